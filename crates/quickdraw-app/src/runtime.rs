//! Generic runtime that drives a [`Node`] over real channels.
//!
//! All state lives on one task: user input, inbound messages, newly
//! accepted peers and the poll timer are multiplexed with `select!` and fed
//! to the node one event at a time, so transitions never interleave. Reader
//! tasks only forward channel traffic into that loop.

use std::collections::HashMap;

use quickdraw_core::{
    Channel, ChannelId, ChannelSink, ChannelStream, Effect, Environment, HostOptions, Intent,
    Listener, Node, NodeAction, NodeEvent, RoomCode, RoundConfig, Transport,
};
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    error::RuntimeError,
    notice::{Notice, NoticeQueue},
    presenter::{Placement, Presenter},
};

/// Input from the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    /// Tap on the full-screen target.
    Tap,
    /// Close the lobby (host).
    StartGame,
    /// Dismiss the notice on screen.
    DismissNotice,
    /// Leave the room.
    Quit,
}

/// How a runtime finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The game ended for this session.
    Ended {
        /// Human-readable cause.
        reason: String,
    },
    /// The user quit or the input source went away.
    Quit,
}

type Inbound = (ChannelId, Option<String>);

/// Channels owned by one runtime, addressed by [`ChannelId`].
struct Links<C: Channel> {
    sinks: HashMap<ChannelId, C::Sink>,
    readers: Vec<JoinHandle<()>>,
    next_id: u64,
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl<C: Channel> Links<C> {
    fn new() -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        (Self { sinks: HashMap::new(), readers: Vec::new(), next_id: 0, inbound }, inbound_rx)
    }

    fn attach(&mut self, channel: C) -> ChannelId {
        let id = ChannelId(self.next_id);
        self.next_id += 1;

        let (sink, mut stream) = channel.split();
        let inbound = self.inbound.clone();
        self.readers.push(tokio::spawn(async move {
            loop {
                let text = stream.recv().await;
                let closed = text.is_none();
                if inbound.send((id, text)).is_err() || closed {
                    break;
                }
            }
        }));
        self.sinks.insert(id, sink);
        id
    }

    fn send(&self, channel: ChannelId, text: String) {
        match self.sinks.get(&channel) {
            Some(sink) => {
                if let Err(error) = sink.send(text) {
                    warn!(%channel, %error, "send failed");
                }
            },
            None => debug!(%channel, "send to closed channel dropped"),
        }
    }

    fn close(&mut self, channel: ChannelId) {
        if let Some(sink) = self.sinks.remove(&channel) {
            sink.close();
        }
    }

    fn shutdown(&mut self) {
        for (_, sink) in self.sinks.drain() {
            sink.close();
        }
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

/// Runs one participant for one game.
///
/// Each call to [`Runtime::host`] or [`Runtime::join`] starts from a fresh
/// session context.
pub struct Runtime<E, P> {
    env: E,
    config: RoundConfig,
    presenter: P,
    notices: NoticeQueue,
}

impl<E: Environment, P: Presenter> Runtime<E, P> {
    /// Create a runtime.
    pub fn new(env: E, config: RoundConfig, presenter: P) -> Self {
        Self { env, config, presenter, notices: NoticeQueue::new() }
    }

    /// The user interface.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Pending modal notices.
    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    /// Give back the user interface.
    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Host a new room and play until the game ends or the user quits.
    pub async fn host<T: Transport>(
        &mut self,
        transport: &T,
        name: &str,
        options: HostOptions,
        inputs: &mut mpsc::UnboundedReceiver<UserInput>,
    ) -> Result<Outcome, RuntimeError> {
        let room = RoomCode::generate(&self.env);
        let listener = match transport.host(room).await {
            Ok(listener) => listener,
            Err(source) => {
                self.presenter.status(&format!("Could not host room {room}"));
                return Err(RuntimeError::Host { room, source });
            },
        };
        info!(%room, name, "hosting room");
        self.presenter.status(&format!("Hosting room {room}"));

        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(listener, accepted_tx));

        let node = Node::host(self.env.clone(), self.config.clone(), name, options);
        let (links, inbound) = Links::<T::Channel>::new();
        self.presenter.roster(node.session().roster());
        Ok(self.drive(node, links, inbound, Some(accepted_rx), Some(accept_task), inputs).await)
    }

    /// Join `room` and play until the game ends or the user quits.
    pub async fn join<T: Transport>(
        &mut self,
        transport: &T,
        room: RoomCode,
        name: &str,
        inputs: &mut mpsc::UnboundedReceiver<UserInput>,
    ) -> Result<Outcome, RuntimeError> {
        self.presenter.status(&format!("Connecting to room {room}..."));
        let channel = match transport.connect(room, name).await {
            Ok(channel) => channel,
            Err(source) => {
                warn!(%room, %source, "connection failed");
                self.presenter.status(&format!("Could not connect to room {room}"));
                return Err(RuntimeError::Connect { room, source });
            },
        };
        info!(%room, name, "joined room");
        self.presenter.status(&format!("Joined room {room}, waiting for the host"));

        let (mut links, inbound) = Links::<T::Channel>::new();
        let host = links.attach(channel);
        let node = Node::player(self.env.clone(), self.config.clone(), name, host);
        Ok(self.drive(node, links, inbound, None, None, inputs).await)
    }

    async fn drive<C: Channel>(
        &mut self,
        mut node: Node<E>,
        mut links: Links<C>,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
        mut accepted: Option<mpsc::UnboundedReceiver<(String, C)>>,
        mut accept_task: Option<JoinHandle<()>>,
        inputs: &mut mpsc::UnboundedReceiver<UserInput>,
    ) -> Outcome {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deferred = Vec::new();

        let outcome = loop {
            if !deferred.is_empty() {
                // Let close notifications of replaced channels land first.
                tokio::task::yield_now().await;
                let mut ready = Vec::new();
                while let Ok((channel, text)) = inbound.try_recv() {
                    ready.push(inbound_event(channel, text));
                }
                ready.append(&mut deferred);
                if let Some(outcome) = self.dispatch(&mut node, &mut links, ready, &mut deferred) {
                    break outcome;
                }
                continue;
            }

            let event = tokio::select! {
                input = inputs.recv() => match input {
                    Some(UserInput::Tap) => NodeEvent::Intent(Intent::Tap),
                    Some(UserInput::StartGame) => NodeEvent::Intent(Intent::StartGame),
                    Some(UserInput::DismissNotice) => {
                        self.dismiss_notice();
                        continue;
                    },
                    Some(UserInput::Quit) | None => break Outcome::Quit,
                },
                Some((channel, text)) = inbound.recv() => inbound_event(channel, text),
                Some((identity, channel)) = next_peer(&mut accepted) => {
                    let channel = links.attach(channel);
                    NodeEvent::PeerConnected { identity, channel }
                },
                _ = ticker.tick() => NodeEvent::Tick,
            };

            if let Some(outcome) = self.dispatch(&mut node, &mut links, vec![event], &mut deferred) {
                break outcome;
            }

            let stopped_listening = node.membership().is_some_and(|m| !m.is_listening());
            if stopped_listening {
                if let Some(task) = accept_task.take() {
                    debug!("no longer accepting peers");
                    task.abort();
                    accepted = None;
                }
            }
        };

        if let Some(task) = accept_task {
            task.abort();
        }
        links.shutdown();
        outcome
    }

    fn dispatch<C: Channel>(
        &mut self,
        node: &mut Node<E>,
        links: &mut Links<C>,
        events: Vec<NodeEvent>,
        deferred: &mut Vec<NodeEvent>,
    ) -> Option<Outcome> {
        let mut ended = None;
        for event in events {
            let actions = match node.handle(event) {
                Ok(actions) => actions,
                Err(error) => {
                    debug!(%error, "intent rejected");
                    self.presenter.status(&error.to_string());
                    continue;
                },
            };

            for action in actions {
                match action {
                    NodeAction::Send { channel, text } => links.send(channel, text),
                    NodeAction::Close { channel } => links.close(channel),
                    NodeAction::Defer(event) => deferred.push(event),
                    NodeAction::Present(effect) => {
                        if let Some(reason) = self.present(effect) {
                            ended = Some(Outcome::Ended { reason });
                        }
                    },
                }
            }
        }
        ended
    }

    /// Apply an effect to the presenter. Returns the reason when the game
    /// ended.
    fn present(&mut self, effect: Effect) -> Option<String> {
        match effect {
            Effect::ShowTarget => self.presenter.show_target(Placement::random(&self.env)),
            Effect::HideTarget => self.presenter.hide_target(),
            Effect::Roster(players) => self.presenter.roster(&players),
            Effect::GameStarted => self.presenter.status("Game on! Tap to start a round"),
            Effect::Winner { player, is_self } => self.notify(Notice::Winner { player, is_self }),
            Effect::GameEnded { reason } => {
                self.presenter.status(&format!("Game over: {reason}"));
                self.notify(Notice::GameOver { reason: reason.clone() });
                return Some(reason);
            },
        }
        None
    }

    fn notify(&mut self, notice: Notice) {
        if let Some(current) = self.notices.push(notice) {
            self.presenter.show_notice(current);
        }
    }

    fn dismiss_notice(&mut self) {
        self.presenter.clear_notice();
        if let Some(next) = self.notices.dismiss() {
            self.presenter.show_notice(next);
        }
    }
}

fn inbound_event(channel: ChannelId, text: Option<String>) -> NodeEvent {
    match text {
        Some(text) => NodeEvent::MessageReceived { channel, text },
        None => NodeEvent::ChannelClosed { channel },
    }
}

async fn next_peer<T>(accepted: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match accepted {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Accept peers until the listener shuts down. A failure concerns one peer
/// only and never stops the loop.
async fn accept_loop<L: Listener>(
    mut listener: L,
    accepted: mpsc::UnboundedSender<(String, L::Channel)>,
) {
    loop {
        match listener.accept().await {
            Ok(Some(peer)) => {
                if accepted.send(peer).is_err() {
                    break;
                }
            },
            Ok(None) => {
                debug!("listener closed");
                break;
            },
            Err(error) => warn!(%error, "failed to accept peer"),
        }
    }
}
