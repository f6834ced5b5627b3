//! One participant of a room.
//!
//! [`Node`] ties the session context, the host's roster and the round
//! coordinator together behind a single event enum. External notifications
//! (channel opened, message received, channel closed, user intent, timer
//! tick) go in as [`NodeEvent`]s; [`NodeAction`]s come out for the driver to
//! execute. Nothing here touches a real channel.
//!
//! # Event flow
//!
//! ```text
//! intent / tick / inbound text
//!            │
//!            ▼
//!     ┌─────────────┐   RoundAction    ┌──────────────┐
//!     │    Node     │ ───────────────> │    route     │ ──> NodeAction
//!     │ (session,   │ <─────────────── │ (recipients  │
//!     │  roster)    │   RoundEvent     │  to channels)│
//!     └─────────────┘                  └──────────────┘
//! ```

use std::time::Duration;

use quickdraw_proto::Message;
use tracing::{debug, info, warn};

use crate::{
    env::Environment,
    error::CoreError,
    membership::{Admission, ChannelId, Membership},
    round::{ArmOrigin, Recipient, RoundAction, RoundConfig, RoundCoordinator, RoundPhase},
    session::{Role, Session, Stage},
};

/// Host settings chosen at room creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOptions {
    /// Start automatically once the roster (host included) reaches this
    /// size. `None` waits for an explicit [`Intent::StartGame`].
    pub expected_members: Option<usize>,
}

/// Local user intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Open a round.
    Arm,
    /// Press the target.
    Press,
    /// Tap the full-screen target: arms when idle, presses when armed.
    Tap,
    /// Close the lobby and begin (host only).
    StartGame,
}

/// Inputs to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A peer connected to the host claiming `identity`.
    PeerConnected {
        /// Claimed identity.
        identity: String,
        /// Channel the peer is reachable on.
        channel: ChannelId,
    },
    /// Install a parked reconnect channel. Emitted by the node itself via
    /// [`NodeAction::Defer`].
    InstallPeer {
        /// Registered identity.
        identity: String,
        /// Parked channel.
        channel: ChannelId,
    },
    /// Text arrived on a channel.
    MessageReceived {
        /// Source channel.
        channel: ChannelId,
        /// Raw message text.
        text: String,
    },
    /// A channel closed.
    ChannelClosed {
        /// Closed channel.
        channel: ChannelId,
    },
    /// The local user did something.
    Intent(Intent),
    /// Periodic timer.
    Tick,
}

/// User-visible effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show the target.
    ShowTarget,
    /// Hide the target.
    HideTarget,
    /// Roster changed.
    Roster(Vec<String>),
    /// The lobby closed and rounds can begin.
    GameStarted,
    /// A round was won.
    Winner {
        /// Winning identity.
        player: String,
        /// Whether the local participant won.
        is_self: bool,
    },
    /// The game is over for this session.
    GameEnded {
        /// Human-readable cause.
        reason: String,
    },
}

/// Effects requested by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    /// Send encoded text on a channel.
    Send {
        /// Destination channel.
        channel: ChannelId,
        /// Encoded message.
        text: String,
    },
    /// Close a channel.
    Close {
        /// Channel to close.
        channel: ChannelId,
    },
    /// Feed this event back after one scheduling tick, once pending close
    /// notifications have been delivered.
    Defer(NodeEvent),
    /// Update the presentation.
    Present(Effect),
}

/// One participant: host or player.
#[derive(Debug, Clone)]
pub struct Node<E> {
    env: E,
    config: RoundConfig,
    options: HostOptions,
    session: Session,
    round: RoundCoordinator<E>,
    membership: Option<Membership>,
    host_channel: Option<ChannelId>,
}

impl<E: Environment> Node<E> {
    /// Node for the host of a new room.
    pub fn host(env: E, config: RoundConfig, self_id: impl Into<String>, options: HostOptions) -> Self {
        let session = Session::host(self_id);
        let round = RoundCoordinator::new(env.clone(), config.clone(), session.self_id(), true);
        let membership = Some(Membership::new(session.self_id()));
        Self { env, config, options, session, round, membership, host_channel: None }
    }

    /// Node for a player connected to the host on `host_channel`.
    pub fn player(env: E, config: RoundConfig, self_id: impl Into<String>, host_channel: ChannelId) -> Self {
        let session = Session::player(self_id);
        let round = RoundCoordinator::new(env.clone(), config.clone(), session.self_id(), false);
        Self {
            env,
            config,
            options: HostOptions::default(),
            session,
            round,
            membership: None,
            host_channel: Some(host_channel),
        }
    }

    /// Session context.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Round coordinator.
    pub fn round(&self) -> &RoundCoordinator<E> {
        &self.round
    }

    /// Roster (host only).
    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }

    /// Channel to the host (player only).
    pub fn host_channel(&self) -> Option<ChannelId> {
        self.host_channel
    }

    /// Reopen the room for the next game: lobby stage, idle round, and an
    /// empty roster that accepts connections again.
    ///
    /// Host only. A player's channel to the host is gone once a game ends, so
    /// players reconnect and start from a fresh [`Node::player`].
    pub fn reset(&mut self) -> Result<(), CoreError> {
        if !self.session.is_host() {
            let role = self.session.role();
            return Err(CoreError::WrongRole { role, operation: "reset the room" });
        }
        self.session = self.session.reset();
        self.round = RoundCoordinator::new(self.env.clone(), self.config.clone(), self.session.self_id(), true);
        self.membership = Some(Membership::new(self.session.self_id()));
        Ok(())
    }

    /// Apply an event.
    pub fn handle(&mut self, event: NodeEvent) -> Result<Vec<NodeAction>, CoreError> {
        match event {
            NodeEvent::PeerConnected { identity, channel } => Ok(self.peer_connected(&identity, channel)),
            NodeEvent::InstallPeer { identity, channel } => Ok(self.install_peer(&identity, channel)),
            NodeEvent::MessageReceived { channel, text } => Ok(self.message_received(channel, &text)),
            NodeEvent::ChannelClosed { channel } => Ok(self.channel_closed(channel)),
            NodeEvent::Intent(intent) => self.intent(intent),
            NodeEvent::Tick => {
                let actions = self.round.tick();
                Ok(self.route(actions))
            },
        }
    }

    fn intent(&mut self, intent: Intent) -> Result<Vec<NodeAction>, CoreError> {
        if intent == Intent::StartGame {
            return self.start_game();
        }

        let stage = self.session.stage();
        if stage != Stage::Playing {
            return Err(CoreError::InvalidStage { stage, operation: "play a round" });
        }

        let actions = match intent {
            Intent::Arm => self.round.arm(ArmOrigin::Local),
            Intent::Press => self.round.press(),
            Intent::Tap if self.round.phase() == RoundPhase::Idle => self.round.arm(ArmOrigin::Local),
            Intent::Tap => self.round.press(),
            Intent::StartGame => Vec::new(),
        };
        Ok(self.route(actions))
    }

    fn start_game(&mut self) -> Result<Vec<NodeAction>, CoreError> {
        let role = self.session.role();
        let Some(membership) = self.membership.as_mut() else {
            return Err(CoreError::WrongRole { role, operation: "start the game" });
        };
        let stage = self.session.stage();
        if stage != Stage::Lobby {
            return Err(CoreError::InvalidStage { stage, operation: "start the game" });
        }

        let count = membership.stop_listening();
        let roster = membership.roster();
        self.round.set_expected_members(count);
        self.session.start(Some(count));
        self.session.set_roster(roster.clone());
        info!(members = count, "game started");

        let mut actions = self.broadcast(&Message::Players { players: roster });
        actions.extend(self.broadcast(&Message::StartGame));
        actions.push(NodeAction::Present(Effect::GameStarted));
        Ok(actions)
    }

    fn peer_connected(&mut self, identity: &str, channel: ChannelId) -> Vec<NodeAction> {
        let Some(membership) = self.membership.as_mut() else {
            warn!(identity, %channel, "inbound peer on a player node");
            return vec![NodeAction::Close { channel }];
        };

        match membership.admit(identity, channel) {
            None => vec![NodeAction::Close { channel }],
            Some(Admission::Joined { .. }) => self.roster_changed(),
            Some(Admission::Replacing { identity, stale }) => vec![
                NodeAction::Close { channel: stale },
                NodeAction::Defer(NodeEvent::InstallPeer { identity, channel }),
            ],
        }
    }

    fn install_peer(&mut self, identity: &str, channel: ChannelId) -> Vec<NodeAction> {
        let installed = self.membership.as_mut().is_some_and(|m| m.install(identity, channel));
        if installed && self.session.stage() == Stage::Lobby {
            self.roster_changed()
        } else {
            Vec::new()
        }
    }

    fn roster_changed(&mut self) -> Vec<NodeAction> {
        let Some(membership) = self.membership.as_ref() else {
            return Vec::new();
        };
        let roster = membership.roster();
        self.session.set_roster(roster.clone());

        let reached = self.options.expected_members.is_some_and(|n| roster.len() >= n);
        let mut actions = self.broadcast(&Message::Players { players: roster.clone() });
        actions.push(NodeAction::Present(Effect::Roster(roster)));

        if reached {
            match self.start_game() {
                Ok(started) => actions.extend(started),
                Err(error) => debug!(%error, "automatic start skipped"),
            }
        }
        actions
    }

    fn message_received(&mut self, channel: ChannelId, text: &str) -> Vec<NodeAction> {
        let message = match Message::decode(text) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!(%channel, "unknown message type ignored");
                return Vec::new();
            },
            Err(error) => {
                debug!(%channel, %error, "malformed message ignored");
                return Vec::new();
            },
        };

        match self.session.role() {
            Role::Host => self.host_message(channel, message),
            Role::Player => self.player_message(channel, message),
        }
    }

    fn host_message(&mut self, channel: ChannelId, message: Message) -> Vec<NodeAction> {
        let Some(identity) =
            self.membership.as_ref().and_then(|m| m.identity_of(channel)).map(str::to_string)
        else {
            debug!(%channel, kind = message.kind(), "message from unregistered channel ignored");
            return Vec::new();
        };
        if self.session.stage() != Stage::Playing {
            debug!(%identity, kind = message.kind(), "message outside a game ignored");
            return Vec::new();
        }

        let actions = match message {
            Message::InitButton => self.round.arm(ArmOrigin::Player(identity)),
            Message::PushButton { time } => {
                self.round.register_press(identity, Duration::from_millis(time))
            },
            other => {
                debug!(%identity, kind = other.kind(), "message not expected by host");
                Vec::new()
            },
        };
        self.route(actions)
    }

    fn player_message(&mut self, channel: ChannelId, message: Message) -> Vec<NodeAction> {
        if self.host_channel != Some(channel) {
            debug!(%channel, kind = message.kind(), "message from non-host channel ignored");
            return Vec::new();
        }

        match message {
            Message::Players { players } => {
                self.session.set_roster(players.clone());
                vec![NodeAction::Present(Effect::Roster(players))]
            },
            Message::StartGame => {
                if self.session.stage() != Stage::Lobby {
                    return Vec::new();
                }
                let members = self.session.roster().len();
                self.session.start((members > 0).then_some(members));
                info!(members, "game started by host");
                vec![NodeAction::Present(Effect::GameStarted)]
            },
            Message::InitButton if self.session.stage() == Stage::Playing => {
                let actions = self.round.arm(ArmOrigin::Host);
                self.route(actions)
            },
            Message::MaxTime { time } => {
                let actions = self.round.tighten_deadline(Duration::from_millis(time));
                self.route(actions)
            },
            Message::Winner { player } => {
                let actions = self.round.accept_winner(player);
                self.route(actions)
            },
            other => {
                debug!(kind = other.kind(), stage = ?self.session.stage(), "message not expected by player");
                Vec::new()
            },
        }
    }

    fn channel_closed(&mut self, channel: ChannelId) -> Vec<NodeAction> {
        if self.session.stage() == Stage::Ended {
            return Vec::new();
        }

        match self.session.role() {
            Role::Host => {
                let Some(identity) = self.membership.as_mut().and_then(|m| m.remove_channel(channel))
                else {
                    debug!(%channel, "close of stale channel ignored");
                    return Vec::new();
                };
                if self.session.stage() == Stage::Playing {
                    self.end_game(format!("{identity} left the game"))
                } else {
                    self.roster_changed()
                }
            },
            Role::Player if self.host_channel == Some(channel) => {
                self.end_game("connection to host closed".to_string())
            },
            Role::Player => Vec::new(),
        }
    }

    fn end_game(&mut self, reason: String) -> Vec<NodeAction> {
        info!(%reason, "game ended");
        let armed = self.round.phase() == RoundPhase::Armed && !self.round.is_pressed();
        self.session.end();
        self.round.reset();

        let channels = match (&self.membership, self.host_channel) {
            (Some(membership), _) => membership.all_channels(),
            (None, Some(host)) => vec![host],
            (None, None) => Vec::new(),
        };
        let mut actions: Vec<NodeAction> =
            channels.into_iter().map(|channel| NodeAction::Close { channel }).collect();
        if armed {
            actions.push(NodeAction::Present(Effect::HideTarget));
        }
        actions.push(NodeAction::Present(Effect::GameEnded { reason }));
        actions
    }

    fn broadcast(&self, message: &Message) -> Vec<NodeAction> {
        self.send_to(&Recipient::Players, message)
    }

    fn send_to(&self, to: &Recipient, message: &Message) -> Vec<NodeAction> {
        let text = match message.encode() {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, kind = message.kind(), "failed to encode message");
                return Vec::new();
            },
        };

        let channels: Vec<ChannelId> = match (to, &self.membership) {
            (Recipient::Host, _) => self.host_channel.into_iter().collect(),
            (Recipient::Players, Some(membership)) => {
                membership.live_channels().map(|(_, channel)| channel).collect()
            },
            (Recipient::PlayersExcept(excluded), Some(membership)) => membership
                .live_channels()
                .filter(|(identity, _)| *identity != excluded.as_str())
                .map(|(_, channel)| channel)
                .collect(),
            (_, None) => Vec::new(),
        };

        channels.into_iter().map(|channel| NodeAction::Send { channel, text: text.clone() }).collect()
    }

    fn route(&self, actions: Vec<RoundAction>) -> Vec<NodeAction> {
        let mut routed = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                RoundAction::Send { to, message } => routed.extend(self.send_to(&to, &message)),
                RoundAction::ShowTarget => routed.push(NodeAction::Present(Effect::ShowTarget)),
                RoundAction::HideTarget => routed.push(NodeAction::Present(Effect::HideTarget)),
                RoundAction::Resolved { winner } => {
                    let is_self = winner == self.session.self_id();
                    routed.push(NodeAction::Present(Effect::Winner { player: winner, is_self }));
                },
            }
        }
        routed
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::ManualEnv;

    fn host_node(env: &ManualEnv) -> Node<ManualEnv> {
        Node::host(env.clone(), RoundConfig::default(), "host", HostOptions::default())
    }

    fn connect(node: &mut Node<ManualEnv>, identity: &str, channel: u64) -> Vec<NodeAction> {
        node.handle(NodeEvent::PeerConnected { identity: identity.into(), channel: ChannelId(channel) })
            .unwrap()
    }

    fn receive(node: &mut Node<ManualEnv>, channel: u64, message: &Message) -> Vec<NodeAction> {
        let text = message.encode().unwrap();
        node.handle(NodeEvent::MessageReceived { channel: ChannelId(channel), text }).unwrap()
    }

    fn messages_to(actions: &[NodeAction], channel: u64) -> Vec<Message> {
        actions
            .iter()
            .filter_map(|a| match a {
                NodeAction::Send { channel: c, text } if *c == ChannelId(channel) => {
                    Message::decode(text).unwrap()
                },
                _ => None,
            })
            .collect()
    }

    fn effects(actions: &[NodeAction]) -> Vec<Effect> {
        actions
            .iter()
            .filter_map(|a| match a {
                NodeAction::Present(effect) => Some(effect.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn join_broadcasts_roster_to_every_player() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        let actions = connect(&mut node, "p2", 2);

        let roster = Message::Players { players: vec!["host".into(), "p1".into(), "p2".into()] };
        assert_eq!(messages_to(&actions, 1), vec![roster.clone()]);
        assert_eq!(messages_to(&actions, 2), vec![roster]);
        assert_eq!(
            effects(&actions),
            vec![Effect::Roster(vec!["host".into(), "p1".into(), "p2".into()])]
        );
    }

    #[test]
    fn start_game_locks_member_count() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);

        let actions = node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();

        assert_eq!(node.session().stage(), Stage::Playing);
        assert_eq!(node.session().member_count(), Some(2));
        assert_eq!(node.round().expected_members(), 2);
        assert_eq!(
            messages_to(&actions, 1),
            vec![
                Message::Players { players: vec!["host".into(), "p1".into()] },
                Message::StartGame,
            ]
        );

        let late = connect(&mut node, "p2", 2);
        assert_eq!(late, vec![NodeAction::Close { channel: ChannelId(2) }]);
    }

    #[test]
    fn start_game_is_host_only_and_once() {
        let env = ManualEnv::with_seed(1);
        let mut player = Node::player(env.clone(), RoundConfig::default(), "p1", ChannelId(0));
        assert!(matches!(
            player.handle(NodeEvent::Intent(Intent::StartGame)),
            Err(CoreError::WrongRole { role: Role::Player, .. })
        ));

        let mut host = host_node(&env);
        host.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();
        assert!(matches!(
            host.handle(NodeEvent::Intent(Intent::StartGame)),
            Err(CoreError::InvalidStage { stage: Stage::Playing, .. })
        ));
    }

    #[test]
    fn intents_before_start_are_rejected() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        assert!(matches!(
            node.handle(NodeEvent::Intent(Intent::Tap)),
            Err(CoreError::InvalidStage { stage: Stage::Lobby, .. })
        ));
    }

    #[test]
    fn expected_members_starts_automatically() {
        let env = ManualEnv::with_seed(1);
        let options = HostOptions { expected_members: Some(3) };
        let mut node = Node::host(env.clone(), RoundConfig::default(), "host", options);

        connect(&mut node, "p1", 1);
        assert_eq!(node.session().stage(), Stage::Lobby);

        let actions = connect(&mut node, "p2", 2);
        assert_eq!(node.session().stage(), Stage::Playing);
        assert_eq!(node.session().member_count(), Some(3));
        assert!(effects(&actions).contains(&Effect::GameStarted));
        assert!(messages_to(&actions, 2).contains(&Message::StartGame));
    }

    #[test]
    fn tap_arms_then_presses() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();

        let actions = node.handle(NodeEvent::Intent(Intent::Tap)).unwrap();
        assert_eq!(effects(&actions), vec![Effect::ShowTarget]);
        assert_eq!(messages_to(&actions, 1), vec![Message::InitButton]);

        env.advance_ms(200);
        let actions = node.handle(NodeEvent::Intent(Intent::Tap)).unwrap();
        assert_eq!(effects(&actions), vec![Effect::HideTarget]);
        assert_eq!(node.round().press_times().unwrap().get("host"), Some(&Duration::from_millis(200)));
    }

    #[test]
    fn player_report_resolves_round_for_everyone() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();
        node.handle(NodeEvent::Intent(Intent::Arm)).unwrap();
        env.advance_ms(500);
        node.handle(NodeEvent::Intent(Intent::Press)).unwrap();

        let actions = receive(&mut node, 1, &Message::PushButton { time: 320 });

        assert_eq!(messages_to(&actions, 1), vec![Message::Winner { player: "p1".into() }]);
        assert_eq!(effects(&actions), vec![Effect::Winner { player: "p1".into(), is_self: false }]);
        assert_eq!(node.round().phase(), RoundPhase::Idle);
    }

    #[test]
    fn player_arm_is_relayed_to_others_only() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        connect(&mut node, "p2", 2);
        node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();

        let actions = receive(&mut node, 1, &Message::InitButton);

        assert!(messages_to(&actions, 1).is_empty());
        assert_eq!(messages_to(&actions, 2), vec![Message::InitButton]);
        assert_eq!(node.round().phase(), RoundPhase::Armed);
    }

    #[test]
    fn player_follows_host_messages() {
        let env = ManualEnv::with_seed(1);
        let mut node = Node::player(env.clone(), RoundConfig::default(), "p1", ChannelId(7));

        let actions = receive(&mut node, 7, &Message::Players { players: vec!["h".into(), "p1".into()] });
        assert_eq!(effects(&actions), vec![Effect::Roster(vec!["h".into(), "p1".into()])]);

        // Arms are ignored until the game starts.
        receive(&mut node, 7, &Message::InitButton);
        assert_eq!(node.round().phase(), RoundPhase::Idle);

        receive(&mut node, 7, &Message::StartGame);
        let actions = receive(&mut node, 7, &Message::InitButton);
        assert_eq!(effects(&actions), vec![Effect::ShowTarget]);
        assert!(messages_to(&actions, 7).is_empty(), "host arms are never echoed");

        receive(&mut node, 7, &Message::MaxTime { time: 400 });
        assert_eq!(node.round().deadline(), Duration::from_millis(400));

        env.advance_ms(250);
        let actions = node.handle(NodeEvent::Intent(Intent::Press)).unwrap();
        assert_eq!(messages_to(&actions, 7), vec![Message::PushButton { time: 250 }]);

        let actions = receive(&mut node, 7, &Message::Winner { player: "p1".into() });
        assert_eq!(effects(&actions), vec![Effect::Winner { player: "p1".into(), is_self: true }]);
        assert_eq!(node.round().deadline(), Duration::from_millis(1500));
    }

    #[test]
    fn player_ignores_other_channels_and_host_only_messages() {
        let env = ManualEnv::with_seed(1);
        let mut node = Node::player(env.clone(), RoundConfig::default(), "p1", ChannelId(7));
        receive(&mut node, 7, &Message::StartGame);

        assert!(receive(&mut node, 8, &Message::InitButton).is_empty());
        assert!(receive(&mut node, 7, &Message::PushButton { time: 1 }).is_empty());
        assert_eq!(node.round().phase(), RoundPhase::Idle);
    }

    #[test]
    fn lobby_departure_rebroadcasts_roster() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        connect(&mut node, "p2", 2);

        let actions = node.handle(NodeEvent::ChannelClosed { channel: ChannelId(1) }).unwrap();

        assert_eq!(
            messages_to(&actions, 2),
            vec![Message::Players { players: vec!["host".into(), "p2".into()] }]
        );
        assert_eq!(node.session().stage(), Stage::Lobby);
    }

    #[test]
    fn departure_mid_game_ends_session_for_everyone() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        connect(&mut node, "p2", 2);
        node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();
        node.handle(NodeEvent::Intent(Intent::Arm)).unwrap();

        let actions = node.handle(NodeEvent::ChannelClosed { channel: ChannelId(1) }).unwrap();

        assert!(actions.contains(&NodeAction::Close { channel: ChannelId(2) }));
        assert_eq!(
            effects(&actions),
            vec![Effect::HideTarget, Effect::GameEnded { reason: "p1 left the game".into() }]
        );
        assert_eq!(node.session().stage(), Stage::Ended);
        assert_eq!(node.round().phase(), RoundPhase::Idle);

        // Close notifications for channels we closed ourselves are inert.
        assert!(node.handle(NodeEvent::ChannelClosed { channel: ChannelId(2) }).unwrap().is_empty());
    }

    #[test]
    fn player_learns_member_count_from_roster() {
        let env = ManualEnv::with_seed(1);
        let mut node = Node::player(env.clone(), RoundConfig::default(), "p1", ChannelId(7));
        assert_eq!(node.session().member_count(), None);

        let players = vec!["host".into(), "p1".into(), "p2".into()];
        receive(&mut node, 7, &Message::Players { players });
        receive(&mut node, 7, &Message::StartGame);

        assert_eq!(node.session().stage(), Stage::Playing);
        assert_eq!(node.session().member_count(), Some(3));
    }

    #[test]
    fn host_channel_close_ends_player_game() {
        let env = ManualEnv::with_seed(1);
        let mut node = Node::player(env.clone(), RoundConfig::default(), "p1", ChannelId(7));
        receive(&mut node, 7, &Message::StartGame);

        let actions = node.handle(NodeEvent::ChannelClosed { channel: ChannelId(7) }).unwrap();
        assert!(matches!(effects(&actions).last(), Some(Effect::GameEnded { .. })));
        assert_eq!(node.session().stage(), Stage::Ended);
    }

    #[test]
    fn reconnect_closes_stale_channel_and_defers_install() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);

        let actions = connect(&mut node, "p1", 2);
        assert_eq!(
            actions,
            vec![
                NodeAction::Close { channel: ChannelId(1) },
                NodeAction::Defer(NodeEvent::InstallPeer {
                    identity: "p1".into(),
                    channel: ChannelId(2),
                }),
            ]
        );

        assert!(node.handle(NodeEvent::ChannelClosed { channel: ChannelId(1) }).unwrap().is_empty());
        let actions = node
            .handle(NodeEvent::InstallPeer { identity: "p1".into(), channel: ChannelId(2) })
            .unwrap();
        assert_eq!(
            messages_to(&actions, 2),
            vec![Message::Players { players: vec!["host".into(), "p1".into()] }]
        );
    }

    #[test]
    fn malformed_text_is_ignored() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        let actions = node
            .handle(NodeEvent::MessageReceived { channel: ChannelId(1), text: "{{nope".into() })
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn reset_reopens_lobby() {
        let env = ManualEnv::with_seed(1);
        let mut node = host_node(&env);
        connect(&mut node, "p1", 1);
        node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();
        node.handle(NodeEvent::ChannelClosed { channel: ChannelId(1) }).unwrap();

        node.reset().unwrap();

        assert_eq!(node.session().stage(), Stage::Lobby);
        assert!(node.membership().is_some_and(Membership::is_listening));
        assert_eq!(node.membership().map(Membership::roster), Some(vec!["host".to_string()]));
    }

    #[test]
    fn player_cannot_reset_after_losing_host() {
        let env = ManualEnv::with_seed(1);
        let mut node = Node::player(env.clone(), RoundConfig::default(), "p1", ChannelId(7));
        receive(&mut node, 7, &Message::StartGame);
        node.handle(NodeEvent::ChannelClosed { channel: ChannelId(7) }).unwrap();

        assert!(matches!(node.reset(), Err(CoreError::WrongRole { role: Role::Player, .. })));
        assert_eq!(node.session().stage(), Stage::Ended);
    }

    proptest! {
        #[test]
        fn unknown_types_never_touch_round_state(
            tag in "[a-z]{3,10}",
            armed in any::<bool>(),
        ) {
            prop_assume!(!["winner", "players"].contains(&tag.as_str()));
            let env = ManualEnv::with_seed(2);
            let mut node = host_node(&env);
            connect(&mut node, "p1", 1);
            node.handle(NodeEvent::Intent(Intent::StartGame)).unwrap();
            if armed {
                node.handle(NodeEvent::Intent(Intent::Arm)).unwrap();
            }
            let before = node.round().snapshot();

            let text = format!(r#"{{"type":"{tag}","time":5,"player":"p1"}}"#);
            let actions = node
                .handle(NodeEvent::MessageReceived { channel: ChannelId(1), text })
                .unwrap();

            prop_assert!(actions.is_empty());
            prop_assert_eq!(node.round().snapshot(), before);
        }
    }
}
