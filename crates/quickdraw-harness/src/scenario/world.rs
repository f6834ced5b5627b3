//! World state for scenario execution.
//!
//! The World owns every actor (one host, any number of players), the virtual
//! links between them and a single event queue ordered by delivery time.
//! Links are reliable and ordered with a fixed one-way latency per player.
//! Every actor is ticked each poll interval, after any events due at the
//! same instant.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BinaryHeap, HashMap},
    time::{Duration, Instant},
};

use quickdraw_core::{
    ChannelId, Effect, HostOptions, Intent, Node, NodeAction, NodeEvent, RoundConfig,
};
use quickdraw_proto::Message;
use tracing::debug;

use crate::sim_env::SimEnv;

/// One participant in the world.
pub struct Actor {
    node: Node<SimEnv>,
    latency: Duration,
    effects: Vec<Effect>,
    sent: Vec<(String, Message)>,
    rejected: Vec<String>,
}

impl Actor {
    fn new(node: Node<SimEnv>, latency: Duration) -> Self {
        Self { node, latency, effects: Vec::new(), sent: Vec::new(), rejected: Vec::new() }
    }

    /// The node.
    pub fn node(&self) -> &Node<SimEnv> {
        &self.node
    }

    /// Effects presented so far.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Messages sent so far, with the label of the receiving actor.
    pub fn sent(&self) -> &[(String, Message)] {
        &self.sent
    }

    /// Intents the node rejected, as error text.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Winners presented so far, in order.
    pub fn winners(&self) -> Vec<String> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Winner { player, .. } => Some(player.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Link {
    owner: String,
    peer: ChannelId,
    latency: Duration,
    open: bool,
}

#[derive(Debug)]
enum Pending {
    Deliver { to: String, event: NodeEvent },
    Reconnect { label: String, stale_close_after: Duration },
    Disconnect { label: String },
    CloseLink { channel: ChannelId },
}

#[derive(Debug)]
struct Scheduled {
    at: Duration,
    seq: u64,
    pending: Pending,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Simulated room.
pub struct World {
    env: SimEnv,
    config: RoundConfig,
    start: Instant,
    now: Duration,
    next_tick: Duration,
    host: String,
    actors: BTreeMap<String, Actor>,
    links: HashMap<ChannelId, Link>,
    next_channel: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    seq: u64,
}

impl World {
    /// World containing only the host, labelled by its identity.
    pub fn new(seed: u64, config: RoundConfig, host: &str, options: HostOptions) -> Self {
        let start = Instant::now();
        let env = SimEnv::manual(seed, start);
        let node = Node::host(env.clone(), config.clone(), host, options);
        let next_tick = config.poll_interval;

        let mut actors = BTreeMap::new();
        actors.insert(host.to_string(), Actor::new(node, Duration::ZERO));

        Self {
            env,
            config,
            start,
            now: Duration::ZERO,
            next_tick,
            host: host.to_string(),
            actors,
            links: HashMap::new(),
            next_channel: 0,
            queue: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Simulated time since the world was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Label of the host actor.
    pub fn host_label(&self) -> &str {
        &self.host
    }

    /// The host actor.
    pub fn host(&self) -> Option<&Actor> {
        self.actors.get(&self.host)
    }

    /// Actor by label.
    pub fn actor(&self, label: &str) -> Option<&Actor> {
        self.actors.get(label)
    }

    /// Node by label.
    pub fn node(&self, label: &str) -> Option<&Node<SimEnv>> {
        self.actors.get(label).map(Actor::node)
    }

    /// Every actor, ordered by label.
    pub fn actors(&self) -> impl Iterator<Item = (&str, &Actor)> {
        self.actors.iter().map(|(label, actor)| (label.as_str(), actor))
    }

    /// Messages delivered or in flight to `label`, in send order per sender.
    pub fn received(&self, label: &str) -> Vec<Message> {
        self.actors
            .values()
            .flat_map(|actor| actor.sent.iter())
            .filter(|(to, _)| to == label)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Connect a player labelled `label` claiming `identity`, with a fixed
    /// one-way latency to the host.
    pub fn join(&mut self, label: &str, identity: &str, latency: Duration) {
        let (host_end, player_end) = self.open_link(label, latency);
        let node = Node::player(self.env.clone(), self.config.clone(), identity, player_end);
        self.actors.insert(label.to_string(), Actor::new(node, latency));
        self.schedule(
            self.now + latency,
            Pending::Deliver {
                to: self.host.clone(),
                event: NodeEvent::PeerConnected { identity: identity.to_string(), channel: host_end },
            },
        );
    }

    /// Apply an intent now.
    pub fn intent(&mut self, label: &str, intent: Intent) {
        self.deliver(label, NodeEvent::Intent(intent));
    }

    /// Apply an intent at `at`.
    pub fn intent_at(&mut self, at: Duration, label: &str, intent: Intent) {
        self.schedule(
            at,
            Pending::Deliver { to: label.to_string(), event: NodeEvent::Intent(intent) },
        );
    }

    /// At `at`, replace `label` with a fresh client that connects again
    /// under the same identity. Unless the host closes it first, the old
    /// connection is dropped `stale_close_after` later.
    pub fn reconnect_at(&mut self, at: Duration, label: &str, stale_close_after: Duration) {
        self.schedule(at, Pending::Reconnect { label: label.to_string(), stale_close_after });
    }

    /// At `at`, `label` drops its connection to the host.
    pub fn disconnect_at(&mut self, at: Duration, label: &str) {
        self.schedule(at, Pending::Disconnect { label: label.to_string() });
    }

    /// Process every event and tick due up to and including `until`.
    pub fn run_until(&mut self, until: Duration) {
        loop {
            let next_event = self.queue.peek().map(|Reverse(scheduled)| scheduled.at);
            match next_event {
                Some(at) if at <= self.next_tick && at <= until => {
                    if let Some(Reverse(scheduled)) = self.queue.pop() {
                        self.set_time(scheduled.at);
                        self.process(scheduled.pending);
                    }
                },
                _ if self.next_tick <= until => {
                    self.set_time(self.next_tick);
                    self.next_tick += self.config.poll_interval;
                    let labels: Vec<String> = self.actors.keys().cloned().collect();
                    for label in labels {
                        self.deliver(&label, NodeEvent::Tick);
                    }
                },
                _ => break,
            }
        }
        self.set_time(until);
    }

    /// Run for `duration` more simulated time.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    fn set_time(&mut self, at: Duration) {
        if at > self.now {
            self.now = at;
            self.env.advance_to(self.start + at);
        }
    }

    fn schedule(&mut self, at: Duration, pending: Pending) {
        self.seq += 1;
        self.queue.push(Reverse(Scheduled { at: at.max(self.now), seq: self.seq, pending }));
    }

    fn open_link(&mut self, label: &str, latency: Duration) -> (ChannelId, ChannelId) {
        let host_end = ChannelId(self.next_channel);
        let player_end = ChannelId(self.next_channel + 1);
        self.next_channel += 2;

        self.links.insert(
            host_end,
            Link { owner: self.host.clone(), peer: player_end, latency, open: true },
        );
        self.links
            .insert(player_end, Link { owner: label.to_string(), peer: host_end, latency, open: true });
        (host_end, player_end)
    }

    fn process(&mut self, pending: Pending) {
        match pending {
            Pending::Deliver { to, event } => self.deliver(&to, event),
            Pending::Reconnect { label, stale_close_after } => self.reconnect(&label, stale_close_after),
            Pending::Disconnect { label } => {
                if let Some(channel) = self.node(&label).and_then(Node::host_channel) {
                    self.close_link(channel);
                }
            },
            Pending::CloseLink { channel } => self.close_link(channel),
        }
    }

    fn reconnect(&mut self, label: &str, stale_close_after: Duration) {
        let Some(actor) = self.actors.get(label) else {
            return;
        };
        let identity = actor.node.session().self_id().to_string();
        let latency = actor.latency;
        let stale = actor.node.host_channel();
        debug!(label, %identity, "client reconnecting");

        self.join(label, &identity, latency);
        if let Some(stale) = stale {
            self.schedule(self.now + stale_close_after, Pending::CloseLink { channel: stale });
        }
    }

    fn deliver(&mut self, label: &str, event: NodeEvent) {
        let Some(actor) = self.actors.get_mut(label) else {
            debug!(label, "event for unknown actor dropped");
            return;
        };
        match actor.node.handle(event) {
            Ok(actions) => self.execute(label, actions),
            Err(error) => {
                debug!(label, %error, "intent rejected");
                actor.rejected.push(error.to_string());
            },
        }
    }

    fn execute(&mut self, from: &str, actions: Vec<NodeAction>) {
        for action in actions {
            match action {
                NodeAction::Send { channel, text } => self.send(from, channel, text),
                NodeAction::Close { channel } => self.close_link(channel),
                NodeAction::Defer(event) => {
                    self.schedule(self.now, Pending::Deliver { to: from.to_string(), event });
                },
                NodeAction::Present(effect) => {
                    if let Some(actor) = self.actors.get_mut(from) {
                        actor.effects.push(effect);
                    }
                },
            }
        }
    }

    fn send(&mut self, from: &str, channel: ChannelId, text: String) {
        let Some(link) = self.links.get(&channel).filter(|link| link.open) else {
            debug!(from, %channel, "send on closed link dropped");
            return;
        };
        let (peer, latency) = (link.peer, link.latency);
        let Some(to) = self.links.get(&peer).map(|link| link.owner.clone()) else {
            return;
        };

        if let (Some(actor), Ok(Some(message))) = (self.actors.get_mut(from), Message::decode(&text)) {
            actor.sent.push((to.clone(), message));
        }
        self.schedule(
            self.now + latency,
            Pending::Deliver { to, event: NodeEvent::MessageReceived { channel: peer, text } },
        );
    }

    fn close_link(&mut self, channel: ChannelId) {
        let Some(link) = self.links.get_mut(&channel).filter(|link| link.open) else {
            return;
        };
        link.open = false;
        let (owner, peer, latency) = (link.owner.clone(), link.peer, link.latency);
        let Some(peer_link) = self.links.get_mut(&peer) else {
            return;
        };
        peer_link.open = false;
        let peer_owner = peer_link.owner.clone();

        self.schedule(self.now, Pending::Deliver { to: owner, event: NodeEvent::ChannelClosed { channel } });
        self.schedule(
            self.now + latency,
            Pending::Deliver { to: peer_owner, event: NodeEvent::ChannelClosed { channel: peer } },
        );
    }
}

#[cfg(test)]
mod tests {
    use quickdraw_core::{Environment, Stage};

    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn join_reaches_host_after_latency() {
        let mut world = World::new(1, RoundConfig::default(), "host", HostOptions::default());
        world.join("p1", "p1", ms(30));

        world.run_until(ms(29));
        assert_eq!(world.host().map(|h| h.node().session().roster().len()), Some(1));

        world.run_until(ms(30));
        assert_eq!(
            world.node("p1").map(|n| n.session().roster().to_vec()),
            Some(vec!["host".to_string(), "p1".to_string()])
        );
    }

    #[test]
    fn clock_follows_simulated_time() {
        let mut world = World::new(1, RoundConfig::default(), "host", HostOptions::default());
        let before = world.env().now();
        world.run_until(ms(120));
        assert_eq!(world.env().now() - before, ms(120));
        assert_eq!(world.now(), ms(120));
    }

    #[test]
    fn disconnect_ends_game_on_both_sides() {
        let mut world = World::new(1, RoundConfig::default(), "host", HostOptions::default());
        world.join("p1", "p1", ms(5));
        world.intent_at(ms(10), "host", Intent::StartGame);
        world.disconnect_at(ms(20), "p1");
        world.run_until(ms(40));

        for label in ["host", "p1"] {
            assert_eq!(world.node(label).map(|n| n.session().stage()), Some(Stage::Ended));
        }
        let host_effects = world.host().map(Actor::effects).unwrap_or_default();
        assert!(host_effects.contains(&Effect::GameEnded { reason: "p1 left the game".into() }));
    }
}
