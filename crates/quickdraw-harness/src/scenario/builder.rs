//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use quickdraw_core::{HostOptions, Intent, RoundConfig};

use crate::scenario::{OracleFn, World};

#[derive(Debug, Clone)]
enum Step {
    Intent { label: String, intent: Intent },
    Reconnect { label: String, stale_close_after: Duration },
    Disconnect { label: String },
}

/// Scenario builder.
///
/// Add a host, players and timed steps, then call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    seed: u64,
    config: RoundConfig,
    options: HostOptions,
    host: String,
    players: Vec<(String, String, Duration)>,
    steps: Vec<(Duration, Step)>,
    duration: Duration,
}

impl Scenario {
    /// New scenario hosted by `"host"`, seed 0, default round constants,
    /// running for three simulated seconds.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            config: RoundConfig::default(),
            options: HostOptions::default(),
            host: "host".to_string(),
            players: Vec::new(),
            steps: Vec::new(),
            duration: Duration::from_secs(3),
        }
    }

    /// RNG seed for room codes and tie-breaks.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Round tuning constants for every participant.
    pub fn config(mut self, config: RoundConfig) -> Self {
        self.config = config;
        self
    }

    /// Host identity (also its label).
    pub fn host(mut self, identity: impl Into<String>) -> Self {
        self.host = identity.into();
        self
    }

    /// Start automatically once the roster reaches `count` (host included).
    pub fn expected_members(mut self, count: usize) -> Self {
        self.options.expected_members = Some(count);
        self
    }

    /// Player whose label is also its claimed identity, with a one-way
    /// latency to the host in milliseconds.
    pub fn player(self, name: &str, latency_ms: u64) -> Self {
        self.player_as(name, name, latency_ms)
    }

    /// Player labelled `label` claiming `identity`.
    pub fn player_as(mut self, label: &str, identity: &str, latency_ms: u64) -> Self {
        self.players.push((label.to_string(), identity.to_string(), Duration::from_millis(latency_ms)));
        self
    }

    /// Host closes the lobby at `at_ms`.
    pub fn start_at(self, at_ms: u64) -> Self {
        let host = self.host.clone();
        self.at(at_ms, &host, Intent::StartGame)
    }

    /// `label` performs `intent` at `at_ms` (its local clock is the shared
    /// simulated clock).
    pub fn at(mut self, at_ms: u64, label: &str, intent: Intent) -> Self {
        self.steps
            .push((Duration::from_millis(at_ms), Step::Intent { label: label.to_string(), intent }));
        self
    }

    /// `label` reconnects at `at_ms`; its old connection lingers for
    /// `stale_ms` unless the host closes it first.
    pub fn reconnect_at(mut self, at_ms: u64, label: &str, stale_ms: u64) -> Self {
        let step = Step::Reconnect {
            label: label.to_string(),
            stale_close_after: Duration::from_millis(stale_ms),
        };
        self.steps.push((Duration::from_millis(at_ms), step));
        self
    }

    /// `label` drops its connection at `at_ms`.
    pub fn disconnect_at(mut self, at_ms: u64, label: &str) -> Self {
        self.steps.push((Duration::from_millis(at_ms), Step::Disconnect { label: label.to_string() }));
        self
    }

    /// Total simulated run time.
    pub fn run_for(mut self, ms: u64) -> Self {
        self.duration = Duration::from_millis(ms);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario and verify the final world with the oracle.
    ///
    /// Players connect at time zero, each arriving at the host after its
    /// link latency. Steps fire at their scheduled simulated time, before
    /// any poll tick due at the same instant.
    pub fn run(self) -> Result<(), String> {
        let world = self.execute();
        (self.oracle)(&world).map_err(|error| format!("Scenario '{}': {error}", self.scenario.name))
    }

    /// Execute the scenario and hand back the final world without running
    /// the oracle.
    pub fn execute(&self) -> World {
        let scenario = &self.scenario;
        let mut world =
            World::new(scenario.seed, scenario.config.clone(), &scenario.host, scenario.options.clone());

        for (label, identity, latency) in &scenario.players {
            world.join(label, identity, *latency);
        }
        for (at, step) in &scenario.steps {
            match step {
                Step::Intent { label, intent } => world.intent_at(*at, label, *intent),
                Step::Reconnect { label, stale_close_after } => {
                    world.reconnect_at(*at, label, *stale_close_after);
                },
                Step::Disconnect { label } => world.disconnect_at(*at, label),
            }
        }

        world.run_until(scenario.duration);
        world
    }
}
