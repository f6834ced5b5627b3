//! Round coordinator.
//!
//! One state machine runs on every participant. The host (or a participant
//! playing alone) is *authoritative*: it additionally collects press times and
//! resolves the winner. Players only report their own press.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Time and randomness come from the [`Environment`]; nothing here sleeps
//!   or performs I/O
//! - Every transition returns `Vec<RoundAction>` for the caller to execute
//! - Timeouts are detected by [`RoundCoordinator::tick`], which the driver
//!   calls every [`RoundConfig::poll_interval`]
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  arm   ┌───────┐  all presses in  ┌──────────┐
//! │ Idle │───────>│ Armed │─────────────────>│ Resolved │
//! └──────┘        └───────┘   / winner msg   └──────────┘
//!    ^                                             │
//!    └─────────────────── reset ───────────────────┘
//! ```
//!
//! # Deadline
//!
//! The deadline is the reaction window after which a participant that has
//! not pressed is reported as having pressed at `deadline + timeout_penalty`.
//! Within a round it never grows. The authoritative side shrinks it to a
//! reported press time when that press beats the deadline by more than
//! [`RoundConfig::shrink_margin`], and tells everyone with `maxTime`.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use quickdraw_proto::{Message, Millis};
use tracing::{debug, info, warn};

use crate::env::Environment;

/// Round tuning constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundConfig {
    /// Reaction window at the start of every round.
    pub default_deadline: Duration,
    /// Subtracted once from the deadline on the first locally armed round of
    /// a session, which players always react to more slowly.
    pub first_arm_correction: Duration,
    /// Added to the deadline to form the press time of a participant that
    /// timed out.
    pub timeout_penalty: Duration,
    /// A press must beat the deadline by more than this to tighten it.
    pub shrink_margin: Duration,
    /// How often the driver should call [`RoundCoordinator::tick`].
    pub poll_interval: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_millis(1500),
            first_arm_correction: Duration::from_millis(100),
            timeout_penalty: Duration::from_millis(100),
            shrink_margin: Duration::from_millis(200),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Who triggered an arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmOrigin {
    /// The local user.
    Local,
    /// The host announced the arm (player side).
    Host,
    /// A player armed first and told the host (host side).
    Player(String),
}

/// Round phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No round open.
    Idle,
    /// Target visible, collecting presses.
    Armed,
    /// Winner known; the coordinator resets to `Idle` within the same
    /// transition.
    Resolved,
}

/// Addressee of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The host (player side).
    Host,
    /// Every connected player (host side).
    Players,
    /// Every connected player except the named one (host side).
    PlayersExcept(String),
}

/// Effects requested by the round coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundAction {
    /// Send a control message.
    Send {
        /// Addressee.
        to: Recipient,
        /// Message to send.
        message: Message,
    },
    /// Make the target visible and pressable.
    ShowTarget,
    /// Hide the target.
    HideTarget,
    /// The round is over.
    Resolved {
        /// Winning identity.
        winner: String,
    },
}

/// Inputs to the round coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    /// Open a round.
    Arm(ArmOrigin),
    /// The local participant pressed.
    Press,
    /// Periodic timeout check.
    Tick,
    /// A press report reached the authoritative side.
    PressReported {
        /// Reporting identity.
        player: String,
        /// Elapsed time from that participant's arm to its press.
        elapsed: Duration,
    },
    /// The host tightened the deadline.
    DeadlineTightened(Duration),
    /// The host announced the winner.
    WinnerAnnounced(String),
}

/// Observable round state, for assertions and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    /// Current phase.
    pub phase: RoundPhase,
    /// When the round was armed.
    pub arm_time: Option<Instant>,
    /// Current reaction window.
    pub deadline: Duration,
    /// Whether the local participant already pressed.
    pub pressed: bool,
    /// Collected press times (authoritative side, open round only).
    pub press_times: Option<BTreeMap<String, Duration>>,
}

/// Round coordinator for one participant.
#[derive(Debug, Clone)]
pub struct RoundCoordinator<E> {
    env: E,
    config: RoundConfig,
    self_id: String,
    authoritative: bool,
    expected_members: usize,
    phase: RoundPhase,
    arm_time: Option<Instant>,
    deadline: Duration,
    pressed: bool,
    press_times: Option<BTreeMap<String, Duration>>,
    has_armed: bool,
}

impl<E: Environment> RoundCoordinator<E> {
    /// Create an idle coordinator.
    ///
    /// The expected member count starts at 1 (a lone participant) and is
    /// raised with [`Self::set_expected_members`] when the game starts.
    pub fn new(env: E, config: RoundConfig, self_id: impl Into<String>, authoritative: bool) -> Self {
        let deadline = config.default_deadline;
        Self {
            env,
            config,
            self_id: self_id.into(),
            authoritative,
            expected_members: 1,
            phase: RoundPhase::Idle,
            arm_time: None,
            deadline,
            pressed: false,
            press_times: None,
            has_armed: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Current reaction window.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// When the open round was armed.
    pub fn arm_time(&self) -> Option<Instant> {
        self.arm_time
    }

    /// Whether the local participant already pressed this round.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Collected press times, present only on the authoritative side while a
    /// round is open.
    pub fn press_times(&self) -> Option<&BTreeMap<String, Duration>> {
        self.press_times.as_ref()
    }

    /// Whether this side collects presses and resolves rounds.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Number of press reports that close a round.
    pub fn expected_members(&self) -> usize {
        self.expected_members
    }

    /// Identity of the local participant.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Round tuning constants.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Lock the number of participants whose reports close a round.
    pub fn set_expected_members(&mut self, count: usize) {
        self.expected_members = count.max(1);
    }

    /// Capture the observable state.
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            phase: self.phase,
            arm_time: self.arm_time,
            deadline: self.deadline,
            pressed: self.pressed,
            press_times: self.press_times.clone(),
        }
    }

    /// Apply an event.
    pub fn handle(&mut self, event: RoundEvent) -> Vec<RoundAction> {
        match event {
            RoundEvent::Arm(origin) => self.arm(origin),
            RoundEvent::Press => self.press(),
            RoundEvent::Tick => self.tick(),
            RoundEvent::PressReported { player, elapsed } => self.register_press(player, elapsed),
            RoundEvent::DeadlineTightened(deadline) => self.tighten_deadline(deadline),
            RoundEvent::WinnerAnnounced(winner) => self.accept_winner(winner),
        }
    }

    /// Open a round (`Idle` to `Armed`).
    ///
    /// A local arm is announced to everyone else; an arm learned from a
    /// player is relayed by the host to the remaining players. Arms learned
    /// from the host are never forwarded.
    pub fn arm(&mut self, origin: ArmOrigin) -> Vec<RoundAction> {
        if self.phase != RoundPhase::Idle {
            debug!(?origin, phase = ?self.phase, "arm ignored: round already open");
            return Vec::new();
        }

        let first_arm = !self.has_armed;
        self.has_armed = true;
        if first_arm && origin == ArmOrigin::Local {
            self.deadline = self.deadline.saturating_sub(self.config.first_arm_correction);
        }

        self.phase = RoundPhase::Armed;
        self.arm_time = Some(self.env.now());
        self.pressed = false;
        if self.authoritative {
            self.press_times = Some(BTreeMap::new());
        }

        info!(?origin, deadline_ms = millis(self.deadline), "round armed");

        let mut actions = vec![RoundAction::ShowTarget];
        match origin {
            ArmOrigin::Local => {
                let to = if self.authoritative { Recipient::Players } else { Recipient::Host };
                actions.push(RoundAction::Send { to, message: Message::InitButton });
            },
            ArmOrigin::Player(from) if self.authoritative => {
                actions.push(RoundAction::Send {
                    to: Recipient::PlayersExcept(from),
                    message: Message::InitButton,
                });
            },
            ArmOrigin::Player(_) | ArmOrigin::Host => {},
        }
        actions
    }

    /// Register the local press. No effect unless armed and not yet pressed.
    pub fn press(&mut self) -> Vec<RoundAction> {
        let Some(arm_time) = self.open_arm_time() else {
            debug!(phase = ?self.phase, pressed = self.pressed, "press ignored");
            return Vec::new();
        };
        let elapsed = self.env.now().saturating_duration_since(arm_time);
        self.report(elapsed)
    }

    /// Periodic timeout check.
    ///
    /// Once strictly more than the deadline has elapsed without a local
    /// press, reports a press at `deadline + timeout_penalty`.
    pub fn tick(&mut self) -> Vec<RoundAction> {
        let Some(arm_time) = self.open_arm_time() else {
            return Vec::new();
        };
        let elapsed = self.env.now().saturating_duration_since(arm_time);
        if elapsed > self.deadline {
            let penalized = self.deadline + self.config.timeout_penalty;
            debug!(elapsed_ms = millis(elapsed), reported_ms = millis(penalized), "press timed out");
            self.report(penalized)
        } else {
            Vec::new()
        }
    }

    /// Record a press report (authoritative side only).
    ///
    /// A repeated report for the same identity overwrites the earlier one.
    /// Resolves the round once every expected member has reported; otherwise
    /// tightens the deadline if the report beats it by more than the margin.
    pub fn register_press(&mut self, player: String, elapsed: Duration) -> Vec<RoundAction> {
        if !self.authoritative {
            warn!(%player, "press report ignored: not authoritative");
            return Vec::new();
        }
        let Some(times) = self.press_times.as_mut() else {
            debug!(%player, "press report ignored: no open round");
            return Vec::new();
        };

        if let Some(previous) = times.insert(player.clone(), elapsed) {
            debug!(%player, previous_ms = millis(previous), "press report overwritten");
        }
        debug!(%player, elapsed_ms = millis(elapsed), reported = times.len(), "press registered");

        if times.len() >= self.expected_members {
            return self.resolve_winner();
        }

        let beats_deadline = self
            .deadline
            .checked_sub(self.config.shrink_margin)
            .is_some_and(|threshold| elapsed < threshold);
        if beats_deadline {
            self.deadline = elapsed;
            info!(deadline_ms = millis(elapsed), "deadline tightened");
            return vec![RoundAction::Send {
                to: Recipient::Players,
                message: Message::MaxTime { time: millis(elapsed) },
            }];
        }
        Vec::new()
    }

    /// Pick the winner among the fastest reports and close the round.
    ///
    /// Called automatically when the last expected report arrives. Ties are
    /// broken uniformly at random.
    pub fn resolve_winner(&mut self) -> Vec<RoundAction> {
        let Some(times) = self.press_times.take() else {
            return Vec::new();
        };
        let Some(fastest) = times.values().min().copied() else {
            self.press_times = Some(times);
            return Vec::new();
        };

        let candidates: Vec<&String> =
            times.iter().filter(|(_, elapsed)| **elapsed == fastest).map(|(p, _)| p).collect();
        let pick = if candidates.len() > 1 { self.env.random_below(candidates.len()) } else { 0 };
        let Some(winner) = candidates.get(pick).map(|p| (*p).clone()) else {
            return Vec::new();
        };

        info!(%winner, fastest_ms = millis(fastest), tied = candidates.len(), "round resolved");

        let mut actions = vec![RoundAction::Send {
            to: Recipient::Players,
            message: Message::Winner { player: winner.clone() },
        }];
        actions.extend(self.finish(winner));
        actions
    }

    /// Apply a `maxTime` from the host. The deadline never grows.
    pub fn tighten_deadline(&mut self, deadline: Duration) -> Vec<RoundAction> {
        if self.phase != RoundPhase::Armed {
            debug!(deadline_ms = millis(deadline), "deadline update ignored: no open round");
        } else if deadline < self.deadline {
            self.deadline = deadline;
            debug!(deadline_ms = millis(deadline), "deadline tightened by host");
        }
        Vec::new()
    }

    /// Apply a `winner` from the host (non-authoritative side).
    pub fn accept_winner(&mut self, winner: String) -> Vec<RoundAction> {
        if self.authoritative {
            debug!(%winner, "winner announcement ignored: authoritative side resolves itself");
            return Vec::new();
        }
        let mut actions = Vec::new();
        if self.phase == RoundPhase::Armed && !self.pressed {
            actions.push(RoundAction::HideTarget);
        }
        info!(%winner, "round resolved by host");
        actions.extend(self.finish(winner));
        actions
    }

    /// Return to `Idle` with the default deadline.
    pub fn reset(&mut self) {
        self.phase = RoundPhase::Idle;
        self.arm_time = None;
        self.deadline = self.config.default_deadline;
        self.pressed = false;
        self.press_times = None;
    }

    fn finish(&mut self, winner: String) -> Vec<RoundAction> {
        self.phase = RoundPhase::Resolved;
        let actions = vec![RoundAction::Resolved { winner }];
        self.reset();
        actions
    }

    fn open_arm_time(&self) -> Option<Instant> {
        match (self.phase, self.arm_time) {
            (RoundPhase::Armed, Some(arm_time)) if !self.pressed => Some(arm_time),
            _ => None,
        }
    }

    /// Report the local press. The authoritative side records its own time
    /// at wire precision so it compares evenly with remote reports.
    fn report(&mut self, elapsed: Duration) -> Vec<RoundAction> {
        self.pressed = true;
        let elapsed_ms = millis(elapsed);
        let mut actions = vec![RoundAction::HideTarget];
        if self.authoritative {
            let me = self.self_id.clone();
            actions.extend(self.register_press(me, Duration::from_millis(elapsed_ms)));
        } else {
            actions.push(RoundAction::Send {
                to: Recipient::Host,
                message: Message::PushButton { time: elapsed_ms },
            });
        }
        actions
    }
}

/// Whole milliseconds in `duration`, saturating.
pub fn millis(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}
