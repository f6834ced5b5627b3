//! Quickdraw protocol core logic
//!
//! Pure state machines for the reaction-time round protocol, decoupled from
//! I/O. A host owns the roster and is authoritative for resolving rounds;
//! every participant runs the same round state machine.
//!
//! # Architecture
//!
//! State transitions are driven by explicit events and return declarative
//! actions (send this message, close that channel, show the target). Time and
//! randomness come from an [`Environment`] so the same code runs under a real
//! clock and under a simulated one.
//!
//! # Components
//!
//! - [`round`]: Round coordinator (arm, press, timeout, deadline, winner)
//! - [`membership`]: Host-side roster of identities and their channels
//! - [`session`]: Per-client session context (role, identity, stage)
//! - [`node`]: One participant: session, roster and round behind one event enum
//! - [`room_code`]: Four-digit room codes
//! - [`mod@env`]: Environment abstraction (time, RNG)
//! - [`transport`]: Channel and transport abstraction
//! - [`error`]: Error types

pub mod env;
pub mod error;
pub mod membership;
pub mod node;
pub mod room_code;
pub mod round;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use env::{EnvRng, Environment, SystemEnv};
pub use error::CoreError;
pub use membership::{Admission, ChannelId, Membership};
pub use node::{Effect, HostOptions, Intent, Node, NodeAction, NodeEvent};
pub use room_code::RoomCode;
pub use round::{
    ArmOrigin, Recipient, RoundAction, RoundConfig, RoundCoordinator, RoundEvent, RoundPhase,
    RoundSnapshot,
};
pub use session::{Role, Session, Stage};
pub use transport::{Channel, ChannelSink, ChannelStream, Listener, Transport};
