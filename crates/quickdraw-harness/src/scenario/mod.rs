//! Scenario-based testing with mandatory oracles.
//!
//! A scenario declares a room (host, players with per-link latency), the
//! intents applied at given simulated times, and an oracle that checks the
//! final [`World`]. A scenario cannot run without an oracle.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::{Actor, World};

/// Verification run against the final world state.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
