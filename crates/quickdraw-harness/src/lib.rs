//! Deterministic simulation harness for quickdraw protocol testing.
//!
//! Simulated implementations of the Environment and Transport traits plus a
//! scenario world that drives several nodes over a virtual network with
//! per-link latency, so rounds can be replayed exactly from a seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory_transport;
pub mod presenter;
pub mod scenario;
pub mod sim_env;

pub use memory_transport::{MemoryChannel, MemoryListener, MemorySink, MemoryStream, MemoryTransport};
pub use presenter::{RecordingPresenter, Shown};
pub use sim_env::SimEnv;
