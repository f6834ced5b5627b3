//! Application layer for quickdraw
//!
//! Connects the pure [`quickdraw_core::Node`] state machine to real channels
//! and to a user interface, with the same code running in production and in
//! simulation.
//!
//! # Components
//!
//! - [`Presenter`]: Trait for the platform-specific user interface
//! - [`NoticeQueue`]: FIFO of modal notices shown one at a time
//! - [`Placement`]: Randomized position and rotation of the tap target
//! - [`Runtime`]: Generic orchestration loop over a [`quickdraw_core::Transport`]

mod error;
mod notice;
mod presenter;
mod runtime;

pub use error::RuntimeError;
pub use notice::{Notice, NoticeQueue};
pub use presenter::{Placement, Presenter};
pub use runtime::{Outcome, Runtime, UserInput};
