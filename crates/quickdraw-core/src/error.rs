//! Error types for the core state machines.

use thiserror::Error;

use crate::session::{Role, Stage};

/// Errors returned when an intent or input is invalid for the current state.
///
/// Inbound protocol traffic never produces these: unknown, malformed, or
/// out-of-place messages are logged and dropped by the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Operation is not valid for this participant's role.
    #[error("{operation} is not available to a {role:?}")]
    WrongRole {
        /// Role of the participant.
        role: Role,
        /// Operation attempted.
        operation: &'static str,
    },

    /// Operation is not valid in the current session stage.
    #[error("cannot {operation} while {stage:?}")]
    InvalidStage {
        /// Current stage.
        stage: Stage,
        /// Operation attempted.
        operation: &'static str,
    },

    /// Room code was not four decimal digits.
    #[error("invalid room code {0:?}: expected four digits")]
    InvalidRoomCode(String),
}
