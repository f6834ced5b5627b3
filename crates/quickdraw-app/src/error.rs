//! Runtime errors.

use std::io;

use quickdraw_core::RoomCode;
use thiserror::Error;

/// Failures that end a runtime before a game could be played.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The transport could not reach the room.
    #[error("could not connect to room {room}: {source}")]
    Connect {
        /// Room that was dialed.
        room: RoomCode,
        /// Transport error.
        source: io::Error,
    },

    /// The transport refused to host the room.
    #[error("could not host room {room}: {source}")]
    Host {
        /// Room that was requested.
        room: RoomCode,
        /// Transport error.
        source: io::Error,
    },
}
