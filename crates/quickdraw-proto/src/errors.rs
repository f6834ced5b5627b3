//! Codec errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding control messages.
///
/// An unrecognized `type` tag is not an error; see [`crate::Message::decode`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Text could not be parsed as a control message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
