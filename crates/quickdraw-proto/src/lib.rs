//! Wire vocabulary for the quickdraw round protocol.
//!
//! Every control message is a flat object with a `type` tag and at most one
//! small payload field, carried as JSON text.
//!
//! Decoding is forward compatible: a message whose `type` is not part of this
//! vocabulary decodes to `Ok(None)` so that newer peers can extend the
//! protocol without breaking older ones.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use message::{Message, Millis};
