//! Channel and transport abstraction.
//!
//! The peer-to-peer transport and its signaling are external. All the
//! protocol needs is an ordered, reliable, bidirectional text channel per
//! peer, a way to host a room and accept peers into it, and a way to connect
//! to a hosted room.
//!
//! Production wraps a real peer-to-peer library; tests use in-memory
//! channels from the harness.

use std::io;

use async_trait::async_trait;

use crate::room_code::RoomCode;

/// Peer connection establishment.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Channel to a single peer.
    type Channel: Channel;

    /// Accept loop for a hosted room.
    type Listener: Listener<Channel = Self::Channel>;

    /// Host `room` and start accepting peers.
    async fn host(&self, room: RoomCode) -> io::Result<Self::Listener>;

    /// Connect to the host of `room`, announcing `identity`.
    async fn connect(&self, room: RoomCode, identity: &str) -> io::Result<Self::Channel>;
}

/// Stream of inbound peers for a hosted room.
#[async_trait]
pub trait Listener: Send + 'static {
    /// Channel to an accepted peer.
    type Channel: Channel;

    /// Wait for the next peer and the identity it claims.
    ///
    /// An error concerns one peer only; callers keep accepting. Returns
    /// `Ok(None)` once the listener is shut down.
    async fn accept(&mut self) -> io::Result<Option<(String, Self::Channel)>>;
}

/// Ordered reliable text channel to one peer.
pub trait Channel: Send + 'static {
    /// Sending half.
    type Sink: ChannelSink;

    /// Receiving half.
    type Stream: ChannelStream;

    /// Split into halves so sending and receiving can proceed independently.
    fn split(self) -> (Self::Sink, Self::Stream);
}

/// Sending half of a channel.
pub trait ChannelSink: Send + 'static {
    /// Queue `text` for delivery.
    fn send(&self, text: String) -> io::Result<()>;

    /// Close the channel. Both ends observe the close.
    fn close(&self);
}

/// Receiving half of a channel.
#[async_trait]
pub trait ChannelStream: Send + 'static {
    /// Next message, or `None` once the channel is closed.
    async fn recv(&mut self) -> Option<String>;
}
