//! In-memory transport.
//!
//! Rooms live in a shared table; connecting to a room hands the host one end
//! of a fresh channel pair through its listener. Closing either end is seen
//! by both, after any messages already queued have been read.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use quickdraw_core::{Channel, ChannelSink, ChannelStream, Listener, RoomCode, Transport};
use tokio::sync::{mpsc, watch};
use tracing::debug;

type Pending = io::Result<(String, MemoryChannel)>;

/// Transport whose rooms and channels live in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    rooms: Arc<Mutex<HashMap<RoomCode, mpsc::UnboundedSender<Pending>>>>,
}

impl MemoryTransport {
    /// Empty transport with no hosted rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rooms currently hosted.
    pub fn rooms(&self) -> Vec<RoomCode> {
        let mut rooms: Vec<RoomCode> = self.lock().keys().copied().collect();
        rooms.sort();
        rooms
    }

    /// Make the next accept on `room` fail. Returns false if the room is not
    /// hosted.
    pub fn inject_accept_error(&self, room: RoomCode) -> bool {
        self.lock()
            .get(&room)
            .is_some_and(|tx| tx.send(Err(io::Error::other("peer handshake failed"))).is_ok())
    }

    /// Stop hosting `room`. Its listener yields `None` once drained.
    pub fn close_room(&self, room: RoomCode) {
        self.lock().remove(&room);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RoomCode, mpsc::UnboundedSender<Pending>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Channel = MemoryChannel;
    type Listener = MemoryListener;

    async fn host(&self, room: RoomCode) -> io::Result<MemoryListener> {
        let mut rooms = self.lock();
        if rooms.get(&room).is_some_and(|tx| !tx.is_closed()) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, format!("room {room} is taken")));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        rooms.insert(room, tx);
        debug!(%room, "room hosted");
        Ok(MemoryListener { pending: rx })
    }

    async fn connect(&self, room: RoomCode, identity: &str) -> io::Result<MemoryChannel> {
        let refused =
            || io::Error::new(io::ErrorKind::ConnectionRefused, format!("no host for room {room}"));

        let mut rooms = self.lock();
        let Some(tx) = rooms.get(&room) else {
            return Err(refused());
        };
        let (local, remote) = MemoryChannel::pair();
        if tx.send(Ok((identity.to_string(), remote))).is_err() {
            rooms.remove(&room);
            return Err(refused());
        }
        debug!(%room, identity, "peer connected");
        Ok(local)
    }
}

/// Inbound peers of one hosted room.
#[derive(Debug)]
pub struct MemoryListener {
    pending: mpsc::UnboundedReceiver<Pending>,
}

#[async_trait]
impl Listener for MemoryListener {
    type Channel = MemoryChannel;

    async fn accept(&mut self) -> io::Result<Option<(String, MemoryChannel)>> {
        match self.pending.recv().await {
            Some(peer) => peer.map(Some),
            None => Ok(None),
        }
    }
}

/// One end of an in-memory channel pair.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
    closed: Arc<watch::Sender<bool>>,
}

impl MemoryChannel {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(watch::Sender::new(false));
        (
            Self { tx: a_tx, rx: a_rx, closed: Arc::clone(&closed) },
            Self { tx: b_tx, rx: b_rx, closed },
        )
    }
}

impl Channel for MemoryChannel {
    type Sink = MemorySink;
    type Stream = MemoryStream;

    fn split(self) -> (MemorySink, MemoryStream) {
        let closed_rx = self.closed.subscribe();
        let sink = MemorySink { tx: self.tx, closed: self.closed };
        (sink, MemoryStream { rx: self.rx, closed: closed_rx })
    }
}

/// Sending half of a [`MemoryChannel`].
#[derive(Debug)]
pub struct MemorySink {
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<watch::Sender<bool>>,
}

impl ChannelSink for MemorySink {
    fn send(&self, text: String) -> io::Result<()> {
        if *self.closed.borrow() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"));
        }
        self.tx.send(text).map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Receiving half of a [`MemoryChannel`].
#[derive(Debug)]
pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<String>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl ChannelStream for MemoryStream {
    async fn recv(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            text = self.rx.recv() => text,
            () = closed(&mut self.closed) => None,
        }
    }
}

async fn closed(flag: &mut watch::Receiver<bool>) {
    while !*flag.borrow_and_update() {
        if flag.changed().await.is_err() {
            return;
        }
    }
}
