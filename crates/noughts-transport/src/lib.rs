//! Network edge of a Noughts server.
//!
//! Accepting a client happens in two steps. [`Transport::accept`] hands
//! back a [`PendingConnection`] as soon as a peer opens a socket; the
//! protocol handshake happens later in [`PendingConnection::upgrade`],
//! on the caller's own task. The accept loop never waits on a client, so
//! a peer that connects and then goes quiet holds up nobody but itself.
//!
//! Once upgraded, a [`Connection`] is a duplex pipe of whole frames. Each
//! one gets a fresh [`ConnectionId`]; the room and session layers use it
//! to decide where outbound events go.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique handle for one upgraded client connection.
///
/// A participant who reloads their page comes back with a new id; the
/// user id carried in events is what stays stable. Never sent over the
/// wire. `Ord` so that lists of connections come out in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listener side: yields peers that still have to complete a handshake.
pub trait Transport: Send + Sync + 'static {
    type Pending: PendingConnection<Connection = Self::Connection, Error = Self::Error>;
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer to open a socket.
    ///
    /// Returns before any protocol bytes are exchanged; an error here is
    /// about the listener, not about a particular client.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// A peer that has connected but not yet finished its handshake.
pub trait PendingConnection: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake. Unbounded; callers put their own deadline on it.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// An upgraded client: whole frames in, whole frames out.
///
/// The server handler `select!`s on [`recv`](Self::recv) while room
/// actors push events through [`send`](Self::send), so the two directions
/// must never share a lock.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next frame from the client. `Ok(None)` means the client closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
