//! Transport abstraction layer for lightrelay.
//!
//! The relay engine never touches sockets. It consumes the [`Transport`]
//! capability (send to a connection, drop a connection, report the maximum
//! packet size) plus a stream of [`TransportEvent`]s produced by the
//! transport's own background tasks.
//!
//! Concrete transports are chosen at startup by name through
//! [`TransportKind`] and [`AnyTransport`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `tcp` (default): length-prefixed TCP transport

mod error;
mod registry;
mod table;
#[cfg(feature = "tcp")]
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use registry::{AnyTransport, TransportKind};
#[cfg(feature = "tcp")]
pub use tcp::TcpTransport;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::fmt;
use std::net::SocketAddr;

use tokio::sync::mpsc;

/// Identifier the transport assigns to each accepted connection.
///
/// The relay protocol carries these ids on the wire as `int32`, with `-1`
/// reserved for "nobody", so the transport only ever hands out positive
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(i32);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `i32`.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the underlying `i32` value.
    pub fn into_inner(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Delivery channel a frame travels on.
///
/// Channel `0` is reliable, channel `1` unreliable. Transports without an
/// unreliable mode deliver both reliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    Reliable,
    Unreliable,
}

impl Channel {
    /// Maps a raw channel index to a channel. Unknown indices are treated
    /// as reliable.
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::Unreliable,
            _ => Self::Reliable,
        }
    }

    /// Returns the raw channel index.
    pub fn index(self) -> i32 {
        match self {
            Self::Reliable => 0,
            Self::Unreliable => 1,
        }
    }
}

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer connected.
    Connected {
        id: ConnectionId,
        remote: SocketAddr,
    },
    /// A peer sent a message.
    Data {
        id: ConnectionId,
        data: Vec<u8>,
        channel: Channel,
    },
    /// A peer went away, either on its own or after [`Transport::disconnect`].
    Disconnected { id: ConnectionId },
}

/// Receiving half of a transport's event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Server-side message transport.
///
/// `send` and `disconnect` only enqueue work for the connection's writer
/// task; they never wait on the network, so a slow peer cannot stall the
/// caller.
pub trait Transport: Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Queues `data` for delivery to `id` on `channel`.
    fn send(
        &self,
        id: ConnectionId,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), Self::Error>;

    /// Closes the connection. A `Disconnected` event follows.
    fn disconnect(&self, id: ConnectionId) -> Result<(), Self::Error>;

    /// Largest frame this transport will carry.
    fn max_packet_size(&self) -> usize;
}
