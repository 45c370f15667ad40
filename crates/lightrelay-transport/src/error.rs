use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// No connection with this id is known to the transport.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// No transport is registered under this name.
    #[error("unknown transport {0:?}")]
    UnknownTransport(String),
}
