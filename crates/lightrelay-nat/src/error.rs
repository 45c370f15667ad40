//! Error types for the NAT rendezvous layer.

/// Errors that can occur while running the rendezvous socket.
///
/// Bad datagrams are not errors: they are dropped inside the listener
/// loop. Only socket setup can fail.
#[derive(Debug, thiserror::Error)]
pub enum NatError {
    /// The UDP socket could not be bound.
    #[error("failed to bind rendezvous socket: {0}")]
    Bind(#[source] std::io::Error),

    /// The bound socket could not report its address.
    #[error("rendezvous socket error: {0}")]
    Io(#[from] std::io::Error),
}
