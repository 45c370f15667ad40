//! Error types for the load balancer.

use lightrelay_protocol::ProtocolError;
use lightrelay_room::RoomError;

/// A relay node did not answer a probe usefully.
///
/// Any of these means "node is down" to the balancer.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Connection refused, timeout, or an unreadable body.
    #[error("probe request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The node answered with a non-success status.
    #[error("node answered with status {0}")]
    Status(u16),
}

/// Errors surfaced by the balancer itself.
#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Room id generation failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A room list could not be serialized.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("endpoint error: {0}")]
    Io(#[from] std::io::Error),
}
