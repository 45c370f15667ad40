//! Unified error type for the relay node.

use lightrelay_nat::NatError;
use lightrelay_protocol::ProtocolError;
use lightrelay_room::RoomError;
use lightrelay_session::SessionError;
use lightrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// None of these cross a connection boundary: the engine turns per-frame
/// failures into log lines or protocol signals. `RelayError` surfaces from
/// startup, from the HTTP endpoint, and from calls to the load balancer.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind, send, unknown transport name).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, serialization).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, unknown policy).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (id exhaustion, not host).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The NAT rendezvous socket failed.
    #[error(transparent)]
    Nat(#[from] NatError),

    /// The load balancer could not be reached.
    #[error("load balancer request failed: {0}")]
    Balancer(#[from] reqwest::Error),

    /// The load balancer answered with a non-success status.
    #[error("load balancer rejected request with status {0}")]
    BalancerRejected(u16),

    /// The HTTP endpoint socket failed.
    #[error("endpoint error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightrelay_transport::ConnectionId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::UnknownTransport("carrier-pigeon".into());
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Transport(_)));
        assert!(relay_err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownOpCode(99);
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::AuthFailed("nope".into());
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotHost(ConnectionId::new(3));
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Room(_)));
    }

    #[test]
    fn test_from_nat_error() {
        let err = NatError::Bind(std::io::Error::other("in use"));
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Nat(_)));
        assert!(relay_err.to_string().contains("in use"));
    }

    #[test]
    fn test_balancer_rejected_display() {
        let err = RelayError::BalancerRejected(403);
        assert_eq!(
            err.to_string(),
            "load balancer rejected request with status 403"
        );
    }
}
