//! Error types for the session layer.

use lightrelay_transport::ConnectionId;

/// Errors that can occur while tracking connection sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The presented key was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the connection. Either it never connected or
    /// it has already been removed.
    #[error("no session for {0}")]
    NotFound(ConnectionId),

    /// The connection already completed the handshake.
    #[error("{0} is already authenticated")]
    AlreadyAuthenticated(ConnectionId),

    /// An [`AuthFailurePolicy`](crate::AuthFailurePolicy) name that is
    /// neither `disconnect` nor `ignore`.
    #[error("unknown auth failure policy {0:?}")]
    UnknownPolicy(String),
}
