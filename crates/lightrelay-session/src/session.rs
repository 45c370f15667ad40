//! Session types: the server's record of one transport connection.

use std::net::SocketAddr;
use std::time::Instant;

use lightrelay_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a connection is in the handshake.
///
/// ```text
///   PendingAuth ──(key accepted)──→ Authenticated
/// ```
///
/// There is no way back: an authenticated connection stays authenticated
/// until it disconnects, at which point its session is removed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `AuthenticationRequest` has been sent; waiting for the key.
    PendingAuth,
    /// The key was accepted. Room and data frames are allowed.
    Authenticated,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected peer.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ConnectionId,
    pub state: SessionState,
    /// The peer address as seen by the transport.
    pub remote: SocketAddr,
    pub connected_at: Instant,
}

impl Session {
    pub fn new(id: ConnectionId, remote: SocketAddr) -> Self {
        Self {
            id,
            state: SessionState::PendingAuth,
            remote,
            connected_at: Instant::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}
