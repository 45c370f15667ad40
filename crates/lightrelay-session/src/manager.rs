//! The session manager: tracks every live connection's handshake state.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap` wrapper and is not thread-safe by
//! itself. The relay engine owns it inside its state mutex, next to the
//! room registry, so session and room changes for one frame happen under
//! one lock.

use std::collections::HashMap;
use std::net::SocketAddr;

use lightrelay_transport::ConnectionId;

use crate::{Authenticator, Session, SessionError, SessionState};

/// All connected peers, keyed by transport connection id.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ [PendingAuth] ──authenticate()──→ [Authenticated]
///     │                                                 │
///     └──────────────── disconnect() ←──────────────────┘
/// ```
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection in the `PendingAuth` state.
    ///
    /// A stale session under the same id (the transport reused it) is
    /// replaced.
    pub fn connect(&mut self, id: ConnectionId, remote: SocketAddr) -> &Session {
        if self.sessions.contains_key(&id) {
            tracing::warn!(conn_id = %id, "connection id reused, replacing stale session");
        }
        self.sessions.insert(id, Session::new(id, remote));
        tracing::debug!(conn_id = %id, %remote, "session pending authentication");
        &self.sessions[&id]
    }

    /// Checks `key` for a pending connection and promotes it on success.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: the connection is unknown
    /// - [`SessionError::AlreadyAuthenticated`]: the handshake already
    ///   completed; the frame should be ignored
    /// - [`SessionError::AuthFailed`]: wrong key; the connection stays
    ///   pending
    pub fn authenticate(
        &mut self,
        id: ConnectionId,
        key: &str,
        authenticator: &dyn Authenticator,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if session.state == SessionState::Authenticated {
            return Err(SessionError::AlreadyAuthenticated(id));
        }

        authenticator.verify(key)?;
        session.state = SessionState::Authenticated;
        tracing::info!(conn_id = %id, "connection authenticated");
        Ok(())
    }

    /// Removes the connection's session, returning it if there was one.
    pub fn disconnect(&mut self, id: ConnectionId) -> Option<Session> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            tracing::debug!(conn_id = %id, "session removed");
        }
        removed
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn is_authenticated(&self, id: ConnectionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(Session::is_authenticated)
    }

    /// Ids of every authenticated connection, in ascending order.
    pub fn authenticated_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .sessions
            .values()
            .filter(|s| s.is_authenticated())
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Total connections, pending or authenticated.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager`, named
    //! `test_{function}_{scenario}_{expected}`.

    use super::*;
    use crate::SharedKeyAuthenticator;

    fn cid(id: i32) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn auth() -> SharedKeyAuthenticator {
        SharedKeyAuthenticator::new("key")
    }

    #[test]
    fn test_connect_new_connection_is_pending() {
        let mut mgr = SessionManager::new();
        let session = mgr.connect(cid(1), remote());
        assert_eq!(session.state, SessionState::PendingAuth);
        assert!(!mgr.is_authenticated(cid(1)));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_authenticate_correct_key_promotes() {
        let mut mgr = SessionManager::new();
        mgr.connect(cid(1), remote());
        mgr.authenticate(cid(1), "key", &auth()).unwrap();
        assert!(mgr.is_authenticated(cid(1)));
    }

    #[test]
    fn test_authenticate_wrong_key_stays_pending() {
        let mut mgr = SessionManager::new();
        mgr.connect(cid(1), remote());
        let err = mgr.authenticate(cid(1), "nope", &auth()).unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(_)));
        assert_eq!(mgr.get(cid(1)).unwrap().state, SessionState::PendingAuth);

        // A later correct attempt still works.
        mgr.authenticate(cid(1), "key", &auth()).unwrap();
        assert!(mgr.is_authenticated(cid(1)));
    }

    #[test]
    fn test_authenticate_twice_returns_already_authenticated() {
        let mut mgr = SessionManager::new();
        mgr.connect(cid(1), remote());
        mgr.authenticate(cid(1), "key", &auth()).unwrap();
        assert!(matches!(
            mgr.authenticate(cid(1), "key", &auth()),
            Err(SessionError::AlreadyAuthenticated(id)) if id == cid(1)
        ));
    }

    #[test]
    fn test_authenticate_unknown_connection_returns_not_found() {
        let mut mgr = SessionManager::new();
        assert!(matches!(
            mgr.authenticate(cid(9), "key", &auth()),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_is_authenticated_pending_or_unknown_returns_false() {
        let mut mgr = SessionManager::new();
        mgr.connect(cid(1), remote());
        assert!(!mgr.is_authenticated(cid(1)));
        assert!(!mgr.is_authenticated(cid(2)));
        assert!(mgr.authenticated_ids().is_empty());
    }

    #[test]
    fn test_disconnect_removes_session() {
        let mut mgr = SessionManager::new();
        mgr.connect(cid(1), remote());
        assert!(mgr.disconnect(cid(1)).is_some());
        assert!(mgr.disconnect(cid(1)).is_none());
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_authenticated_ids_excludes_pending_and_is_sorted() {
        let mut mgr = SessionManager::new();
        for id in [3, 1, 2] {
            mgr.connect(cid(id), remote());
        }
        mgr.authenticate(cid(3), "key", &auth()).unwrap();
        mgr.authenticate(cid(1), "key", &auth()).unwrap();
        assert_eq!(mgr.authenticated_ids(), vec![cid(1), cid(3)]);
    }
}
