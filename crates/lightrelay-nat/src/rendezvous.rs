//! Pending tokens and resolved public endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;

use lightrelay_transport::ConnectionId;
use rand::Rng;
use tokio::sync::Mutex;

use crate::BiMap;

#[derive(Default)]
struct RendezvousState {
    /// Connections that were sent a token and have not punched yet.
    pending: BiMap<ConnectionId, String>,
    /// Public endpoints observed on the rendezvous socket.
    endpoints: HashMap<ConnectionId, SocketAddr>,
}

/// Shared between the relay engine (which issues tokens and reads
/// endpoints) and the [`PunchListener`](crate::PunchListener) (which
/// resolves them).
pub struct NatRendezvous {
    state: Mutex<RendezvousState>,
    udp_port: u16,
}

impl NatRendezvous {
    /// `udp_port` is the port peers are told to punch to.
    pub fn new(udp_port: u16) -> Self {
        Self {
            state: Mutex::new(RendezvousState::default()),
            udp_port,
        }
    }

    pub fn udp_port(&self) -> u16 {
        self.udp_port
    }

    /// Creates a fresh token for `id`, replacing any earlier one.
    pub async fn issue_token(&self, id: ConnectionId) -> String {
        let mut state = self.state.lock().await;
        let mut token = generate_token();
        while state.pending.get_by_right(&token).is_some() {
            token = generate_token();
        }
        state.pending.insert(id, token.clone());
        token
    }

    /// Binds `token`'s connection to the endpoint the datagram came from.
    ///
    /// Returns the connection, or `None` for an unknown or already used
    /// token.
    pub async fn resolve(
        &self,
        token: &str,
        observed: SocketAddr,
    ) -> Option<ConnectionId> {
        let mut state = self.state.lock().await;
        let id = state.pending.remove_by_right(&token.to_string())?;
        state.endpoints.insert(id, observed);
        tracing::info!(conn_id = %id, %observed, "NAT endpoint resolved");
        Some(id)
    }

    /// The resolved public endpoint of `id`, if any.
    pub async fn endpoint(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.state.lock().await.endpoints.get(&id).copied()
    }

    /// Drops everything known about `id`. Called on disconnect.
    pub async fn forget(&self, id: ConnectionId) {
        let mut state = self.state.lock().await;
        state.pending.remove_by_left(&id);
        state.endpoints.remove(&id);
    }

    /// Number of tokens still waiting for a datagram.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

/// A random 128-bit token as 32 lowercase hex characters.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
