//! The UDP side of NAT rendezvous.

use std::net::SocketAddr;
use std::sync::Arc;

use lightrelay_protocol::{PunchDatagram, PUNCH_ACK};
use tokio::net::UdpSocket;

use crate::{NatError, NatRendezvous};

/// Largest datagram the listener reads. Valid punch datagrams are a bool
/// plus a 32-character token, far below this.
const MAX_DATAGRAM: usize = 512;

/// Receives punch datagrams and resolves their tokens.
pub struct PunchListener {
    socket: UdpSocket,
    rendezvous: Arc<NatRendezvous>,
}

impl PunchListener {
    pub async fn bind(
        addr: &str,
        rendezvous: Arc<NatRendezvous>,
    ) -> Result<Self, NatError> {
        let socket = UdpSocket::bind(addr).await.map_err(NatError::Bind)?;
        tracing::info!(local_addr = %socket.local_addr()?, "NAT rendezvous listening");
        Ok(Self { socket, rendezvous })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NatError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves datagrams until the task is dropped.
    ///
    /// Malformed datagrams are dropped without a reply. Every well-formed
    /// one is acknowledged, resolved or not, so the peer's NAT mapping
    /// stays open.
    pub async fn run(self) {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::debug!(error = %e, "rendezvous recv failed");
                    continue;
                }
            };

            let datagram = match PunchDatagram::decode(&buf[..len]) {
                Ok(d) => d,
                Err(e) => {
                    tracing::debug!(%from, error = %e, "dropping malformed punch datagram");
                    continue;
                }
            };

            if let PunchDatagram::Establish { token } = &datagram {
                if self.rendezvous.resolve(token, from).await.is_none() {
                    tracing::debug!(%from, "punch datagram with unknown token");
                }
            }

            if let Err(e) = self.socket.send_to(&PUNCH_ACK, from).await {
                tracing::debug!(%from, error = %e, "rendezvous ack failed");
            }
        }
    }
}
