//! Connection table shared by the socket-backed transports.
//!
//! Every live connection owns a writer task fed by an unbounded channel.
//! The table maps connection ids to those channels so that `send` and
//! `disconnect` are plain, non-blocking enqueues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{ConnectionId, TransportError};

/// Work item for a connection's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(Vec<u8>),
    Close,
}

pub(crate) struct ConnectionTable {
    next_id: AtomicI32,
    peers: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>>,
}

impl ConnectionTable {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates an id and the writer queue for a new connection.
    pub(crate) fn register(
        &self,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id =
            ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.lock().insert(id, tx);
        (id, rx)
    }

    pub(crate) fn remove(&self, id: ConnectionId) {
        self.peers.lock().remove(&id);
    }

    pub(crate) fn send(
        &self,
        id: ConnectionId,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.push(id, Outbound::Frame(data.to_vec()))
    }

    pub(crate) fn close(&self, id: ConnectionId) -> Result<(), TransportError> {
        self.push(id, Outbound::Close)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.peers.lock().len()
    }

    fn push(
        &self,
        id: ConnectionId,
        item: Outbound,
    ) -> Result<(), TransportError> {
        let peers = self.peers.lock();
        let tx = peers
            .get(&id)
            .ok_or(TransportError::UnknownConnection(id))?;
        tx.send(item)
            .map_err(|_| TransportError::ConnectionClosed(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_hands_out_increasing_positive_ids() {
        let table = ConnectionTable::new();
        let (a, _rx_a) = table.register();
        let (b, _rx_b) = table.register();
        assert_eq!(a.into_inner(), 1);
        assert_eq!(b.into_inner(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_send_unknown_connection_returns_error() {
        let table = ConnectionTable::new();
        let result = table.send(ConnectionId::new(9), b"hi");
        assert!(matches!(
            result,
            Err(TransportError::UnknownConnection(id)) if id.into_inner() == 9
        ));
    }

    #[test]
    fn test_send_after_writer_gone_returns_closed() {
        let table = ConnectionTable::new();
        let (id, rx) = table.register();
        drop(rx);
        assert!(matches!(
            table.send(id, b"hi"),
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_send_and_close_reach_writer_queue_in_order() {
        let table = ConnectionTable::new();
        let (id, mut rx) = table.register();
        table.send(id, b"abc").unwrap();
        table.close(id).unwrap();
        assert!(matches!(rx.try_recv(), Ok(Outbound::Frame(d)) if d == b"abc"));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Close)));
    }

    #[test]
    fn test_remove_forgets_connection() {
        let table = ConnectionTable::new();
        let (id, _rx) = table.register();
        table.remove(id);
        assert_eq!(table.len(), 0);
        assert!(table.send(id, b"x").is_err());
    }
}
