//! Integration tests for the rendezvous listener over a real UDP socket.

use std::sync::Arc;
use std::time::Duration;

use lightrelay_nat::{NatRendezvous, PunchListener};
use lightrelay_protocol::{PunchDatagram, PUNCH_ACK};
use lightrelay_transport::ConnectionId;
use tokio::net::UdpSocket;

async fn start() -> (Arc<NatRendezvous>, std::net::SocketAddr) {
    let nat = Arc::new(NatRendezvous::new(0));
    let listener = PunchListener::bind("127.0.0.1:0", Arc::clone(&nat))
        .await
        .expect("should bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run());
    (nat, addr)
}

fn establish(token: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 128];
    let len = PunchDatagram::Establish {
        token: token.to_string(),
    }
    .encode(&mut buf)
    .unwrap();
    buf.truncate(len);
    buf
}

async fn recv_ack(peer: &UdpSocket) -> Option<Vec<u8>> {
    let mut buf = [0u8; 16];
    match tokio::time::timeout(Duration::from_millis(500), peer.recv(&mut buf))
        .await
    {
        Ok(Ok(len)) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

#[tokio::test]
async fn test_establish_datagram_resolves_and_acks() {
    let (nat, addr) = start().await;
    let id = ConnectionId::new(11);
    let token = nat.issue_token(id).await;

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    peer.connect(addr).await.unwrap();
    peer.send(&establish(&token)).await.unwrap();

    assert_eq!(recv_ack(&peer).await.as_deref(), Some(&PUNCH_ACK[..]));
    assert_eq!(nat.endpoint(id).await, Some(peer.local_addr().unwrap()));
}

#[tokio::test]
async fn test_unknown_token_still_acked() {
    let (nat, addr) = start().await;

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    peer.connect(addr).await.unwrap();
    peer.send(&establish("not-a-token")).await.unwrap();

    assert_eq!(recv_ack(&peer).await.as_deref(), Some(&PUNCH_ACK[..]));
    assert_eq!(nat.pending_len().await, 0);
}

#[tokio::test]
async fn test_malformed_datagram_dropped_and_loop_survives() {
    let (nat, addr) = start().await;
    let id = ConnectionId::new(3);
    let token = nat.issue_token(id).await;

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    peer.connect(addr).await.unwrap();
    peer.send(&[1, 0xFF, 0xFF, 0xFF, 0x7F]).await.unwrap();
    assert_eq!(recv_ack(&peer).await, None);

    peer.send(&establish(&token)).await.unwrap();
    assert_eq!(recv_ack(&peer).await.as_deref(), Some(&PUNCH_ACK[..]));
    assert!(nat.endpoint(id).await.is_some());
}

#[tokio::test]
async fn test_keepalive_byte_acked_without_consuming_token() {
    let (nat, addr) = start().await;
    let id = ConnectionId::new(5);
    nat.issue_token(id).await;

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    peer.connect(addr).await.unwrap();
    // Clients send a single `false` byte to hold the mapping open.
    peer.send(&[0u8]).await.unwrap();

    assert_eq!(recv_ack(&peer).await.as_deref(), Some(&PUNCH_ACK[..]));
    assert_eq!(nat.endpoint(id).await, None);
    assert_eq!(nat.pending_len().await, 1);
}
