//! Integration tests for the relay engine, driven through an in-process
//! transport that records everything the engine sends.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lightrelay::prelude::*;
use lightrelay_protocol::{ClientFrame, CreateRoom, RoomUpdate, ServerFrame};
use lightrelay_transport::TransportError;

const KEY: &str = "Secret Auth Key";

// =========================================================================
// Recording transport
// =========================================================================

struct RecordingTransport {
    sent: Mutex<Vec<(ConnectionId, Channel, Vec<u8>)>>,
    disconnected: Mutex<Vec<ConnectionId>>,
    max_packet_size: usize,
}

impl RecordingTransport {
    fn new(max_packet_size: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            disconnected: Mutex::new(Vec::new()),
            max_packet_size,
        }
    }
}

impl Transport for RecordingTransport {
    type Error = TransportError;

    fn send(
        &self,
        id: ConnectionId,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        self.sent.lock().unwrap().push((id, channel, data.to_vec()));
        Ok(())
    }

    fn disconnect(&self, id: ConnectionId) -> Result<(), Self::Error> {
        self.disconnected.lock().unwrap().push(id);
        Ok(())
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

// =========================================================================
// Helpers
// =========================================================================

type Engine = RelayEngine<RecordingTransport>;

fn cid(id: i32) -> ConnectionId {
    ConnectionId::new(id)
}

fn engine_with(config: EngineConfig, max_packet_size: usize) -> Engine {
    RelayEngine::new(
        RecordingTransport::new(max_packet_size),
        config,
        SharedKeyAuthenticator::new(KEY),
    )
}

fn engine() -> Engine {
    engine_with(EngineConfig::default(), 1024)
}

async fn connect(engine: &Engine, id: i32) {
    let remote: SocketAddr = format!("127.0.0.1:{}", 50_000 + id).parse().unwrap();
    engine
        .handle_event(TransportEvent::Connected { id: cid(id), remote })
        .await;
}

async fn send(engine: &Engine, id: i32, frame: ClientFrame) {
    let mut buf = vec![0u8; 4096];
    let len = frame.encode(&mut buf).unwrap();
    buf.truncate(len);
    engine
        .handle_event(TransportEvent::Data {
            id: cid(id),
            data: buf,
            channel: Channel::Reliable,
        })
        .await;
}

/// Connects and authenticates `id`, then clears the recorded frames.
async fn join_relay(engine: &Engine, id: i32) {
    connect(engine, id).await;
    send(engine, id, ClientFrame::AuthenticationResponse { key: KEY.into() }).await;
    take(engine);
}

/// Drains and decodes everything sent so far.
fn take(engine: &Engine) -> Vec<(ConnectionId, ServerFrame)> {
    engine
        .transport()
        .sent
        .lock()
        .unwrap()
        .drain(..)
        .map(|(id, _, data)| (id, ServerFrame::decode(&data).unwrap()))
        .collect()
}

fn disconnected(engine: &Engine) -> Vec<ConnectionId> {
    engine.transport().disconnected.lock().unwrap().clone()
}

fn create(max_players: i32, is_public: bool) -> ClientFrame {
    ClientFrame::CreateRoom(CreateRoom {
        max_players,
        name: "Lobby".into(),
        is_public,
        data: "map=dust".into(),
        ..CreateRoom::default()
    })
}

fn join(server_id: &str) -> ClientFrame {
    ClientFrame::JoinServer {
        server_id: server_id.into(),
        can_direct_connect: false,
        local_ip: "192.168.1.20".into(),
    }
}

/// Has `host` create a room and returns its id.
async fn create_room(engine: &Engine, host: i32, max_players: i32) -> String {
    send(engine, host, create(max_players, true)).await;
    match take(engine).as_slice() {
        [(to, ServerFrame::RoomCreated { server_id })] if *to == cid(host) => {
            server_id.clone()
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_connect_sends_authentication_request() {
    let engine = engine();
    connect(&engine, 1).await;
    assert_eq!(take(&engine), vec![(cid(1), ServerFrame::AuthenticationRequest)]);
}

#[tokio::test]
async fn test_correct_key_replies_authenticated() {
    let engine = engine();
    connect(&engine, 1).await;
    take(&engine);

    send(&engine, 1, ClientFrame::AuthenticationResponse { key: KEY.into() }).await;

    assert_eq!(take(&engine), vec![(cid(1), ServerFrame::Authenticated)]);
    assert!(disconnected(&engine).is_empty());
}

#[tokio::test]
async fn test_wrong_key_disconnects_by_default() {
    let engine = engine();
    connect(&engine, 1).await;
    take(&engine);

    send(&engine, 1, ClientFrame::AuthenticationResponse { key: "guess".into() }).await;

    assert!(take(&engine).is_empty());
    assert_eq!(disconnected(&engine), vec![cid(1)]);
}

#[tokio::test]
async fn test_wrong_key_ignored_policy_allows_retry() {
    let engine = engine_with(
        EngineConfig {
            auth_failure: AuthFailurePolicy::Ignore,
            ..EngineConfig::default()
        },
        1024,
    );
    connect(&engine, 1).await;
    take(&engine);

    send(&engine, 1, ClientFrame::AuthenticationResponse { key: "guess".into() }).await;
    assert!(take(&engine).is_empty());
    assert!(disconnected(&engine).is_empty());

    send(&engine, 1, ClientFrame::AuthenticationResponse { key: KEY.into() }).await;
    assert_eq!(take(&engine), vec![(cid(1), ServerFrame::Authenticated)]);
}

#[tokio::test]
async fn test_frames_before_auth_are_ignored() {
    let engine = engine();
    connect(&engine, 1).await;
    take(&engine);

    send(&engine, 1, ClientFrame::RequestId).await;
    send(&engine, 1, create(4, true)).await;

    assert!(take(&engine).is_empty());
    assert_eq!(engine.stats().await.room_count, 0);
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_alive() {
    let engine = engine();
    join_relay(&engine, 1).await;

    engine
        .handle_event(TransportEvent::Data {
            id: cid(1),
            data: vec![99, 1, 2],
            channel: Channel::Reliable,
        })
        .await;
    send(&engine, 1, ClientFrame::RequestId).await;

    assert_eq!(take(&engine), vec![(cid(1), ServerFrame::GetId { id: cid(1) })]);
    assert!(disconnected(&engine).is_empty());
}

#[tokio::test]
async fn test_out_of_place_frames_from_authenticated_peer_are_dropped() {
    let engine = engine();
    join_relay(&engine, 1).await;

    // A server-to-client opcode, a truncated CreateRoom, and an update
    // from a peer that hosts nothing.
    for data in [vec![5], vec![7, 1]] {
        engine
            .handle_event(TransportEvent::Data {
                id: cid(1),
                data,
                channel: Channel::Reliable,
            })
            .await;
    }
    send(
        &engine,
        1,
        ClientFrame::UpdateRoomData(RoomUpdate {
            name: Some("Nowhere".into()),
            ..RoomUpdate::default()
        }),
    )
    .await;

    assert!(take(&engine).is_empty());
    assert!(disconnected(&engine).is_empty());
    assert_eq!(engine.stats().await.room_count, 0);

    send(&engine, 1, ClientFrame::RequestId).await;
    assert_eq!(take(&engine), vec![(cid(1), ServerFrame::GetId { id: cid(1) })]);
}

// =========================================================================
// Rooms and relaying
// =========================================================================

#[tokio::test]
async fn test_create_join_and_relay_in_both_directions() {
    let engine = engine();
    join_relay(&engine, 1).await;
    join_relay(&engine, 2).await;

    let id = create_room(&engine, 1, 2).await;
    assert_eq!(id.len(), 5);

    send(&engine, 2, join(&id)).await;
    let joined = ServerFrame::ServerJoined { client: cid(2) };
    assert_eq!(
        take(&engine),
        vec![(cid(2), joined.clone()), (cid(1), joined)]
    );

    send(
        &engine,
        1,
        ClientFrame::SendData {
            payload: b"snapshot".to_vec(),
            target: cid(2),
        },
    )
    .await;
    assert_eq!(
        take(&engine),
        vec![(
            cid(2),
            ServerFrame::GetData {
                payload: b"snapshot".to_vec(),
                sender: None
            }
        )]
    );

    send(
        &engine,
        2,
        ClientFrame::SendData {
            payload: b"input".to_vec(),
            target: cid(-1),
        },
    )
    .await;
    assert_eq!(
        take(&engine),
        vec![(
            cid(1),
            ServerFrame::GetData {
                payload: b"input".to_vec(),
                sender: Some(cid(2))
            }
        )]
    );
}

#[tokio::test]
async fn test_relayed_data_keeps_its_channel() {
    let engine = engine();
    join_relay(&engine, 1).await;
    join_relay(&engine, 2).await;
    let id = create_room(&engine, 1, 4).await;
    send(&engine, 2, join(&id)).await;
    take(&engine);

    let mut buf = vec![0u8; 64];
    let len = ClientFrame::SendData {
        payload: b"pos".to_vec(),
        target: cid(-1),
    }
    .encode(&mut buf)
    .unwrap();
    buf.truncate(len);
    engine
        .handle_event(TransportEvent::Data {
            id: cid(2),
            data: buf,
            channel: Channel::Unreliable,
        })
        .await;

    let sent = engine.transport().sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, cid(1));
    assert_eq!(sent[0].1, Channel::Unreliable);
}

#[tokio::test]
async fn test_join_full_room_replies_server_left_to_caller_only() {
    let engine = engine();
    for id in 1..=3 {
        join_relay(&engine, id).await;
    }
    let id = create_room(&engine, 1, 2).await;
    send(&engine, 2, join(&id)).await;
    take(&engine);

    send(&engine, 3, join(&id)).await;

    assert_eq!(take(&engine), vec![(cid(3), ServerFrame::ServerLeft)]);
}

#[tokio::test]
async fn test_join_unknown_room_replies_server_left() {
    let engine = engine();
    join_relay(&engine, 1).await;

    send(&engine, 1, join("NOPE1")).await;

    assert_eq!(take(&engine), vec![(cid(1), ServerFrame::ServerLeft)]);
}

#[tokio::test]
async fn test_kick_by_non_host_is_noop() {
    let engine = engine();
    for id in 1..=3 {
        join_relay(&engine, id).await;
    }
    let id = create_room(&engine, 1, 4).await;
    send(&engine, 2, join(&id)).await;
    send(&engine, 3, join(&id)).await;
    take(&engine);

    send(&engine, 2, ClientFrame::KickPlayer { target: cid(3) }).await;
    send(&engine, 2, ClientFrame::KickPlayer { target: cid(1) }).await;

    assert!(take(&engine).is_empty());
    assert_eq!(engine.stats().await.room_count, 1);
}

#[tokio::test]
async fn test_kick_by_host_removes_client() {
    let engine = engine();
    join_relay(&engine, 1).await;
    join_relay(&engine, 2).await;
    let id = create_room(&engine, 1, 4).await;
    send(&engine, 2, join(&id)).await;
    take(&engine);

    send(&engine, 1, ClientFrame::KickPlayer { target: cid(2) }).await;

    assert_eq!(
        take(&engine),
        vec![(cid(1), ServerFrame::PlayerDisconnected { client: cid(2) })]
    );
}

#[tokio::test]
async fn test_host_disconnect_evicts_members_and_clears_list() {
    let engine = engine();
    for id in 1..=3 {
        join_relay(&engine, id).await;
    }
    let id = create_room(&engine, 1, 4).await;
    send(&engine, 2, join(&id)).await;
    send(&engine, 3, join(&id)).await;
    take(&engine);
    assert!(engine.room_list_json().await.contains(&id));

    engine
        .handle_event(TransportEvent::Disconnected { id: cid(1) })
        .await;

    assert_eq!(
        take(&engine),
        vec![
            (cid(2), ServerFrame::ServerLeft),
            (cid(3), ServerFrame::ServerLeft)
        ]
    );
    assert_eq!(engine.room_list_json().await, "[]");
    let stats = engine.stats().await;
    assert_eq!(stats.room_count, 0);
    assert_eq!(stats.connected_clients, 2);
}

#[tokio::test]
async fn test_oversized_payload_disconnects_sender() {
    let engine = engine_with(EngineConfig::default(), 64);
    join_relay(&engine, 1).await;
    join_relay(&engine, 2).await;
    let id = create_room(&engine, 1, 4).await;
    send(&engine, 2, join(&id)).await;
    take(&engine);

    send(
        &engine,
        2,
        ClientFrame::SendData {
            payload: vec![7u8; 100],
            target: cid(-1),
        },
    )
    .await;

    assert!(take(&engine).is_empty());
    assert_eq!(disconnected(&engine), vec![cid(2)]);
}

#[tokio::test]
async fn test_update_room_data_refreshes_listing() {
    let engine = engine();
    join_relay(&engine, 1).await;
    let id = create_room(&engine, 1, 4).await;

    send(
        &engine,
        1,
        ClientFrame::UpdateRoomData(RoomUpdate {
            name: Some("Renamed".into()),
            is_public: Some(false),
            ..RoomUpdate::default()
        }),
    )
    .await;

    let json = engine.room_list_json().await;
    assert!(!json.contains(&id));
    assert_eq!(engine.stats().await.public_room_count, 0);
}

#[tokio::test]
async fn test_update_room_data_from_client_leaves_listing_unchanged() {
    let engine = engine();
    join_relay(&engine, 1).await;
    join_relay(&engine, 2).await;
    let id = create_room(&engine, 1, 4).await;
    send(&engine, 2, join(&id)).await;
    take(&engine);
    let before = engine.room_list_json().await;

    send(
        &engine,
        2,
        ClientFrame::UpdateRoomData(RoomUpdate {
            name: Some("Hijacked".into()),
            is_public: Some(false),
            max_players: Some(64),
            ..RoomUpdate::default()
        }),
    )
    .await;

    assert_eq!(engine.room_list_json().await, before);
    assert!(before.contains("Lobby"));
    assert!(!before.contains("Hijacked"));
    assert_eq!(engine.stats().await.public_room_count, 1);
    assert!(take(&engine).is_empty());
    assert!(disconnected(&engine).is_empty());
}

#[tokio::test]
async fn test_private_room_not_listed() {
    let engine = engine();
    join_relay(&engine, 1).await;
    send(&engine, 1, create(4, false)).await;

    assert_eq!(engine.room_list_json().await, "[]");
    let stats = engine.stats().await;
    assert_eq!(stats.room_count, 1);
    assert_eq!(stats.public_room_count, 0);
}

// =========================================================================
// Heartbeat and NAT
// =========================================================================

#[tokio::test]
async fn test_heartbeat_reaches_only_authenticated_peers() {
    let engine = engine();
    join_relay(&engine, 1).await;
    connect(&engine, 2).await;
    engine.transport().sent.lock().unwrap().clear();

    engine.heartbeat().await;

    let sent = engine.transport().sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(cid(1), Channel::Reliable, vec![200])]);
}

#[tokio::test]
async fn test_heartbeat_byte_from_peer_is_ignored() {
    let engine = engine();
    join_relay(&engine, 1).await;

    engine
        .handle_event(TransportEvent::Data {
            id: cid(1),
            data: vec![200],
            channel: Channel::Reliable,
        })
        .await;

    assert!(take(&engine).is_empty());
    assert!(disconnected(&engine).is_empty());
}

#[tokio::test]
async fn test_nat_token_sent_after_authenticated() {
    let nat = Arc::new(NatRendezvous::new(7776));
    let engine = engine().with_nat(Arc::clone(&nat));
    connect(&engine, 1).await;
    take(&engine);

    send(&engine, 1, ClientFrame::AuthenticationResponse { key: KEY.into() }).await;

    let frames = take(&engine);
    assert_eq!(frames[0], (cid(1), ServerFrame::Authenticated));
    match &frames[1] {
        (to, ServerFrame::RequestNatConnection { token, port }) => {
            assert_eq!(*to, cid(1));
            assert_eq!(token.len(), 32);
            assert_eq!(*port, 7776);
        }
        other => panic!("expected RequestNatConnection, got {other:?}"),
    }
    assert_eq!(nat.pending_len().await, 1);
}

#[tokio::test]
async fn test_direct_connect_handoff_with_nat_punch() {
    let nat = Arc::new(NatRendezvous::new(7776));
    let engine = engine().with_nat(Arc::clone(&nat));

    // Authenticate both peers and punch their tokens from distinct NATs.
    let mut endpoints = Vec::new();
    for (id, observed) in [(1, "203.0.113.5:61000"), (2, "198.51.100.9:50000")] {
        connect(&engine, id).await;
        take(&engine);
        send(&engine, id, ClientFrame::AuthenticationResponse { key: KEY.into() }).await;
        let token = match take(&engine).pop() {
            Some((_, ServerFrame::RequestNatConnection { token, .. })) => token,
            other => panic!("expected token, got {other:?}"),
        };
        let observed: SocketAddr = observed.parse().unwrap();
        assert_eq!(nat.resolve(&token, observed).await, Some(cid(id)));
        endpoints.push(observed);
    }

    send(
        &engine,
        1,
        ClientFrame::CreateRoom(CreateRoom {
            max_players: 4,
            is_public: true,
            supports_direct_connect: true,
            host_local_ip: "192.168.1.10".into(),
            use_nat_punch: true,
            port: 7777,
            ..CreateRoom::default()
        }),
    )
    .await;
    let id = match take(&engine).pop() {
        Some((_, ServerFrame::RoomCreated { server_id })) => server_id,
        other => panic!("expected RoomCreated, got {other:?}"),
    };

    send(
        &engine,
        2,
        ClientFrame::JoinServer {
            server_id: id,
            can_direct_connect: true,
            local_ip: "10.0.0.4".into(),
        },
    )
    .await;

    assert_eq!(
        take(&engine),
        vec![
            (
                cid(2),
                ServerFrame::DirectConnectIp {
                    ip: "203.0.113.5".into(),
                    port: 61000,
                    use_nat_punch: true
                }
            ),
            (
                cid(1),
                ServerFrame::DirectConnectIp {
                    ip: "198.51.100.9".into(),
                    port: 50000,
                    use_nat_punch: true
                }
            ),
        ]
    );
}

#[tokio::test]
async fn test_disconnect_forgets_nat_state() {
    let nat = Arc::new(NatRendezvous::new(7776));
    let engine = engine().with_nat(Arc::clone(&nat));
    join_relay(&engine, 1).await;
    assert_eq!(nat.pending_len().await, 1);

    engine
        .handle_event(TransportEvent::Disconnected { id: cid(1) })
        .await;

    assert_eq!(nat.pending_len().await, 0);
    assert_eq!(engine.stats().await.connected_clients, 0);
}

#[tokio::test]
async fn test_numeric_ids_config_generates_digits() {
    let engine = engine_with(
        EngineConfig {
            id_length: 8,
            id_alphabet: lightrelay_room::IdAlphabet::Numeric,
            ..EngineConfig::default()
        },
        1024,
    );
    join_relay(&engine, 1).await;

    let id = create_room(&engine, 1, 2).await;

    assert_eq!(id.len(), 8);
    assert!(id.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_create_room_with_stalled_balancer_does_not_block_other_peers() {
    // A balancer that accepts connections and never answers.
    let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = silent.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = silent.accept().await {
            held.push(stream);
        }
    });

    let balancer = BalancerClient::new(
        BalancerClientConfig {
            port,
            timeout: Duration::from_secs(5),
            issue_room_ids: true,
            ..BalancerClientConfig::default()
        },
        RelayAddress {
            address: "127.0.0.1".into(),
            port: 7777,
            endpoint_port: 8080,
            region: Region::Europe,
        },
    )
    .unwrap();
    let engine = Arc::new(engine().with_balancer(balancer));
    tokio::spawn(run_balancer_sync(Arc::clone(&engine)));
    join_relay(&engine, 1).await;
    join_relay(&engine, 2).await;

    let started = Instant::now();
    let id = tokio::time::timeout(Duration::from_millis(500), create_room(&engine, 1, 4))
        .await
        .expect("room creation should not wait on the balancer");
    send(&engine, 2, ClientFrame::RequestId).await;

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(id.len(), EngineConfig::default().id_length);
    assert_eq!(take(&engine), vec![(cid(2), ServerFrame::GetId { id: cid(2) })]);
}

#[test]
fn test_balancer_silence_fires_once() {
    let engine = engine();
    engine.mark_balancer_ping();
    assert!(!engine.take_balancer_silence(Duration::from_secs(60)));
    std::thread::sleep(Duration::from_millis(5));
    assert!(engine.take_balancer_silence(Duration::from_millis(1)));
    assert!(!engine.take_balancer_silence(Duration::from_secs(60)));
}
