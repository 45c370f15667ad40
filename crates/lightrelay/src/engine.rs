//! The relay engine: turns transport events into relay behavior.
//!
//! One [`RelayEngine`] owns everything a node knows: sessions, rooms, the
//! cached public room list, and (optionally) the NAT rendezvous and the
//! load-balancer link. It never touches sockets itself. It reads
//! [`TransportEvent`]s and answers through the [`Transport`] it was built
//! with.
//!
//! # Event flow
//!
//! ```text
//! Connected    → session created, AuthenticationRequest sent
//! Data         → heartbeat byte? ignore
//!              → decode ClientFrame (malformed: log at debug, drop)
//!              → AuthenticationResponse: check key, Authenticated + NAT token
//!              → anything else: require auth, apply to RoomRegistry,
//!                send the resulting frames, refresh the room list
//! Disconnected → implicit LeaveRoom, session and NAT state dropped
//! ```
//!
//! Per-connection failures never escape this module. They become a log
//! line, a protocol signal, or a forced disconnect.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lightrelay_nat::NatRendezvous;
use lightrelay_protocol::{
    BufferPool, ClientFrame, CreateRoom, ProtocolError, RelayAddress,
    RelayServerInfo, ServerFrame, HEARTBEAT,
};
use lightrelay_room::{
    generate_unique_id, Effects, JoinRequest, Outbound, RoomListCache,
    RoomRegistry,
};
use lightrelay_session::{
    AuthFailurePolicy, Authenticator, SessionError, SessionManager,
};
use lightrelay_transport::{
    Channel, ConnectionId, EventReceiver, Transport, TransportEvent,
};
use tokio::sync::{Mutex, Notify, RwLock};

use crate::{BalancerClient, EngineConfig};

/// Pooled send buffers kept around between sends.
const MAX_IDLE_BUFFERS: usize = 64;

/// Mutable relay state. One lock, so joins and leaves on the same room
/// serialize.
#[derive(Default)]
struct RelayState {
    sessions: SessionManager,
    rooms: RoomRegistry,
}

/// A relay node's core.
///
/// Build it, optionally attach NAT rendezvous and a balancer link, wrap it
/// in an `Arc`, then hand the transport's event stream to
/// [`run()`](Self::run). The same `Arc` is shared with the HTTP endpoint
/// and the heartbeat task.
pub struct RelayEngine<T: Transport> {
    transport: T,
    config: EngineConfig,
    authenticator: Box<dyn Authenticator>,
    state: Mutex<RelayState>,
    nat: Option<Arc<NatRendezvous>>,
    room_list: RwLock<RoomListCache>,
    pool: BufferPool,
    started: Instant,
    balancer: Option<BalancerClient>,
    /// Last time the balancer probed `/api/stats`.
    last_balancer_ping: parking_lot::Mutex<Instant>,
    rooms_changed: Notify,
}

impl<T: Transport> RelayEngine<T> {
    pub fn new(
        transport: T,
        config: EngineConfig,
        authenticator: impl Authenticator,
    ) -> Self {
        let pool = BufferPool::new(transport.max_packet_size(), MAX_IDLE_BUFFERS);
        Self {
            transport,
            config,
            authenticator: Box::new(authenticator),
            state: Mutex::new(RelayState::default()),
            nat: None,
            room_list: RwLock::new(RoomListCache::new()),
            pool,
            started: Instant::now(),
            balancer: None,
            last_balancer_ping: parking_lot::Mutex::new(Instant::now()),
            rooms_changed: Notify::new(),
        }
    }

    /// Enables NAT punch-through: authenticated peers are sent a token for
    /// `nat`'s UDP socket.
    pub fn with_nat(mut self, nat: Arc<NatRendezvous>) -> Self {
        self.nat = Some(nat);
        self
    }

    /// Links the node to a load balancer.
    pub fn with_balancer(mut self, balancer: BalancerClient) -> Self {
        self.balancer = Some(balancer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn balancer(&self) -> Option<&BalancerClient> {
        self.balancer.as_ref()
    }

    /// How this node is listed to peers and to the balancer.
    pub fn relay_address(&self) -> RelayAddress {
        RelayAddress {
            address: self.config.public_ip.clone(),
            port: self.config.transport_port,
            endpoint_port: self.config.endpoint_port,
            region: self.config.region,
        }
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Processes transport events until the transport shuts down.
    pub async fn run(self: Arc<Self>, mut events: EventReceiver) {
        tracing::info!(relay = %self.relay_address(), "relay engine running");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::info!("transport closed, relay engine stopping");
    }

    /// Applies one transport event.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { id, remote } => {
                self.handle_connected(id, remote).await
            }
            TransportEvent::Data { id, data, channel } => {
                self.handle_data(id, &data, channel).await
            }
            TransportEvent::Disconnected { id } => {
                self.handle_disconnected(id).await
            }
        }
    }

    async fn handle_connected(&self, id: ConnectionId, remote: SocketAddr) {
        self.state.lock().await.sessions.connect(id, remote);
        tracing::info!(conn_id = %id, %remote, "peer connected");
        self.send_or_log(id, Channel::Reliable, &ServerFrame::AuthenticationRequest);
    }

    async fn handle_data(&self, id: ConnectionId, data: &[u8], channel: Channel) {
        if data == [HEARTBEAT] {
            return;
        }

        let frame = match ClientFrame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(conn_id = %id, error = %e, "dropping malformed frame");
                return;
            }
        };

        let authenticated = self.state.lock().await.sessions.is_authenticated(id);
        let effects = match frame {
            ClientFrame::AuthenticationResponse { key } => {
                return self.authenticate(id, &key).await;
            }
            frame if !authenticated => {
                tracing::debug!(
                    conn_id = %id,
                    opcode = ?frame.opcode(),
                    "ignoring frame from unauthenticated peer"
                );
                return;
            }
            ClientFrame::Default => return,
            ClientFrame::RequestId => Effects {
                outbound: vec![Outbound {
                    to: id,
                    frame: ServerFrame::GetId { id },
                }],
                rooms_changed: false,
            },
            ClientFrame::CreateRoom(settings) => self.create_room(id, settings).await,
            ClientFrame::JoinServer {
                server_id,
                can_direct_connect,
                local_ip,
            } => {
                let public_endpoint = self.nat_endpoint(id).await;
                let request = JoinRequest {
                    server_id: &server_id,
                    can_direct_connect,
                    local_ip: &local_ip,
                    public_endpoint,
                };
                self.state.lock().await.rooms.join(id, &request)
            }
            ClientFrame::LeaveRoom => self.state.lock().await.rooms.leave(id, None),
            ClientFrame::KickPlayer { target } => {
                self.state.lock().await.rooms.kick(id, target)
            }
            ClientFrame::SendData { payload, target } => {
                return self.relay_data(id, payload, target, channel).await;
            }
            ClientFrame::UpdateRoomData(update) => {
                match self.state.lock().await.rooms.update_room(id, update) {
                    Ok(effects) => effects,
                    Err(e) => {
                        tracing::debug!(conn_id = %id, error = %e, "room update ignored");
                        return;
                    }
                }
            }
        };

        self.apply(effects).await;
    }

    async fn handle_disconnected(&self, id: ConnectionId) {
        let effects = {
            let mut state = self.state.lock().await;
            let effects = state.rooms.leave(id, None);
            state.sessions.disconnect(id);
            effects
        };
        if let Some(nat) = &self.nat {
            nat.forget(id).await;
        }
        tracing::info!(conn_id = %id, "peer disconnected");
        self.apply(effects).await;
    }

    // -----------------------------------------------------------------------
    // Frame handlers
    // -----------------------------------------------------------------------

    async fn authenticate(&self, id: ConnectionId, key: &str) {
        let result = self.state.lock().await.sessions.authenticate(
            id,
            key,
            self.authenticator.as_ref(),
        );

        match result {
            Ok(()) => {
                self.send_or_log(id, Channel::Reliable, &ServerFrame::Authenticated);
                if let Some(nat) = &self.nat {
                    let token = nat.issue_token(id).await;
                    self.send_or_log(
                        id,
                        Channel::Reliable,
                        &ServerFrame::RequestNatConnection {
                            token,
                            port: i32::from(nat.udp_port()),
                        },
                    );
                }
            }
            Err(SessionError::AuthFailed(reason)) => match self.config.auth_failure {
                AuthFailurePolicy::Disconnect => {
                    tracing::info!(conn_id = %id, %reason, "wrong auth key, disconnecting");
                    self.disconnect(id);
                }
                AuthFailurePolicy::Ignore => {
                    tracing::info!(conn_id = %id, %reason, "wrong auth key ignored");
                }
            },
            Err(e) => tracing::debug!(conn_id = %id, error = %e, "authentication frame ignored"),
        }
    }

    async fn create_room(&self, host: ConnectionId, settings: CreateRoom) -> Effects {
        let offered = match &self.balancer {
            Some(balancer) if balancer.issues_room_ids() => {
                let id = balancer.take_room_id();
                if id.is_none() {
                    tracing::debug!("no balancer room id ready, generating locally");
                }
                id
            }
            _ => None,
        };
        let host_endpoint = self.nat_endpoint(host).await;

        let mut state = self.state.lock().await;
        let server_id = match offered {
            Some(id) if !state.rooms.contains_id(&id) => id,
            _ => {
                let generated = generate_unique_id(
                    self.config.id_length,
                    self.config.id_alphabet,
                    |candidate| state.rooms.contains_id(candidate),
                );
                match generated {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::warn!(conn_id = %host, error = %e, "room not created");
                        return Effects::default();
                    }
                }
            }
        };

        match state.rooms.create_room(host, server_id, settings, host_endpoint) {
            Ok(effects) => effects,
            Err(e) => {
                tracing::warn!(conn_id = %host, error = %e, "room not created");
                Effects::default()
            }
        }
    }

    async fn relay_data(
        &self,
        sender: ConnectionId,
        payload: Vec<u8>,
        target: ConnectionId,
        channel: Channel,
    ) {
        let routed = self.state.lock().await.rooms.route_data(sender, payload, target);
        let outbound = match routed {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::debug!(conn_id = %sender, error = %e, "data not relayed");
                return;
            }
        };

        match self.send_frame(outbound.to, channel, &outbound.frame) {
            Ok(()) => {}
            Err(ProtocolError::BufferOverflow { needed, remaining }) => {
                tracing::info!(
                    conn_id = %sender,
                    needed,
                    remaining,
                    "payload exceeds max packet size, disconnecting sender"
                );
                self.disconnect(sender);
            }
            Err(e) => tracing::debug!(conn_id = %sender, error = %e, "relay encode failed"),
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Encodes `frame` into a pooled buffer and queues it.
    ///
    /// Only encoding failures are returned. A failed send means the peer
    /// is going away; its `Disconnected` event does the cleanup.
    fn send_frame(
        &self,
        to: ConnectionId,
        channel: Channel,
        frame: &ServerFrame,
    ) -> Result<(), ProtocolError> {
        let mut buf = self.pool.acquire();
        let len = frame.encode(&mut buf)?;
        if let Err(e) = self.transport.send(to, channel, &buf[..len]) {
            tracing::debug!(conn_id = %to, error = %e, "send failed");
        }
        Ok(())
    }

    fn send_or_log(&self, to: ConnectionId, channel: Channel, frame: &ServerFrame) {
        if let Err(e) = self.send_frame(to, channel, frame) {
            tracing::debug!(conn_id = %to, opcode = ?frame.opcode(), error = %e, "frame not sent");
        }
    }

    fn disconnect(&self, id: ConnectionId) {
        if let Err(e) = self.transport.disconnect(id) {
            tracing::debug!(conn_id = %id, error = %e, "disconnect failed");
        }
    }

    async fn apply(&self, effects: Effects) {
        for Outbound { to, frame } in &effects.outbound {
            self.send_or_log(*to, Channel::Reliable, frame);
        }
        if effects.rooms_changed {
            self.refresh_room_list().await;
        }
    }

    async fn nat_endpoint(&self, id: ConnectionId) -> Option<SocketAddr> {
        match &self.nat {
            Some(nat) => nat.endpoint(id).await,
            None => None,
        }
    }

    // -----------------------------------------------------------------------
    // Room list
    // -----------------------------------------------------------------------

    /// Re-serializes the public room list and wakes the balancer sync task.
    async fn refresh_room_list(&self) {
        let listings = self.state.lock().await.rooms.listings(&self.relay_address());
        if let Err(e) = self.room_list.write().await.rebuild(listings) {
            tracing::warn!(error = %e, "room list not serialized, keeping previous");
        }
        // A stored permit coalesces bursts of changes into one push.
        self.rooms_changed.notify_one();
    }

    /// Cached JSON of the public rooms.
    pub async fn room_list_json(&self) -> String {
        self.room_list.read().await.json().to_string()
    }

    /// Cached compressed form of [`room_list_json`](Self::room_list_json).
    pub async fn room_list_compressed(&self) -> String {
        self.room_list.read().await.compressed().to_string()
    }

    /// Resolves once the room list has changed since the last call.
    pub async fn rooms_changed(&self) {
        self.rooms_changed.notified().await;
    }

    // -----------------------------------------------------------------------
    // Heartbeat and stats
    // -----------------------------------------------------------------------

    /// Sends the keepalive byte to every authenticated peer.
    pub async fn heartbeat(&self) {
        let ids = self.state.lock().await.sessions.authenticated_ids();
        for id in ids {
            if let Err(e) = self.transport.send(id, Channel::Reliable, &[HEARTBEAT]) {
                tracing::debug!(conn_id = %id, error = %e, "heartbeat not sent");
            }
        }
    }

    pub async fn stats(&self) -> RelayServerInfo {
        let state = self.state.lock().await;
        RelayServerInfo {
            connected_clients: state.sessions.len() as u64,
            room_count: state.rooms.len() as u64,
            public_room_count: state.rooms.public_len() as u64,
            uptime: self.started.elapsed().as_secs(),
        }
    }

    /// Records that the balancer just probed this node.
    pub fn mark_balancer_ping(&self) {
        *self.last_balancer_ping.lock() = Instant::now();
    }

    /// True if the balancer has been silent for longer than `after`. Resets
    /// the clock when it fires, so one silence triggers one re-registration.
    pub fn take_balancer_silence(&self, after: Duration) -> bool {
        let mut last = self.last_balancer_ping.lock();
        if last.elapsed() > after {
            *last = Instant::now();
            true
        } else {
            false
        }
    }
}
