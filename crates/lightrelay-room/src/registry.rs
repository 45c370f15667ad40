//! Room registry: creates rooms, moves connections in and out of them, and
//! decides where relayed data goes.
//!
//! Every mutating operation returns [`Effects`]: the frames to send and
//! whether the public room list changed. The registry never touches the
//! network.
//!
//! # Indices
//!
//! Rooms are stored by id. Two side indices map a connection to the room
//! it hosts and to the room it has joined as a client, so every lookup by
//! connection is O(1). A connection appears in at most one of them.

use std::collections::HashMap;
use std::net::SocketAddr;

use lightrelay_protocol::{
    CreateRoom, RelayAddress, RoomListing, RoomUpdate, ServerFrame,
};
use lightrelay_transport::ConnectionId;

use crate::{Room, RoomError};

/// A frame addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub frame: ServerFrame,
}

/// What a registry operation asks the caller to do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    /// Frames to send, in order.
    pub outbound: Vec<Outbound>,
    /// The room list changed and any cached listing is stale.
    pub rooms_changed: bool,
}

impl Effects {
    fn send(&mut self, to: ConnectionId, frame: ServerFrame) {
        self.outbound.push(Outbound { to, frame });
    }
}

/// A `JoinServer` request plus what the relay knows about the caller.
#[derive(Debug, Clone)]
pub struct JoinRequest<'a> {
    pub server_id: &'a str,
    pub can_direct_connect: bool,
    /// The caller's self-reported LAN address.
    pub local_ip: &'a str,
    /// The caller's NAT-observed public endpoint, if it has one.
    pub public_endpoint: Option<SocketAddr>,
}

/// All open rooms on this relay node.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    /// Host connection → id of the room it hosts.
    hosts: HashMap<ConnectionId, String>,
    /// Client connection → id of the room it joined.
    members: HashMap<ConnectionId, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Queries ------------------------------------------------------------

    pub fn contains_id(&self, server_id: &str) -> bool {
        self.rooms.contains_key(server_id)
    }

    pub fn get(&self, server_id: &str) -> Option<&Room> {
        self.rooms.get(server_id)
    }

    /// The room `id` hosts.
    pub fn hosted_by(&self, id: ConnectionId) -> Option<&Room> {
        self.hosts.get(&id).and_then(|sid| self.rooms.get(sid))
    }

    /// The room `id` is in, as host or as client.
    pub fn room_of(&self, id: ConnectionId) -> Option<&Room> {
        self.hosts
            .get(&id)
            .or_else(|| self.members.get(&id))
            .and_then(|sid| self.rooms.get(sid))
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn public_len(&self) -> usize {
        self.rooms.values().filter(|r| r.is_public).count()
    }

    /// Listing entries for every public room, ordered by room id.
    pub fn listings(&self, relay: &RelayAddress) -> Vec<RoomListing> {
        let mut listings: Vec<RoomListing> = self
            .rooms
            .values()
            .filter(|r| r.is_public)
            .map(|r| r.listing(relay))
            .collect();
        listings.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        listings
    }

    // -- Operations ---------------------------------------------------------

    /// Creates a room hosted by `host` under `server_id`.
    ///
    /// Leaves whatever room `host` was in first. `host_endpoint` is the
    /// host's NAT-observed endpoint; without one the room never offers
    /// direct connect.
    ///
    /// # Errors
    /// [`RoomError::DuplicateId`] if `server_id` is taken. Nothing changes.
    pub fn create_room(
        &mut self,
        host: ConnectionId,
        server_id: String,
        settings: CreateRoom,
        host_endpoint: Option<SocketAddr>,
    ) -> Result<Effects, RoomError> {
        if self.rooms.contains_key(&server_id) {
            return Err(RoomError::DuplicateId(server_id));
        }

        let mut effects = self.leave(host, None);

        let room = Room {
            server_id: server_id.clone(),
            host,
            clients: Vec::new(),
            name: settings.name,
            data: settings.data,
            is_public: settings.is_public,
            max_players: settings.max_players,
            host_public_endpoint: host_endpoint,
            host_local_ip: settings.host_local_ip,
            supports_direct_connect: host_endpoint.is_some()
                && settings.supports_direct_connect,
            use_nat_punch: settings.use_nat_punch,
            port: settings.port,
        };

        tracing::info!(
            room_id = %server_id,
            conn_id = %host,
            max_players = room.max_players,
            is_public = room.is_public,
            direct_connect = room.supports_direct_connect,
            "room created"
        );

        self.rooms.insert(server_id.clone(), room);
        self.hosts.insert(host, server_id.clone());
        effects.send(host, ServerFrame::RoomCreated { server_id });
        effects.rooms_changed = true;
        Ok(effects)
    }

    /// Adds `caller` to a room as a client.
    ///
    /// Leaves whatever room `caller` was in first. An unknown or full room
    /// is answered with `ServerLeft` to the caller alone.
    pub fn join(&mut self, caller: ConnectionId, req: &JoinRequest<'_>) -> Effects {
        let mut effects = self.leave(caller, None);

        let Some(room) = self.rooms.get_mut(req.server_id) else {
            tracing::debug!(conn_id = %caller, room_id = req.server_id, "join refused: unknown room");
            effects.send(caller, ServerFrame::ServerLeft);
            return effects;
        };
        if !room.has_free_slot() {
            tracing::debug!(conn_id = %caller, room_id = req.server_id, "join refused: room full");
            effects.send(caller, ServerFrame::ServerLeft);
            return effects;
        }

        room.clients.push(caller);
        self.members.insert(caller, room.server_id.clone());
        effects.rooms_changed = true;

        let direct = match (req.public_endpoint, room.host_public_endpoint) {
            (Some(caller_ep), Some(host_ep))
                if req.can_direct_connect && room.supports_direct_connect =>
            {
                Some((caller_ep, host_ep))
            }
            _ => None,
        };

        match direct {
            Some((caller_ep, host_ep)) => {
                let ip = if caller_ep.ip() == host_ep.ip() {
                    if room.host_local_ip == req.local_ip {
                        "127.0.0.1".to_string()
                    } else {
                        room.host_local_ip.clone()
                    }
                } else {
                    host_ep.ip().to_string()
                };
                let port = if room.use_nat_punch {
                    i32::from(host_ep.port())
                } else {
                    room.port
                };

                tracing::info!(conn_id = %caller, room_id = %room.server_id, %ip, port, "client joined, direct connect");
                effects.send(
                    caller,
                    ServerFrame::DirectConnectIp {
                        ip,
                        port,
                        use_nat_punch: room.use_nat_punch,
                    },
                );
                if room.use_nat_punch {
                    effects.send(
                        room.host,
                        ServerFrame::DirectConnectIp {
                            ip: caller_ep.ip().to_string(),
                            port: i32::from(caller_ep.port()),
                            use_nat_punch: true,
                        },
                    );
                }
            }
            None => {
                tracing::info!(conn_id = %caller, room_id = %room.server_id, "client joined, relayed");
                effects.send(caller, ServerFrame::ServerJoined { client: caller });
                effects.send(room.host, ServerFrame::ServerJoined { client: caller });
            }
        }

        effects
    }

    /// Removes `conn` from its room.
    ///
    /// A host leaving destroys the room and sends `ServerLeft` to every
    /// client. A client leaving is reported to the host with
    /// `PlayerDisconnected`.
    ///
    /// With `required_host` set, only a room hosted by that connection is
    /// touched. This is how kicks are expressed: a host may remove its own
    /// clients, and nobody else can remove anyone.
    pub fn leave(
        &mut self,
        conn: ConnectionId,
        required_host: Option<ConnectionId>,
    ) -> Effects {
        let mut effects = Effects::default();

        if let Some(server_id) = self.hosts.get(&conn).cloned() {
            if required_host.is_some_and(|h| h != conn) {
                return effects;
            }
            self.hosts.remove(&conn);
            if let Some(room) = self.rooms.remove(&server_id) {
                for client in room.clients {
                    self.members.remove(&client);
                    effects.send(client, ServerFrame::ServerLeft);
                }
            }
            tracing::info!(room_id = %server_id, conn_id = %conn, "room closed");
            effects.rooms_changed = true;
            return effects;
        }

        let Some(server_id) = self.members.get(&conn).cloned() else {
            return effects;
        };
        let Some(room) = self.rooms.get_mut(&server_id) else {
            self.members.remove(&conn);
            return effects;
        };
        if required_host.is_some_and(|h| h != room.host) {
            return effects;
        }

        room.clients.retain(|c| *c != conn);
        self.members.remove(&conn);
        effects.send(room.host, ServerFrame::PlayerDisconnected { client: conn });
        effects.rooms_changed = true;
        tracing::info!(room_id = %server_id, conn_id = %conn, kicked = required_host.is_some(), "client left room");
        effects
    }

    /// `caller` asks to remove `target` from the room `caller` hosts.
    pub fn kick(&mut self, caller: ConnectionId, target: ConnectionId) -> Effects {
        self.leave(target, Some(caller))
    }

    /// Decides where a `SendData` payload goes.
    ///
    /// From the host, the payload goes to `target` if it is one of the
    /// host's clients. From a client, it goes to the host tagged with the
    /// sender id; `target` is ignored.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] when the sender has no room, or when a
    /// host targets a connection that is not its client.
    pub fn route_data(
        &self,
        sender: ConnectionId,
        payload: Vec<u8>,
        target: ConnectionId,
    ) -> Result<Outbound, RoomError> {
        if let Some(room) = self.hosted_by(sender) {
            if !room.contains_client(target) {
                return Err(RoomError::NotInRoom(target));
            }
            return Ok(Outbound {
                to: target,
                frame: ServerFrame::GetData {
                    payload,
                    sender: None,
                },
            });
        }

        let room = self
            .members
            .get(&sender)
            .and_then(|sid| self.rooms.get(sid))
            .ok_or(RoomError::NotInRoom(sender))?;
        Ok(Outbound {
            to: room.host,
            frame: ServerFrame::GetData {
                payload,
                sender: Some(sender),
            },
        })
    }

    /// Applies the present fields of `update` to the room `caller` hosts.
    ///
    /// # Errors
    /// [`RoomError::NotHost`] if `caller` hosts no room.
    pub fn update_room(
        &mut self,
        caller: ConnectionId,
        update: RoomUpdate,
    ) -> Result<Effects, RoomError> {
        let room = self
            .hosts
            .get(&caller)
            .and_then(|sid| self.rooms.get_mut(sid))
            .ok_or(RoomError::NotHost(caller))?;

        let changed = !update.is_empty();
        if let Some(name) = update.name {
            room.name = name;
        }
        if let Some(data) = update.data {
            room.data = data;
        }
        if let Some(is_public) = update.is_public {
            room.is_public = is_public;
        }
        if let Some(max_players) = update.max_players {
            room.max_players = max_players;
        }
        tracing::debug!(room_id = %room.server_id, "room data updated");

        Ok(Effects {
            outbound: Vec::new(),
            rooms_changed: changed,
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
