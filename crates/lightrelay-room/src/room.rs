//! A single hosted room.

use std::net::SocketAddr;

use lightrelay_protocol::{RelayAddress, RoomListing};
use lightrelay_transport::ConnectionId;

/// One room: a host, its clients, and what the server list shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub server_id: String,
    pub host: ConnectionId,
    /// Joined clients in join order. Never contains the host.
    pub clients: Vec<ConnectionId>,
    pub name: String,
    /// Opaque host-defined data shown in listings.
    pub data: String,
    pub is_public: bool,
    /// Player limit, host included.
    pub max_players: i32,

    // -- Direct connect -------------------------------------------------
    /// The host's public endpoint, if it completed NAT rendezvous before
    /// creating the room.
    pub host_public_endpoint: Option<SocketAddr>,
    pub host_local_ip: String,
    /// True only when the host asked for direct connect and has a public
    /// endpoint to hand out.
    pub supports_direct_connect: bool,
    pub use_nat_punch: bool,
    /// The host's direct-connect listen port.
    pub port: i32,
}

impl Room {
    /// Players in the room, host included.
    pub fn current_players(&self) -> i32 {
        i32::try_from(self.clients.len())
            .unwrap_or(i32::MAX)
            .saturating_add(1)
    }

    pub fn has_free_slot(&self) -> bool {
        self.current_players() < self.max_players
    }

    pub fn contains_client(&self, id: ConnectionId) -> bool {
        self.clients.contains(&id)
    }

    /// The server-list entry for this room on the node at `relay`.
    pub fn listing(&self, relay: &RelayAddress) -> RoomListing {
        RoomListing {
            server_id: self.server_id.clone(),
            host_id: self.host.into_inner(),
            server_name: self.name.clone(),
            server_data: self.data.clone(),
            is_public: self.is_public,
            max_players: self.max_players,
            current_players: self.current_players(),
            relay_info: relay.clone(),
        }
    }
}
