//! JSON types shared by relay nodes and the load balancer.
//!
//! Everything here travels over HTTP. Field names are camelCase on the
//! wire so existing clients keep working.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A coarse geographic tag used for node selection.
///
/// Serialized as its integer value (`"region": 3`), which is also how it
/// travels in the `x-Region` header.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Region {
    /// No preference. Also the bucket that lists every room.
    #[default]
    Any = 0,
    NorthAmerica = 1,
    SouthAmerica = 2,
    Europe = 3,
    Asia = 4,
    Africa = 5,
    Oceania = 6,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Any,
        Region::NorthAmerica,
        Region::SouthAmerica,
        Region::Europe,
        Region::Asia,
        Region::Africa,
        Region::Oceania,
    ];
}

impl From<Region> for u8 {
    fn from(region: Region) -> Self {
        region as u8
    }
}

impl TryFrom<u8> for Region {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Region::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| ProtocolError::UnknownRegion(value.to_string()))
    }
}

/// Accepts the integer form (`"3"`) or the name (`"europe"`).
impl FromStr for Region {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Region::try_from(n);
        }
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "any" => Ok(Region::Any),
            "northamerica" | "na" => Ok(Region::NorthAmerica),
            "southamerica" | "sa" => Ok(Region::SouthAmerica),
            "europe" | "eu" => Ok(Region::Europe),
            "asia" => Ok(Region::Asia),
            "africa" => Ok(Region::Africa),
            "oceania" => Ok(Region::Oceania),
            _ => Err(ProtocolError::UnknownRegion(s.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Any => "Any",
            Region::NorthAmerica => "NorthAmerica",
            Region::SouthAmerica => "SouthAmerica",
            Region::Europe => "Europe",
            Region::Asia => "Asia",
            Region::Africa => "Africa",
            Region::Oceania => "Oceania",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Relay node identity and load
// ---------------------------------------------------------------------------

/// Where a relay node can be reached. The load balancer's registry key.
///
/// Ordering is by field order, which gives registry sweeps a stable order.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct RelayAddress {
    /// Public address clients connect to.
    pub address: String,
    /// Game (transport) port.
    pub port: u16,
    /// HTTP endpoint port.
    pub endpoint_port: u16,
    #[serde(default)]
    pub region: Region,
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} (endpoint {}, {})",
            self.address, self.port, self.endpoint_port, self.region
        )
    }
}

/// Load figures reported by a relay node's `/api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayServerInfo {
    pub connected_clients: u64,
    pub room_count: u64,
    pub public_room_count: u64,
    /// Seconds since the node started.
    pub uptime: u64,
}

// ---------------------------------------------------------------------------
// Room listing
// ---------------------------------------------------------------------------

/// One public room, as listed by a node and merged by the balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub server_id: String,
    pub host_id: i32,
    pub server_name: String,
    pub server_data: String,
    pub is_public: bool,
    pub max_players: i32,
    pub current_players: i32,
    pub relay_info: RelayAddress,
}

/// Aggregate figures served by the balancer's `/api/stats/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancerStats {
    pub node_count: u64,
    /// Seconds since the balancer started.
    pub uptime: u64,
    /// Sum of connected clients across all nodes.
    pub ccu: u64,
    pub total_rooms: u64,
}
