//! Plain configuration structs for the relay node.
//!
//! The binary fills these from command-line flags and environment
//! variables; tests build them directly.

use std::time::Duration;

use lightrelay_protocol::Region;
use lightrelay_room::IdAlphabet;
use lightrelay_session::AuthFailurePolicy;

/// How the relay engine behaves.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address peers and the balancer use to reach this node.
    pub public_ip: String,
    /// Port the game transport listens on.
    pub transport_port: u16,
    /// Port the HTTP endpoint listens on.
    pub endpoint_port: u16,
    pub region: Region,
    /// Length of locally generated room ids.
    pub id_length: usize,
    pub id_alphabet: IdAlphabet,
    /// What to do with a peer that presents the wrong key.
    pub auth_failure: AuthFailurePolicy,
    /// Cadence of the keepalive sent to authenticated peers.
    pub heartbeat_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            public_ip: "127.0.0.1".to_string(),
            transport_port: 7777,
            endpoint_port: 8080,
            region: Region::NorthAmerica,
            id_length: 5,
            id_alphabet: IdAlphabet::Alphanumeric,
            auth_failure: AuthFailurePolicy::Disconnect,
            heartbeat_interval: Duration::from_millis(1000),
        }
    }
}

/// The node's HTTP endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub bind_address: String,
    pub port: u16,
    /// Serve `/api/servers` and `/api/compressed/servers`. When off, both
    /// answer 403.
    pub serve_server_list: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            serve_server_list: true,
        }
    }
}

/// How the node talks to its load balancer.
#[derive(Debug, Clone)]
pub struct BalancerClientConfig {
    pub address: String,
    pub port: u16,
    pub auth_key: String,
    /// Bound on every request to the balancer.
    pub timeout: Duration,
    /// Ask the balancer for room ids instead of generating them locally.
    pub issue_room_ids: bool,
    /// Re-register when the balancer has not probed `/api/stats` for this
    /// long.
    pub reregister_after: Duration,
}

impl Default for BalancerClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
            auth_key: "AuthKey".to_string(),
            timeout: Duration::from_millis(5000),
            issue_room_ids: false,
            reregister_after: Duration::from_secs(60),
        }
    }
}
