//! # lightrelay
//!
//! A relay node for multiplayer games whose players cannot reach each
//! other directly. One peer hosts a room, others join it, and the node
//! forwards their traffic. When both sides can, the node instead hands
//! them each other's NAT-observed endpoints so they connect directly.
//!
//! This crate ties the layers together:
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session (auth) → Room (relay rules)
//!                                   ↘ NAT rendezvous (UDP)
//! ```
//!
//! plus the node's HTTP endpoint and, optionally, its link to a load
//! balancer.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lightrelay::prelude::*;
//!
//! let (transport, events) = WebSocketTransport::bind("0.0.0.0:7777", 16_384).await?;
//! let engine = Arc::new(RelayEngine::new(
//!     transport,
//!     EngineConfig::default(),
//!     SharedKeyAuthenticator::new("Secret Auth Key"),
//! ));
//! tokio::spawn(run_heartbeat(Arc::clone(&engine)));
//! engine.run(events).await;
//! ```

mod balancer;
mod config;
mod endpoint;
mod engine;
mod error;
mod heartbeat;

pub use balancer::BalancerClient;
pub use config::{BalancerClientConfig, EndpointConfig, EngineConfig};
pub use endpoint::{router, serve};
pub use engine::RelayEngine;
pub use error::RelayError;
pub use heartbeat::{run_balancer_sync, run_heartbeat};

/// Re-exports of the types needed to stand up a relay node.
pub mod prelude {
    pub use crate::{
        run_balancer_sync, run_heartbeat, BalancerClient,
        BalancerClientConfig, EndpointConfig, EngineConfig, RelayEngine,
        RelayError,
    };
    pub use lightrelay_nat::{NatRendezvous, PunchListener};
    pub use lightrelay_protocol::{Region, RelayAddress, RelayServerInfo};
    pub use lightrelay_session::{
        AuthFailurePolicy, Authenticator, SharedKeyAuthenticator,
    };
    pub use lightrelay_transport::{
        AnyTransport, Channel, ConnectionId, Transport, TransportEvent,
        TransportKind, WebSocketTransport,
    };
}
