//! Load balancer for lightrelay nodes.
//!
//! Relay nodes register here; clients ask here which node to use and which
//! rooms exist across all nodes.
//!
//! # Responsibilities
//!
//! 1. **Registry**: nodes present the shared key and their ports; the
//!    balancer probes them once before accepting ([`LoadBalancer::register`])
//! 2. **Health checks**: every node is probed on a fixed interval and
//!    evicted on the first failure ([`run_health_checks`])
//! 3. **Selection**: the least-loaded node, preferring the caller's region
//!    ([`LoadBalancer::select_node`])
//! 4. **Aggregation**: every node's public rooms merged into per-region
//!    cached lists ([`LoadBalancer::aggregate_rooms`])
//! 5. **Room ids**: ids unique across nodes ([`LoadBalancer::issue_room_id`])
//!
//! Node I/O goes through the [`NodeProbe`] trait so tests can script node
//! behavior without sockets.

mod balancer;
mod config;
mod error;
mod health;
mod http;
mod probe;

pub use balancer::{LoadBalancer, Registration};
pub use config::BalancerConfig;
pub use error::{BalancerError, ProbeError};
pub use health::run_health_checks;
pub use http::{router, serve};
pub use probe::{HttpProbe, NodeProbe, NodeTarget};
