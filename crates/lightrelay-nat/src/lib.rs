//! NAT rendezvous for lightrelay.
//!
//! Peers behind NAT can sometimes talk directly once each side knows the
//! other's public endpoint. The relay learns a peer's public endpoint like
//! this:
//!
//! ```text
//! relay ──RequestNatConnection{token, udpPort}──→ peer     (reliable channel)
//! peer  ──{true, token}──→ relay:udpPort                   (UDP)
//! relay records the datagram's source address for that connection
//! relay ──[1]──→ peer                                       (UDP ack)
//! ```
//!
//! [`NatRendezvous`] holds the pending tokens and resolved endpoints, and
//! [`PunchListener`] is the UDP side. The room layer reads resolved
//! endpoints when a peer joins a direct-connect room.

mod bimap;
mod error;
mod listener;
mod rendezvous;

pub use bimap::BiMap;
pub use error::NatError;
pub use listener::PunchListener;
pub use rendezvous::{generate_token, NatRendezvous};
