//! Room management for lightrelay.
//!
//! A room is one hosted session: a host connection, its clients, and the
//! metadata peers see in server lists. The [`RoomRegistry`] is pure state:
//! every operation returns the frames that must be sent as a result
//! ([`Effects`]), and the caller does the sending. That keeps the relay
//! rules testable without sockets.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/destroys rooms, routes data, enforces host authority
//! - [`Room`]: one room's state, including direct-connect details
//! - [`RoomListCache`]: serialized (and compressed) public room lists
//! - [`IdAlphabet`] / [`generate_unique_id`]: room id allocation

mod cache;
mod error;
mod id;
mod registry;
mod room;

pub use cache::RoomListCache;
pub use error::RoomError;
pub use id::{generate_unique_id, random_id, IdAlphabet};
pub use registry::{Effects, JoinRequest, Outbound, RoomRegistry};
pub use room::Room;
