//! Wire protocol for lightrelay.
//!
//! This crate defines the "language" relay nodes, their clients, and the
//! load balancer speak:
//!
//! - **Codec** ([`Writer`], [`Reader`]): fixed-width and length-prefixed
//!   encodings over a byte buffer with an explicit cursor.
//! - **Frames** ([`OpCode`], [`ClientFrame`], [`ServerFrame`],
//!   [`PunchDatagram`]): every relay message, prefixed by one opcode byte.
//! - **Buffers** ([`BufferPool`]): reusable send buffers sized to the
//!   transport's maximum packet size.
//! - **JSON types** ([`RelayAddress`], [`RelayServerInfo`], [`RoomListing`],
//!   [`BalancerStats`], [`Region`]): what the HTTP endpoints exchange.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session / Room (relay state)
//! ```

mod codec;
mod compress;
mod error;
mod frame;
mod opcode;
mod pool;
mod types;

pub use codec::{Reader, Writer};
pub use compress::{compress_text, decompress_text};
pub use error::ProtocolError;
pub use frame::{
    ClientFrame, CreateRoom, PunchDatagram, RoomUpdate, ServerFrame,
    HEARTBEAT, PUNCH_ACK,
};
pub use opcode::OpCode;
pub use pool::{BufferPool, PooledBuffer};
pub use types::{
    BalancerStats, Region, RelayAddress, RelayServerInfo, RoomListing,
};
