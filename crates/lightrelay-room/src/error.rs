//! Error types for the room layer.

use lightrelay_transport::ConnectionId;

/// Errors that can occur during room operations.
///
/// None of these reach a peer as an error code. The relay either answers
/// with a protocol signal (`ServerLeft` for a failed join) or drops the
/// frame and logs.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this id.
    #[error("room {0} not found")]
    NotFound(String),

    /// The room has no free player slots.
    #[error("room {0} is full")]
    RoomFull(String),

    /// The id is already used by another room.
    #[error("room id {0} already in use")]
    DuplicateId(String),

    /// The connection is not in any room.
    #[error("{0} is not in a room")]
    NotInRoom(ConnectionId),

    /// A host-only operation from a connection that hosts nothing.
    #[error("{0} does not host a room")]
    NotHost(ConnectionId),

    /// Id generation kept colliding with existing ids.
    #[error("no free room id after {0} attempts")]
    IdSpaceExhausted(usize),
}
