//! Message opcodes.
//!
//! Every relay frame starts with one of these bytes. The numbering is
//! fixed by deployed clients. 15, 16 and 19 are unassigned and new
//! codes must not take them.

/// The leading byte of every relay frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Default = 0,
    RequestId = 1,
    JoinServer = 2,
    SendData = 3,
    GetId = 4,
    ServerJoined = 5,
    GetData = 6,
    CreateRoom = 7,
    ServerLeft = 8,
    PlayerDisconnected = 9,
    RoomCreated = 10,
    LeaveRoom = 11,
    KickPlayer = 12,
    AuthenticationRequest = 13,
    AuthenticationResponse = 14,
    Authenticated = 17,
    UpdateRoomData = 18,
    RequestNatConnection = 20,
    DirectConnectIp = 21,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = crate::ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => Self::Default,
            1 => Self::RequestId,
            2 => Self::JoinServer,
            3 => Self::SendData,
            4 => Self::GetId,
            5 => Self::ServerJoined,
            6 => Self::GetData,
            7 => Self::CreateRoom,
            8 => Self::ServerLeft,
            9 => Self::PlayerDisconnected,
            10 => Self::RoomCreated,
            11 => Self::LeaveRoom,
            12 => Self::KickPlayer,
            13 => Self::AuthenticationRequest,
            14 => Self::AuthenticationResponse,
            17 => Self::Authenticated,
            18 => Self::UpdateRoomData,
            20 => Self::RequestNatConnection,
            21 => Self::DirectConnectIp,
            other => return Err(crate::ProtocolError::UnknownOpCode(other)),
        })
    }
}
