//! Relay frames.
//!
//! A frame is one opcode byte followed by the opcode's fields in a fixed
//! order. [`ClientFrame`] is what peers send to a relay node, and
//! [`ServerFrame`] is what the relay sends back. Both directions can be
//! encoded and decoded, so a Rust client (or a test) speaks exactly the
//! same bytes as the relay.
//!
//! Two byte sequences travel outside the opcode space: the keepalive
//! [`HEARTBEAT`] byte on relay connections, and the [`PunchDatagram`] /
//! [`PUNCH_ACK`] exchange on the NAT rendezvous socket.

use lightrelay_transport::ConnectionId;

use crate::{OpCode, ProtocolError, Reader, Writer};

/// Keepalive frame: a single raw byte, outside the opcode range.
pub const HEARTBEAT: u8 = 200;

/// Acknowledgment datagram echoed by the rendezvous listener.
pub const PUNCH_ACK: [u8; 1] = [1];

// ---------------------------------------------------------------------------
// Client → relay
// ---------------------------------------------------------------------------

/// Room settings sent by a peer that wants to host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateRoom {
    pub max_players: i32,
    pub name: String,
    pub is_public: bool,
    pub data: String,
    /// The host will accept direct (non-relayed) connections.
    pub supports_direct_connect: bool,
    pub host_local_ip: String,
    pub use_nat_punch: bool,
    /// The port the host listens on for direct connections.
    pub port: i32,
}

/// A partial room update. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub data: Option<String>,
    pub is_public: Option<bool>,
    pub max_players: Option<i32>,
}

impl RoomUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.data.is_none()
            && self.is_public.is_none()
            && self.max_players.is_none()
    }
}

/// A frame sent by a peer to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Opcode 0. Carries nothing and is ignored by the relay.
    Default,
    RequestId,
    JoinServer {
        server_id: String,
        can_direct_connect: bool,
        local_ip: String,
    },
    /// `target` is only meaningful when the sender hosts the room.
    SendData {
        payload: Vec<u8>,
        target: ConnectionId,
    },
    CreateRoom(CreateRoom),
    LeaveRoom,
    KickPlayer {
        target: ConnectionId,
    },
    AuthenticationResponse {
        key: String,
    },
    UpdateRoomData(RoomUpdate),
}

impl ClientFrame {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Default => OpCode::Default,
            Self::RequestId => OpCode::RequestId,
            Self::JoinServer { .. } => OpCode::JoinServer,
            Self::SendData { .. } => OpCode::SendData,
            Self::CreateRoom(_) => OpCode::CreateRoom,
            Self::LeaveRoom => OpCode::LeaveRoom,
            Self::KickPlayer { .. } => OpCode::KickPlayer,
            Self::AuthenticationResponse { .. } => {
                OpCode::AuthenticationResponse
            }
            Self::UpdateRoomData(_) => OpCode::UpdateRoomData,
        }
    }

    /// Decodes a complete frame. Trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(data);
        let byte = r.read_u8()?;
        let frame = match OpCode::try_from(byte)? {
            OpCode::Default => Self::Default,
            OpCode::RequestId => Self::RequestId,
            OpCode::JoinServer => Self::JoinServer {
                server_id: r.read_string()?,
                can_direct_connect: r.read_bool()?,
                local_ip: r.read_string()?,
            },
            OpCode::SendData => Self::SendData {
                payload: r.read_bytes()?,
                target: ConnectionId::new(r.read_i32()?),
            },
            OpCode::CreateRoom => Self::CreateRoom(CreateRoom {
                max_players: r.read_i32()?,
                name: r.read_string()?,
                is_public: r.read_bool()?,
                data: r.read_string()?,
                supports_direct_connect: r.read_bool()?,
                host_local_ip: r.read_string()?,
                use_nat_punch: r.read_bool()?,
                port: r.read_i32()?,
            }),
            OpCode::LeaveRoom => Self::LeaveRoom,
            OpCode::KickPlayer => Self::KickPlayer {
                target: ConnectionId::new(r.read_i32()?),
            },
            OpCode::AuthenticationResponse => Self::AuthenticationResponse {
                key: r.read_string()?,
            },
            OpCode::UpdateRoomData => {
                let mut update = RoomUpdate::default();
                if r.read_bool()? {
                    update.name = Some(r.read_string()?);
                }
                if r.read_bool()? {
                    update.data = Some(r.read_string()?);
                }
                if r.read_bool()? {
                    update.is_public = Some(r.read_bool()?);
                }
                if r.read_bool()? {
                    update.max_players = Some(r.read_i32()?);
                }
                Self::UpdateRoomData(update)
            }
            _ => return Err(ProtocolError::UnexpectedOpCode(byte)),
        };
        Ok(frame)
    }

    /// Encodes the frame into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let mut w = Writer::new(buf);
        w.write_u8(self.opcode().into())?;
        match self {
            Self::Default | Self::RequestId | Self::LeaveRoom => {}
            Self::JoinServer {
                server_id,
                can_direct_connect,
                local_ip,
            } => {
                w.write_string(server_id)?;
                w.write_bool(*can_direct_connect)?;
                w.write_string(local_ip)?;
            }
            Self::SendData { payload, target } => {
                w.write_bytes(payload)?;
                w.write_i32(target.into_inner())?;
            }
            Self::CreateRoom(room) => {
                w.write_i32(room.max_players)?;
                w.write_string(&room.name)?;
                w.write_bool(room.is_public)?;
                w.write_string(&room.data)?;
                w.write_bool(room.supports_direct_connect)?;
                w.write_string(&room.host_local_ip)?;
                w.write_bool(room.use_nat_punch)?;
                w.write_i32(room.port)?;
            }
            Self::KickPlayer { target } => w.write_i32(target.into_inner())?,
            Self::AuthenticationResponse { key } => w.write_string(key)?,
            Self::UpdateRoomData(update) => {
                w.write_bool(update.name.is_some())?;
                if let Some(name) = &update.name {
                    w.write_string(name)?;
                }
                w.write_bool(update.data.is_some())?;
                if let Some(data) = &update.data {
                    w.write_string(data)?;
                }
                w.write_bool(update.is_public.is_some())?;
                if let Some(is_public) = update.is_public {
                    w.write_bool(is_public)?;
                }
                w.write_bool(update.max_players.is_some())?;
                if let Some(max_players) = update.max_players {
                    w.write_i32(max_players)?;
                }
            }
        }
        Ok(w.position())
    }
}

// ---------------------------------------------------------------------------
// Relay → client
// ---------------------------------------------------------------------------

/// A frame sent by the relay to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    AuthenticationRequest,
    Authenticated,
    GetId {
        id: ConnectionId,
    },
    RoomCreated {
        server_id: String,
    },
    /// Relayed mode: `client` has joined. Sent to both the joiner and the
    /// host.
    ServerJoined {
        client: ConnectionId,
    },
    /// The room is gone, or the join was refused.
    ServerLeft,
    PlayerDisconnected {
        client: ConnectionId,
    },
    /// Relayed payload. `sender` is present only on frames delivered to
    /// the host.
    GetData {
        payload: Vec<u8>,
        sender: Option<ConnectionId>,
    },
    RequestNatConnection {
        token: String,
        port: i32,
    },
    DirectConnectIp {
        ip: String,
        port: i32,
        use_nat_punch: bool,
    },
}

impl ServerFrame {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::AuthenticationRequest => OpCode::AuthenticationRequest,
            Self::Authenticated => OpCode::Authenticated,
            Self::GetId { .. } => OpCode::GetId,
            Self::RoomCreated { .. } => OpCode::RoomCreated,
            Self::ServerJoined { .. } => OpCode::ServerJoined,
            Self::ServerLeft => OpCode::ServerLeft,
            Self::PlayerDisconnected { .. } => OpCode::PlayerDisconnected,
            Self::GetData { .. } => OpCode::GetData,
            Self::RequestNatConnection { .. } => OpCode::RequestNatConnection,
            Self::DirectConnectIp { .. } => OpCode::DirectConnectIp,
        }
    }

    /// Encodes the frame into `buf`, returning the number of bytes written.
    ///
    /// `buf` is normally a pooled buffer of the transport's maximum packet
    /// size, so [`ProtocolError::BufferOverflow`] means the frame is too
    /// large to send.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let mut w = Writer::new(buf);
        w.write_u8(self.opcode().into())?;
        match self {
            Self::AuthenticationRequest
            | Self::Authenticated
            | Self::ServerLeft => {}
            Self::GetId { id } => w.write_i32(id.into_inner())?,
            Self::RoomCreated { server_id } => w.write_string(server_id)?,
            Self::ServerJoined { client }
            | Self::PlayerDisconnected { client } => {
                w.write_i32(client.into_inner())?
            }
            Self::GetData { payload, sender } => {
                w.write_bytes(payload)?;
                if let Some(sender) = sender {
                    w.write_i32(sender.into_inner())?;
                }
            }
            Self::RequestNatConnection { token, port } => {
                w.write_string(token)?;
                w.write_i32(*port)?;
            }
            Self::DirectConnectIp {
                ip,
                port,
                use_nat_punch,
            } => {
                w.write_string(ip)?;
                w.write_i32(*port)?;
                w.write_bool(*use_nat_punch)?;
            }
        }
        Ok(w.position())
    }

    /// Decodes a complete frame.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(data);
        let byte = r.read_u8()?;
        let frame = match OpCode::try_from(byte)? {
            OpCode::AuthenticationRequest => Self::AuthenticationRequest,
            OpCode::Authenticated => Self::Authenticated,
            OpCode::GetId => Self::GetId {
                id: ConnectionId::new(r.read_i32()?),
            },
            OpCode::RoomCreated => Self::RoomCreated {
                server_id: r.read_string()?,
            },
            OpCode::ServerJoined => Self::ServerJoined {
                client: ConnectionId::new(r.read_i32()?),
            },
            OpCode::ServerLeft => Self::ServerLeft,
            OpCode::PlayerDisconnected => Self::PlayerDisconnected {
                client: ConnectionId::new(r.read_i32()?),
            },
            OpCode::GetData => {
                let payload = r.read_bytes()?;
                let sender = if r.remaining() >= 4 {
                    Some(ConnectionId::new(r.read_i32()?))
                } else {
                    None
                };
                Self::GetData { payload, sender }
            }
            OpCode::RequestNatConnection => Self::RequestNatConnection {
                token: r.read_string()?,
                port: r.read_i32()?,
            },
            OpCode::DirectConnectIp => Self::DirectConnectIp {
                ip: r.read_string()?,
                port: r.read_i32()?,
                use_nat_punch: r.read_bool()?,
            },
            _ => return Err(ProtocolError::UnexpectedOpCode(byte)),
        };
        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// NAT rendezvous datagram
// ---------------------------------------------------------------------------

/// The datagram a peer sends to the rendezvous socket.
///
/// A leading `true` byte is followed by the peer's token. A bare `false`
/// byte is a keepalive that only holds the NAT mapping open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PunchDatagram {
    KeepAlive,
    Establish { token: String },
}

impl PunchDatagram {
    /// Anything after a keepalive's leading byte is ignored.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(data);
        if r.read_bool()? {
            Ok(Self::Establish {
                token: r.read_string()?,
            })
        } else {
            Ok(Self::KeepAlive)
        }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let mut w = Writer::new(buf);
        match self {
            Self::KeepAlive => w.write_bool(false)?,
            Self::Establish { token } => {
                w.write_bool(true)?;
                w.write_string(token)?;
            }
        }
        Ok(w.position())
    }
}
