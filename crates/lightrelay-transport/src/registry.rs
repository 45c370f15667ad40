//! Startup-time transport selection.
//!
//! Deployments pick a transport by name (`"websocket"`, `"tcp"`). The name
//! is resolved once at process start into an [`AnyTransport`], which then
//! behaves like any other [`Transport`].

use std::net::SocketAddr;
use std::str::FromStr;

use crate::{Channel, ConnectionId, EventReceiver, Transport, TransportError};

/// The transports compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    #[cfg(feature = "websocket")]
    WebSocket,
    #[cfg(feature = "tcp")]
    Tcp,
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            #[cfg(feature = "websocket")]
            "websocket" | "ws" | "simplewebtransport" => Ok(Self::WebSocket),
            #[cfg(feature = "tcp")]
            "tcp" | "telepathy" => Ok(Self::Tcp),
            _ => Err(TransportError::UnknownTransport(name.to_string())),
        }
    }
}

/// A transport selected by [`TransportKind`].
pub enum AnyTransport {
    #[cfg(feature = "websocket")]
    WebSocket(crate::WebSocketTransport),
    #[cfg(feature = "tcp")]
    Tcp(crate::TcpTransport),
}

impl AnyTransport {
    /// Binds the transport of the given kind.
    pub async fn start(
        kind: TransportKind,
        addr: &str,
        max_packet_size: usize,
    ) -> Result<(Self, EventReceiver), TransportError> {
        match kind {
            #[cfg(feature = "websocket")]
            TransportKind::WebSocket => {
                let (t, events) =
                    crate::WebSocketTransport::bind(addr, max_packet_size)
                        .await?;
                Ok((Self::WebSocket(t), events))
            }
            #[cfg(feature = "tcp")]
            TransportKind::Tcp => {
                let (t, events) =
                    crate::TcpTransport::bind(addr, max_packet_size).await?;
                Ok((Self::Tcp(t), events))
            }
        }
    }

    /// Returns the address the transport is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(t) => t.local_addr(),
            #[cfg(feature = "tcp")]
            Self::Tcp(t) => t.local_addr(),
        }
    }
}

impl Transport for AnyTransport {
    type Error = TransportError;

    fn send(
        &self,
        id: ConnectionId,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(t) => t.send(id, channel, data),
            #[cfg(feature = "tcp")]
            Self::Tcp(t) => t.send(id, channel, data),
        }
    }

    fn disconnect(&self, id: ConnectionId) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(t) => t.disconnect(id),
            #[cfg(feature = "tcp")]
            Self::Tcp(t) => t.disconnect(id),
        }
    }

    fn max_packet_size(&self) -> usize {
        match self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(t) => t.max_packet_size(),
            #[cfg(feature = "tcp")]
            Self::Tcp(t) => t.max_packet_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parses_known_names() {
        assert_eq!(
            "websocket".parse::<TransportKind>().unwrap(),
            TransportKind::WebSocket
        );
        assert_eq!(
            "SimpleWebTransport".parse::<TransportKind>().unwrap(),
            TransportKind::WebSocket
        );
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
    }

    #[test]
    fn test_transport_kind_unknown_name_returns_error() {
        let result = "carrier-pigeon".parse::<TransportKind>();
        assert!(matches!(
            result,
            Err(TransportError::UnknownTransport(name)) if name == "carrier-pigeon"
        ));
    }
}
