//! Length-prefixed TCP transport.
//!
//! Each message is a 4-byte big-endian length followed by that many bytes.
//! Messages larger than the configured maximum packet size close the
//! connection before the body is read.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::table::{ConnectionTable, Outbound};
use crate::{
    Channel, ConnectionId, EventReceiver, Transport, TransportError,
    TransportEvent,
};

/// A TCP [`Transport`] speaking `u32` length-prefixed frames.
pub struct TcpTransport {
    table: Arc<ConnectionTable>,
    local_addr: SocketAddr,
    max_packet_size: usize,
}

impl TcpTransport {
    /// Binds the listener and starts accepting connections in the
    /// background.
    pub async fn bind(
        addr: &str,
        max_packet_size: usize,
    ) -> Result<(Self, EventReceiver), TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "TCP transport listening");

        let table = Arc::new(ConnectionTable::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&table),
            events_tx,
            max_packet_size,
        ));

        Ok((
            Self {
                table,
                local_addr,
                max_packet_size,
            },
            events_rx,
        ))
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for TcpTransport {
    type Error = TransportError;

    fn send(
        &self,
        id: ConnectionId,
        _channel: Channel,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        self.table.send(id, data)
    }

    fn disconnect(&self, id: ConnectionId) -> Result<(), Self::Error> {
        self.table.close(id)
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

async fn accept_loop(
    listener: TcpListener,
    table: Arc<ConnectionTable>,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_packet_size: usize,
) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let _ = stream.set_nodelay(true);
                tokio::spawn(serve_connection(
                    stream,
                    remote,
                    Arc::clone(&table),
                    events.clone(),
                    max_packet_size,
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
        if events.is_closed() {
            tracing::info!("event receiver dropped, TCP transport stopping");
            break;
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    table: Arc<ConnectionTable>,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_packet_size: usize,
) {
    let (id, outbound) = table.register();
    tracing::debug!(%id, %remote, "accepted TCP connection");
    if events
        .send(TransportEvent::Connected { id, remote })
        .is_err()
    {
        table.remove(id);
        return;
    }

    let (read_half, write_half) = stream.into_split();

    tokio::select! {
        _ = write_frames(id, write_half, outbound) => {}
        _ = read_frames(id, read_half, &events, max_packet_size) => {}
    }

    table.remove(id);
    tracing::debug!(%id, "TCP connection closed");
    let _ = events.send(TransportEvent::Disconnected { id });
}

async fn write_frames(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(data) => {
                let Ok(len) = u32::try_from(data.len()) else {
                    tracing::warn!(%id, len = data.len(), "frame too large to prefix");
                    continue;
                };
                let result = async {
                    writer.write_u32(len).await?;
                    writer.write_all(&data).await
                }
                .await;
                if let Err(e) = result {
                    tracing::debug!(%id, error = %e, "send failed");
                    break;
                }
            }
            Outbound::Close => {
                let _ = writer.shutdown().await;
                break;
            }
        }
    }
}

async fn read_frames(
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    events: &mpsc::UnboundedSender<TransportEvent>,
    max_packet_size: usize,
) {
    loop {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                break;
            }
        };
        if len > max_packet_size {
            tracing::info!(%id, len, max_packet_size, "inbound frame too large, dropping connection");
            break;
        }
        let mut data = vec![0u8; len];
        if let Err(e) = reader.read_exact(&mut data).await {
            tracing::debug!(%id, error = %e, "recv error");
            break;
        }
        let event = TransportEvent::Data {
            id,
            data,
            channel: Channel::Reliable,
        };
        if events.send(event).is_err() {
            break;
        }
    }
}
