//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use crate::table::{ConnectionTable, Outbound};
use crate::{
    Channel, ConnectionId, EventReceiver, Transport, TransportError,
    TransportEvent,
};

/// Peers that have not finished the upgrade by then are dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Every binary (or text) message from a peer becomes one
/// [`TransportEvent::Data`] on the reliable channel. A message larger than
/// `max_packet_size` closes the connection.
pub struct WebSocketTransport {
    table: Arc<ConnectionTable>,
    local_addr: SocketAddr,
    max_packet_size: usize,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address and starts
    /// accepting connections in the background.
    pub async fn bind(
        addr: &str,
        max_packet_size: usize,
    ) -> Result<(Self, EventReceiver), TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let table = Arc::new(ConnectionTable::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(max_packet_size))
            .max_frame_size(Some(max_packet_size));
        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&table),
            events_tx,
            ws_config,
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

impl Transport for WebSocketTransport {
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
    ws_config: WebSocketConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                tokio::spawn(serve_connection(
                    stream,
                    remote,
                    Arc::clone(&table),
                    events.clone(),
                    ws_config,
                ));
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
        if events.is_closed() {
            tracing::info!("event receiver dropped, WebSocket transport stopping");
            break;
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    table: Arc<ConnectionTable>,
    events: mpsc::UnboundedSender<TransportEvent>,
    ws_config: WebSocketConfig,
) {
    let handshake = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config));
    let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::debug!(%remote, error = %e, "WebSocket handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%remote, "WebSocket handshake timed out");
            return;
        }
    };

    let (id, mut outbound) = table.register();
    tracing::debug!(%id, %remote, "accepted WebSocket connection");
    if events
        .send(TransportEvent::Connected { id, remote })
        .is_err()
    {
        table.remove(id);
        return;
    }

    let (mut sink, mut source) = ws.split();

    let writer = async {
        while let Some(item) = outbound.recv().await {
            match item {
                Outbound::Frame(data) => {
                    if let Err(e) = sink.send(Message::Binary(data.into())).await {
                        tracing::debug!(%id, error = %e, "send failed");
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.close().await;
                    break;
                }
            }
        }
    };

    let reader = async {
        while let Some(msg) = source.next().await {
            let data = match msg {
                Ok(Message::Binary(data)) => data.to_vec(),
                Ok(Message::Text(text)) => text.as_bytes().to_vec(),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue, // ping/pong/raw frame
                Err(e) => {
                    // Includes messages over the size cap.
                    tracing::debug!(%id, error = %e, "recv error");
                    break;
                }
            };
            let event = TransportEvent::Data {
                id,
                data,
                channel: Channel::Reliable,
            };
            if events.send(event).is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    table.remove(id);
    tracing::debug!(%id, "WebSocket connection closed");
    let _ = events.send(TransportEvent::Disconnected { id });
}
