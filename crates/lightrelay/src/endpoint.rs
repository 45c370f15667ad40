//! The node's HTTP endpoint.
//!
//! | Route | Answer |
//! |---|---|
//! | `GET /api/stats` | `{connectedClients, roomCount, publicRoomCount, uptime}` |
//! | `GET /api/servers` | cached JSON array of public rooms, or 403 |
//! | `GET /api/compressed/servers` | the same list, LZ4 + base64, or 403 |
//!
//! The balancer's health checks hit `/api/stats`, so every request there
//! also counts as a balancer ping.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use lightrelay_protocol::RelayServerInfo;
use lightrelay_transport::Transport;
use tokio::net::TcpListener;

use crate::{EndpointConfig, RelayEngine, RelayError};

struct EndpointState<T: Transport> {
    engine: Arc<RelayEngine<T>>,
    serve_server_list: bool,
}

type SharedState<T> = Arc<EndpointState<T>>;

/// Builds the endpoint's routes.
pub fn router<T: Transport>(
    engine: Arc<RelayEngine<T>>,
    config: &EndpointConfig,
) -> Router {
    let state = Arc::new(EndpointState {
        engine,
        serve_server_list: config.serve_server_list,
    });
    Router::new()
        .route("/api/stats", get(stats_handler::<T>))
        .route("/api/servers", get(servers_handler::<T>))
        .route("/api/compressed/servers", get(compressed_servers_handler::<T>))
        .with_state(state)
}

/// Serves the endpoint on an already bound listener until the task is
/// dropped.
pub async fn serve<T: Transport>(
    listener: TcpListener,
    engine: Arc<RelayEngine<T>>,
    config: &EndpointConfig,
) -> Result<(), RelayError> {
    tracing::info!(local_addr = %listener.local_addr()?, "relay endpoint listening");
    axum::serve(listener, router(engine, config)).await?;
    Ok(())
}

async fn stats_handler<T: Transport>(
    State(state): State<SharedState<T>>,
) -> Json<RelayServerInfo> {
    state.engine.mark_balancer_ping();
    Json(state.engine.stats().await)
}

async fn servers_handler<T: Transport>(
    State(state): State<SharedState<T>>,
) -> Result<impl IntoResponse, StatusCode> {
    if !state.serve_server_list {
        return Err(StatusCode::FORBIDDEN);
    }
    let json = state.engine.room_list_json().await;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

async fn compressed_servers_handler<T: Transport>(
    State(state): State<SharedState<T>>,
) -> Result<String, StatusCode> {
    if !state.serve_server_list {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(state.engine.room_list_compressed().await)
}
