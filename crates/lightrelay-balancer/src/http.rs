//! The balancer's HTTP surface.
//!
//! | Route | Caller | Answer |
//! |---|---|---|
//! | `GET /api/auth` | node | 200 registered (or already), 403 bad key or missing headers, 400 unparsable headers |
//! | `GET /api/roomsupdated` | node | 200 after re-aggregating rooms, 403 bad key |
//! | `GET /api/join/` | client | least-loaded `RelayAddress`, 204 if no node |
//! | `GET /api/masterlist/` | client | cached room list for `x-Region`, all rooms without it |
//! | `GET /api/get/id` | node | a fresh room id as plain text |
//! | `GET /api/stats/` | anyone | `{nodeCount, uptime, ccu, totalRooms}` |
//!
//! Every route answers with and without a trailing slash.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use lightrelay_protocol::{BalancerStats, RelayAddress, Region};
use tokio::net::TcpListener;

use crate::{BalancerError, LoadBalancer, NodeProbe, NodeTarget};

type SharedBalancer<P> = Arc<LoadBalancer<P>>;

/// Builds the balancer's routes.
///
/// `/api/auth` reads the caller's address, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`, as
/// [`serve`] does.
pub fn router<P: NodeProbe>(balancer: SharedBalancer<P>) -> Router {
    Router::new()
        .route("/api/auth", get(auth_handler::<P>))
        .route("/api/auth/", get(auth_handler::<P>))
        .route("/api/roomsupdated", get(rooms_updated_handler::<P>))
        .route("/api/roomsupdated/", get(rooms_updated_handler::<P>))
        .route("/api/join", get(join_handler::<P>))
        .route("/api/join/", get(join_handler::<P>))
        .route("/api/masterlist", get(masterlist_handler::<P>))
        .route("/api/masterlist/", get(masterlist_handler::<P>))
        .route("/api/get/id", get(room_id_handler::<P>))
        .route("/api/get/id/", get(room_id_handler::<P>))
        .route("/api/stats", get(stats_handler::<P>))
        .route("/api/stats/", get(stats_handler::<P>))
        .with_state(balancer)
}

/// Serves the balancer on an already bound listener until the task is
/// dropped.
pub async fn serve<P: NodeProbe>(
    listener: TcpListener,
    balancer: SharedBalancer<P>,
) -> Result<(), BalancerError> {
    tracing::info!(local_addr = %listener.local_addr()?, "load balancer listening");
    axum::serve(
        listener,
        router(balancer).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn region_hint(headers: &HeaderMap) -> Option<Region> {
    header_str(headers, "x-Region").and_then(|r| r.parse().ok())
}

async fn auth_handler<P: NodeProbe>(
    State(balancer): State<SharedBalancer<P>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> StatusCode {
    let (Some(key), Some(endpoint_port), Some(game_port), Some(region)) = (
        header_str(&headers, "Authorization"),
        header_str(&headers, "x-EndpointPort"),
        header_str(&headers, "x-GamePort"),
        header_str(&headers, "x-Region"),
    ) else {
        tracing::info!(%remote, "registration missing headers");
        return StatusCode::FORBIDDEN;
    };
    if key != balancer.config().auth_key {
        tracing::info!(%remote, "registration with wrong key");
        return StatusCode::FORBIDDEN;
    }
    let (Ok(endpoint_port), Ok(game_port), Ok(region)) = (
        endpoint_port.parse::<u16>(),
        game_port.parse::<u16>(),
        region.parse::<Region>(),
    ) else {
        return StatusCode::BAD_REQUEST;
    };

    let host = remote.ip().to_string();
    let relay = RelayAddress {
        address: header_str(&headers, "x-PIP").unwrap_or(&host).to_string(),
        port: game_port,
        endpoint_port,
        region,
    };
    let target = NodeTarget {
        host,
        endpoint_port,
    };

    // A node that fails the probe is simply not added; it retries on its
    // own schedule.
    if let Err(e) = balancer.register(relay, target).await {
        tracing::debug!(%remote, error = %e, "registration not completed");
    }
    StatusCode::OK
}

async fn rooms_updated_handler<P: NodeProbe>(
    State(balancer): State<SharedBalancer<P>>,
    headers: HeaderMap,
) -> StatusCode {
    match header_str(&headers, "Authorization") {
        Some(key) if !key.is_empty() && key == balancer.config().auth_key => {}
        _ => return StatusCode::FORBIDDEN,
    }
    match balancer.aggregate_rooms().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "room aggregation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn join_handler<P: NodeProbe>(
    State(balancer): State<SharedBalancer<P>>,
    headers: HeaderMap,
) -> Response {
    match balancer.select_node(region_hint(&headers)).await {
        Some(relay) => Json(relay).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn masterlist_handler<P: NodeProbe>(
    State(balancer): State<SharedBalancer<P>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let region = region_hint(&headers).unwrap_or(Region::Any);
    let json = balancer.room_list(region).await;
    ([(header::CONTENT_TYPE, "application/json")], json)
}

async fn room_id_handler<P: NodeProbe>(
    State(balancer): State<SharedBalancer<P>>,
) -> Result<String, StatusCode> {
    balancer.issue_room_id().await.map_err(|e| {
        tracing::warn!(error = %e, "room id not issued");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn stats_handler<P: NodeProbe>(
    State(balancer): State<SharedBalancer<P>>,
) -> Json<BalancerStats> {
    Json(balancer.stats().await)
}
