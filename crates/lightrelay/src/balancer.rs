//! HTTP client for the node's side of the load-balancer protocol.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lightrelay_protocol::RelayAddress;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::{BalancerClientConfig, RelayError};

/// Balancer-issued room ids kept ready for room creation.
const ROOM_ID_POOL: usize = 4;

/// Pooled ids older than this are discarded. Kept below the balancer's
/// default reservation window.
const ROOM_ID_MAX_AGE: Duration = Duration::from_secs(30);

/// Room ids fetched ahead of time, oldest first.
#[derive(Debug, Default)]
struct RoomIdPool {
    ids: parking_lot::Mutex<VecDeque<(String, Instant)>>,
    /// Wakes the prefetch loop after an id is taken.
    wanted: Notify,
}

impl RoomIdPool {
    fn prune(&self) {
        self.ids
            .lock()
            .retain(|(_, fetched)| fetched.elapsed() < ROOM_ID_MAX_AGE);
    }
}

/// Talks to one load balancer on behalf of this node.
///
/// Every call is a single request bounded by the configured timeout. None
/// are retried; the heartbeat loop re-registers on its own cadence.
///
/// Room ids are never fetched on the engine's event path. When the node
/// uses balancer-issued ids, [`prefetch_room_ids`](Self::prefetch_room_ids)
/// keeps a small pool filled and room creation takes from it.
#[derive(Debug, Clone)]
pub struct BalancerClient {
    http: reqwest::Client,
    base_url: String,
    auth_key: String,
    relay: RelayAddress,
    issue_room_ids: bool,
    reregister_after: Duration,
    room_ids: Arc<RoomIdPool>,
}

impl BalancerClient {
    /// `relay` is what this node advertises: its public IP, game port,
    /// endpoint port and region.
    pub fn new(
        config: BalancerClientConfig,
        relay: RelayAddress,
    ) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let host = if config.address == "localhost" {
            "127.0.0.1"
        } else {
            config.address.as_str()
        };
        Ok(Self {
            base_url: format!("http://{host}:{}", config.port),
            http,
            auth_key: config.auth_key,
            relay,
            issue_room_ids: config.issue_room_ids,
            reregister_after: config.reregister_after,
            room_ids: Arc::new(RoomIdPool::default()),
        })
    }

    pub fn issues_room_ids(&self) -> bool {
        self.issue_room_ids
    }

    pub fn reregister_after(&self) -> Duration {
        self.reregister_after
    }

    /// Announces this node. The balancer probes `/api/stats` before it
    /// answers, so the endpoint must already be serving.
    pub async fn register(&self) -> Result<(), RelayError> {
        let response = self
            .http
            .get(format!("{}/api/auth", self.base_url))
            .header("Authorization", &self.auth_key)
            .header("x-EndpointPort", self.relay.endpoint_port.to_string())
            .header("x-GamePort", self.relay.port.to_string())
            .header("x-PIP", &self.relay.address)
            .header("x-Region", u8::from(self.relay.region).to_string())
            .send()
            .await?;
        expect_ok(response.status())?;
        tracing::info!(balancer = %self.base_url, "registered with load balancer");
        Ok(())
    }

    /// Tells the balancer this node's room list changed.
    pub async fn notify_rooms_updated(&self) -> Result<(), RelayError> {
        let response = self
            .http
            .get(format!("{}/api/roomsupdated", self.base_url))
            .header("Authorization", &self.auth_key)
            .send()
            .await?;
        expect_ok(response.status())
    }

    /// Fetches a room id that is unique across every node.
    pub async fn request_room_id(&self) -> Result<String, RelayError> {
        let response = self
            .http
            .get(format!("{}/api/get/id", self.base_url))
            .send()
            .await?;
        expect_ok(response.status())?;
        let id = response.text().await?.trim().to_string();
        if id.is_empty() {
            return Err(RelayError::BalancerRejected(
                StatusCode::NO_CONTENT.as_u16(),
            ));
        }
        Ok(id)
    }

    /// A prefetched room id, if one is ready. Never waits on the network.
    pub fn take_room_id(&self) -> Option<String> {
        self.room_ids.prune();
        let id = self.room_ids.ids.lock().pop_front().map(|(id, _)| id);
        self.room_ids.wanted.notify_one();
        id
    }

    /// Number of prefetched ids ready to be taken.
    pub fn pooled_room_ids(&self) -> usize {
        self.room_ids.ids.lock().len()
    }

    /// Keeps the room id pool filled. Runs until the task is dropped.
    ///
    /// Refills after every take and at least once per half of the
    /// maximum id age. A failed fetch ends the round; the next round
    /// retries.
    pub async fn prefetch_room_ids(&self) {
        loop {
            self.room_ids.prune();
            while self.pooled_room_ids() < ROOM_ID_POOL {
                match self.request_room_id().await {
                    Ok(id) => self.room_ids.ids.lock().push_back((id, Instant::now())),
                    Err(e) => {
                        tracing::debug!(error = %e, "room id prefetch failed");
                        break;
                    }
                }
            }
            let _ = tokio::time::timeout(ROOM_ID_MAX_AGE / 2, self.room_ids.wanted.notified())
                .await;
        }
    }
}

fn expect_ok(status: StatusCode) -> Result<(), RelayError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RelayError::BalancerRejected(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightrelay_protocol::Region;

    fn relay() -> RelayAddress {
        RelayAddress {
            address: "203.0.113.7".into(),
            port: 7777,
            endpoint_port: 8080,
            region: Region::Europe,
        }
    }

    #[test]
    fn test_new_maps_localhost_to_loopback() {
        let client = BalancerClient::new(
            BalancerClientConfig {
                address: "localhost".into(),
                port: 7070,
                ..BalancerClientConfig::default()
            },
            relay(),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:7070");
    }

    #[test]
    fn test_expect_ok_rejects_forbidden() {
        assert!(expect_ok(StatusCode::OK).is_ok());
        assert!(matches!(
            expect_ok(StatusCode::FORBIDDEN),
            Err(RelayError::BalancerRejected(403))
        ));
    }

    #[test]
    fn test_take_room_id_empty_pool_returns_none() {
        let client =
            BalancerClient::new(BalancerClientConfig::default(), relay()).unwrap();
        assert_eq!(client.take_room_id(), None);
    }

    #[test]
    fn test_take_room_id_skips_stale_ids() {
        let client =
            BalancerClient::new(BalancerClientConfig::default(), relay()).unwrap();
        {
            let mut ids = client.room_ids.ids.lock();
            if let Some(old) = Instant::now().checked_sub(ROOM_ID_MAX_AGE * 2) {
                ids.push_back(("OLD01".into(), old));
            }
            ids.push_back(("NEW01".into(), Instant::now()));
        }

        assert_eq!(client.take_room_id().as_deref(), Some("NEW01"));
        assert_eq!(client.pooled_room_ids(), 0);
    }

    #[tokio::test]
    async fn test_register_unreachable_balancer_returns_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            socket.local_addr().unwrap().port()
        };
        let client = BalancerClient::new(
            BalancerClientConfig {
                port,
                timeout: Duration::from_millis(500),
                ..BalancerClientConfig::default()
            },
            relay(),
        )
        .unwrap();

        assert!(matches!(
            client.register().await,
            Err(RelayError::Balancer(_))
        ));
    }
}
