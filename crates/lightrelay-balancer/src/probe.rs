//! How the balancer reaches relay nodes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use lightrelay_protocol::{RelayServerInfo, RoomListing};

use crate::ProbeError;

/// Where a node's HTTP endpoint answers.
///
/// `host` is the address the node registered from, which may differ from
/// the public address it advertises to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTarget {
    pub host: String,
    pub endpoint_port: u16,
}

impl fmt::Display for NodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.endpoint_port)
        } else {
            write!(f, "{}:{}", self.host, self.endpoint_port)
        }
    }
}

/// Reads a node's load and room list.
///
/// # Example
///
/// ```rust
/// use lightrelay_balancer::{NodeProbe, NodeTarget, ProbeError};
/// use lightrelay_protocol::{RelayServerInfo, RoomListing};
///
/// /// Every node is idle and empty.
/// struct IdleNodes;
///
/// impl NodeProbe for IdleNodes {
///     async fn stats(&self, _node: &NodeTarget) -> Result<RelayServerInfo, ProbeError> {
///         Ok(RelayServerInfo::default())
///     }
///
///     async fn rooms(&self, _node: &NodeTarget) -> Result<Vec<RoomListing>, ProbeError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait NodeProbe: Send + Sync + 'static {
    /// The node's `/api/stats`.
    fn stats(
        &self,
        node: &NodeTarget,
    ) -> impl Future<Output = Result<RelayServerInfo, ProbeError>> + Send;

    /// The node's public rooms, from `/api/servers`.
    fn rooms(
        &self,
        node: &NodeTarget,
    ) -> impl Future<Output = Result<Vec<RoomListing>, ProbeError>> + Send;
}

/// [`NodeProbe`] over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
}

impl HttpProbe {
    /// Every request fails after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    async fn get(
        &self,
        node: &NodeTarget,
        path: &str,
    ) -> Result<reqwest::Response, ProbeError> {
        let response = self
            .http
            .get(format!("http://{node}{path}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }
        Ok(response)
    }
}

impl NodeProbe for HttpProbe {
    async fn stats(&self, node: &NodeTarget) -> Result<RelayServerInfo, ProbeError> {
        Ok(self.get(node, "/api/stats").await?.json().await?)
    }

    async fn rooms(&self, node: &NodeTarget) -> Result<Vec<RoomListing>, ProbeError> {
        // A node with nothing to list may answer `null`.
        let rooms: Option<Vec<RoomListing>> =
            self.get(node, "/api/servers").await?.json().await?;
        Ok(rooms.unwrap_or_default())
    }
}
