//! The balancer's state: registered nodes and aggregated rooms.
//!
//! # Concurrency note
//!
//! Both maps sit behind reader-writer locks. Joins, room-list reads and
//! stats only read. Registration, health checks and aggregation write, and
//! they never hold a lock across a probe: they snapshot what they need,
//! release, probe, then lock again to apply the results.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use lightrelay_protocol::{
    BalancerStats, RelayAddress, RelayServerInfo, Region, RoomListing,
};
use lightrelay_room::{generate_unique_id, RoomListCache};
use tokio::sync::RwLock;

use crate::{BalancerConfig, BalancerError, NodeProbe, NodeTarget};

/// A registered node: where to probe it and its last reported load.
#[derive(Debug, Clone)]
struct NodeEntry {
    target: NodeTarget,
    info: RelayServerInfo,
}

/// Aggregated rooms, one cached list per region.
#[derive(Debug)]
struct RoomIndex {
    buckets: BTreeMap<Region, RoomListCache>,
    /// Every room id seen in the last sweep.
    ids: HashSet<String>,
    /// Issued ids no sweep has seen yet, with their expiry.
    reserved: HashMap<String, Instant>,
}

impl Default for RoomIndex {
    fn default() -> Self {
        Self {
            buckets: Region::ALL
                .iter()
                .map(|r| (*r, RoomListCache::new()))
                .collect(),
            ids: HashSet::new(),
            reserved: HashMap::new(),
        }
    }
}

/// Result of a registration attempt that reached the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// The node was already registered; nothing changed.
    AlreadyRegistered,
}

/// The load balancer.
///
/// Generic over the [`NodeProbe`] so tests can supply scripted nodes.
pub struct LoadBalancer<P: NodeProbe> {
    probe: P,
    config: BalancerConfig,
    /// Ordered so sweeps visit nodes in a stable order.
    nodes: RwLock<BTreeMap<RelayAddress, NodeEntry>>,
    rooms: RwLock<RoomIndex>,
    started: Instant,
}

impl<P: NodeProbe> LoadBalancer<P> {
    pub fn new(probe: P, config: BalancerConfig) -> Self {
        Self {
            probe,
            config,
            nodes: RwLock::new(BTreeMap::new()),
            rooms: RwLock::new(RoomIndex::default()),
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Adds a node after one successful stats probe.
    ///
    /// # Errors
    /// [`BalancerError::Probe`] if the node did not answer. It is not
    /// added.
    pub async fn register(
        &self,
        relay: RelayAddress,
        target: NodeTarget,
    ) -> Result<Registration, BalancerError> {
        if self.nodes.read().await.contains_key(&relay) {
            tracing::info!(node = %relay, "node tried to register while already registered");
            return Ok(Registration::AlreadyRegistered);
        }

        let info = match self.probe.stats(&target).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(node = %relay, %target, error = %e, "node failed registration probe");
                return Err(e.into());
            }
        };

        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&relay) {
            return Ok(Registration::AlreadyRegistered);
        }
        tracing::info!(node = %relay, %target, "node registered");
        nodes.insert(relay, NodeEntry { target, info });
        Ok(Registration::Added)
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_registered(&self, relay: &RelayAddress) -> bool {
        self.nodes.read().await.contains_key(relay)
    }

    async fn evict(&self, relay: &RelayAddress) {
        if self.nodes.write().await.remove(relay).is_some() {
            tracing::warn!(node = %relay, "node evicted");
        }
    }

    /// Probes every node once. Answers replace the node's load; failures
    /// evict it.
    ///
    /// Returns the number of nodes evicted. When any were, the room lists
    /// are rebuilt without them.
    pub async fn check_nodes(&self) -> usize {
        let snapshot: Vec<(RelayAddress, NodeTarget)> = self
            .nodes
            .read()
            .await
            .iter()
            .map(|(relay, entry)| (relay.clone(), entry.target.clone()))
            .collect();
        tracing::debug!(nodes = snapshot.len(), "health check sweep");

        let mut evicted = 0;
        for (relay, target) in snapshot {
            match self.probe.stats(&target).await {
                Ok(info) => {
                    if let Some(entry) = self.nodes.write().await.get_mut(&relay) {
                        entry.info = info;
                    }
                }
                Err(e) => {
                    tracing::warn!(node = %relay, error = %e, "health check failed");
                    self.evict(&relay).await;
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            if let Err(e) = self.aggregate_rooms().await {
                tracing::warn!(error = %e, "room lists not rebuilt after eviction");
            }
        }
        evicted
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Picks the least-loaded node, preferring `region`.
    ///
    /// Without a hint, or when no node serves the hinted region, the
    /// globally least-loaded node is returned. `None` only when no node is
    /// registered. With `verify_on_join`, a node that fails a fresh probe
    /// is evicted and the choice is made again.
    pub async fn select_node(&self, region: Option<Region>) -> Option<RelayAddress> {
        loop {
            let (relay, target) = {
                let nodes = self.nodes.read().await;
                let chosen = region
                    .and_then(|hint| {
                        least_loaded(nodes.iter().filter(|(relay, _)| relay.region == hint))
                    })
                    .or_else(|| least_loaded(nodes.iter()))?;
                (chosen.0.clone(), chosen.1.target.clone())
            };

            if !self.config.verify_on_join {
                return Some(relay);
            }
            match self.probe.stats(&target).await {
                Ok(info) => {
                    if let Some(entry) = self.nodes.write().await.get_mut(&relay) {
                        entry.info = info;
                    }
                    return Some(relay);
                }
                Err(e) => {
                    tracing::warn!(node = %relay, error = %e, "selected node failed verification");
                    self.evict(&relay).await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    /// Pulls every node's public rooms and rebuilds the per-region lists.
    ///
    /// Nodes are visited in address order, so sweeps over unchanged nodes
    /// produce identical lists. A room id seen twice keeps its first
    /// listing. A node whose list cannot be fetched is evicted.
    pub async fn aggregate_rooms(&self) -> Result<(), BalancerError> {
        let snapshot: Vec<(RelayAddress, NodeTarget)> = self
            .nodes
            .read()
            .await
            .iter()
            .map(|(relay, entry)| (relay.clone(), entry.target.clone()))
            .collect();

        let mut lists: BTreeMap<Region, Vec<RoomListing>> =
            Region::ALL.iter().map(|r| (*r, Vec::new())).collect();
        let mut ids = HashSet::new();

        for (relay, target) in snapshot {
            let rooms = match self.probe.rooms(&target).await {
                Ok(rooms) => rooms,
                Err(e) => {
                    tracing::warn!(node = %relay, error = %e, "room list fetch failed");
                    self.evict(&relay).await;
                    continue;
                }
            };
            for room in rooms {
                if !ids.insert(room.server_id.clone()) {
                    tracing::warn!(room_id = %room.server_id, node = %relay, "duplicate room id across nodes");
                    continue;
                }
                if relay.region != Region::Any {
                    lists.entry(relay.region).or_default().push(room.clone());
                }
                lists.entry(Region::Any).or_default().push(room);
            }
        }

        let mut index = self.rooms.write().await;
        for (region, listings) in lists {
            index.buckets.entry(region).or_default().rebuild(listings)?;
        }
        let now = Instant::now();
        index
            .reserved
            .retain(|id, expires| *expires > now && !ids.contains(id));
        index.ids = ids;
        tracing::debug!(
            rooms = index.ids.len(),
            reserved = index.reserved.len(),
            "room lists rebuilt"
        );
        Ok(())
    }

    /// Cached JSON for `region`'s rooms.
    pub async fn room_list(&self, region: Region) -> String {
        self.rooms
            .read()
            .await
            .buckets
            .get(&region)
            .map(|cache| cache.json().to_string())
            .unwrap_or_else(|| "[]".to_string())
    }

    /// A room id no known room uses and no earlier call handed out.
    ///
    /// The id stays reserved across sweeps until a node lists it or
    /// `id_reservation` elapses.
    pub async fn issue_room_id(&self) -> Result<String, BalancerError> {
        let now = Instant::now();
        let mut index = self.rooms.write().await;
        index.reserved.retain(|_, expires| *expires > now);
        let RoomIndex { ids, reserved, .. } = &mut *index;
        let id = generate_unique_id(
            self.config.id_length,
            self.config.id_alphabet,
            |candidate| ids.contains(candidate) || reserved.contains_key(candidate),
        )?;
        reserved.insert(id.clone(), now + self.config.id_reservation);
        Ok(id)
    }

    pub async fn stats(&self) -> BalancerStats {
        let nodes = self.nodes.read().await;
        BalancerStats {
            node_count: nodes.len() as u64,
            uptime: self.started.elapsed().as_secs(),
            ccu: nodes.values().map(|n| n.info.connected_clients).sum(),
            total_rooms: nodes.values().map(|n| n.info.room_count).sum(),
        }
    }
}

/// Ties go to the node that sorts first.
fn least_loaded<'a>(
    nodes: impl Iterator<Item = (&'a RelayAddress, &'a NodeEntry)>,
) -> Option<(&'a RelayAddress, &'a NodeEntry)> {
    nodes.min_by_key(|(_, entry)| entry.info.connected_clients)
}
