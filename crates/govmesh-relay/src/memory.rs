//! In-memory network
//!
//! Wires relay nodes together over channels for simulations and tests.
//! Each node gets a [`MemoryDirectory`] listing the neighbours configured
//! with [`MemoryNetwork::connect`]; a send pushes the frame straight into
//! the neighbour's inbound queue.

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::node::{Inbound, NodeHandle, RelayNode, SpawnedNode};
use crate::protocol::RelayEngine;
use async_trait::async_trait;
use govmesh_core::{CredentialOracle, LocalIdentity, NetworkError, PeerDirectory, PeerId, PeerLink};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type Registry = Arc<RwLock<HashMap<PeerId, NodeHandle>>>;

/// Directory view of one node in a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    local: PeerId,
    neighbours: BTreeSet<PeerId>,
    registry: Registry,
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn connected_peers(&self) -> Vec<PeerId> {
        self.neighbours.iter().cloned().collect()
    }

    async fn resolve(&self, peer: &PeerId) -> Option<PeerLink> {
        self.neighbours
            .contains(peer)
            .then(|| PeerLink::new(self.local.clone(), peer.clone()))
    }

    async fn send_to(&self, link: &PeerLink, frame: Vec<u8>) -> Result<(), NetworkError> {
        if !self.neighbours.contains(&link.remote) {
            return Err(NetworkError::unreachable(link.remote.clone()));
        }
        let registry = self.registry.read().await;
        let handle = registry
            .get(&link.remote)
            .ok_or_else(|| NetworkError::unreachable(link.remote.clone()))?;
        handle
            .deliver(Inbound::from_peer(link.local.clone(), frame))
            .map_err(|e| NetworkError::send_failed(link, e.to_string()))
    }
}

/// A set of in-process nodes and the links between them.
#[derive(Debug, Default)]
pub struct MemoryNetwork {
    links: BTreeMap<PeerId, BTreeSet<PeerId>>,
    registry: Registry,
}

impl MemoryNetwork {
    /// Network with no nodes or links
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `a` and `b` in both directions.
    ///
    /// Only affects nodes spawned afterwards.
    pub fn connect(&mut self, a: impl Into<PeerId>, b: impl Into<PeerId>) {
        let (a, b) = (a.into(), b.into());
        self.links.entry(a.clone()).or_default().insert(b.clone());
        self.links.entry(b).or_default().insert(a);
    }

    /// Neighbours configured for `peer`
    pub fn neighbours(&self, peer: &PeerId) -> BTreeSet<PeerId> {
        self.links.get(peer).cloned().unwrap_or_default()
    }

    /// Every peer that appears in a link
    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.links.keys()
    }

    /// Directory for a node with primary id `peer`
    pub fn directory_for(&self, peer: &PeerId) -> MemoryDirectory {
        MemoryDirectory {
            local: peer.clone(),
            neighbours: self.neighbours(peer),
            registry: self.registry.clone(),
        }
    }

    /// Start a node and register it so neighbours can reach it.
    pub async fn spawn_node<O>(
        &self,
        identity: LocalIdentity,
        oracle: Arc<O>,
        config: RelayConfig,
    ) -> Result<SpawnedNode, RelayError>
    where
        O: CredentialOracle + ?Sized + 'static,
    {
        let directory = Arc::new(self.directory_for(identity.primary()));
        let engine = RelayEngine::new(identity, directory, oracle, config)?;
        let node = RelayNode::spawn(engine);
        debug!(node = %node.handle.id(), "memory node registered");
        self.registry
            .write()
            .await
            .insert(node.handle.id().clone(), node.handle.clone());
        Ok(node)
    }

    /// Handle of a registered node
    pub async fn handle(&self, peer: &PeerId) -> Option<NodeHandle> {
        self.registry.read().await.get(peer).cloned()
    }

    /// Stop every registered node.
    pub async fn shutdown(&self) {
        for handle in self.registry.write().await.drain().map(|(_, handle)| handle) {
            if let Err(e) = handle.shutdown() {
                debug!(node = %handle.id(), error = %e, "node already stopped");
            }
        }
    }
}
