//! `govmesh simulate`: run the relay protocol over an in-memory network
//!
//! The topology file declares nodes, their credential holdings and the links
//! between them:
//!
//! ```toml
//! links = [["A", "B"], ["B", "C"]]
//!
//! [[nodes]]
//! id = "A"
//!
//! [[nodes]]
//! id = "C"
//! [nodes.holdings]
//! identities = ["C"]
//! ```
//!
//! Peers that appear only in `links` hold no credentials.

use super::evaluate::load_doc;
use crate::config::NodeSection;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use govmesh_core::{LocalIdentity, PeerId};
use govmesh_governance::{Holdings, HoldingsOracle};
use govmesh_relay::{ConnectivityGraph, MemoryNetwork, NodeEvent, RelayConfig, SpawnedNode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Simulate a relay exchange
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Network topology (TOML)
    #[arg(long)]
    pub topology: PathBuf,

    /// Originating node; defaults to `[node] id` from the config file
    #[arg(long)]
    pub from: Option<String>,

    /// Stop once no event arrives for this many milliseconds
    #[arg(long, default_value = "300")]
    pub settle_ms: u64,

    #[command(subcommand)]
    pub exchange: Exchange,
}

/// Exchange to simulate
#[derive(Subcommand, Debug)]
pub enum Exchange {
    /// Discover a route to a peer
    Trace {
        /// Peer to look for
        #[arg(long)]
        target: String,
    },
    /// Gossip a message to members
    Gossip {
        /// Comma separated member ids
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,
        /// Message text
        #[arg(long)]
        content: String,
    },
    /// Run a compliance query for a framework
    Comply {
        /// Governance framework document (JSON)
        #[arg(long)]
        doc: PathBuf,
    },
}

/// Simulated network description.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Topology {
    /// Node declarations
    pub nodes: Vec<TopologyNode>,
    /// Undirected links
    pub links: Vec<(String, String)>,
}

/// One declared node.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyNode {
    /// Primary id
    pub id: String,
    /// Further ids
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Credentials the node holds
    #[serde(default)]
    pub holdings: Holdings,
}

impl Topology {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a topology file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse topology {}", path.display()))
    }

    /// Every node, declared or implied by a link, in id order
    pub fn all_nodes(&self) -> BTreeMap<String, TopologyNode> {
        let mut nodes: BTreeMap<String, TopologyNode> = self
            .nodes
            .iter()
            .map(|node| (node.id.clone(), node.clone()))
            .collect();
        for (a, b) in &self.links {
            for id in [a, b] {
                nodes.entry(id.clone()).or_insert_with(|| TopologyNode {
                    id: id.clone(),
                    aliases: Vec::new(),
                    holdings: Holdings::default(),
                });
            }
        }
        nodes
    }
}

/// Handle `govmesh simulate`
///
/// `local` is the `[node]` table of the config file: its id is the default
/// originator and its aliases are added to the matching node.
pub async fn run(args: SimulateArgs, local: &NodeSection, relay: RelayConfig) -> Result<()> {
    let topology = Topology::load(&args.topology)?;
    let from = args
        .from
        .or_else(|| local.id.clone())
        .ok_or_else(|| anyhow!("no originating node: pass --from or set [node] id"))?;

    let mut network = MemoryNetwork::new();
    for (a, b) in &topology.links {
        network.connect(a.as_str(), b.as_str());
    }

    let mut nodes = BTreeMap::new();
    for (id, mut node) in topology.all_nodes() {
        if local.id.as_deref() == Some(id.as_str()) {
            node.aliases.extend(local.aliases.iter().cloned());
        }
        let identity = LocalIdentity::new(id.as_str()).with_aliases(node.aliases);
        let oracle = Arc::new(HoldingsOracle::new(node.holdings));
        let spawned = network.spawn_node(identity, oracle, relay.clone()).await?;
        nodes.insert(id, spawned);
    }
    info!(nodes = nodes.len(), links = topology.links.len(), "network started");

    let settle = Duration::from_millis(args.settle_ms);
    let origin = nodes
        .get_mut(&from)
        .ok_or_else(|| anyhow!("originating node {from} is not in the topology"))?;

    let output = match args.exchange {
        Exchange::Trace { target } => {
            let started = origin.handle.start_trace(target.as_str()).await?;
            debug!(id = %started.message_id, sent = started.sent.len(), "trace sent");
            let events = drain(origin, settle).await;
            let graph = events.iter().find_map(|event| match event {
                NodeEvent::RouteDiscovered { graph, .. } => Some(graph.clone()),
                _ => None,
            });
            match graph {
                Some(graph) => serde_json::to_value(graph)?,
                None => bail!("no route to {target} found"),
            }
        }
        Exchange::Gossip { members, content } => {
            let members = members.into_iter().map(PeerId::from).collect();
            origin
                .handle
                .start_gossip(members, Value::String(content))
                .await?;
            let mut received = BTreeMap::new();
            for (id, node) in nodes.iter_mut() {
                if let Some(graph) = last_graph(&drain(node, settle).await) {
                    received.insert(id.clone(), graph);
                }
            }
            serde_json::to_value(received)?
        }
        Exchange::Comply { doc } => {
            let doc = load_doc(&doc)?;
            origin.handle.start_compliance_query(doc).await?;
            let events = drain(origin, settle).await;
            serde_json::to_value(last_graph(&events).unwrap_or_default())?
        }
    };

    network.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Collect events until none arrives within `settle`.
async fn drain(node: &mut SpawnedNode, settle: Duration) -> Vec<NodeEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = timeout(settle, node.events.recv()).await {
        events.push(event);
    }
    events
}

fn last_graph(events: &[NodeEvent]) -> Option<ConnectivityGraph> {
    events.last().map(|event| event.graph().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"
links = [["A", "B"], ["B", "C"]]

[[nodes]]
id = "A"

[[nodes]]
id = "B"
[nodes.holdings]
identities = ["B"]
"#;

    #[test]
    fn test_links_imply_nodes() {
        let topology = Topology::from_toml_str(CHAIN).unwrap();
        let nodes = topology.all_nodes();

        assert_eq!(nodes.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(nodes["B"].holdings.identities, vec!["B".to_string()]);
        assert!(nodes["C"].holdings.identities.is_empty());
    }

    #[test]
    fn test_demo_topology_parses() {
        let topology =
            Topology::from_toml_str(include_str!("../../demos/trade_chain.toml")).unwrap();
        assert_eq!(topology.all_nodes().len(), 4);
    }

    #[tokio::test]
    async fn test_trace_and_comply_run() {
        let dir = tempfile::tempdir().unwrap();
        let topology = dir.path().join("net.toml");
        let doc = dir.path().join("doc.json");
        std::fs::write(&topology, CHAIN).unwrap();
        std::fs::write(
            &doc,
            r#"{"schemas": [], "participants": [], "roles": ["trader"],
                "permissions": [{"grant": ["trader"], "when": {"any": [{"id": "B"}]}}]}"#,
        )
        .unwrap();

        run(
            SimulateArgs {
                topology: topology.clone(),
                from: Some("A".into()),
                settle_ms: 100,
                exchange: Exchange::Trace { target: "C".into() },
            },
            &NodeSection::default(),
            RelayConfig::default(),
        )
        .await
        .unwrap();

        run(
            SimulateArgs {
                topology: topology.clone(),
                from: None,
                settle_ms: 100,
                exchange: Exchange::Comply { doc },
            },
            &NodeSection {
                id: Some("A".into()),
                aliases: vec!["A2".into()],
            },
            RelayConfig::default(),
        )
        .await
        .unwrap();

        let missing = run(
            SimulateArgs {
                topology,
                from: Some("Z".into()),
                settle_ms: 100,
                exchange: Exchange::Trace { target: "C".into() },
            },
            &NodeSection::default(),
            RelayConfig::default(),
        )
        .await;
        assert!(missing.is_err());
    }
}
