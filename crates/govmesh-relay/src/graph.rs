//! Connectivity graph
//!
//! Relay messages accumulate a graph of the peers they pass through. Each
//! node carries the labels it was observed with (roles granted by a
//! governance framework, or the link label for plain relay hops). Merges
//! only ever add: nodes gain labels, absent edges are inserted, nothing is
//! removed.
//!
//! Edge ids are derived from the unordered endpoint pair, so the same link
//! observed from either side, or by different messages, collapses into one
//! edge.
//!
//! On the wire a graph has the shape the trust-network UI consumes:
//!
//! ```json
//! {"nodes": [{"id": "B", "name": "B", "auras": ["trader"]}],
//!  "links": [{"id": "3f2a...", "from": "A", "to": "B", "label": "P2P"}]}
//! ```

use govmesh_core::{ContentHash, LocalIdentity, PeerId, PeerLink};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Id of the synthetic node standing in for the local node.
pub const SELF_NODE_ID: &str = "me";

/// Hex characters kept from the pair hash.
const EDGE_ID_LEN: usize = 16;

/// Deterministic edge id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Id of the edge joining `a` and `b`, independent of their order.
    pub fn between(a: &PeerId, b: &PeerId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut material = Vec::with_capacity(lo.as_str().len() + hi.as_str().len() + 1);
        material.extend_from_slice(lo.as_str().as_bytes());
        material.push(0);
        material.extend_from_slice(hi.as_str().as_bytes());
        let hex = ContentHash::of_bytes(&material).to_hex();
        Self(hex[..EDGE_ID_LEN].to_string())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A peer in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Peer id
    pub id: PeerId,
    /// Name shown to operators
    pub display_name: String,
    /// Roles and relay labels observed for this peer
    pub role_labels: BTreeSet<String>,
}

/// A link between two peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Deterministic id
    pub id: EdgeId,
    /// Endpoint that first reported the link
    pub from: PeerId,
    /// Other endpoint
    pub to: PeerId,
    /// Link label
    pub label: String,
}

/// One peer seen over one channel.
///
/// Merging an observation labels both `peer` and the channel's local end
/// with `label` and joins them with an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Observed peer
    pub peer: PeerId,
    /// Channel the peer was seen on
    pub link: PeerLink,
    /// Label for the peer, the local node and the edge
    pub label: String,
}

impl Observation {
    /// Observation of the remote end of `link`.
    pub fn of_link(link: PeerLink, label: impl Into<String>) -> Self {
        Self {
            peer: link.remote.clone(),
            link,
            label: label.into(),
        }
    }
}

/// Peers and links accumulated by relayed messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GraphWire", into = "GraphWire")]
pub struct ConnectivityGraph {
    nodes: BTreeMap<PeerId, NodeInfo>,
    edges: BTreeMap<EdgeId, Edge>,
}

impl ConnectivityGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph holding only `peer`, labelled with `labels`.
    pub fn single_node<I, S>(peer: &PeerId, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::new();
        graph.upsert_node(peer, labels);
        graph
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    /// Edges in id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Look up a node
    pub fn node(&self, peer: &PeerId) -> Option<&NodeInfo> {
        self.nodes.get(peer)
    }

    /// Whether `peer` is in the graph
    pub fn contains_node(&self, peer: &PeerId) -> bool {
        self.nodes.contains_key(peer)
    }

    /// The edge joining `a` and `b`, in either direction
    pub fn edge_between(&self, a: &PeerId, b: &PeerId) -> Option<&Edge> {
        self.edges.get(&EdgeId::between(a, b))
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has neither nodes nor edges
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Insert `peer` or union `labels` into its existing labels.
    pub fn upsert_node<I, S>(&mut self, peer: &PeerId, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = self.nodes.entry(peer.clone()).or_insert_with(|| NodeInfo {
            id: peer.clone(),
            display_name: peer.to_string(),
            role_labels: BTreeSet::new(),
        });
        node.role_labels.extend(labels.into_iter().map(Into::into));
    }

    /// Insert the edge `from`-`to` unless one already joins the pair.
    ///
    /// Returns whether an edge was inserted.
    pub fn insert_edge(&mut self, from: &PeerId, to: &PeerId, label: &str) -> bool {
        let id = EdgeId::between(from, to);
        if self.edges.contains_key(&id) {
            return false;
        }
        self.edges.insert(
            id.clone(),
            Edge {
                id,
                from: from.clone(),
                to: to.clone(),
                label: label.to_string(),
            },
        );
        true
    }

    /// Merge one observation in place.
    pub fn observe(&mut self, observation: &Observation) {
        let local = &observation.link.local;
        self.upsert_node(&observation.peer, [observation.label.as_str()]);
        self.upsert_node(local, [observation.label.as_str()]);
        self.insert_edge(local, &observation.peer, &observation.label);
    }

    /// `self` with `observation` merged.
    pub fn merged(&self, observation: &Observation) -> Self {
        let mut graph = self.clone();
        graph.observe(observation);
        graph
    }

    /// Union another graph into this one.
    ///
    /// Existing display names and edges win; labels are unioned.
    pub fn absorb(&mut self, other: &ConnectivityGraph) {
        for node in other.nodes() {
            match self.nodes.get_mut(&node.id) {
                Some(existing) => existing
                    .role_labels
                    .extend(node.role_labels.iter().cloned()),
                None => {
                    self.nodes.insert(node.id.clone(), node.clone());
                }
            }
        }
        for edge in other.edges() {
            self.edges
                .entry(edge.id.clone())
                .or_insert_with(|| edge.clone());
        }
    }

    /// Hash of the canonical wire form.
    pub fn content_hash(&self) -> Result<ContentHash, serde_json::Error> {
        ContentHash::of_json(self)
    }

    /// View of the graph from `identity`'s side.
    ///
    /// Nodes for the local identities are folded into one node with id
    /// [`SELF_NODE_ID`] named `self_label`, carrying their labels. Edges are
    /// rewritten to point at it and re-keyed; links between two local
    /// identities vanish.
    pub fn localized(&self, identity: &LocalIdentity, self_label: &str) -> Self {
        let me = PeerId::new(SELF_NODE_ID);
        let mut view = Self::new();
        let mut own_labels = BTreeSet::new();

        for node in self.nodes() {
            if identity.contains(&node.id) {
                own_labels.extend(node.role_labels.iter().cloned());
            } else {
                view.nodes.insert(node.id.clone(), node.clone());
            }
        }
        view.nodes.insert(
            me.clone(),
            NodeInfo {
                id: me.clone(),
                display_name: self_label.to_string(),
                role_labels: own_labels,
            },
        );

        let local = |peer: &PeerId| {
            if identity.contains(peer) {
                me.clone()
            } else {
                peer.clone()
            }
        };
        for edge in self.edges() {
            let (from, to) = (local(&edge.from), local(&edge.to));
            if from == to {
                continue;
            }
            let id = EdgeId::between(&from, &to);
            view.edges.entry(id.clone()).or_insert_with(|| Edge {
                id,
                from,
                to,
                label: edge.label.clone(),
            });
        }
        view
    }
}

#[derive(Serialize, Deserialize)]
struct GraphWire {
    #[serde(default)]
    nodes: Vec<NodeWire>,
    #[serde(default)]
    links: Vec<LinkWire>,
}

#[derive(Serialize, Deserialize)]
struct NodeWire {
    id: PeerId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    auras: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct LinkWire {
    #[serde(default)]
    id: Option<EdgeId>,
    from: PeerId,
    to: PeerId,
    #[serde(default)]
    label: String,
}

impl From<GraphWire> for ConnectivityGraph {
    fn from(wire: GraphWire) -> Self {
        let mut graph = Self::new();
        for node in wire.nodes {
            graph.upsert_node(&node.id, node.auras);
            if let (Some(name), Some(info)) = (node.name, graph.nodes.get_mut(&node.id)) {
                info.display_name = name;
            }
        }
        // Edges are keyed by their endpoint pair; wire ids are ignored
        for link in wire.links {
            let id = EdgeId::between(&link.from, &link.to);
            graph.edges.entry(id.clone()).or_insert(Edge {
                id,
                from: link.from,
                to: link.to,
                label: link.label,
            });
        }
        graph
    }
}

impl From<ConnectivityGraph> for GraphWire {
    fn from(graph: ConnectivityGraph) -> Self {
        Self {
            nodes: graph
                .nodes
                .into_values()
                .map(|node| NodeWire {
                    id: node.id,
                    name: Some(node.display_name),
                    auras: node.role_labels.into_iter().collect(),
                })
                .collect(),
            links: graph
                .edges
                .into_values()
                .map(|edge| LinkWire {
                    id: Some(edge.id),
                    from: edge.from,
                    to: edge.to,
                    label: edge.label,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer(id: &str) -> PeerId {
        PeerId::from(id)
    }

    #[test]
    fn test_edge_id_ignores_direction() {
        assert_eq!(
            EdgeId::between(&peer("a"), &peer("b")),
            EdgeId::between(&peer("b"), &peer("a"))
        );
        assert_ne!(
            EdgeId::between(&peer("a"), &peer("b")),
            EdgeId::between(&peer("a"), &peer("c"))
        );
        assert_ne!(
            EdgeId::between(&peer("ab"), &peer("c")),
            EdgeId::between(&peer("a"), &peer("bc"))
        );
    }

    #[test]
    fn test_observe_labels_both_ends() {
        let observation = Observation::of_link(PeerLink::new("a", "b"), "P2P");
        let graph = ConnectivityGraph::new().merged(&observation);

        assert_eq!(graph.node_count(), 2);
        assert!(graph.node(&peer("a")).unwrap().role_labels.contains("P2P"));
        assert!(graph.node(&peer("b")).unwrap().role_labels.contains("P2P"));
        let edge = graph.edge_between(&peer("b"), &peer("a")).unwrap();
        assert_eq!(edge.from, peer("a"));
        assert_eq!(edge.label, "P2P");
    }

    #[test]
    fn test_observe_unions_into_existing_node() {
        let mut graph = ConnectivityGraph::single_node(&peer("b"), ["trader"]);
        graph.observe(&Observation::of_link(PeerLink::new("a", "b"), "P2P"));

        let labels = &graph.node(&peer("b")).unwrap().role_labels;
        assert!(labels.contains("trader"));
        assert!(labels.contains("P2P"));
    }

    #[test]
    fn test_existing_edge_is_kept() {
        let mut graph = ConnectivityGraph::new();
        assert!(graph.insert_edge(&peer("a"), &peer("b"), "first"));
        assert!(!graph.insert_edge(&peer("b"), &peer("a"), "second"));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges().next().unwrap().label, "first");
    }

    #[test]
    fn test_absorb_unions() {
        let mut base = ConnectivityGraph::single_node(&peer("a"), ["x"]);
        let mut other = ConnectivityGraph::single_node(&peer("a"), ["y"]);
        other.upsert_node(&peer("b"), ["z"]);
        other.insert_edge(&peer("a"), &peer("b"), "P2P");

        base.absorb(&other);
        base.absorb(&other);

        assert_eq!(base.node_count(), 2);
        assert_eq!(base.edge_count(), 1);
        assert_eq!(base.node(&peer("a")).unwrap().role_labels.len(), 2);
    }

    #[test]
    fn test_wire_shape() {
        let mut graph = ConnectivityGraph::single_node(&peer("b"), ["trader"]);
        graph.insert_edge(&peer("b"), &peer("a"), "P2P");

        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["nodes"][0]["id"], "b");
        assert_eq!(value["nodes"][0]["name"], "b");
        assert_eq!(value["nodes"][0]["auras"], json!(["trader"]));
        assert_eq!(value["links"][0]["from"], "b");
        assert_eq!(value["links"][0]["to"], "a");
        assert_eq!(value["links"][0]["label"], "P2P");

        let decoded: ConnectivityGraph = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, graph);
    }

    #[test]
    fn test_wire_tolerates_sparse_input() {
        let graph: ConnectivityGraph = serde_json::from_value(json!({
            "nodes": [{"id": "a"}, {"id": "a", "auras": ["x"]}],
            "links": [{"from": "a", "to": "b"}]
        }))
        .unwrap();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(&peer("a")).unwrap().display_name, "a");
        assert!(graph.edge_between(&peer("a"), &peer("b")).is_some());

        let empty: ConnectivityGraph = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_wire_edge_ids_are_rederived() {
        let mut graph: ConnectivityGraph = serde_json::from_value(json!({
            "nodes": [{"id": "A"}, {"id": "B"}],
            "links": [
                {"id": "1", "from": "A", "to": "B", "label": "P2P"},
                {"id": "2", "from": "B", "to": "A", "label": "P2P"}
            ]
        }))
        .unwrap();

        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge_between(&peer("A"), &peer("B")).unwrap();
        assert_eq!(edge.id, EdgeId::between(&peer("A"), &peer("B")));

        graph.observe(&Observation::of_link(PeerLink::new("B", "A"), "P2P"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_content_hash_tracks_content() {
        let a = ConnectivityGraph::single_node(&peer("a"), ["x"]);
        let b = ConnectivityGraph::single_node(&peer("a"), ["x", "y"]);
        assert_eq!(a.content_hash().unwrap(), a.clone().content_hash().unwrap());
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn test_localized_replaces_own_ids() {
        let identity = LocalIdentity::new("did:sov:A").with_aliases(["A2"]);
        let mut graph = ConnectivityGraph::new();
        graph.observe(&Observation::of_link(PeerLink::new("A", "B"), "P2P"));
        graph.observe(&Observation::of_link(PeerLink::new("A2", "C"), "P2P"));
        graph.insert_edge(&peer("A"), &peer("A2"), "P2P");

        let view = graph.localized(&identity, "MySelf");

        let me = peer(SELF_NODE_ID);
        assert!(!view.contains_node(&peer("A")));
        assert!(!view.contains_node(&peer("A2")));
        assert_eq!(view.node(&me).unwrap().display_name, "MySelf");
        assert!(view.node(&me).unwrap().role_labels.contains("P2P"));
        assert_eq!(view.edge_count(), 2);
        assert!(view.edges().all(|e| e.from == me || e.to == me));
        assert!(view.edges().all(|e| e.from != e.to));
    }
}
