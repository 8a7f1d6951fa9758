//! Application events raised by a relay node

use crate::graph::ConnectivityGraph;
use govmesh_core::{MessageId, PeerId};
use serde_json::Value;

/// Something the application layer should know about.
///
/// Graphs are localised: the node's own identities appear as the single
/// synthetic self node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// A trace this node started reached its target
    RouteDiscovered {
        /// Id of the trace
        message_id: MessageId,
        /// Peer that was looked for
        target: PeerId,
        /// Hops from this node towards the target
        route: Vec<PeerId>,
        /// Graph of the discovered path
        graph: ConnectivityGraph,
    },

    /// Gossip seen for the first time
    GossipReceived {
        /// Gossip id
        message_id: MessageId,
        /// Application content
        content: Value,
        /// Intended members
        members: Vec<PeerId>,
        /// Graph the gossip carried, with the local observation merged
        graph: ConnectivityGraph,
        /// Peer that delivered it
        from: Option<PeerId>,
    },

    /// Known gossip came back with a different graph
    GraphUpdated {
        /// Gossip id
        message_id: MessageId,
        /// Graph carried by the repeat
        graph: ConnectivityGraph,
    },

    /// A compliance query this node started received an answer
    ComplianceUpdated {
        /// Id of the query
        message_id: MessageId,
        /// All answers merged so far
        graph: ConnectivityGraph,
    },
}

impl NodeEvent {
    /// Id of the message the event is about
    pub fn message_id(&self) -> MessageId {
        match self {
            NodeEvent::RouteDiscovered { message_id, .. }
            | NodeEvent::GossipReceived { message_id, .. }
            | NodeEvent::GraphUpdated { message_id, .. }
            | NodeEvent::ComplianceUpdated { message_id, .. } => *message_id,
        }
    }

    /// Graph carried by the event
    pub fn graph(&self) -> &ConnectivityGraph {
        match self {
            NodeEvent::RouteDiscovered { graph, .. }
            | NodeEvent::GossipReceived { graph, .. }
            | NodeEvent::GraphUpdated { graph, .. }
            | NodeEvent::ComplianceUpdated { graph, .. } => graph,
        }
    }
}
