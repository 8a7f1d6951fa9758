//! Message envelope and wire codec
//!
//! Every relay message is a JSON object with an `@id`, a `@type` URI naming
//! one of five message kinds, the accumulated `route`, and the kind's own
//! fields:
//!
//! ```json
//! {
//!   "@id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
//!   "@type": "https://didcomm.org/govmesh-relay/1.0/trace-request",
//!   "route": ["did:sov:A", "did:sov:B"],
//!   "target": "did:sov:D"
//! }
//! ```
//!
//! Only `route` changes as a message travels: forwarding hops append their
//! own id. Responses reuse the request's `@id` so originators can correlate
//! them.

use crate::error::RelayError;
use crate::graph::ConnectivityGraph;
use govmesh_core::{MessageId, PeerId};
use govmesh_governance::GovernanceDoc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// `@type` of a trace request
pub const TRACE_REQUEST_TYPE: &str = "https://didcomm.org/govmesh-relay/1.0/trace-request";
/// `@type` of a trace response
pub const TRACE_RESPONSE_TYPE: &str = "https://didcomm.org/govmesh-relay/1.0/trace-response";
/// `@type` of a gossip message
pub const GOSSIP_TYPE: &str = "https://didcomm.org/govmesh-relay/1.0/gossip";
/// `@type` of a compliance request
pub const COMPLIANCE_REQUEST_TYPE: &str =
    "https://didcomm.org/govmesh-relay/1.0/compliance-request";
/// `@type` of a compliance response
pub const COMPLIANCE_RESPONSE_TYPE: &str =
    "https://didcomm.org/govmesh-relay/1.0/compliance-response";

/// Ask the network for a path to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRequest {
    /// Peer being looked for
    pub target: PeerId,
}

/// A path to `target` was found; travels back along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResponse {
    /// Peer that was looked for
    pub target: PeerId,
    /// Graph describing the target
    #[serde(default)]
    pub graph: ConnectivityGraph,
}

/// Application content spread to a member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gossip {
    /// Peers the content is meant for
    #[serde(default)]
    pub members: Vec<PeerId>,
    /// Opaque application content
    #[serde(default)]
    pub content: Value,
    /// Graph of the peers the message passed through
    #[serde(default)]
    pub graph: ConnectivityGraph,
}

/// Ask every reachable peer which roles `doc` grants it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRequest {
    /// Governance framework to evaluate
    pub doc: GovernanceDoc,
}

/// One peer's role assertion; travels back along the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResponse {
    /// Responder labelled with its roles, linked to the peer it answered
    pub graph: ConnectivityGraph,
}

/// Kind-specific part of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Body {
    /// Route discovery request
    #[serde(rename = "https://didcomm.org/govmesh-relay/1.0/trace-request")]
    TraceRequest(TraceRequest),
    /// Route discovery answer
    #[serde(rename = "https://didcomm.org/govmesh-relay/1.0/trace-response")]
    TraceResponse(TraceResponse),
    /// Gossip
    #[serde(rename = "https://didcomm.org/govmesh-relay/1.0/gossip")]
    Gossip(Gossip),
    /// Compliance query
    #[serde(rename = "https://didcomm.org/govmesh-relay/1.0/compliance-request")]
    ComplianceRequest(ComplianceRequest),
    /// Compliance answer
    #[serde(rename = "https://didcomm.org/govmesh-relay/1.0/compliance-response")]
    ComplianceResponse(ComplianceResponse),
}

impl Body {
    /// The `@type` URI of this body
    pub fn type_uri(&self) -> &'static str {
        match self {
            Body::TraceRequest(_) => TRACE_REQUEST_TYPE,
            Body::TraceResponse(_) => TRACE_RESPONSE_TYPE,
            Body::Gossip(_) => GOSSIP_TYPE,
            Body::ComplianceRequest(_) => COMPLIANCE_REQUEST_TYPE,
            Body::ComplianceResponse(_) => COMPLIANCE_RESPONSE_TYPE,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Body::TraceRequest(_) => "trace_request",
            Body::TraceResponse(_) => "trace_response",
            Body::Gossip(_) => "gossip",
            Body::ComplianceRequest(_) => "compliance_request",
            Body::ComplianceResponse(_) => "compliance_response",
        }
    }
}

/// A relay message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message id, shared by a request and its responses
    #[serde(rename = "@id")]
    pub id: MessageId,
    /// Peers the message has passed through, oldest first
    #[serde(default)]
    pub route: Vec<PeerId>,
    /// Kind and kind-specific fields
    #[serde(flatten)]
    pub body: Body,
}

impl Envelope {
    /// New message with a fresh id
    pub fn new(body: Body, route: Vec<PeerId>) -> Self {
        Self {
            id: MessageId::new(),
            route,
            body,
        }
    }

    /// A reply correlated with `self`, carrying `self`'s route.
    pub fn reply(&self, body: Body) -> Self {
        Self {
            id: self.id,
            route: self.route.clone(),
            body,
        }
    }

    /// Copy of `self` with `hop` appended to the route.
    pub fn extended(&self, hop: &PeerId) -> Self {
        let mut next = self.clone();
        next.route.push(hop.clone());
        next
    }

    /// Last entry of the route
    pub fn previous_hop(&self) -> Option<&PeerId> {
        self.route.last()
    }

    /// Whether the route names a peer twice
    pub fn has_route_loop(&self) -> bool {
        let mut visited = BTreeSet::new();
        !self.route.iter().all(|hop| visited.insert(hop))
    }

    /// Whether `peer` is on the route
    pub fn route_contains(&self, peer: &PeerId) -> bool {
        self.route.contains(peer)
    }

    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<Vec<u8>, RelayError> {
        serde_json::to_vec(self).map_err(|e| RelayError::encode(e.to_string()))
    }

    /// Parse a wire frame.
    pub fn decode(frame: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(frame).map_err(|e| RelayError::decode(e.to_string()))
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.body.kind(), self.id)
    }
}
