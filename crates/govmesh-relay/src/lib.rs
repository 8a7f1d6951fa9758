//! # govmesh relay
//!
//! Store-less relay protocol of a govmesh node. Five message kinds travel
//! over peer links, each carrying the route it has taken so far:
//!
//! - **trace request / response**: find a multi-hop route to a peer that
//!   is not directly connected
//! - **gossip**: spread application content to a member list, building a
//!   connectivity graph on the way
//! - **compliance request / response**: ask every reachable peer which
//!   roles a governance framework grants it, and collect the answers into
//!   one graph at the originator
//!
//! The protocol needs only a [`PeerDirectory`](govmesh_core::PeerDirectory)
//! and a [`CredentialOracle`](govmesh_core::CredentialOracle).
//! [`RelayEngine`] holds the per-node state and handlers, [`RelayNode`] runs
//! an engine on one task behind a single inbound queue, and
//! [`MemoryNetwork`] connects nodes in-process.
//!
//! # Example
//!
//! ```ignore
//! let mut network = MemoryNetwork::new();
//! network.connect("A", "B");
//! network.connect("B", "C");
//!
//! let mut a = network.spawn_node(LocalIdentity::new("A"), oracle.clone(), RelayConfig::default()).await?;
//! network.spawn_node(LocalIdentity::new("B"), oracle.clone(), RelayConfig::default()).await?;
//! network.spawn_node(LocalIdentity::new("C"), oracle, RelayConfig::default()).await?;
//!
//! a.handle.start_trace("C").await?;
//! if let Some(NodeEvent::RouteDiscovered { route, .. }) = a.events.recv().await {
//!     println!("reached C via {route:?}");
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod graph;
pub mod memory;
pub mod node;
pub mod protocol;
pub mod routing;
pub mod seen;

pub use config::RelayConfig;
pub use envelope::{
    Body, ComplianceRequest, ComplianceResponse, Envelope, Gossip, TraceRequest, TraceResponse,
};
pub use error::RelayError;
pub use events::NodeEvent;
pub use graph::{ConnectivityGraph, Edge, EdgeId, NodeInfo, Observation, SELF_NODE_ID};
pub use memory::{MemoryDirectory, MemoryNetwork};
pub use node::{Inbound, NodeHandle, RelayNode, SpawnedNode};
pub use protocol::{DropReason, Originated, RelayEngine, RelayOutcome};
pub use routing::{next_hop_back, ReverseHop};
pub use seen::{SeenMessages, Sighting};
