//! Relay protocol state machine
//!
//! [`RelayEngine`] turns one inbound message into zero or more outbound
//! frames and at most one application event. Messages carry their own
//! accumulated route, so the only state kept between messages is the seen
//! cache and the working graphs of compliance queries this node started.
//!
//! # Handlers
//!
//! - **Trace request**: answer when the target is one of our identities,
//!   forward straight to the target when it is a neighbour, otherwise flood
//!   to every neighbour not yet on the route.
//! - **Trace response / compliance response**: walk back along the route
//!   (see [`routing`](crate::routing)); the originator consumes it.
//! - **Gossip**: forward once per id to the member list; repeats with a
//!   changed graph only notify the application.
//! - **Compliance request**: evaluate the carried governance document,
//!   answer the sender, then re-flood to neighbours not on the route.
//!
//! Nothing here returns an error for protocol-level problems: loops,
//! duplicates, dead ends and malformed frames are reported as
//! [`RelayOutcome::Dropped`] and logged.

use crate::config::RelayConfig;
use crate::envelope::{
    Body, ComplianceRequest, ComplianceResponse, Envelope, Gossip, TraceRequest, TraceResponse,
};
use crate::error::RelayError;
use crate::events::NodeEvent;
use crate::graph::{ConnectivityGraph, Observation};
use crate::routing::{next_hop_back, ReverseHop};
use crate::seen::{SeenMessages, Sighting};
use govmesh_core::{CredentialOracle, LocalIdentity, MessageId, PeerDirectory, PeerId, PeerLink};
use govmesh_governance::{granted_roles, GovernanceDoc};
use lru::LruCache;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Why a message was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Frame or document could not be decoded
    Malformed,
    /// Route repeats a peer or already passes through this node
    RouteLoop,
    /// Message id already processed
    Duplicate,
    /// Gossip repeat with an unchanged graph
    Unchanged,
    /// Trace target reached but the route names no previous hop
    NoPreviousHop,
    /// Compliance request with neither a transport sender nor a route
    UnknownSender,
    /// Response with no usable hop back
    DeadEnd,
}

impl DropReason {
    /// Stable name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Malformed => "malformed",
            DropReason::RouteLoop => "route_loop",
            DropReason::Duplicate => "duplicate",
            DropReason::Unchanged => "unchanged",
            DropReason::NoPreviousHop => "no_previous_hop",
            DropReason::UnknownSender => "unknown_sender",
            DropReason::DeadEnd => "dead_end",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Processed; frames went to `sent`, `event` goes to the application
    Handled {
        /// Peers a frame was successfully queued for
        sent: Vec<PeerId>,
        /// Event for the application, if any
        event: Option<NodeEvent>,
    },
    /// Not processed
    Dropped(DropReason),
}

impl RelayOutcome {
    fn sent(sent: Vec<PeerId>) -> Self {
        RelayOutcome::Handled { sent, event: None }
    }

    fn delivered(sent: Vec<PeerId>, event: NodeEvent) -> Self {
        RelayOutcome::Handled {
            sent,
            event: Some(event),
        }
    }

    /// Peers a frame was sent to
    pub fn recipients(&self) -> &[PeerId] {
        match self {
            RelayOutcome::Handled { sent, .. } => sent,
            RelayOutcome::Dropped(_) => &[],
        }
    }

    /// Event for the application, if any
    pub fn event(&self) -> Option<&NodeEvent> {
        match self {
            RelayOutcome::Handled { event, .. } => event.as_ref(),
            RelayOutcome::Dropped(_) => None,
        }
    }

    /// Take the event out of the outcome
    pub fn into_event(self) -> Option<NodeEvent> {
        match self {
            RelayOutcome::Handled { event, .. } => event,
            RelayOutcome::Dropped(_) => None,
        }
    }

    /// Why the message was dropped, if it was
    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            RelayOutcome::Dropped(reason) => Some(*reason),
            RelayOutcome::Handled { .. } => None,
        }
    }
}

/// A message started by this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originated {
    /// Id responses will carry
    pub message_id: MessageId,
    /// Peers the message was sent to
    pub sent: Vec<PeerId>,
}

/// Per-node relay state and handlers.
///
/// Methods take `&mut self`: a node processes one message at a time, so
/// the caches need no locking. [`RelayNode`](crate::RelayNode) provides the
/// sequential task that owns an engine.
pub struct RelayEngine<D: ?Sized, O: ?Sized> {
    identity: LocalIdentity,
    config: RelayConfig,
    seen: SeenMessages,
    queries: LruCache<MessageId, ConnectivityGraph>,
    directory: Arc<D>,
    oracle: Arc<O>,
}

impl<D, O> RelayEngine<D, O>
where
    D: PeerDirectory + ?Sized,
    O: CredentialOracle + ?Sized,
{
    /// Create an engine after validating `config`.
    pub fn new(
        identity: LocalIdentity,
        directory: Arc<D>,
        oracle: Arc<O>,
        config: RelayConfig,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let capacity = config.seen_capacity()?;
        Ok(Self {
            identity,
            seen: SeenMessages::new(capacity),
            queries: LruCache::new(capacity),
            config,
            directory,
            oracle,
        })
    }

    /// Identities of this node
    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Active configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Seen-message cache
    pub fn seen(&self) -> &SeenMessages {
        &self.seen
    }

    /// Unlocalised working graph of a compliance query started here
    pub fn working_graph(&self, query: &MessageId) -> Option<&ConnectivityGraph> {
        self.queries.peek(query)
    }

    /// Decode and handle one inbound frame.
    ///
    /// `sender` is the transport-level sender when the transport knows it.
    pub async fn handle_frame(&mut self, sender: Option<&PeerId>, frame: &[u8]) -> RelayOutcome {
        match Envelope::decode(frame) {
            Ok(envelope) => self.handle(sender, envelope).await,
            Err(e) => {
                warn!(sender = ?sender, error = %e, "dropping malformed relay frame");
                RelayOutcome::Dropped(DropReason::Malformed)
            }
        }
    }

    /// Handle one decoded message.
    pub async fn handle(&mut self, sender: Option<&PeerId>, envelope: Envelope) -> RelayOutcome {
        trace!(
            message = %envelope,
            sender = ?sender,
            hops = envelope.route.len(),
            "relay message received"
        );

        let outcome = match &envelope.body {
            Body::TraceRequest(request) => self.on_trace_request(&envelope, request).await,
            Body::TraceResponse(response) => self.on_trace_response(&envelope, response).await,
            Body::Gossip(gossip) => self.on_gossip(sender, &envelope, gossip).await,
            Body::ComplianceRequest(request) => {
                self.on_compliance_request(sender, &envelope, request).await
            }
            Body::ComplianceResponse(response) => {
                self.on_compliance_response(&envelope, response).await
            }
        };

        if let RelayOutcome::Dropped(reason) = &outcome {
            debug!(message = %envelope, %reason, "relay message dropped");
        }
        outcome
    }

    /// Start looking for a route to `target`.
    pub async fn start_trace(&mut self, target: PeerId) -> Result<Originated, RelayError> {
        let envelope = Envelope::new(
            Body::TraceRequest(TraceRequest {
                target: target.clone(),
            }),
            vec![self.identity.primary().clone()],
        );
        self.seen.check_and_mark(envelope.id);
        let frame = envelope.encode()?;

        let sent = match self.directory.resolve(&target).await {
            Some(link) => self.send_on(&link, &frame).await.into_iter().collect(),
            None => {
                let targets = self.flood_targets(&envelope, None).await;
                self.send_all(&targets, &frame).await
            }
        };

        info!(id = %envelope.id, %target, sent = sent.len(), "trace started");
        Ok(Originated {
            message_id: envelope.id,
            sent,
        })
    }

    /// Gossip `content` to `members`.
    pub async fn start_gossip(
        &mut self,
        members: Vec<PeerId>,
        content: Value,
    ) -> Result<Originated, RelayError> {
        let primary = self.identity.primary().clone();
        let graph = ConnectivityGraph::single_node(&primary, [self.config.link_label.as_str()]);
        let hash = graph
            .content_hash()
            .map_err(|e| RelayError::encode(e.to_string()))?;

        let envelope = Envelope::new(
            Body::Gossip(Gossip {
                members: members.clone(),
                content,
                graph,
            }),
            vec![primary],
        );
        self.seen.observe(envelope.id, hash);
        let frame = envelope.encode()?;

        let targets: Vec<PeerId> = members
            .into_iter()
            .filter(|member| !self.identity.contains(member))
            .collect();
        let sent = self.send_all(&targets, &frame).await;

        info!(id = %envelope.id, members = targets.len(), sent = sent.len(), "gossip started");
        Ok(Originated {
            message_id: envelope.id,
            sent,
        })
    }

    /// Ask the reachable network which roles `doc` grants each peer.
    ///
    /// The working graph is seeded with the roles `doc` grants this node.
    pub async fn start_compliance_query(
        &mut self,
        doc: GovernanceDoc,
    ) -> Result<Originated, RelayError> {
        let primary = self.identity.primary().clone();
        let roles = granted_roles(&doc, self.oracle.as_ref()).await;

        let envelope = Envelope::new(
            Body::ComplianceRequest(ComplianceRequest { doc }),
            vec![primary.clone()],
        );
        if self.config.compliance_dedup {
            self.seen.check_and_mark(envelope.id);
        }
        self.queries
            .put(envelope.id, ConnectivityGraph::single_node(&primary, roles));

        let frame = envelope.encode()?;
        let targets = self.flood_targets(&envelope, None).await;
        let sent = self.send_all(&targets, &frame).await;

        info!(id = %envelope.id, sent = sent.len(), "compliance query started");
        Ok(Originated {
            message_id: envelope.id,
            sent,
        })
    }

    async fn on_trace_request(&mut self, envelope: &Envelope, request: &TraceRequest) -> RelayOutcome {
        if envelope.has_route_loop() || self.route_passes_here(envelope) {
            return RelayOutcome::Dropped(DropReason::RouteLoop);
        }
        if !self.seen.check_and_mark(envelope.id) {
            return RelayOutcome::Dropped(DropReason::Duplicate);
        }

        if self.identity.contains(&request.target) {
            let Some(previous) = envelope.previous_hop() else {
                return RelayOutcome::Dropped(DropReason::NoPreviousHop);
            };
            let response = envelope.reply(Body::TraceResponse(TraceResponse {
                target: request.target.clone(),
                graph: ConnectivityGraph::single_node(&request.target, std::iter::empty::<String>()),
            }));
            let Some(frame) = self.encode(&response) else {
                return RelayOutcome::Dropped(DropReason::Malformed);
            };
            debug!(id = %envelope.id, to = %previous, "trace target reached, answering");
            return RelayOutcome::sent(self.send_all(std::slice::from_ref(previous), &frame).await);
        }

        let forward = envelope.extended(self.identity.primary());
        let Some(frame) = self.encode(&forward) else {
            return RelayOutcome::Dropped(DropReason::Malformed);
        };

        if let Some(link) = self.directory.resolve(&request.target).await {
            trace!(id = %envelope.id, target = %request.target, "trace target is a neighbour");
            return RelayOutcome::sent(self.send_on(&link, &frame).await.into_iter().collect());
        }

        let targets = self.flood_targets(envelope, None).await;
        if targets.is_empty() {
            trace!(id = %envelope.id, "no flood targets for trace");
        }
        RelayOutcome::sent(self.send_all(&targets, &frame).await)
    }

    async fn on_trace_response(&mut self, envelope: &Envelope, response: &TraceResponse) -> RelayOutcome {
        match next_hop_back(&envelope.route, &self.identity, self.directory.as_ref()).await {
            ReverseHop::Deliver => {
                let mut hops = envelope.route.clone();
                hops.push(response.target.clone());

                let mut graph = response.graph.clone();
                for pair in hops.windows(2) {
                    let link = PeerLink::new(pair[0].clone(), pair[1].clone());
                    graph.observe(&Observation::of_link(link, self.config.link_label.as_str()));
                }

                info!(id = %envelope.id, target = %response.target, hops = hops.len() - 1, "route discovered");
                RelayOutcome::delivered(
                    Vec::new(),
                    NodeEvent::RouteDiscovered {
                        message_id: envelope.id,
                        target: response.target.clone(),
                        route: hops.into_iter().skip(1).collect(),
                        graph: self.localize(&graph),
                    },
                )
            }
            ReverseHop::Forward(link) => match self.encode(envelope) {
                Some(frame) => RelayOutcome::sent(self.send_on(&link, &frame).await.into_iter().collect()),
                None => RelayOutcome::Dropped(DropReason::Malformed),
            },
            ReverseHop::DeadEnd => RelayOutcome::Dropped(DropReason::DeadEnd),
        }
    }

    async fn on_gossip(
        &mut self,
        sender: Option<&PeerId>,
        envelope: &Envelope,
        gossip: &Gossip,
    ) -> RelayOutcome {
        let hash = match gossip.graph.content_hash() {
            Ok(hash) => hash,
            Err(e) => {
                warn!(id = %envelope.id, error = %e, "cannot hash gossip graph");
                return RelayOutcome::Dropped(DropReason::Malformed);
            }
        };

        match self.seen.observe(envelope.id, hash) {
            Sighting::Unchanged => return RelayOutcome::Dropped(DropReason::Unchanged),
            Sighting::Changed => {
                debug!(id = %envelope.id, "known gossip carries a new graph");
                return RelayOutcome::delivered(
                    Vec::new(),
                    NodeEvent::GraphUpdated {
                        message_id: envelope.id,
                        graph: self.localize(&gossip.graph),
                    },
                );
            }
            Sighting::First => {}
        }

        let from = sender.or(envelope.previous_hop()).cloned();
        let mut graph = gossip.graph.clone();
        self.observe_sender(&mut graph, from.as_ref()).await;

        let mut route = envelope.route.clone();
        route.push(self.identity.primary().clone());
        let forward = Envelope {
            id: envelope.id,
            route,
            body: Body::Gossip(Gossip {
                members: gossip.members.clone(),
                content: gossip.content.clone(),
                graph: graph.clone(),
            }),
        };

        let mut sent = Vec::new();
        if let Some(frame) = self.encode(&forward) {
            for member in &gossip.members {
                if self.identity.contains(member) || Some(member) == from.as_ref() {
                    continue;
                }
                match self.directory.resolve(member).await {
                    Some(link) => sent.extend(self.send_on(&link, &frame).await),
                    None => debug!(id = %envelope.id, %member, "gossip member not reachable, skipping"),
                }
            }
        }

        RelayOutcome::delivered(
            sent,
            NodeEvent::GossipReceived {
                message_id: envelope.id,
                content: gossip.content.clone(),
                members: gossip.members.clone(),
                graph: self.localize(&graph),
                from,
            },
        )
    }

    async fn on_compliance_request(
        &mut self,
        sender: Option<&PeerId>,
        envelope: &Envelope,
        request: &ComplianceRequest,
    ) -> RelayOutcome {
        if envelope.has_route_loop() || self.route_passes_here(envelope) {
            return RelayOutcome::Dropped(DropReason::RouteLoop);
        }
        if self.config.compliance_dedup && !self.seen.check_and_mark(envelope.id) {
            return RelayOutcome::Dropped(DropReason::Duplicate);
        }
        let Some(from) = sender.or(envelope.previous_hop()).cloned() else {
            warn!(id = %envelope.id, "compliance request without sender or route");
            return RelayOutcome::Dropped(DropReason::UnknownSender);
        };

        let primary = self.identity.primary().clone();
        let roles = granted_roles(&request.doc, self.oracle.as_ref()).await;
        debug!(id = %envelope.id, %from, ?roles, "compliance request evaluated");

        let mut graph = ConnectivityGraph::single_node(&primary, roles);
        graph.insert_edge(&primary, &from, &self.config.link_label);
        let response = envelope.reply(Body::ComplianceResponse(ComplianceResponse { graph }));

        let mut sent = Vec::new();
        if let Some(frame) = self.encode(&response) {
            sent.extend(self.send_all(std::slice::from_ref(&from), &frame).await);
        }

        let forward = envelope.extended(&primary);
        if let Some(frame) = self.encode(&forward) {
            let targets = self.flood_targets(envelope, Some(&from)).await;
            sent.extend(self.send_all(&targets, &frame).await);
        }

        RelayOutcome::sent(sent)
    }

    async fn on_compliance_response(
        &mut self,
        envelope: &Envelope,
        response: &ComplianceResponse,
    ) -> RelayOutcome {
        match next_hop_back(&envelope.route, &self.identity, self.directory.as_ref()).await {
            ReverseHop::Deliver => {
                let working = match self.queries.get_mut(&envelope.id) {
                    Some(working) => {
                        working.absorb(&response.graph);
                        working.clone()
                    }
                    None => {
                        debug!(id = %envelope.id, "answer to an unknown query, starting a new working graph");
                        self.queries.put(envelope.id, response.graph.clone());
                        response.graph.clone()
                    }
                };
                RelayOutcome::delivered(
                    Vec::new(),
                    NodeEvent::ComplianceUpdated {
                        message_id: envelope.id,
                        graph: self.localize(&working),
                    },
                )
            }
            ReverseHop::Forward(link) => match self.encode(envelope) {
                Some(frame) => RelayOutcome::sent(self.send_on(&link, &frame).await.into_iter().collect()),
                None => RelayOutcome::Dropped(DropReason::Malformed),
            },
            ReverseHop::DeadEnd => RelayOutcome::Dropped(DropReason::DeadEnd),
        }
    }

    fn route_passes_here(&self, envelope: &Envelope) -> bool {
        envelope.route.iter().any(|hop| self.identity.contains(hop))
    }

    fn localize(&self, graph: &ConnectivityGraph) -> ConnectivityGraph {
        graph.localized(&self.identity, &self.config.self_label)
    }

    /// Merge the link to `from` into `graph`, or just this node if the
    /// sender is unknown.
    async fn observe_sender(&self, graph: &mut ConnectivityGraph, from: Option<&PeerId>) {
        let label = self.config.link_label.as_str();
        let primary = self.identity.primary();
        match from {
            Some(peer) => {
                let link = match self.directory.resolve(peer).await {
                    Some(link) => link,
                    None => PeerLink::new(primary.clone(), peer.clone()),
                };
                graph.observe(&Observation::of_link(link, label));
            }
            None => graph.upsert_node(primary, [label]),
        }
    }

    /// Neighbours that are neither on the route, nor `exclude`, nor us.
    async fn flood_targets(&self, envelope: &Envelope, exclude: Option<&PeerId>) -> Vec<PeerId> {
        self.directory
            .connected_peers()
            .await
            .into_iter()
            .filter(|peer| !self.identity.contains(peer))
            .filter(|peer| Some(peer) != exclude)
            .filter(|peer| !envelope.route_contains(peer))
            .collect()
    }

    fn encode(&self, envelope: &Envelope) -> Option<Vec<u8>> {
        match envelope.encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(message = %envelope, error = %e, "failed to encode relay frame");
                None
            }
        }
    }

    /// Send to each resolvable peer; returns the peers that accepted it.
    async fn send_all(&self, peers: &[PeerId], frame: &[u8]) -> Vec<PeerId> {
        let mut sent = Vec::with_capacity(peers.len());
        for peer in peers {
            match self.directory.resolve(peer).await {
                Some(link) => sent.extend(self.send_on(&link, frame).await),
                None => warn!(%peer, "peer not resolvable, dropping send"),
            }
        }
        sent
    }

    async fn send_on(&self, link: &PeerLink, frame: &[u8]) -> Option<PeerId> {
        match self.directory.send_to(link, frame.to_vec()).await {
            Ok(()) => Some(link.remote.clone()),
            Err(e) => {
                warn!(%link, error = %e, "failed to send relay frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govmesh_testkit::{RecordingDirectory, ScriptedOracle, SentFrame};
    use serde_json::json;

    type Engine = RelayEngine<RecordingDirectory, ScriptedOracle>;

    fn peer(id: &str) -> PeerId {
        PeerId::from(id)
    }

    fn route(hops: &[&str]) -> Vec<PeerId> {
        hops.iter().map(|hop| peer(hop)).collect()
    }

    fn engine_with(
        local: &str,
        peers: &[&str],
        oracle: ScriptedOracle,
        config: RelayConfig,
    ) -> (Engine, Arc<RecordingDirectory>) {
        let directory = Arc::new(RecordingDirectory::new(local, peers.iter().copied()));
        let engine = RelayEngine::new(
            LocalIdentity::new(local),
            directory.clone(),
            Arc::new(oracle),
            config,
        )
        .unwrap();
        (engine, directory)
    }

    fn engine(local: &str, peers: &[&str]) -> (Engine, Arc<RecordingDirectory>) {
        engine_with(local, peers, ScriptedOracle::new(), RelayConfig::default())
    }

    fn decoded(frame: &SentFrame) -> Envelope {
        Envelope::decode(&frame.frame).unwrap()
    }

    fn trace_request(target: &str, hops: &[&str]) -> Envelope {
        Envelope::new(
            Body::TraceRequest(TraceRequest {
                target: peer(target),
            }),
            route(hops),
        )
    }

    fn trader_doc(holder: &str) -> GovernanceDoc {
        GovernanceDoc::from_value(json!({
            "schemas": [],
            "participants": [],
            "roles": ["trader"],
            "permissions": [
                {"grant": ["trader"], "when": {"any": [{"id": holder}]}}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_trace_request_with_repeated_hop_is_dropped() {
        let (mut engine, directory) = engine("Z", &["X", "Y"]);

        let outcome = engine.handle(None, trace_request("D", &["X", "Y", "X"])).await;

        assert_eq!(outcome.drop_reason(), Some(DropReason::RouteLoop));
        assert!(directory.sent().is_empty());
    }

    #[tokio::test]
    async fn test_trace_request_through_self_is_dropped() {
        let (mut engine, directory) = engine("B", &["A", "C"]);

        let outcome = engine.handle(None, trace_request("D", &["A", "B"])).await;

        assert_eq!(outcome.drop_reason(), Some(DropReason::RouteLoop));
        assert!(directory.sent().is_empty());
        assert!(engine.seen().is_empty());
    }

    #[tokio::test]
    async fn test_trace_request_duplicate_id_is_dropped() {
        let (mut engine, directory) = engine("B", &["A", "C"]);
        let request = trace_request("D", &["A"]);

        engine.handle(None, request.clone()).await;
        let again = engine.handle(None, request).await;

        assert_eq!(again.drop_reason(), Some(DropReason::Duplicate));
        assert_eq!(directory.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_trace_target_answers_previous_hop() {
        let (mut engine, directory) = engine("C", &["B"]);
        let request = trace_request("C", &["A", "B"]);

        let outcome = engine.handle(Some(&peer("B")), request.clone()).await;

        assert_eq!(outcome.recipients(), &[peer("B")]);
        let response = decoded(&directory.sent()[0]);
        assert_eq!(response.id, request.id);
        assert_eq!(response.route, route(&["A", "B"]));
        match response.body {
            Body::TraceResponse(TraceResponse { target, graph }) => {
                assert_eq!(target, peer("C"));
                assert_eq!(graph.node_count(), 1);
                assert!(graph.contains_node(&peer("C")));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trace_target_with_empty_route_stays_silent() {
        let (mut engine, directory) = engine("C", &["B"]);

        let outcome = engine.handle(None, trace_request("C", &[])).await;

        assert_eq!(outcome.drop_reason(), Some(DropReason::NoPreviousHop));
        assert!(directory.sent().is_empty());
    }

    #[tokio::test]
    async fn test_trace_goes_straight_to_neighbouring_target() {
        let (mut engine, directory) = engine("B", &["A", "C", "E"]);

        let outcome = engine.handle(None, trace_request("C", &["A"])).await;

        assert_eq!(outcome.recipients(), &[peer("C")]);
        assert_eq!(decoded(&directory.sent()[0]).route, route(&["A", "B"]));
    }

    #[tokio::test]
    async fn test_trace_floods_to_peers_off_route() {
        let (mut engine, directory) = engine("B", &["A", "C", "E"]);

        let outcome = engine.handle(Some(&peer("A")), trace_request("D", &["A"])).await;

        assert_eq!(outcome.recipients(), &[peer("C"), peer("E")]);
        for frame in directory.sent() {
            assert_eq!(decoded(&frame).route, route(&["A", "B"]));
        }
    }

    #[tokio::test]
    async fn test_trace_response_forwarded_towards_origin() {
        let (mut engine, directory) = engine("B", &["A", "C"]);
        let response = Envelope::new(
            Body::TraceResponse(TraceResponse {
                target: peer("C"),
                graph: ConnectivityGraph::single_node(&peer("C"), std::iter::empty::<String>()),
            }),
            route(&["A", "B"]),
        );

        let outcome = engine.handle(Some(&peer("C")), response.clone()).await;

        assert_eq!(outcome.recipients(), &[peer("A")]);
        assert_eq!(decoded(&directory.sent()[0]), response);
    }

    #[tokio::test]
    async fn test_trace_response_delivered_at_origin() {
        let (mut engine, _directory) = engine("A", &["B"]);
        let response = Envelope::new(
            Body::TraceResponse(TraceResponse {
                target: peer("C"),
                graph: ConnectivityGraph::single_node(&peer("C"), std::iter::empty::<String>()),
            }),
            route(&["A", "B"]),
        );

        let outcome = engine.handle(Some(&peer("B")), response).await;

        match outcome.into_event() {
            Some(NodeEvent::RouteDiscovered { target, route: hops, graph, .. }) => {
                assert_eq!(target, peer("C"));
                assert_eq!(hops, route(&["B", "C"]));
                assert!(graph.contains_node(&peer("B")));
                assert!(graph.contains_node(&peer("C")));
                assert!(!graph.contains_node(&peer("A")));
                assert!(graph.edge_between(&peer("me"), &peer("B")).is_some());
                assert!(graph.edge_between(&peer("B"), &peer("C")).is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gossip_forwarded_once_per_graph() {
        let (mut engine, directory) = engine("B", &["A", "C", "D"]);
        let gossip = Envelope::new(
            Body::Gossip(Gossip {
                members: route(&["A", "B", "C", "D", "Q"]),
                content: json!("hello"),
                graph: ConnectivityGraph::single_node(&peer("A"), ["P2P"]),
            }),
            route(&["A"]),
        );

        let first = engine.handle(Some(&peer("A")), gossip.clone()).await;
        let second = engine.handle(Some(&peer("A")), gossip).await;

        // sender, self and the unreachable Q are skipped
        assert_eq!(first.recipients(), &[peer("C"), peer("D")]);
        assert!(matches!(
            first.event(),
            Some(NodeEvent::GossipReceived { content, .. }) if content == &json!("hello")
        ));
        assert_eq!(second.drop_reason(), Some(DropReason::Unchanged));
        assert_eq!(directory.sent().len(), 2);

        let forwarded = decoded(&directory.sent()[0]);
        assert_eq!(forwarded.route, route(&["A", "B"]));
        let Body::Gossip(body) = forwarded.body else {
            panic!("expected gossip");
        };
        assert!(body.graph.edge_between(&peer("A"), &peer("B")).is_some());
    }

    #[tokio::test]
    async fn test_gossip_with_new_graph_notifies_without_forwarding() {
        let (mut engine, directory) = engine("B", &["A", "C"]);
        let gossip = Envelope::new(
            Body::Gossip(Gossip {
                members: route(&["C"]),
                content: json!({"text": "hi"}),
                graph: ConnectivityGraph::single_node(&peer("A"), ["P2P"]),
            }),
            route(&["A"]),
        );
        let mut echoed = gossip.clone();
        if let Body::Gossip(body) = &mut echoed.body {
            body.graph.upsert_node(&peer("C"), ["P2P"]);
        }

        engine.handle(Some(&peer("A")), gossip).await;
        let sends = directory.sent().len();
        let outcome = engine.handle(Some(&peer("C")), echoed).await;

        assert!(matches!(outcome.event(), Some(NodeEvent::GraphUpdated { .. })));
        assert!(outcome.recipients().is_empty());
        assert_eq!(directory.sent().len(), sends);
    }

    #[tokio::test]
    async fn test_compliance_request_answers_and_refloods() {
        let oracle = ScriptedOracle::new().with_identity("B");
        let (mut engine, directory) =
            engine_with("B", &["A", "C", "D"], oracle, RelayConfig::default());
        let request = Envelope::new(
            Body::ComplianceRequest(ComplianceRequest {
                doc: trader_doc("B"),
            }),
            route(&["A"]),
        );

        let outcome = engine.handle(Some(&peer("A")), request.clone()).await;

        assert_eq!(outcome.recipients(), &[peer("A"), peer("C"), peer("D")]);
        let sent = directory.sent();

        let response = decoded(&sent[0]);
        assert_eq!(response.id, request.id);
        assert_eq!(response.route, route(&["A"]));
        let Body::ComplianceResponse(ComplianceResponse { graph }) = response.body else {
            panic!("expected compliance response");
        };
        let labels: Vec<_> = graph.node(&peer("B")).unwrap().role_labels.iter().cloned().collect();
        assert_eq!(labels, vec!["trader".to_string()]);
        assert_eq!(graph.node_count(), 1);
        assert!(graph.edge_between(&peer("B"), &peer("A")).is_some());

        for frame in &sent[1..] {
            let forwarded = decoded(frame);
            assert_eq!(forwarded.route, route(&["A", "B"]));
            assert_eq!(forwarded.body.kind(), "compliance_request");
        }
    }

    #[tokio::test]
    async fn test_compliance_request_repeats_unless_deduplicated() {
        let request = Envelope::new(
            Body::ComplianceRequest(ComplianceRequest {
                doc: trader_doc("B"),
            }),
            route(&["A"]),
        );

        let (mut literal, _) = engine("B", &["A"]);
        literal.handle(Some(&peer("A")), request.clone()).await;
        let repeat = literal.handle(Some(&peer("A")), request.clone()).await;
        assert_eq!(repeat.recipients(), &[peer("A")]);

        let (mut hardened, _) = engine_with(
            "B",
            &["A"],
            ScriptedOracle::new(),
            RelayConfig::default().with_compliance_dedup(true),
        );
        hardened.handle(Some(&peer("A")), request.clone()).await;
        let repeat = hardened.handle(Some(&peer("A")), request).await;
        assert_eq!(repeat.drop_reason(), Some(DropReason::Duplicate));
    }

    #[tokio::test]
    async fn test_compliance_request_without_sender_is_dropped() {
        let (mut engine, directory) = engine("B", &["A"]);
        let request = Envelope::new(
            Body::ComplianceRequest(ComplianceRequest {
                doc: trader_doc("B"),
            }),
            Vec::new(),
        );

        let outcome = engine.handle(None, request).await;

        assert_eq!(outcome.drop_reason(), Some(DropReason::UnknownSender));
        assert!(directory.sent().is_empty());
    }

    #[tokio::test]
    async fn test_compliance_answers_merge_at_origin() {
        let oracle = ScriptedOracle::new().with_identity("A");
        let (mut engine, directory) =
            engine_with("A", &["B", "C"], oracle, RelayConfig::default());

        let query = engine.start_compliance_query(trader_doc("A")).await.unwrap();
        assert_eq!(query.sent, vec![peer("B"), peer("C")]);
        assert_eq!(directory.sent().len(), 2);

        for responder in ["B", "C"] {
            let mut graph = ConnectivityGraph::single_node(&peer(responder), ["trader"]);
            graph.insert_edge(&peer(responder), &peer("A"), "P2P");
            let response = Envelope {
                id: query.message_id,
                route: route(&["A"]),
                body: Body::ComplianceResponse(ComplianceResponse { graph }),
            };
            engine.handle(Some(&peer(responder)), response).await;
        }

        let working = engine.working_graph(&query.message_id).unwrap();
        assert_eq!(working.node_count(), 3);
        assert!(working.node(&peer("A")).unwrap().role_labels.contains("trader"));
        assert_eq!(working.edge_count(), 2);
    }

    #[tokio::test]
    async fn test_compliance_event_is_localized() {
        let (mut engine, _) = engine("A", &["B"]);
        let query = engine.start_compliance_query(trader_doc("nobody")).await.unwrap();

        let mut graph = ConnectivityGraph::single_node(&peer("B"), ["trader"]);
        graph.insert_edge(&peer("B"), &peer("A"), "P2P");
        let outcome = engine
            .handle(
                Some(&peer("B")),
                Envelope {
                    id: query.message_id,
                    route: route(&["A"]),
                    body: Body::ComplianceResponse(ComplianceResponse { graph }),
                },
            )
            .await;

        let Some(NodeEvent::ComplianceUpdated { graph, .. }) = outcome.into_event() else {
            panic!("expected compliance update");
        };
        assert!(graph.contains_node(&peer("me")));
        assert!(!graph.contains_node(&peer("A")));
        assert_eq!(graph.edge_between(&peer("B"), &peer("me")).unwrap().label, "P2P");
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let (mut engine, directory) = engine("B", &["A"]);

        let outcome = engine.handle_frame(Some(&peer("A")), b"{\"@type\": 7}").await;

        assert_eq!(outcome.drop_reason(), Some(DropReason::Malformed));
        assert!(directory.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_sends_are_not_reported() {
        let directory = Arc::new(RecordingDirectory::new("B", ["A", "C", "E"]).failing_send_to("C"));
        let mut engine = RelayEngine::new(
            LocalIdentity::new("B"),
            directory.clone(),
            Arc::new(ScriptedOracle::new()),
            RelayConfig::default(),
        )
        .unwrap();

        let outcome = engine.handle(None, trace_request("D", &["A"])).await;

        assert_eq!(outcome.recipients(), &[peer("E")]);
    }

    #[tokio::test]
    async fn test_start_trace_marks_own_request() {
        let (mut engine, directory) = engine("A", &["B", "C"]);

        let started = engine.start_trace(peer("D")).await.unwrap();

        assert_eq!(started.sent, vec![peer("B"), peer("C")]);
        assert!(engine.seen().has_seen(&started.message_id));
        let request = decoded(&directory.sent()[0]);
        assert_eq!(request.route, route(&["A"]));

        // echo of our own request
        let echo = engine.handle(None, request.extended(&peer("B"))).await;
        assert_eq!(echo.drop_reason(), Some(DropReason::RouteLoop));
    }

    #[tokio::test]
    async fn test_start_gossip_skips_self_and_strangers() {
        let (mut engine, directory) = engine("A", &["B", "C"]);

        let started = engine
            .start_gossip(route(&["A", "B", "Z"]), json!("news"))
            .await
            .unwrap();

        assert_eq!(started.sent, vec![peer("B")]);
        assert_eq!(directory.sent().len(), 1);
        assert!(engine.seen().hash_of(&started.message_id).is_some());
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let result = RelayEngine::new(
            LocalIdentity::new("A"),
            Arc::new(RecordingDirectory::new("A", Vec::<&str>::new())),
            Arc::new(ScriptedOracle::new()),
            RelayConfig::default().with_seen_cache_capacity(0),
        );
        assert!(matches!(result, Err(RelayError::InvalidConfig { .. })));
    }
}
