//! Sequential node runtime
//!
//! A [`RelayNode`] owns one [`RelayEngine`] and drains a single inbound
//! queue on one task, so handlers for a node never overlap. Transports push
//! frames through a cloneable [`NodeHandle`]; application events come out
//! of a bounded channel. A slow event consumer slows the node down rather
//! than losing events.

use crate::error::RelayError;
use crate::events::NodeEvent;
use crate::protocol::{Originated, RelayEngine};
use govmesh_core::{CredentialOracle, PeerDirectory, PeerId};
use govmesh_governance::GovernanceDoc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// A frame received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Transport-level sender, when known
    pub sender: Option<PeerId>,
    /// Encoded envelope
    pub frame: Vec<u8>,
}

impl Inbound {
    /// Frame received from `sender`
    pub fn from_peer(sender: impl Into<PeerId>, frame: Vec<u8>) -> Self {
        Self {
            sender: Some(sender.into()),
            frame,
        }
    }
}

type Reply = oneshot::Sender<Result<Originated, RelayError>>;

enum Command {
    Inbound(Inbound),
    StartTrace {
        target: PeerId,
        reply: Reply,
    },
    StartGossip {
        members: Vec<PeerId>,
        content: Value,
        reply: Reply,
    },
    StartCompliance {
        doc: Box<GovernanceDoc>,
        reply: Reply,
    },
    Shutdown,
}

/// Cloneable handle to a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: PeerId,
    commands: mpsc::UnboundedSender<Command>,
}

impl NodeHandle {
    /// Primary id of the node
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Queue an inbound frame. Never blocks.
    pub fn deliver(&self, inbound: Inbound) -> Result<(), RelayError> {
        self.submit(Command::Inbound(inbound))
    }

    /// Start a trace towards `target`
    pub async fn start_trace(&self, target: impl Into<PeerId>) -> Result<Originated, RelayError> {
        let target = target.into();
        self.request(|reply| Command::StartTrace { target, reply })
            .await
    }

    /// Gossip `content` to `members`
    pub async fn start_gossip(
        &self,
        members: Vec<PeerId>,
        content: Value,
    ) -> Result<Originated, RelayError> {
        self.request(|reply| Command::StartGossip {
            members,
            content,
            reply,
        })
        .await
    }

    /// Start a compliance query for `doc`
    pub async fn start_compliance_query(
        &self,
        doc: GovernanceDoc,
    ) -> Result<Originated, RelayError> {
        self.request(|reply| Command::StartCompliance {
            doc: Box::new(doc),
            reply,
        })
        .await
    }

    /// Ask the node to stop after the commands already queued
    pub fn shutdown(&self) -> Result<(), RelayError> {
        self.submit(Command::Shutdown)
    }

    fn submit(&self, command: Command) -> Result<(), RelayError> {
        self.commands
            .send(command)
            .map_err(|_| RelayError::node_stopped(&self.id))
    }

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> Command,
    ) -> Result<Originated, RelayError> {
        let (reply, response) = oneshot::channel();
        self.submit(command(reply))?;
        response
            .await
            .map_err(|_| RelayError::node_stopped(&self.id))?
    }
}

/// A node running on its own task.
#[derive(Debug)]
pub struct SpawnedNode {
    /// Handle for transports and the application
    pub handle: NodeHandle,
    /// Application events
    pub events: mpsc::Receiver<NodeEvent>,
    /// The node task
    pub task: JoinHandle<()>,
}

/// The task body of a node.
pub struct RelayNode<D: ?Sized, O: ?Sized> {
    engine: RelayEngine<D, O>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<NodeEvent>,
}

impl<D, O> RelayNode<D, O>
where
    D: PeerDirectory + ?Sized + 'static,
    O: CredentialOracle + ?Sized + 'static,
{
    /// Wrap `engine`; returns the node, its handle and its event stream.
    pub fn new(engine: RelayEngine<D, O>) -> (Self, NodeHandle, mpsc::Receiver<NodeEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(engine.config().event_buffer.max(1));
        let handle = NodeHandle {
            id: engine.identity().primary().clone(),
            commands: command_tx,
        };
        let node = Self {
            engine,
            commands: command_rx,
            events: event_tx,
        };
        (node, handle, event_rx)
    }

    /// Run `engine` on a new tokio task.
    pub fn spawn(engine: RelayEngine<D, O>) -> SpawnedNode {
        let (node, handle, events) = Self::new(engine);
        let task = tokio::spawn(node.run());
        SpawnedNode {
            handle,
            events,
            task,
        }
    }

    /// Process commands until shut down or every handle is dropped.
    pub async fn run(mut self) {
        let id = self.engine.identity().primary().clone();
        debug!(node = %id, "relay node started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Inbound(inbound) => {
                    let outcome = self
                        .engine
                        .handle_frame(inbound.sender.as_ref(), &inbound.frame)
                        .await;
                    if let Some(event) = outcome.into_event() {
                        self.emit(event).await;
                    }
                }
                Command::StartTrace { target, reply } => {
                    let result = self.engine.start_trace(target).await;
                    Self::answer(reply, result);
                }
                Command::StartGossip {
                    members,
                    content,
                    reply,
                } => {
                    let result = self.engine.start_gossip(members, content).await;
                    Self::answer(reply, result);
                }
                Command::StartCompliance { doc, reply } => {
                    let result = self.engine.start_compliance_query(*doc).await;
                    Self::answer(reply, result);
                }
                Command::Shutdown => break,
            }
        }

        info!(node = %id, "relay node stopped");
    }

    async fn emit(&self, event: NodeEvent) {
        if self.events.send(event).await.is_err() {
            trace!("event receiver dropped, discarding event");
        }
    }

    fn answer(reply: Reply, result: Result<Originated, RelayError>) {
        if reply.send(result).is_err() {
            trace!("originator stopped waiting for the reply");
        }
    }
}
