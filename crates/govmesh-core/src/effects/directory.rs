//! Peer directory trait
//!
//! The directory knows which peers the local node has a live channel to and
//! carries encoded frames over those channels. Sends are fire-and-forget: the
//! relay logs a failed send and moves on.

use crate::identifiers::PeerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A bidirectional channel between the local node and one remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerLink {
    /// Identity the local node uses on this channel
    pub local: PeerId,
    /// The remote end
    pub remote: PeerId,
}

impl PeerLink {
    /// Create a link between `local` and `remote`.
    pub fn new(local: impl Into<PeerId>, remote: impl Into<PeerId>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// The same channel seen from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            local: self.remote.clone(),
            remote: self.local.clone(),
        }
    }
}

impl fmt::Display for PeerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.local, self.remote)
    }
}

/// Network operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The peer has no channel in this directory
    #[error("peer unreachable: {peer_id}")]
    PeerUnreachable {
        /// Identifier of the unreachable peer
        peer_id: PeerId,
    },
    /// The transport refused or lost the frame
    #[error("failed to send frame over {link}: {reason}")]
    SendFailed {
        /// Channel the send targeted
        link: PeerLink,
        /// Reason for the failure
        reason: String,
    },
}

impl NetworkError {
    /// Create an unreachable-peer error.
    pub fn unreachable(peer_id: PeerId) -> Self {
        Self::PeerUnreachable { peer_id }
    }

    /// Create a send failure.
    pub fn send_failed(link: &PeerLink, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            link: link.clone(),
            reason: reason.into(),
        }
    }
}

/// Access to the local node's direct peers.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Remote ids of every peer with a live channel.
    async fn connected_peers(&self) -> Vec<PeerId>;

    /// The channel to `peer`, if one exists.
    async fn resolve(&self, peer: &PeerId) -> Option<PeerLink>;

    /// Queue an encoded frame on `link`. Does not wait for delivery.
    async fn send_to(&self, link: &PeerLink, frame: Vec<u8>) -> Result<(), NetworkError>;
}

#[async_trait]
impl<T: PeerDirectory + ?Sized> PeerDirectory for std::sync::Arc<T> {
    async fn connected_peers(&self) -> Vec<PeerId> {
        (**self).connected_peers().await
    }

    async fn resolve(&self, peer: &PeerId) -> Option<PeerLink> {
        (**self).resolve(peer).await
    }

    async fn send_to(&self, link: &PeerLink, frame: Vec<u8>) -> Result<(), NetworkError> {
        (**self).send_to(link, frame).await
    }
}
