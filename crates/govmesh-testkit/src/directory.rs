//! Recording peer directory

use async_trait::async_trait;
use govmesh_core::{NetworkError, PeerDirectory, PeerId, PeerLink};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// A frame captured by [`RecordingDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Channel the frame was queued on
    pub link: PeerLink,
    /// Encoded frame
    pub frame: Vec<u8>,
}

impl SentFrame {
    /// Remote end of the channel
    pub fn to(&self) -> &PeerId {
        &self.link.remote
    }

    /// The frame decoded as generic JSON
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.frame).unwrap_or(Value::Null)
    }

    /// The `@type` field of the frame, if any
    pub fn message_type(&self) -> Option<String> {
        self.json()
            .get("@type")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

/// Directory with a fixed neighbour set that records sends.
#[derive(Debug)]
pub struct RecordingDirectory {
    local: PeerId,
    peers: BTreeSet<PeerId>,
    failing: BTreeSet<PeerId>,
    sent: Mutex<Vec<SentFrame>>,
}

impl RecordingDirectory {
    /// Directory for `local` connected to `peers`
    pub fn new<I, P>(local: impl Into<PeerId>, peers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PeerId>,
    {
        Self {
            local: local.into(),
            peers: peers.into_iter().map(Into::into).collect(),
            failing: BTreeSet::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make sends to `peer` fail while it stays resolvable
    pub fn failing_send_to(mut self, peer: impl Into<PeerId>) -> Self {
        self.failing.insert(peer.into());
        self
    }

    /// Frames sent so far, in order
    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the frames sent so far
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Remote ids of the frames sent so far, in order
    pub fn recipients(&self) -> Vec<PeerId> {
        self.sent().iter().map(|f| f.to().clone()).collect()
    }
}

#[async_trait]
impl PeerDirectory for RecordingDirectory {
    async fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.iter().cloned().collect()
    }

    async fn resolve(&self, peer: &PeerId) -> Option<PeerLink> {
        self.peers
            .contains(peer)
            .then(|| PeerLink::new(self.local.clone(), peer.clone()))
    }

    async fn send_to(&self, link: &PeerLink, frame: Vec<u8>) -> Result<(), NetworkError> {
        if !self.peers.contains(&link.remote) {
            return Err(NetworkError::unreachable(link.remote.clone()));
        }
        if self.failing.contains(&link.remote) {
            return Err(NetworkError::send_failed(link, "scripted send failure"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentFrame {
                link: link.clone(),
                frame,
            });
        Ok(())
    }
}
