//! Core identifier types
//!
//! Peers are addressed by decentralized identifiers (DIDs). A DID may arrive
//! fully qualified (`did:sov:VbNrngVsD113FC5gWsHsC2`) or bare
//! (`VbNrngVsD113FC5gWsHsC2`); [`strip_namespace`] maps both to the bare form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Name of a role granted by a governance framework (e.g. `"trader"`).
pub type RoleName = String;

/// Drop any namespace prefix from an identifier, keeping the last `:` segment.
///
/// `did:sov:ABC` becomes `ABC`; an identifier without `:` is returned as is.
pub fn strip_namespace(id: &str) -> &str {
    id.rsplit(':').next().unwrap_or(id)
}

/// Identifier of a peer in the trust network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a peer id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier with its namespace prefix removed
    pub fn unqualified(&self) -> &str {
        strip_namespace(&self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a relay message.
///
/// Forwarded copies of a message keep the id of the original so that every
/// node can recognise repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Create a new random message ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The set of identities a node answers to.
///
/// A node appears on the network under a primary id and, in pairwise
/// deployments, under one alias per connection. All of them count as "self"
/// for loop detection, originator checks and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    primary: PeerId,
    aliases: BTreeSet<PeerId>,
}

impl LocalIdentity {
    /// Identity with a single id
    pub fn new(primary: impl Into<PeerId>) -> Self {
        Self {
            primary: primary.into(),
            aliases: BTreeSet::new(),
        }
    }

    /// Add further ids this node answers to
    pub fn with_aliases<I, P>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PeerId>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self.aliases.remove(&self.primary);
        self
    }

    /// The id this node stamps on routes and graphs
    pub fn primary(&self) -> &PeerId {
        &self.primary
    }

    /// Whether `peer` is one of this node's identities.
    ///
    /// Comparison ignores namespace prefixes, so `did:sov:X` matches `X`.
    pub fn contains(&self, peer: &PeerId) -> bool {
        let bare = peer.unqualified();
        self.iter().any(|own| own == peer || own.unqualified() == bare)
    }

    /// Iterate over the primary id followed by the aliases
    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        std::iter::once(&self.primary).chain(self.aliases.iter())
    }
}
