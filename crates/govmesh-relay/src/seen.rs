//! Seen-message cache
//!
//! Remembers which message ids a node has processed and, for gossip, the
//! hash of the graph it last saw under each id. Bounded by an LRU so a long
//! running node keeps constant memory; an evicted id is treated as new if
//! it shows up again.

use govmesh_core::{ContentHash, MessageId};
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::trace;

/// How a message id relates to what the cache has recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// Id not seen before (or evicted since)
    First,
    /// Id seen with the same content hash
    Unchanged,
    /// Id seen with a different content hash; the cache now holds the new one
    Changed,
}

/// Bounded map from message id to last known content hash.
#[derive(Debug)]
pub struct SeenMessages {
    entries: LruCache<MessageId, Option<ContentHash>>,
}

impl SeenMessages {
    /// Cache holding at most `capacity` ids
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Mark `id` as seen.
    ///
    /// Returns true if this is the first sighting.
    pub fn check_and_mark(&mut self, id: MessageId) -> bool {
        if self.entries.get(&id).is_some() {
            return false;
        }
        self.entries.put(id, None);
        true
    }

    /// Record `hash` under `id` and report how it compares.
    pub fn observe(&mut self, id: MessageId, hash: ContentHash) -> Sighting {
        match self.entries.get_mut(&id) {
            None => {
                if self.entries.len() == self.entries.cap().get() {
                    trace!(capacity = self.entries.cap().get(), "seen cache full, evicting oldest id");
                }
                self.entries.put(id, Some(hash));
                Sighting::First
            }
            Some(known) if *known == Some(hash) => Sighting::Unchanged,
            Some(known) => {
                *known = Some(hash);
                Sighting::Changed
            }
        }
    }

    /// Whether `id` is cached, without refreshing its recency
    pub fn has_seen(&self, id: &MessageId) -> bool {
        self.entries.contains(id)
    }

    /// Last hash recorded for `id`
    pub fn hash_of(&self, id: &MessageId) -> Option<ContentHash> {
        self.entries.peek(id).copied().flatten()
    }

    /// Number of cached ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached ids
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Forget every id
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
