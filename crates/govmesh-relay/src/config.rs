//! Relay configuration

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default number of message ids remembered for deduplication.
pub const DEFAULT_SEEN_CACHE_CAPACITY: usize = 10_000;

/// Label carried by relay observations when none is configured.
pub const DEFAULT_LINK_LABEL: &str = "P2P";

/// Display name of the synthetic self node when none is configured.
pub const DEFAULT_SELF_LABEL: &str = "MySelf";

/// Default capacity of the application event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Tunables of a relay node.
///
/// Deserializes from a partial table; missing keys take their defaults:
///
/// ```toml
/// [relay]
/// seen_cache_capacity = 10000
/// compliance_dedup = false
/// link_label = "P2P"
/// self_label = "MySelf"
/// event_buffer = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Message ids kept in the seen cache before LRU eviction
    pub seen_cache_capacity: usize,
    /// Process each compliance query id at most once
    pub compliance_dedup: bool,
    /// Label attached to relay observations (role label and edge label)
    pub link_label: String,
    /// Display name of the synthetic self node in localised graphs
    pub self_label: String,
    /// Capacity of the application event channel
    pub event_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            seen_cache_capacity: DEFAULT_SEEN_CACHE_CAPACITY,
            compliance_dedup: false,
            link_label: DEFAULT_LINK_LABEL.to_string(),
            self_label: DEFAULT_SELF_LABEL.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Enable compliance query deduplication
    pub fn with_compliance_dedup(mut self, enabled: bool) -> Self {
        self.compliance_dedup = enabled;
        self
    }

    /// Set the seen cache capacity
    pub fn with_seen_cache_capacity(mut self, capacity: usize) -> Self {
        self.seen_cache_capacity = capacity;
        self
    }

    /// Check the configuration can be used to build a node.
    pub fn validate(&self) -> Result<(), RelayError> {
        self.seen_capacity()?;
        if self.event_buffer == 0 {
            return Err(RelayError::invalid_config("event_buffer must be positive"));
        }
        if self.link_label.is_empty() {
            return Err(RelayError::invalid_config("link_label must not be empty"));
        }
        Ok(())
    }

    /// Seen cache capacity as a non-zero count.
    pub fn seen_capacity(&self) -> Result<NonZeroUsize, RelayError> {
        NonZeroUsize::new(self.seen_cache_capacity)
            .ok_or_else(|| RelayError::invalid_config("seen_cache_capacity must be positive"))
    }
}
