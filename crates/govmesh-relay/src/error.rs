//! Relay errors
//!
//! Protocol decisions (drops, duplicates, dead ends) are reported as
//! [`RelayOutcome`](crate::RelayOutcome) values. `RelayError` covers the
//! failures a caller has to act on: codec faults, bad configuration and a
//! node runtime that is gone.

use thiserror::Error;

/// Errors raised by the relay codec, configuration and node runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// An envelope could not be serialized
    #[error("failed to encode envelope: {reason}")]
    Encode {
        /// Serializer message
        reason: String,
    },

    /// A frame is not a well-formed envelope
    #[error("malformed frame: {reason}")]
    Decode {
        /// Deserializer message
        reason: String,
    },

    /// Configuration rejected by validation
    #[error("invalid relay configuration: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: String,
    },

    /// The node task has stopped
    #[error("relay node {node} is no longer running")]
    NodeStopped {
        /// Primary id of the stopped node
        node: String,
    },
}

impl RelayError {
    /// Create an encode error
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a stopped-node error
    pub fn node_stopped(node: impl ToString) -> Self {
        Self::NodeStopped {
            node: node.to_string(),
        }
    }
}
