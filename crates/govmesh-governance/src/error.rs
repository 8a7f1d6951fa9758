//! Governance error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading governance documents and credential holdings.
///
/// Evaluation itself never fails; these only arise while reading input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    /// The document is not valid JSON or is missing a required field.
    #[error("malformed governance document: {reason}")]
    MalformedDocument {
        /// Parser message
        reason: String,
    },

    /// A credential holdings file could not be read or parsed.
    #[error("invalid holdings file {path}: {reason}")]
    Holdings {
        /// File that failed
        path: PathBuf,
        /// Reason for the failure
        reason: String,
    },
}

impl GovernanceError {
    /// Create a malformed document error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }

    /// Create a holdings file error.
    pub fn holdings(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Holdings {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}
