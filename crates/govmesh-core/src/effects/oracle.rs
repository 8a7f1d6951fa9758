//! Credential oracle trait
//!
//! Answers credential-possession questions about the local holder. Proof
//! construction and verification stay inside the identity SDK behind this
//! trait; govmesh only sees the boolean.

use async_trait::async_trait;
use thiserror::Error;

/// Failure inside an oracle implementation.
///
/// The permission engine never propagates these: a failed check counts as
/// "not held".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The referenced schema or credential definition could not be loaded
    #[error("unknown ledger object: {id}")]
    UnknownObject {
        /// Schema or credential definition id
        id: String,
    },
    /// The wallet or SDK backing the oracle failed
    #[error("credential backend failure: {reason}")]
    Backend {
        /// Description of the failure
        reason: String,
    },
}

impl OracleError {
    /// Create an unknown-object error.
    pub fn unknown_object(id: impl Into<String>) -> Self {
        Self::UnknownObject { id: id.into() }
    }

    /// Create a backend error.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Yes/no questions about credentials held by the local node.
///
/// All identifiers are passed already resolved and, for issuers and
/// identities, stripped of namespace prefixes.
#[async_trait]
pub trait CredentialOracle: Send + Sync {
    /// Does the holder have a credential built on `schema_id`, issued by
    /// `issuer_id`, with at least one provable attribute?
    async fn holds_schema_credential(
        &self,
        schema_id: &str,
        issuer_id: &str,
    ) -> Result<bool, OracleError>;

    /// Is `peer_id` one of the local node's own identities?
    async fn holds_identity(&self, peer_id: &str) -> Result<bool, OracleError>;

    /// Does the holder have a credential issued under `cred_def_id` with at
    /// least one provable attribute?
    async fn holds_cred_def_credential(&self, cred_def_id: &str) -> Result<bool, OracleError>;
}

#[async_trait]
impl<T: CredentialOracle + ?Sized> CredentialOracle for std::sync::Arc<T> {
    async fn holds_schema_credential(
        &self,
        schema_id: &str,
        issuer_id: &str,
    ) -> Result<bool, OracleError> {
        (**self).holds_schema_credential(schema_id, issuer_id).await
    }

    async fn holds_identity(&self, peer_id: &str) -> Result<bool, OracleError> {
        (**self).holds_identity(peer_id).await
    }

    async fn holds_cred_def_credential(&self, cred_def_id: &str) -> Result<bool, OracleError> {
        (**self).holds_cred_def_credential(cred_def_id).await
    }
}
