//! Scripted credential oracle

use async_trait::async_trait;
use govmesh_core::{CredentialOracle, OracleError};
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Oracle answering from a scripted credential set.
///
/// Every call is logged as a short line (`"schema <schema> <issuer>"`,
/// `"identity <id>"`, `"cred_def <id>"`) so tests can assert on call order
/// and short-circuiting.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    schema_credentials: BTreeSet<(String, String)>,
    identities: BTreeSet<String>,
    cred_defs: BTreeSet<String>,
    failing: BTreeSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    /// Oracle that holds nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a credential for `schema_id` issued by `issuer_id`
    pub fn with_schema_credential(mut self, schema_id: &str, issuer_id: &str) -> Self {
        self.schema_credentials
            .insert((schema_id.to_string(), issuer_id.to_string()));
        self
    }

    /// Own the identity `peer_id`
    pub fn with_identity(mut self, peer_id: &str) -> Self {
        self.identities.insert(peer_id.to_string());
        self
    }

    /// Hold a credential issued under `cred_def_id`
    pub fn with_cred_def_credential(mut self, cred_def_id: &str) -> Self {
        self.cred_defs.insert(cred_def_id.to_string());
        self
    }

    /// Fail any call that mentions `id`
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, line: String, ids: &[&str]) -> Result<(), OracleError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
        match ids.iter().find(|id| self.failing.contains(**id)) {
            Some(id) => Err(OracleError::backend(format!("scripted failure on {id}"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CredentialOracle for ScriptedOracle {
    async fn holds_schema_credential(
        &self,
        schema_id: &str,
        issuer_id: &str,
    ) -> Result<bool, OracleError> {
        self.record(
            format!("schema {schema_id} {issuer_id}"),
            &[schema_id, issuer_id],
        )?;
        Ok(self
            .schema_credentials
            .contains(&(schema_id.to_string(), issuer_id.to_string())))
    }

    async fn holds_identity(&self, peer_id: &str) -> Result<bool, OracleError> {
        self.record(format!("identity {peer_id}"), &[peer_id])?;
        Ok(self.identities.contains(peer_id))
    }

    async fn holds_cred_def_credential(&self, cred_def_id: &str) -> Result<bool, OracleError> {
        self.record(format!("cred_def {cred_def_id}"), &[cred_def_id])?;
        Ok(self.cred_defs.contains(cred_def_id))
    }
}
