//! Static credential holdings
//!
//! A [`CredentialOracle`] answering from a declared list of credentials
//! instead of a live wallet. Used for offline evaluation and simulation:
//!
//! ```toml
//! identities = ["did:sov:Hzp6tiXwVbTwdU8eRWiN2M"]
//! cred_defs = ["Gk6YNB9x5w6FwhNBUKjUEY:3:CL:8974:EXPORTER"]
//!
//! [[schema_credentials]]
//! schema = "Gk6YNB9x5w6FwhNBUKjUEY:2:Trade-License:1.0"
//! issuer = "did:sov:Gk6YNB9x5w6FwhNBUKjUEY"
//! ```

use crate::error::GovernanceError;
use async_trait::async_trait;
use govmesh_core::{strip_namespace, CredentialOracle, OracleError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A credential instantiated from a schema by an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCredential {
    /// Schema ledger id
    pub schema: String,
    /// Issuer DID, qualified or bare
    pub issuer: String,
}

/// Credentials held by one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    /// DIDs owned by the holder
    #[serde(default)]
    pub identities: Vec<String>,
    /// Schema-based credentials
    #[serde(default)]
    pub schema_credentials: Vec<SchemaCredential>,
    /// Credential definition ids the holder has credentials under
    #[serde(default)]
    pub cred_defs: Vec<String>,
}

impl Holdings {
    /// Parse holdings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read holdings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, GovernanceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GovernanceError::holdings(path, e.to_string()))?;
        Self::from_toml_str(&text).map_err(|e| GovernanceError::holdings(path, e.to_string()))
    }
}

/// Oracle backed by a fixed [`Holdings`] list.
#[derive(Debug, Clone, Default)]
pub struct HoldingsOracle {
    holdings: Holdings,
}

impl HoldingsOracle {
    /// Wrap a holdings list.
    pub fn new(holdings: Holdings) -> Self {
        Self { holdings }
    }

    /// The underlying holdings
    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }
}

#[async_trait]
impl CredentialOracle for HoldingsOracle {
    async fn holds_schema_credential(
        &self,
        schema_id: &str,
        issuer_id: &str,
    ) -> Result<bool, OracleError> {
        let issuer = strip_namespace(issuer_id);
        Ok(self
            .holdings
            .schema_credentials
            .iter()
            .any(|c| c.schema == schema_id && strip_namespace(&c.issuer) == issuer))
    }

    async fn holds_identity(&self, peer_id: &str) -> Result<bool, OracleError> {
        let peer = strip_namespace(peer_id);
        Ok(self
            .holdings
            .identities
            .iter()
            .any(|own| strip_namespace(own) == peer))
    }

    async fn holds_cred_def_credential(&self, cred_def_id: &str) -> Result<bool, OracleError> {
        Ok(self.holdings.cred_defs.iter().any(|c| c == cred_def_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLDINGS: &str = r#"
identities = ["did:sov:Hzp6tiXwVbTwdU8eRWiN2M"]
cred_defs = ["Gk6Y:3:CL:8974:EXPORTER"]

[[schema_credentials]]
schema = "Gk6Y:2:Trade-License:1.0"
issuer = "did:sov:Gk6Y"
"#;

    fn oracle() -> HoldingsOracle {
        HoldingsOracle::new(Holdings::from_toml_str(HOLDINGS).unwrap())
    }

    #[tokio::test]
    async fn test_schema_credential_matches_bare_issuer() {
        let oracle = oracle();
        assert!(oracle
            .holds_schema_credential("Gk6Y:2:Trade-License:1.0", "Gk6Y")
            .await
            .unwrap());
        assert!(!oracle
            .holds_schema_credential("Gk6Y:2:Trade-License:1.0", "Other")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_identity_and_cred_def() {
        let oracle = oracle();
        assert!(oracle.holds_identity("Hzp6tiXwVbTwdU8eRWiN2M").await.unwrap());
        assert!(!oracle.holds_identity("someone").await.unwrap());
        assert!(oracle
            .holds_cred_def_credential("Gk6Y:3:CL:8974:EXPORTER")
            .await
            .unwrap());
    }

    #[test]
    fn test_empty_holdings_parse() {
        assert_eq!(Holdings::from_toml_str("").unwrap(), Holdings::default());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Holdings::load(Path::new("/nonexistent/holdings.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/holdings.toml"));
    }
}
