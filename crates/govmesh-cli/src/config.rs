//! CLI configuration file
//!
//! ```toml
//! [node]
//! id = "did:sov:Gk6YNB9x5w6FwhNBUKjUEY"
//! aliases = ["Gk6YNB9x5w6FwhNBUKjUEY"]
//!
//! [relay]
//! seen_cache_capacity = 10000
//! compliance_dedup = false
//!
//! [log]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use govmesh_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identity of the local node
    pub node: NodeSection,
    /// Relay tunables
    pub relay: RelayConfig,
    /// Logging
    pub log: LogSection,
}

/// `[node]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Primary peer id
    pub id: Option<String>,
    /// Further ids the node answers to
    pub aliases: Vec<String>,
}

/// `[log]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// `tracing` filter directive
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.relay.validate()?;
        Ok(config)
    }
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<NodeConfig> {
    if !path.exists() {
        return Ok(NodeConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    NodeConfig::from_toml_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}
