//! Governance document model
//!
//! A machine-readable governance framework lists the schemas, credential
//! definitions and participants it trusts, the roles it defines, and
//! permission rules that grant roles when boolean combinations of
//! credential conditions hold:
//!
//! ```json
//! {
//!   "schemas": [{"id": "46rZ...:2:Cargo-License:2.0", "name": "Cargo licence"}],
//!   "participants": [{"id": "did:sov:46rZ...", "name": "trade_ministry"}],
//!   "roles": ["trader"],
//!   "permissions": [
//!     {"grant": ["trader"],
//!      "when": {"and": [{"schema": "Cargo licence", "issuer": "trade_ministry"}]}}
//!   ]
//! }
//! ```
//!
//! Fields govmesh does not interpret (`@context`, `name`, `version`,
//! participant `describe` blocks, ...) are kept so that a document relayed
//! through a node reaches the next hop unchanged.

use crate::error::GovernanceError;
use govmesh_core::RoleName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A governance framework document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDoc {
    /// Credential schemas referenced by the rules
    pub schemas: Vec<LedgerEntry>,
    /// Credential definitions referenced by the rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cred_defs: Vec<LedgerEntry>,
    /// Known issuers and members
    pub participants: Vec<Participant>,
    /// Roles this framework defines
    pub roles: Vec<RoleName>,
    /// Permission rules, evaluated in order
    pub permissions: Vec<PermissionRule>,
    /// Uninterpreted top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GovernanceDoc {
    /// Parse a document from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, GovernanceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a document from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, GovernanceError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Roles granted by some rule but missing from `roles`.
    pub fn undeclared_grants(&self) -> BTreeSet<&str> {
        self.permissions
            .iter()
            .flat_map(|rule| rule.grant.iter())
            .filter(|role| !self.roles.contains(role))
            .map(String::as_str)
            .collect()
    }
}

/// A schema or credential definition entry: canonical ledger id plus an
/// optional human name rules may use instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Canonical ledger identifier
    pub id: String,
    /// Human-readable alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Uninterpreted fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LedgerEntry {
    /// Entry with an id and a name.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            extra: Map::new(),
        }
    }
}

/// A participant (issuer or member) known to the framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Canonical identifier, usually a qualified DID
    pub id: String,
    /// Short name rules may use instead of the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// DID when it differs from `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// Uninterpreted fields such as `describe`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Participant {
    /// Participant with an id and a name.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            did: None,
            extra: Map::new(),
        }
    }
}

/// Grants `grant` when `when` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Roles granted by this rule
    pub grant: BTreeSet<RoleName>,
    /// Condition tree
    pub when: Combinator,
}

/// Boolean combinator over conditions.
///
/// Serialised as a single-key object, `{"and": [...]}` or `{"any": [...]}`;
/// any other shape is rejected when the document is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every condition must hold
    And(Vec<Condition>),
    /// At least one condition must hold
    Any(Vec<Condition>),
}

impl Combinator {
    /// The child conditions, in evaluation order
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::And(children) | Self::Any(children) => children,
        }
    }
}

/// A single credential condition.
///
/// Condition objects carry exactly one of `schema`, `id` or `cred_def`
/// (checked in that order) plus an optional `issuer`. Objects that match
/// none of these are kept as [`Condition::Unrecognized`] and never hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub enum Condition {
    /// Holder has a credential for `schema` issued by `issuer`
    SchemaHeld {
        /// Schema name or id
        schema: String,
        /// Issuer participant name or id
        issuer: Option<String>,
    },
    /// Holder owns the identity `participant`
    IdentityHeld {
        /// Participant name or id
        participant: String,
    },
    /// Holder has a credential issued under `cred_def`
    CredDefHeld {
        /// Credential definition name or id
        cred_def: String,
    },
    /// Shape govmesh does not understand
    Unrecognized(Map<String, Value>),
}

impl Condition {
    /// Schema condition.
    pub fn schema(schema: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self::SchemaHeld {
            schema: schema.into(),
            issuer: Some(issuer.into()),
        }
    }

    /// Identity condition.
    pub fn identity(participant: impl Into<String>) -> Self {
        Self::IdentityHeld {
            participant: participant.into(),
        }
    }

    /// Credential definition condition.
    pub fn cred_def(cred_def: impl Into<String>) -> Self {
        Self::CredDefHeld {
            cred_def: cred_def.into(),
        }
    }
}

const KEY_SCHEMA: &str = "schema";
const KEY_ISSUER: &str = "issuer";
const KEY_ID: &str = "id";
const KEY_CRED_DEF: &str = "cred_def";

fn non_empty_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

impl From<Map<String, Value>> for Condition {
    fn from(map: Map<String, Value>) -> Self {
        if map.contains_key(KEY_SCHEMA) {
            return match non_empty_text(&map, KEY_SCHEMA) {
                Some(schema) => Self::SchemaHeld {
                    schema,
                    issuer: non_empty_text(&map, KEY_ISSUER),
                },
                None => Self::Unrecognized(map),
            };
        }
        if map.contains_key(KEY_ID) {
            return match non_empty_text(&map, KEY_ID) {
                Some(participant) => Self::IdentityHeld { participant },
                None => Self::Unrecognized(map),
            };
        }
        if map.contains_key(KEY_CRED_DEF) {
            return match non_empty_text(&map, KEY_CRED_DEF) {
                Some(cred_def) => Self::CredDefHeld { cred_def },
                None => Self::Unrecognized(map),
            };
        }
        Self::Unrecognized(map)
    }
}

impl From<Condition> for Map<String, Value> {
    fn from(condition: Condition) -> Self {
        let mut map = Map::new();
        match condition {
            Condition::SchemaHeld { schema, issuer } => {
                map.insert(KEY_SCHEMA.to_string(), Value::String(schema));
                if let Some(issuer) = issuer {
                    map.insert(KEY_ISSUER.to_string(), Value::String(issuer));
                }
            }
            Condition::IdentityHeld { participant } => {
                map.insert(KEY_ID.to_string(), Value::String(participant));
            }
            Condition::CredDefHeld { cred_def } => {
                map.insert(KEY_CRED_DEF.to_string(), Value::String(cred_def));
            }
            Condition::Unrecognized(raw) => map = raw,
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(when: Value) -> Value {
        json!({
            "schemas": [],
            "participants": [],
            "roles": ["trader"],
            "permissions": [{"grant": ["trader"], "when": when}]
        })
    }

    #[test]
    fn test_parses_each_condition_shape() {
        let doc = GovernanceDoc::from_value(minimal(json!({"any": [
            {"schema": "Trade Licence", "issuer": "ministry"},
            {"id": "did:sov:abc"},
            {"cred_def": "Exporter License"},
            {"unexpected": true}
        ]})))
        .unwrap();

        let conditions = doc.permissions[0].when.conditions();
        assert_eq!(conditions[0], Condition::schema("Trade Licence", "ministry"));
        assert_eq!(conditions[1], Condition::identity("did:sov:abc"));
        assert_eq!(conditions[2], Condition::cred_def("Exporter License"));
        assert!(matches!(conditions[3], Condition::Unrecognized(_)));
    }

    #[test]
    fn test_schema_takes_precedence_over_id() {
        let condition: Condition =
            serde_json::from_value(json!({"id": "x", "schema": "s", "issuer": "i"})).unwrap();
        assert_eq!(condition, Condition::schema("s", "i"));
    }

    #[test]
    fn test_schema_without_issuer_is_kept() {
        let condition: Condition = serde_json::from_value(json!({"schema": "s"})).unwrap();
        assert_eq!(
            condition,
            Condition::SchemaHeld {
                schema: "s".into(),
                issuer: None
            }
        );
    }

    #[test]
    fn test_non_string_key_is_unrecognized() {
        let condition: Condition = serde_json::from_value(json!({"cred_def": 7})).unwrap();
        assert!(matches!(condition, Condition::Unrecognized(_)));
    }

    #[test]
    fn test_when_requires_exactly_one_known_key() {
        assert!(GovernanceDoc::from_value(minimal(json!({}))).is_err());
        assert!(GovernanceDoc::from_value(minimal(json!({"or": []}))).is_err());
        assert!(GovernanceDoc::from_value(minimal(json!({"and": [], "any": []}))).is_err());
        assert!(GovernanceDoc::from_value(minimal(json!({"and": {"schema": "s"}}))).is_err());
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let err = GovernanceDoc::from_value(json!({
            "schemas": [], "participants": [], "roles": []
        }))
        .unwrap_err();
        assert!(matches!(err, GovernanceError::MalformedDocument { .. }));
        assert!(err.to_string().contains("permissions"));
    }

    #[test]
    fn test_cred_defs_are_optional() {
        let doc = GovernanceDoc::from_value(minimal(json!({"and": []}))).unwrap();
        assert!(doc.cred_defs.is_empty());
    }

    #[test]
    fn test_uninterpreted_fields_survive_reserialisation() {
        let mut value = minimal(json!({"and": [{"schema": "s", "issuer": "i"}]}));
        value["@context"] = json!(["https://example.org/context.jsonld"]);
        value["participants"] = json!([{
            "id": "did:sov:abc",
            "name": "ministry",
            "describe": {"label": "Ministry", "website": "example.org"}
        }]);

        let doc = GovernanceDoc::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&doc).unwrap(), value);
    }

    #[test]
    fn test_undeclared_grants() {
        let mut value = minimal(json!({"and": []}));
        value["permissions"][0]["grant"] = json!(["trader", "smuggler"]);
        let doc = GovernanceDoc::from_value(value).unwrap();

        assert_eq!(doc.undeclared_grants().into_iter().collect::<Vec<_>>(), vec!["smuggler"]);
    }
}
