//! Name resolution
//!
//! Rules may reference schemas, credential definitions and participants by
//! human name or by canonical id. Each reference goes through one lookup:
//! the name table first, the literal value otherwise.

use crate::document::GovernanceDoc;
use std::collections::HashMap;

/// Lookup tables built once per document.
#[derive(Debug, Clone, Default)]
pub struct NameTables {
    schemas: HashMap<String, String>,
    cred_defs: HashMap<String, String>,
    participants: HashMap<String, String>,
}

impl NameTables {
    /// Build the tables from a document. Later entries overwrite earlier
    /// ones with the same name.
    pub fn from_doc(doc: &GovernanceDoc) -> Self {
        let mut tables = Self::default();

        for entry in &doc.schemas {
            if let Some(name) = &entry.name {
                tables.schemas.insert(name.clone(), entry.id.clone());
            }
        }
        for entry in &doc.cred_defs {
            if let Some(name) = &entry.name {
                tables.cred_defs.insert(name.clone(), entry.id.clone());
            }
        }
        // Participants resolve from their name and from their own id.
        for participant in &doc.participants {
            tables
                .participants
                .insert(participant.id.clone(), participant.id.clone());
            if let Some(name) = &participant.name {
                tables
                    .participants
                    .insert(name.clone(), participant.id.clone());
            }
        }

        tables
    }

    /// Canonical schema id for a name or id
    pub fn schema<'a>(&'a self, reference: &'a str) -> &'a str {
        resolve(&self.schemas, reference)
    }

    /// Canonical credential definition id for a name or id
    pub fn cred_def<'a>(&'a self, reference: &'a str) -> &'a str {
        resolve(&self.cred_defs, reference)
    }

    /// Canonical participant id for a name or id
    pub fn participant<'a>(&'a self, reference: &'a str) -> &'a str {
        resolve(&self.participants, reference)
    }
}

fn resolve<'a>(table: &'a HashMap<String, String>, reference: &'a str) -> &'a str {
    table.get(reference).map(String::as_str).unwrap_or(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LedgerEntry, Participant};
    use serde_json::Map;

    fn doc() -> GovernanceDoc {
        GovernanceDoc {
            schemas: vec![
                LedgerEntry::named("S1:2:Trade:1.0", "Trade Licence"),
                LedgerEntry::named("S2:2:Trade:2.0", "Trade Licence"),
            ],
            cred_defs: vec![LedgerEntry::named("C1:3:CL:1:EXP", "Exporter")],
            participants: vec![Participant::named("did:sov:M1", "ministry")],
            roles: vec![],
            permissions: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn test_names_resolve_to_ids() {
        let tables = NameTables::from_doc(&doc());
        assert_eq!(tables.cred_def("Exporter"), "C1:3:CL:1:EXP");
        assert_eq!(tables.participant("ministry"), "did:sov:M1");
        assert_eq!(tables.participant("did:sov:M1"), "did:sov:M1");
    }

    #[test]
    fn test_unknown_reference_is_literal() {
        let tables = NameTables::from_doc(&doc());
        assert_eq!(tables.schema("X:2:Other:1.0"), "X:2:Other:1.0");
        assert_eq!(tables.participant("did:sov:unknown"), "did:sov:unknown");
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let tables = NameTables::from_doc(&doc());
        assert_eq!(tables.schema("Trade Licence"), "S2:2:Trade:2.0");
    }
}
