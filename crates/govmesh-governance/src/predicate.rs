//! Predicate evaluation
//!
//! Turns one [`Condition`] into a definite boolean by resolving its
//! references and asking the [`CredentialOracle`]. Oracle faults count as
//! "not held": a permission check always produces an answer.

use crate::document::{Condition, GovernanceDoc};
use crate::resolver::NameTables;
use govmesh_core::{strip_namespace, CredentialOracle, OracleError};
use tracing::{debug, trace, warn};

/// Evaluates conditions of one document against one oracle.
pub struct PredicateEvaluator<'a, O: ?Sized> {
    tables: &'a NameTables,
    oracle: &'a O,
}

impl<'a, O> PredicateEvaluator<'a, O>
where
    O: CredentialOracle + ?Sized,
{
    /// Create an evaluator over prepared name tables.
    pub fn new(tables: &'a NameTables, oracle: &'a O) -> Self {
        Self { tables, oracle }
    }

    /// Evaluate a single condition.
    pub async fn evaluate(&self, condition: &Condition) -> bool {
        match condition {
            Condition::SchemaHeld { schema, issuer } => {
                let Some(issuer) = issuer else {
                    debug!(%schema, "schema condition without issuer never holds");
                    return false;
                };
                let schema_id = self.tables.schema(schema);
                let issuer_id = strip_namespace(self.tables.participant(issuer));
                trace!(schema_id, issuer_id, "checking schema credential");
                settle(
                    "schema",
                    self.oracle
                        .holds_schema_credential(schema_id, issuer_id)
                        .await,
                )
            }
            Condition::IdentityHeld { participant } => {
                let peer_id = strip_namespace(self.tables.participant(participant));
                trace!(peer_id, "checking identity");
                settle("identity", self.oracle.holds_identity(peer_id).await)
            }
            Condition::CredDefHeld { cred_def } => {
                let cred_def_id = self.tables.cred_def(cred_def);
                trace!(cred_def_id, "checking cred-def credential");
                settle(
                    "cred_def",
                    self.oracle.holds_cred_def_credential(cred_def_id).await,
                )
            }
            Condition::Unrecognized(raw) => {
                debug!(keys = ?raw.keys().collect::<Vec<_>>(), "unrecognized condition never holds");
                false
            }
        }
    }
}

fn settle(kind: &str, answer: Result<bool, OracleError>) -> bool {
    match answer {
        Ok(held) => held,
        Err(error) => {
            warn!(kind, %error, "credential oracle failed; treating condition as not held");
            false
        }
    }
}

/// Evaluate one condition in the context of `doc`.
///
/// Builds the document's name tables on every call; use
/// [`PredicateEvaluator`] directly when evaluating many conditions.
pub async fn evaluate_condition<O>(condition: &Condition, doc: &GovernanceDoc, oracle: &O) -> bool
where
    O: CredentialOracle + ?Sized,
{
    let tables = NameTables::from_doc(doc);
    PredicateEvaluator::new(&tables, oracle)
        .evaluate(condition)
        .await
}
