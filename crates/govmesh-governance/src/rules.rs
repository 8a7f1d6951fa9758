//! Permission rule engine
//!
//! Walks a document's permission rules in order and collects the roles whose
//! condition trees hold for the local holder. Children are evaluated in
//! order and short-circuit (`any` stops at the first hit, `and` at the first
//! miss), so the set of oracle calls is deterministic.

use crate::document::{Combinator, GovernanceDoc};
use crate::predicate::PredicateEvaluator;
use crate::resolver::NameTables;
use govmesh_core::{CredentialOracle, RoleName};
use std::collections::BTreeSet;
use tracing::debug;

/// Outcome of one permission rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecision {
    /// Position of the rule in the document
    pub index: usize,
    /// Whether the rule's combinator held
    pub granted: bool,
    /// Roles the rule grants
    pub roles: BTreeSet<RoleName>,
    /// Conditions evaluated before the combinator settled
    pub evaluated: usize,
}

/// Evaluate every rule of `doc` and report each decision.
pub async fn evaluate_rules<O>(doc: &GovernanceDoc, oracle: &O) -> Vec<RuleDecision>
where
    O: CredentialOracle + ?Sized,
{
    let tables = NameTables::from_doc(doc);
    let evaluator = PredicateEvaluator::new(&tables, oracle);
    let mut decisions = Vec::with_capacity(doc.permissions.len());

    for (index, rule) in doc.permissions.iter().enumerate() {
        let (granted, evaluated) = evaluate_combinator(&rule.when, &evaluator).await;
        debug!(index, granted, evaluated, roles = ?rule.grant, "permission rule evaluated");
        decisions.push(RuleDecision {
            index,
            granted,
            roles: rule.grant.clone(),
            evaluated,
        });
    }

    decisions
}

/// Roles the local holder may claim under `doc`.
pub async fn granted_roles<O>(doc: &GovernanceDoc, oracle: &O) -> BTreeSet<RoleName>
where
    O: CredentialOracle + ?Sized,
{
    collect_granted(evaluate_rules(doc, oracle).await)
}

/// Union of the roles of every granted decision.
pub fn collect_granted<I>(decisions: I) -> BTreeSet<RoleName>
where
    I: IntoIterator<Item = RuleDecision>,
{
    decisions
        .into_iter()
        .filter(|decision| decision.granted)
        .flat_map(|decision| decision.roles)
        .collect()
}

/// Returns the combinator result and how many children were evaluated.
///
/// An empty `any` is false and an empty `and` is true.
async fn evaluate_combinator<O>(
    combinator: &Combinator,
    evaluator: &PredicateEvaluator<'_, O>,
) -> (bool, usize)
where
    O: CredentialOracle + ?Sized,
{
    let mut evaluated = 0;
    match combinator {
        Combinator::Any(children) => {
            for child in children {
                evaluated += 1;
                if evaluator.evaluate(child).await {
                    return (true, evaluated);
                }
            }
            (false, evaluated)
        }
        Combinator::And(children) => {
            for child in children {
                evaluated += 1;
                if !evaluator.evaluate(child).await {
                    return (false, evaluated);
                }
            }
            (true, evaluated)
        }
    }
}
