//! # govmesh governance
//!
//! Evaluates machine-readable governance frameworks against the credentials
//! a node holds:
//!
//! - [`document`]: the framework document (schemas, credential definitions,
//!   participants, roles, permission rules)
//! - [`resolver`]: name-or-id lookup tables
//! - [`predicate`]: single-condition evaluation against a
//!   [`CredentialOracle`](govmesh_core::CredentialOracle)
//! - [`rules`]: ordered, short-circuiting rule evaluation producing the
//!   granted role set
//! - [`holdings`]: an oracle answering from a static holdings file
//!
//! # Example
//!
//! ```ignore
//! use govmesh_governance::{granted_roles, GovernanceDoc};
//!
//! let doc = GovernanceDoc::from_json_str(&framework_json)?;
//! let roles = granted_roles(&doc, &oracle).await;
//! if roles.contains("trader") {
//!     // advertise the trader role
//! }
//! ```

pub mod document;
pub mod error;
pub mod holdings;
pub mod predicate;
pub mod resolver;
pub mod rules;

pub use document::{Combinator, Condition, GovernanceDoc, LedgerEntry, Participant, PermissionRule};
pub use error::GovernanceError;
pub use holdings::{Holdings, HoldingsOracle, SchemaCredential};
pub use predicate::{evaluate_condition, PredicateEvaluator};
pub use resolver::NameTables;
pub use rules::{collect_granted, evaluate_rules, granted_roles, RuleDecision};
