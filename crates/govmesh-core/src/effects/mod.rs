//! Capability traits consumed by govmesh
//!
//! govmesh never talks to a wallet, ledger or socket directly. The permission
//! engine asks a [`CredentialOracle`] yes/no questions about the local
//! holder's credentials, and the relay reaches peers through a
//! [`PeerDirectory`]. Production implementations wrap an identity SDK and a
//! transport; tests use the doubles in `govmesh-testkit`.

pub mod directory;
pub mod oracle;

pub use directory::{NetworkError, PeerDirectory, PeerLink};
pub use oracle::{CredentialOracle, OracleError};
