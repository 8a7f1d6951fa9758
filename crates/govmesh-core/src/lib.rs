//! # govmesh core
//!
//! Foundation types shared by the governance engine and the relay protocol:
//!
//! - Identifiers: [`PeerId`], [`MessageId`], [`RoleName`] and the node's
//!   [`LocalIdentity`]
//! - Capability traits consumed from the outside world:
//!   [`CredentialOracle`] and [`PeerDirectory`]
//! - Deterministic content hashing ([`ContentHash`])
//!
//! This crate carries no protocol logic. Identity management, credential
//! issuance and transports live outside govmesh and are reached only through
//! the traits in [`effects`].

pub mod effects;
pub mod hash;
pub mod identifiers;

pub use effects::{
    CredentialOracle, NetworkError, OracleError, PeerDirectory, PeerLink,
};
pub use hash::ContentHash;
pub use identifiers::{strip_namespace, LocalIdentity, MessageId, PeerId, RoleName};
