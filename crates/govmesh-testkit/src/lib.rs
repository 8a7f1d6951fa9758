//! # govmesh testkit
//!
//! Test doubles for the capability traits in `govmesh-core`, plus fixture
//! documents:
//!
//! - [`ScriptedOracle`]: answers from a scripted credential set, records
//!   every call and can inject faults
//! - [`RecordingDirectory`]: a fixed neighbour set that captures outbound
//!   frames instead of sending them
//! - [`fixtures`]: governance framework documents in wire form
//!
//! Depends only on `govmesh-core` so every crate can use it as a
//! dev-dependency.

pub mod directory;
pub mod fixtures;
pub mod oracle;

pub use directory::{RecordingDirectory, SentFrame};
pub use oracle::ScriptedOracle;
