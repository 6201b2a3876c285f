//! # wirelink-store: SQL-backed device and key store
//!
//! Persists a messaging client's cryptographic key material and protocol
//! state in a relational database, and self-upgrades that schema across
//! releases without manual intervention.
//!
//! The heart of the crate is the upgrade engine: version detection, ordered
//! step application, per-step transactional atomicity, and dialect-sensitive
//! SQL generation for the supported engine families (SQLite and Postgres).
//! Most callers only need [`Store::connect`] followed by [`Store::upgrade`].

pub mod dialect;
pub mod error;
pub mod migrations;
pub mod schema;
pub mod store;

// Re-export core types
pub use dialect::Dialect;
pub use error::{StoreError, StoreResult};
pub use migrations::registry::MigrationRegistry;
pub use migrations::runner::UpgradeRunner;
pub use migrations::step::{MigrationStep, StepContext};
pub use migrations::version::{UpgradeConfig, VersionStore};
pub use store::Store;
