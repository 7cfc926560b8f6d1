//! Docker authorization policy engine.
//!
//! This crate provides:
//! - YAML policy documents with serde deserialization
//! - An all-or-nothing directory loader producing immutable snapshots
//! - A lock-free policy store (single writer, many readers)
//! - Request → action mapping and deny-overrides evaluation
//! - Directory watching with debounced hot-reload via `notify`

pub mod action;
pub mod debounce;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod reload;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod watcher;

pub use error::{PolicyError, Result};
pub use evaluator::{decide, AccessRequest, Decision};
pub use loader::{PolicyLoader, YamlPolicyLoader};
pub use snapshot::PolicySnapshot;
pub use store::PolicyStore;
