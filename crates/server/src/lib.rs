//! Docker authorization plugin service.
//!
//! Serves the Docker `authz` plugin protocol on a Unix socket, answering each
//! request against the current policy snapshot while a background task keeps
//! that snapshot in sync with the policy directory.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod protocol;
pub mod router;
pub mod server;
pub mod signal;
pub mod state;

pub use config::ServiceConfig;
pub use lifecycle::{Coordinator, LifecycleState};
