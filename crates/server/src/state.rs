use std::sync::Arc;

use dpe_policy::PolicyStore;

/// Shared handler state.
pub struct AppState {
    pub store: Arc<PolicyStore>,
    /// Log every decision at info level with rule detail.
    pub debug_acl: bool,
}

impl AppState {
    pub fn new(store: Arc<PolicyStore>, debug_acl: bool) -> Self {
        Self { store, debug_acl }
    }
}
