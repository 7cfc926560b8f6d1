//! HTTP router construction.
//!
//! Assembles the Docker plugin API routes into a single `Router`.

use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use crate::api;
use crate::state::AppState;

/// Build the plugin router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(api::activate))
        .route("/AuthZPlugin.AuthZReq", post(api::authz_request))
        .route("/AuthZPlugin.AuthZRes", post(api::authz_response))
        .with_state(state)
}
