//! Docker plugin API handlers.
//!
//! Bodies are parsed by hand rather than through `Json`: the daemon sends
//! `application/vnd.docker.plugins.v1.2+json`, and a malformed body must
//! still produce a well-formed denial instead of an extractor rejection.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use dpe_policy::{decide, AccessRequest, Decision};

use crate::protocol::{ActivateResponse, AuthZRequest, AuthZResponse, PLUGIN_CONTENT_TYPE};
use crate::state::AppState;

/// `POST /Plugin.Activate`: advertise the `authz` capability.
pub(crate) async fn activate() -> Response {
    info!("plugin activated by docker daemon");
    plugin_json(&ActivateResponse::authz())
}

/// `POST /AuthZPlugin.AuthZReq`: decide whether a daemon request may proceed.
///
/// The policy store is read exactly once, so the whole evaluation sees one
/// snapshot even if a reload lands mid-request.
pub(crate) async fn authz_request(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: AuthZRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed authorization request");
            return plugin_json(&AuthZResponse::error(format!("invalid authorization request: {e}")));
        }
    };

    let access = AccessRequest::new(request.user, request.request_method, request.request_uri);
    let snapshot = state.store.current();
    let decision = decide(&snapshot, &access);
    log_decision(state.debug_acl, &access, &decision);

    let response = if decision.allowed {
        AuthZResponse::allow(decision.reason)
    } else {
        AuthZResponse::deny(decision.reason)
    };
    plugin_json(&response)
}

/// `POST /AuthZPlugin.AuthZRes`: responses are never filtered by policy.
pub(crate) async fn authz_response(body: Bytes) -> Response {
    match serde_json::from_slice::<AuthZRequest>(&body) {
        Ok(request) => debug!(
            method = %request.request_method,
            uri = %request.request_uri,
            status = ?request.response_status_code,
            "response phase"
        ),
        Err(e) => debug!(error = %e, "unparseable response-phase body"),
    }
    plugin_json(&AuthZResponse::allow(""))
}

fn log_decision(debug_acl: bool, access: &AccessRequest, decision: &Decision) {
    let action = decision.action.unwrap_or("-");
    if debug_acl {
        info!(
            user = %access.user,
            method = %access.method,
            uri = %access.uri,
            action,
            allowed = decision.allowed,
            reason = %decision.reason,
            "acl decision"
        );
    } else {
        debug!(
            user = %access.user,
            action,
            allowed = decision.allowed,
            "acl decision"
        );
    }
}

fn plugin_json<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => ([(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to serialize plugin response");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use dpe_policy::schema::{Effect, PolicyDocument, PolicyMetadata, PolicyRule, POLICY_KIND};
    use dpe_policy::{PolicySnapshot, PolicyStore};

    use super::*;
    use crate::router::build_router;

    fn snapshot(effect: Effect) -> PolicySnapshot {
        let doc = PolicyDocument {
            api_version: "v1".to_string(),
            kind: POLICY_KIND.to_string(),
            metadata: PolicyMetadata {
                id: "all".to_string(),
                name: "all".to_string(),
                description: None,
                tags: None,
                enabled: true,
            },
            rules: vec![PolicyRule {
                name: "everything".to_string(),
                effect,
                users: vec!["*".to_string()],
                actions: vec!["*".to_string()],
                uris: Vec::new(),
                readonly: false,
            }],
        };
        PolicySnapshot::from_documents(vec![(PathBuf::from("all.yml"), doc)]).unwrap()
    }

    async fn post(store: Arc<PolicyStore>, uri: &str, body: &str) -> (StatusCode, String, serde_json::Value) {
        let app = build_router(Arc::new(AppState::new(store, true)));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, content_type, json)
    }

    const CREATE: &str = r#"{"User":"alice","RequestMethod":"POST","RequestURI":"/v1.41/containers/create"}"#;

    #[tokio::test]
    async fn activate_advertises_authz() {
        let (status, content_type, json) = post(Arc::new(PolicyStore::new()), "/Plugin.Activate", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, PLUGIN_CONTENT_TYPE);
        assert_eq!(json, serde_json::json!({"Implements": ["authz"]}));
    }

    #[tokio::test]
    async fn request_allowed_by_policy() {
        let store = Arc::new(PolicyStore::with_snapshot(snapshot(Effect::Allow)));
        let (_, _, json) = post(store, "/AuthZPlugin.AuthZReq", CREATE).await;
        assert_eq!(json["Allow"], true);
    }

    #[tokio::test]
    async fn request_denied_by_policy() {
        let store = Arc::new(PolicyStore::with_snapshot(snapshot(Effect::Deny)));
        let (_, _, json) = post(store, "/AuthZPlugin.AuthZReq", CREATE).await;
        assert_eq!(json["Allow"], false);
        assert!(json["Msg"].as_str().unwrap().contains("everything"));
    }

    #[tokio::test]
    async fn request_without_policy_is_denied() {
        let (_, _, json) = post(Arc::new(PolicyStore::new()), "/AuthZPlugin.AuthZReq", CREATE).await;
        assert_eq!(json["Allow"], false);
        assert_eq!(json["Msg"], "no policy loaded");
    }

    #[tokio::test]
    async fn malformed_body_is_denied_not_rejected() {
        let store = Arc::new(PolicyStore::with_snapshot(snapshot(Effect::Allow)));
        let (status, _, json) = post(store, "/AuthZPlugin.AuthZReq", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["Allow"], false);
        assert!(json["Err"].as_str().unwrap().starts_with("invalid authorization request"));
    }

    #[tokio::test]
    async fn malformed_uri_is_denied_with_reason() {
        let store = Arc::new(PolicyStore::with_snapshot(snapshot(Effect::Allow)));
        let body = r#"{"User":"","RequestMethod":"GET","RequestURI":"info"}"#;
        let (_, _, json) = post(store, "/AuthZPlugin.AuthZReq", body).await;
        assert_eq!(json["Allow"], false);
        assert!(json["Msg"].as_str().unwrap().contains("not an absolute path"));
    }

    #[tokio::test]
    async fn response_phase_always_allows() {
        let store = Arc::new(PolicyStore::with_snapshot(snapshot(Effect::Deny)));
        let (_, _, json) = post(store, "/AuthZPlugin.AuthZRes", CREATE).await;
        assert_eq!(json["Allow"], true);
    }
}
