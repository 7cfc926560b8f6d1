//! Docker plugin API wire types (`authz` capability).
//!
//! Field names follow the daemon's Go structs, hence the PascalCase renames.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Content type the Docker plugin client sends and expects back.
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.2+json";

/// Capability advertised on activation.
pub const AUTHZ_CAPABILITY: &str = "authz";

/// Reply to `POST /Plugin.Activate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

impl ActivateResponse {
    pub fn authz() -> Self {
        Self {
            implements: vec![AUTHZ_CAPABILITY.to_string()],
        }
    }
}

/// Body of `AuthZPlugin.AuthZReq` and `AuthZPlugin.AuthZRes`.
///
/// Bodies arrive base64-encoded (Go `[]byte`); they are carried but never
/// decoded since policies do not inspect payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AuthZRequest {
    #[serde(default)]
    pub user: String,
    #[serde(default, rename = "UserAuthNMethod")]
    pub user_authn_method: String,
    #[serde(default)]
    pub request_method: String,
    #[serde(default, rename = "RequestURI")]
    pub request_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HashMap<String, String>>,
}

/// Reply to both authorization phases.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AuthZResponse {
    pub allow: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub err: String,
}

impl AuthZResponse {
    pub fn allow(msg: impl Into<String>) -> Self {
        Self {
            allow: true,
            msg: msg.into(),
            err: String::new(),
        }
    }

    pub fn deny(msg: impl Into<String>) -> Self {
        Self {
            allow: false,
            msg: msg.into(),
            err: String::new(),
        }
    }

    /// Denial caused by a plugin-side failure rather than by policy.
    pub fn error(err: impl Into<String>) -> Self {
        Self {
            allow: false,
            msg: String::new(),
            err: err.into(),
        }
    }
}
