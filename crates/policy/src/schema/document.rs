//! Policy document and rule definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PolicyMetadata;

/// The only `kind` value a policy file may carry.
pub const POLICY_KIND: &str = "Policy";

/// A complete policy file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: PolicyMetadata,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Whether a matching rule grants or refuses the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// A single access rule.
///
/// `users` and `actions` accept `"*"` for "any"; an action ending in `*`
/// matches by prefix (`container_*`). `uris` are regular expressions
/// matched against the version-stripped request path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    pub name: String,
    pub effect: Effect,
    pub users: Vec<String>,
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
    /// Restrict the rule to read-only (GET/HEAD) requests.
    #[serde(default)]
    pub readonly: bool,
}
