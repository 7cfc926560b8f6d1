//! Deny-overrides evaluation of a request against a snapshot.
//!
//! Evaluation order:
//! 1. The unloaded sentinel denies everything ("no policy loaded").
//! 2. Any matching deny rule in an enabled policy denies.
//! 3. Otherwise any matching allow rule allows.
//! 4. Otherwise the request is denied.
//!
//! [`decide`] never fails: evaluation errors become explicit denials.

use std::fmt;

use crate::action::{action_for, is_read_only, normalize_path};
use crate::error::{PolicyError, Result};
use crate::schema::Effect;
use crate::snapshot::PolicySnapshot;

/// The attributes of an inbound Docker API call that policies match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    /// Authenticated user; empty when the daemon has no authentication.
    pub user: String,
    pub method: String,
    pub uri: String,
}

impl AccessRequest {
    pub fn new(user: impl Into<String>, method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            method: method.into(),
            uri: uri.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.method.trim().is_empty() {
            return Err(PolicyError::Evaluation("request method is empty".to_string()));
        }
        if !self.uri.starts_with('/') {
            return Err(PolicyError::Evaluation(format!(
                "request uri '{}' is not an absolute path",
                self.uri
            )));
        }
        Ok(())
    }
}

/// Allow/deny outcome with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
    /// Action name the request mapped to, when evaluation got that far.
    pub action: Option<&'static str>,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            action: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            action: None,
        }
    }

    fn with_action(mut self, action: &'static str) -> Self {
        self.action = Some(action);
        self
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allowed { "allow" } else { "deny" };
        write!(f, "{verdict}: {}", self.reason)
    }
}

/// Evaluate a request, surfacing malformed requests as errors.
pub fn evaluate(snapshot: &PolicySnapshot, request: &AccessRequest) -> Result<Decision> {
    if !snapshot.is_loaded() {
        return Ok(Decision::deny("no policy loaded"));
    }
    request.validate()?;

    let action = action_for(&request.method, &request.uri);
    let path = normalize_path(&request.uri);
    let read_only = is_read_only(&request.method);

    let mut allowed_by = None;
    for policy in snapshot.policies().iter().filter(|p| p.enabled) {
        for rule in &policy.rules {
            if !rule.matches(&request.user, action, path, read_only) {
                continue;
            }
            match rule.effect {
                Effect::Deny => {
                    return Ok(Decision::deny(format!(
                        "action '{}' denied by rule '{}' of policy '{}'",
                        action, rule.name, policy.id
                    ))
                    .with_action(action));
                }
                Effect::Allow => {
                    allowed_by.get_or_insert((rule.name.as_str(), policy.id.as_str()));
                }
            }
        }
    }

    let decision = match allowed_by {
        Some((rule, policy)) => Decision::allow(format!(
            "action '{}' allowed by rule '{}' of policy '{}'",
            action, rule, policy
        )),
        None => Decision::deny(format!(
            "no rule allows action '{}' for user '{}'",
            action,
            display_user(&request.user)
        )),
    };
    Ok(decision.with_action(action))
}

/// Evaluate a request; any evaluation error degrades to a denial.
pub fn decide(snapshot: &PolicySnapshot, request: &AccessRequest) -> Decision {
    evaluate(snapshot, request).unwrap_or_else(|e| Decision::deny(e.to_string()))
}

fn display_user(user: &str) -> &str {
    if user.is_empty() {
        "<anonymous>"
    } else {
        user
    }
}
