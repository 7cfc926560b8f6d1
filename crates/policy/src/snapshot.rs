//! Immutable, compiled policy snapshot.
//!
//! A [`PolicySnapshot`] is built once from every policy document in the
//! directory and never mutated afterwards. Replacing the active policy means
//! building a new snapshot and swapping it into the [`crate::PolicyStore`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{PolicyError, Result};
use crate::schema::{Effect, PolicyDocument, PolicyRule, POLICY_KIND};

/// A validated rule with its URI patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub effect: Effect,
    users: Vec<String>,
    actions: Vec<String>,
    uris: Vec<Regex>,
    readonly: bool,
}

impl CompiledRule {
    fn compile(rule: &PolicyRule) -> Result<Self> {
        if rule.name.trim().is_empty() {
            return Err(PolicyError::Validation("rule name must not be empty".to_string()));
        }
        if rule.users.is_empty() {
            return Err(PolicyError::Validation(format!(
                "rule '{}' must list at least one user (use \"*\" for any)",
                rule.name
            )));
        }
        if rule.actions.is_empty() {
            return Err(PolicyError::Validation(format!(
                "rule '{}' must list at least one action (use \"*\" for any)",
                rule.name
            )));
        }

        let uris = rule
            .uris
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| PolicyError::Pattern {
                    rule: rule.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: rule.name.clone(),
            effect: rule.effect,
            users: rule.users.clone(),
            actions: rule.actions.clone(),
            uris,
            readonly: rule.readonly,
        })
    }

    /// Whether this rule applies to the given request attributes.
    pub fn matches(&self, user: &str, action: &str, path: &str, read_only: bool) -> bool {
        if self.readonly && !read_only {
            return false;
        }
        let user_ok = self.users.iter().any(|u| u == "*" || u == user);
        let action_ok = self.actions.iter().any(|a| action_matches(a, action));
        let uri_ok = self.uris.is_empty() || self.uris.iter().any(|re| re.is_match(path));
        user_ok && action_ok && uri_ok
    }
}

fn action_matches(pattern: &str, action: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => action.starts_with(prefix),
        None => pattern == action,
    }
}

/// One policy file after validation.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub source: PathBuf,
    pub rules: Vec<CompiledRule>,
}

/// Immutable view of every policy loaded from the directory at one point in time.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    policies: Vec<CompiledPolicy>,
    loaded_at: Option<DateTime<Utc>>,
}

impl PolicySnapshot {
    /// The "no policy loaded" sentinel held by the store before the first
    /// successful load.
    pub fn unloaded() -> Self {
        Self {
            policies: Vec::new(),
            loaded_at: None,
        }
    }

    /// Validate and compile parsed documents into a snapshot.
    ///
    /// Fails on the first invalid document; nothing is partially built.
    pub fn from_documents(documents: Vec<(PathBuf, PolicyDocument)>) -> Result<Self> {
        let mut seen_ids = HashSet::new();
        let mut policies = Vec::with_capacity(documents.len());

        for (source, doc) in documents {
            if doc.kind != POLICY_KIND {
                return Err(PolicyError::Validation(format!(
                    "{}: unsupported kind '{}', expected '{}'",
                    source.display(),
                    doc.kind,
                    POLICY_KIND
                )));
            }
            if doc.metadata.id.trim().is_empty() {
                return Err(PolicyError::Validation(format!(
                    "{}: metadata.id must not be empty",
                    source.display()
                )));
            }
            if !seen_ids.insert(doc.metadata.id.clone()) {
                return Err(PolicyError::Validation(format!(
                    "{}: duplicate policy id '{}'",
                    source.display(),
                    doc.metadata.id
                )));
            }

            let rules = doc
                .rules
                .iter()
                .map(CompiledRule::compile)
                .collect::<Result<Vec<_>>>()?;

            policies.push(CompiledPolicy {
                id: doc.metadata.id,
                name: doc.metadata.name,
                enabled: doc.metadata.enabled,
                source,
                rules,
            });
        }

        Ok(Self {
            policies,
            loaded_at: Some(Utc::now()),
        })
    }

    /// `false` only for the [`unloaded`](Self::unloaded) sentinel.
    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn policies(&self) -> &[CompiledPolicy] {
        &self.policies
    }

    /// Policy files this snapshot was built from.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.policies.iter().map(|p| p.source.as_path())
    }

    pub fn rule_count(&self) -> usize {
        self.policies.iter().map(|p| p.rules.len()).sum()
    }
}
