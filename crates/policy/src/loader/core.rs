//! [`PolicyLoader`] trait and the YAML directory implementation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PolicyError, Result};
use crate::schema::PolicyDocument;
use crate::snapshot::PolicySnapshot;

/// Builds policy snapshots from a directory.
///
/// Implementations must be side-effect free: a failed load leaves no trace
/// beyond the returned error.
pub trait PolicyLoader: Send + Sync {
    /// Parse every recognized policy file in `dir` into one snapshot.
    fn load(&self, dir: &Path) -> Result<PolicySnapshot>;

    /// Whether a path follows the naming convention this loader understands.
    fn is_policy_file(&self, path: &Path) -> bool {
        is_policy_file(path)
    }
}

/// `*.yml` / `*.yaml`, excluding dotfiles (editor swap and temp files).
pub fn is_policy_file(path: &Path) -> bool {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false);

    let is_hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);

    is_yaml && !is_hidden
}

/// Loads `kind: Policy` YAML documents from the top level of a directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlPolicyLoader;

impl YamlPolicyLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single policy file.
    pub fn load_file(&self, path: &Path) -> Result<PolicyDocument> {
        let contents = fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Recognized policy files in `dir`, sorted by file name.
    pub fn policy_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if self.is_policy_file(&path) {
                files.push(path);
            } else {
                debug!(path = %path.display(), "skipping non-policy file");
            }
        }
        files.sort();
        Ok(files)
    }
}

impl PolicyLoader for YamlPolicyLoader {
    fn load(&self, dir: &Path) -> Result<PolicySnapshot> {
        let files = self.policy_files(dir)?;
        if files.is_empty() {
            return Err(PolicyError::NoPolicies(dir.to_path_buf()));
        }

        let documents = files
            .into_iter()
            .map(|path| {
                let doc = self.load_file(&path)?;
                Ok((path, doc))
            })
            .collect::<Result<Vec<_>>>()?;

        let snapshot = PolicySnapshot::from_documents(documents)?;
        info!(
            path = %dir.display(),
            policies = snapshot.policies().len(),
            rules = snapshot.rule_count(),
            "loaded policy directory"
        );
        Ok(snapshot)
    }
}
