//! Error types for policy loading, watching and evaluation.

use std::path::PathBuf;

/// Errors that can occur while loading, watching or evaluating policies.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Policy validation error (wrong kind, duplicate IDs, empty fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A `uris` entry is not a valid regular expression.
    #[error("invalid uri pattern '{pattern}' in rule '{rule}': {source}")]
    Pattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The directory holds no recognized policy file.
    #[error("no policy files found in {}", .0.display())]
    NoPolicies(PathBuf),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The request could not be evaluated.
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

/// Result alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
