//! Resolved service configuration.

use std::path::PathBuf;
use std::time::Duration;

use dpe_policy::debounce::DEFAULT_QUIET_PERIOD;

pub const DEFAULT_POLICY_DIR: &str = "/etc/dpe/policy.d";
pub const DEFAULT_SOCKET_PATH: &str = "/run/docker/plugins/dpe.sock";
pub const DEFAULT_PLUGIN_DIR: &str = "/etc/docker/plugins";
pub const DEFAULT_SPEC_NAME: &str = "dpe.spec";

/// Everything the lifecycle coordinator and bootstrap need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Directory holding the policy YAML files.
    pub policy_dir: PathBuf,
    /// Unix socket the plugin API is served on.
    pub socket_path: PathBuf,
    /// Docker plugin discovery directory.
    pub plugin_dir: PathBuf,
    /// Descriptor file name inside `plugin_dir`.
    pub spec_name: String,
    /// Quiet period before a burst of changes triggers a reload.
    pub debounce: Duration,
    /// Bounded drain of in-flight requests on shutdown; zero aborts at once.
    pub drain_timeout: Duration,
    /// Log every decision with rule detail.
    pub debug_acl: bool,
    /// Treat a missing policy directory as fatal.
    pub require_policy_dir: bool,
}

impl ServiceConfig {
    pub fn spec_path(&self) -> PathBuf {
        self.plugin_dir.join(&self.spec_name)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            policy_dir: PathBuf::from(DEFAULT_POLICY_DIR),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
            spec_name: DEFAULT_SPEC_NAME.to_string(),
            debounce: DEFAULT_QUIET_PERIOD,
            drain_timeout: Duration::ZERO,
            debug_acl: false,
            require_policy_dir: false,
        }
    }
}
