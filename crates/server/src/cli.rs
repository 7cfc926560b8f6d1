//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    ServiceConfig, DEFAULT_PLUGIN_DIR, DEFAULT_POLICY_DIR, DEFAULT_SOCKET_PATH, DEFAULT_SPEC_NAME,
};

/// Launch the Docker Policy Engine authorization plugin.
#[derive(Parser, Debug)]
#[command(name = "dpe", version, about)]
pub struct Cli {
    /// Debug the ACL subsystem (log every decision).
    #[arg(short = 'D', long, env = "DPE_DEBUG")]
    pub debug: bool,

    /// ACL policy directory.
    #[arg(short = 'd', long = "policydir", env = "DPE_POLICY_DIR", default_value = DEFAULT_POLICY_DIR)]
    pub policy_dir: PathBuf,

    /// Unix socket to serve the plugin API on.
    #[arg(long, env = "DPE_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    /// Docker plugin discovery directory.
    #[arg(long, env = "DPE_PLUGIN_DIR", default_value = DEFAULT_PLUGIN_DIR)]
    pub plugin_dir: PathBuf,

    /// Plugin descriptor file name written inside the plugin directory.
    #[arg(long, env = "DPE_SPEC_NAME", default_value = DEFAULT_SPEC_NAME)]
    pub spec_name: String,

    /// Quiet period in milliseconds before policy changes are reloaded.
    #[arg(long, env = "DPE_DEBOUNCE_MS", default_value_t = 1000)]
    pub debounce_ms: u64,

    /// Seconds to drain in-flight requests on shutdown (0 = exit at once).
    #[arg(long, env = "DPE_DRAIN_TIMEOUT_SECS", default_value_t = 0)]
    pub drain_timeout_secs: u64,

    /// Fail at startup when the policy directory does not exist.
    #[arg(long = "require-policydir", env = "DPE_REQUIRE_POLICY_DIR")]
    pub require_policy_dir: bool,
}

impl Cli {
    pub fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            policy_dir: self.policy_dir,
            socket_path: self.socket,
            plugin_dir: self.plugin_dir,
            spec_name: self.spec_name,
            debounce: Duration::from_millis(self.debounce_ms),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            debug_acl: self.debug,
            require_policy_dir: self.require_policy_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_defaults() {
        let cli = Cli::try_parse_from(["dpe"]).unwrap();
        assert_eq!(cli.into_config(), ServiceConfig::default());
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from(["dpe", "-D", "-d", "/tmp/policies"]).unwrap();
        let config = cli.into_config();
        assert!(config.debug_acl);
        assert_eq!(config.policy_dir, PathBuf::from("/tmp/policies"));
    }

    #[test]
    fn timing_flags() {
        let cli = Cli::try_parse_from([
            "dpe",
            "--debounce-ms",
            "250",
            "--drain-timeout-secs",
            "5",
            "--require-policydir",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
        assert!(config.require_policy_dir);
    }
}
