//! One-time host preparation before the service starts.
//!
//! Writes the Docker plugin descriptor so the daemon can discover the socket.
//! The policy directory check lives here too but runs as the coordinator's
//! first startup step. Every failure here is fatal and happens before any
//! watcher or listener exists.

use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::config::ServiceConfig;

const PLUGIN_DIR_MODE: u32 = 0o755;
const DESCRIPTOR_MODE: u32 = 0o644;

/// Outcome of the policy directory check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDirStatus {
    Present,
    /// Absent and not required: the service runs without hot-reload.
    Missing,
}

/// Prepare the host for `config`.
pub fn run(config: &ServiceConfig) -> anyhow::Result<()> {
    ensure_plugin_spec(&config.plugin_dir, &config.spec_name, &config.socket_path)?;
    info!("server has completed initialization");
    Ok(())
}

/// Create the plugin directory and write the descriptor if it is missing.
///
/// Directories that already exist keep their mode, and an existing
/// descriptor is left untouched.
pub fn ensure_plugin_spec(plugin_dir: &Path, spec_name: &str, socket: &Path) -> anyhow::Result<PathBuf> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(PLUGIN_DIR_MODE)
        .create(plugin_dir)
        .with_context(|| format!("failed to create plugin directory {}", plugin_dir.display()))?;

    let spec_path = plugin_dir.join(spec_name);
    if spec_path.exists() {
        info!(path = %spec_path.display(), "plugin descriptor already present");
        return Ok(spec_path);
    }

    fs::write(&spec_path, format!("unix://{}", socket.display()))
        .with_context(|| format!("failed to write plugin descriptor {}", spec_path.display()))?;
    set_mode(&spec_path, DESCRIPTOR_MODE)?;
    info!(path = %spec_path.display(), socket = %socket.display(), "wrote plugin descriptor");
    Ok(spec_path)
}

/// Validate the configured policy directory.
pub fn check_policy_dir(dir: &Path, required: bool) -> anyhow::Result<PolicyDirStatus> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(PolicyDirStatus::Present),
        Ok(_) => bail!("policy path {} is not a directory", dir.display()),
        Err(e) if required => {
            Err(e).with_context(|| format!("policy directory {} is not accessible", dir.display()))
        }
        Err(e) => {
            warn!(
                path = %dir.display(),
                error = %e,
                "policy directory not accessible, policy hot-reload disabled"
            );
            Ok(PolicyDirStatus::Missing)
        }
    }
}

fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_descriptor_once() {
        let dir = TempDir::new().unwrap();
        let plugin_dir = dir.path().join("plugins");
        let socket = Path::new("/run/docker/plugins/dpe.sock");

        let spec = ensure_plugin_spec(&plugin_dir, "dpe.spec", socket).unwrap();
        assert_eq!(
            fs::read_to_string(&spec).unwrap(),
            "unix:///run/docker/plugins/dpe.sock"
        );

        fs::write(&spec, "unix:///custom.sock").unwrap();
        ensure_plugin_spec(&plugin_dir, "dpe.spec", socket).unwrap();
        assert_eq!(fs::read_to_string(&spec).unwrap(), "unix:///custom.sock");
    }

    #[test]
    fn policy_dir_checks() {
        let dir = TempDir::new().unwrap();
        assert_eq!(check_policy_dir(dir.path(), true).unwrap(), PolicyDirStatus::Present);

        let missing = dir.path().join("missing");
        assert_eq!(check_policy_dir(&missing, false).unwrap(), PolicyDirStatus::Missing);
        assert!(check_policy_dir(&missing, true).is_err());

        let file = dir.path().join("file.yml");
        fs::write(&file, "").unwrap();
        assert!(check_policy_dir(&file, false).is_err());
    }

    #[test]
    fn run_prepares_host() {
        let dir = TempDir::new().unwrap();
        let config = ServiceConfig {
            policy_dir: dir.path().join("policy.d"),
            plugin_dir: dir.path().join("plugins"),
            socket_path: dir.path().join("dpe.sock"),
            ..ServiceConfig::default()
        };

        run(&config).unwrap();
        assert!(config.spec_path().exists());
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn existing_plugin_dir_keeps_its_mode() {
        let dir = TempDir::new().unwrap();
        let plugin_dir = dir.path().join("plugins");
        fs::create_dir(&plugin_dir).unwrap();
        fs::set_permissions(&plugin_dir, fs::Permissions::from_mode(0o2775)).unwrap();

        ensure_plugin_spec(&plugin_dir, "dpe.spec", Path::new("/run/dpe.sock")).unwrap();
        assert_eq!(mode_of(&plugin_dir), 0o2775);
    }

    #[test]
    fn created_plugin_dir_is_not_group_writable() {
        let dir = TempDir::new().unwrap();
        let plugin_dir = dir.path().join("etc/docker/plugins");

        let spec = ensure_plugin_spec(&plugin_dir, "dpe.spec", Path::new("/run/dpe.sock")).unwrap();
        assert!(plugin_dir.is_dir());
        assert_eq!(mode_of(&plugin_dir) & 0o022, 0);
        assert_eq!(mode_of(&spec), DESCRIPTOR_MODE);
    }
}
