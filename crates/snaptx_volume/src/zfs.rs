//! ZFS snapshot provider.

use crate::error::{SnapshotError, SnapshotResult};
use crate::provider::{validate_snapshot_name, SnapshotHandle, SnapshotProvider};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Configuration for a [`ZfsProvider`].
#[derive(Debug, Clone)]
pub struct ZfsConfig {
    /// Dataset whose mountpoint holds the transactional tree, e.g. `tank/data`.
    pub dataset: String,

    /// Path or name of the `zfs` executable.
    pub zfs_binary: PathBuf,

    /// Whether to prefix every invocation with `sudo -n`.
    pub use_sudo: bool,
}

impl ZfsConfig {
    /// Creates a configuration for `dataset` with default settings.
    #[must_use]
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            zfs_binary: PathBuf::from("zfs"),
            use_sudo: true,
        }
    }

    /// Sets the `zfs` executable.
    #[must_use]
    pub fn zfs_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.zfs_binary = path.into();
        self
    }

    /// Sets whether to run through `sudo -n`.
    #[must_use]
    pub const fn use_sudo(mut self, value: bool) -> Self {
        self.use_sudo = value;
        self
    }
}

/// A snapshot provider backed by a ZFS dataset.
///
/// Each operation is a single `zfs` invocation, which ZFS executes
/// atomically:
///
/// | Operation          | Command                          |
/// |--------------------|----------------------------------|
/// | `create_snapshot`  | `zfs snapshot <dataset>@<name>`  |
/// | `rollback`         | `zfs rollback -r <dataset>@<name>` |
/// | `destroy_snapshot` | `zfs destroy <dataset>@<name>`   |
///
/// Arguments are passed directly to the process, never through a shell.
#[derive(Debug, Clone)]
pub struct ZfsProvider {
    config: ZfsConfig,
}

impl ZfsProvider {
    /// Creates a provider for the configured dataset.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::InvalidName`] if the dataset name is empty or
    /// contains `@`.
    pub fn new(config: ZfsConfig) -> SnapshotResult<Self> {
        if config.dataset.is_empty() {
            return Err(SnapshotError::invalid_name(
                &config.dataset,
                "dataset is empty",
            ));
        }
        if config.dataset.contains('@') || config.dataset.starts_with('-') {
            return Err(SnapshotError::invalid_name(
                &config.dataset,
                "dataset must not contain '@' or start with '-'",
            ));
        }
        Ok(Self { config })
    }

    /// Returns the provider's configuration.
    #[must_use]
    pub fn config(&self) -> &ZfsConfig {
        &self.config
    }

    /// Builds the full argument vector for a `zfs` subcommand.
    ///
    /// The first element is the program to execute.
    #[must_use]
    pub fn command_line(&self, args: &[&str]) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        if self.config.use_sudo {
            argv.push(OsString::from("sudo"));
            argv.push(OsString::from("-n"));
        }
        argv.push(self.config.zfs_binary.clone().into_os_string());
        argv.extend(args.iter().map(OsString::from));
        argv
    }

    fn run(&self, args: &[&str]) -> SnapshotResult<()> {
        let argv = self.command_line(args);
        let rendered = argv
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!(command = %rendered, "running volume command");
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .output()
            .map_err(|source| SnapshotError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SnapshotError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn target(&self, name: &str) -> String {
        format!("{}@{}", self.config.dataset, name)
    }
}

impl SnapshotProvider for ZfsProvider {
    fn create_snapshot(&self, name: &str) -> SnapshotResult<SnapshotHandle> {
        validate_snapshot_name(name)?;
        self.run(&["snapshot", &self.target(name)])?;
        Ok(SnapshotHandle::new(&self.config.dataset, name))
    }

    fn rollback(&self, handle: &SnapshotHandle) -> SnapshotResult<()> {
        self.run(&["rollback", "-r", &self.target(handle.name())])
    }

    fn destroy_snapshot(&self, handle: &SnapshotHandle) -> SnapshotResult<()> {
        self.run(&["destroy", &self.target(handle.name())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv_strings(provider: &ZfsProvider, args: &[&str]) -> Vec<String> {
        provider
            .command_line(args)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_config_uses_sudo() {
        let config = ZfsConfig::new("tank/data");
        assert!(config.use_sudo);
        assert_eq!(config.zfs_binary, PathBuf::from("zfs"));
    }

    #[test]
    fn command_line_with_sudo() {
        let provider = ZfsProvider::new(ZfsConfig::new("tank/data")).unwrap();
        assert_eq!(
            argv_strings(&provider, &["snapshot", "tank/data@s1"]),
            vec!["sudo", "-n", "zfs", "snapshot", "tank/data@s1"]
        );
    }

    #[test]
    fn command_line_without_sudo() {
        let config = ZfsConfig::new("tank/data")
            .use_sudo(false)
            .zfs_binary("/sbin/zfs");
        let provider = ZfsProvider::new(config).unwrap();
        assert_eq!(
            argv_strings(&provider, &["destroy", "tank/data@s1"]),
            vec!["/sbin/zfs", "destroy", "tank/data@s1"]
        );
    }

    #[test]
    fn rejects_bad_dataset() {
        assert!(ZfsProvider::new(ZfsConfig::new("")).is_err());
        assert!(ZfsProvider::new(ZfsConfig::new("tank@snap")).is_err());
        assert!(ZfsProvider::new(ZfsConfig::new("-rf")).is_err());
    }

    #[test]
    fn invalid_snapshot_name_never_spawns() {
        let config = ZfsConfig::new("tank/data")
            .use_sudo(false)
            .zfs_binary("/nonexistent/zfs");
        let provider = ZfsProvider::new(config).unwrap();

        let result = provider.create_snapshot("x; rm -rf /");
        assert!(matches!(result, Err(SnapshotError::InvalidName { .. })));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let config = ZfsConfig::new("tank/data")
            .use_sudo(false)
            .zfs_binary("/nonexistent/zfs");
        let provider = ZfsProvider::new(config).unwrap();

        let result = provider.create_snapshot("s1");
        assert!(matches!(result, Err(SnapshotError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_command_failed() {
        let config = ZfsConfig::new("tank/data")
            .use_sudo(false)
            .zfs_binary("false");
        let provider = ZfsProvider::new(config).unwrap();

        let handle = SnapshotHandle::new("tank/data", "s1");
        match provider.destroy_snapshot(&handle) {
            Err(SnapshotError::CommandFailed { command, status, .. }) => {
                assert_eq!(command, "false destroy tank/data@s1");
                assert_eq!(status, Some(1));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}
