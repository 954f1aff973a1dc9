//! CLI command implementations.

pub mod ideas;
pub mod stress;

use crate::ProviderKind;
use snaptx_core::{Config, TransactionManager};
use snaptx_volume::{InMemoryProvider, SnapshotProvider, ZfsConfig, ZfsProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Global options that decide how the transaction manager is opened.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub root: Option<PathBuf>,
    pub provider: ProviderKind,
    pub dataset: Option<String>,
    pub use_sudo: bool,
    pub lock_file: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Opens a transaction manager over `--root` with the selected provider.
pub fn open_manager(
    options: &ManagerOptions,
) -> Result<TransactionManager, Box<dyn std::error::Error>> {
    let root = options.root.as_ref().ok_or("Tree root required (--root)")?;

    let provider: Arc<dyn SnapshotProvider> = match options.provider {
        ProviderKind::Zfs => {
            let dataset = options
                .dataset
                .as_ref()
                .ok_or("ZFS dataset required with the zfs provider (--dataset)")?;
            let config = ZfsConfig::new(dataset.as_str()).use_sudo(options.use_sudo);
            Arc::new(ZfsProvider::new(config)?)
        }
        ProviderKind::Memory => Arc::new(InMemoryProvider::new(root)),
    };

    let mut config = Config::new();
    if let Some(timeout) = options.timeout {
        config = config.transaction_timeout(timeout);
    }
    if let Some(lock_file) = &options.lock_file {
        config = config.lock_path(lock_file);
    }

    tracing::debug!(root = %root.display(), provider = ?options.provider, "opening transaction manager");
    Ok(TransactionManager::open(root, config, provider)?)
}
