pub mod build;
pub mod config;
pub mod fetch;
pub mod keys;
pub mod status;
pub mod version;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use crate::cli::CommonConfigArgs;
use crate::logging;
use crate::merger::MergedConfig;
use crate::storage::FilesystemStore;

/// Load the effective config and initialize logging from it
pub(crate) fn prepare(args: &CommonConfigArgs) -> Result<MergedConfig> {
    let config = MergedConfig::load(args)?;
    logging::init(&config.log_level, config.log_format);

    if let Some(source) = &config.source {
        debug!("Using config: {}", source.display());
    }
    Ok(config)
}

pub(crate) fn open_store(config: &MergedConfig) -> Result<Arc<FilesystemStore>> {
    let store = FilesystemStore::open(&config.store_dir)
        .with_context(|| format!("Failed to open store at {}", config.store_dir.display()))?;
    Ok(Arc::new(store))
}
