use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::StrataConfig;

pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Discovers Strata configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }

        // Try to go up one level
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// `~/.config/strata/config.toml`, if it exists
pub fn global_config() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".config/strata/config.toml"))
        .filter(|path| path.is_file())
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd,
/// then falls back to the global config, then to defaults.
///
/// Returns the config and the file it was loaded from, if any.
pub fn load_config_with_discovery(
    explicit_path: Option<&Path>,
) -> Result<(StrataConfig, Option<PathBuf>)> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let current_dir = std::env::current_dir()
                .context("Failed to get current directory for config discovery")?;
            discover_config(&current_dir).or_else(global_config)
        }
    };

    match path {
        Some(path) => {
            let config = StrataConfig::from_file(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((StrataConfig::default(), None)),
    }
}
