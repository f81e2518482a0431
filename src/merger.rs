/// Configuration merger: CLI args > Env vars > Config file > Defaults
///
/// Env vars are read by clap into the same fields as CLI args, so only two
/// layers are merged here.
use anyhow::Result;
use std::path::PathBuf;

use crate::cli::CommonConfigArgs;
use crate::config::StrataConfig;
use crate::config_discovery::load_config_with_discovery;
use crate::keys::KeyNamespace;
use crate::logging::LogFormat;

/// Effective configuration of one CLI invocation
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub store_dir: PathBuf,
    pub apps_dir: String,
    pub environment: Option<String>,
    pub validate: bool,
    pub log_level: String,
    pub log_format: Option<LogFormat>,
    /// File the config was loaded from, if any
    pub source: Option<PathBuf>,
}

impl MergedConfig {
    /// Merge configuration from CLI args and config file
    pub fn merge(args: &CommonConfigArgs, file: StrataConfig, source: Option<PathBuf>) -> Self {
        Self {
            store_dir: args
                .store_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| file.store_dir()),
            apps_dir: args
                .apps_dir
                .clone()
                .unwrap_or_else(|| file.namespace.apps_dir.clone()),
            environment: file.build.environment.clone(),
            validate: file.build.validate,
            log_level: args
                .log_level
                .clone()
                .unwrap_or_else(|| file.observability.log_level.clone()),
            log_format: file.log_format(),
            source,
        }
    }

    /// Discover and validate the config file, then apply `args` on top
    pub fn load(args: &CommonConfigArgs) -> Result<Self> {
        let (mut file, source) = load_config_with_discovery(args.config.as_deref())?;

        // Validate after applying overrides so bad flags are caught too
        if let Some(dir) = &args.store_dir {
            file.store.dir = dir.clone();
        }
        if let Some(apps_dir) = &args.apps_dir {
            file.namespace.apps_dir = apps_dir.clone();
        }
        if let Some(level) = &args.log_level {
            file.observability.log_level = level.clone();
        }
        file.validate()?;

        Ok(Self::merge(args, file, source))
    }

    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.apps_dir.clone())
    }
}
