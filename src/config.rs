use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::keys::DEFAULT_APPS_DIR;
use crate::logging::LogFormat;
use crate::storage::default_store_dir;

/// Complete Strata configuration (loaded from `strata.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrataConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub namespace: NamespaceConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Object and version store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory path
    #[serde(default = "default_store_dir_string")]
    pub dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir_string(),
        }
    }
}

/// Storage key layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Top-level directory under which every application lives
    #[serde(default = "default_apps_dir")]
    pub apps_dir: String,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            apps_dir: default_apps_dir(),
        }
    }
}

/// Defaults for `strata build`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Environment name applied to every app config built with this config
    #[serde(default)]
    pub environment: Option<String>,

    /// Run structural validation on assembled contexts
    #[serde(default = "default_true")]
    pub validate: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            environment: None,
            validate: true,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default)]
    pub log_format: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: None,
        }
    }
}

// Default value functions
fn default_store_dir_string() -> String {
    default_store_dir().to_string_lossy().into_owned()
}

fn default_apps_dir() -> String {
    DEFAULT_APPS_DIR.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl StrataConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: StrataConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        toml::to_string_pretty(&StrataConfig::default()).context("Failed to render config")
    }

    pub fn store_dir(&self) -> PathBuf {
        PathBuf::from(&self.store.dir)
    }

    pub fn log_format(&self) -> Option<LogFormat> {
        self.observability
            .log_format
            .as_deref()
            .and_then(LogFormat::parse)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.dir.is_empty() {
            anyhow::bail!("store.dir must be set");
        }

        if self.namespace.apps_dir.trim_matches('/').is_empty() {
            anyhow::bail!("namespace.apps_dir must be set");
        }

        if self.namespace.apps_dir.split('/').any(|s| s == "..") {
            anyhow::bail!("namespace.apps_dir must not contain '..'");
        }

        if self.build.environment.as_deref() == Some("") {
            anyhow::bail!("build.environment must not be empty");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.observability.log_level.as_str())
        {
            anyhow::bail!("observability.log_level must be one of: trace, debug, info, warn, error");
        }

        if let Some(format) = &self.observability.log_format {
            if LogFormat::parse(format).is_none() {
                anyhow::bail!("observability.log_format must be one of: pretty, compact, json");
            }
        }

        Ok(())
    }
}
