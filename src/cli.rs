use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strata - content-addressed context resolution
///
/// Strata resolves a declarative application config into an immutable,
/// content-addressed context and keeps dataset versions stable across builds.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author = "Strata Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Content-addressed context resolution", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Common configuration arguments shared across commands
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path (default: nearest strata.toml)
    #[arg(short = 'c', long, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store directory
    #[arg(long, env = "STRATA_STORE_DIR")]
    pub store_dir: Option<String>,

    /// Top-level directory of every application key
    #[arg(long, env = "STRATA_APPS_DIR")]
    pub apps_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "STRATA_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an application config into a context
    Build(BuildArgs),

    /// Load a stored context by id
    Fetch(FetchArgs),

    /// List stored contexts of an application
    List(ListArgs),

    /// Show or invalidate the dataset version of an application
    Version(VersionArgs),

    /// Print the storage keys of an application
    Keys(KeysArgs),

    /// Show workload status of a resource
    Status(StatusArgs),

    /// Configuration management utilities
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Application config (TOML)
    pub app_config: PathBuf,

    /// Directory of user code and packages (default: the config's directory)
    #[arg(long)]
    pub files: Option<PathBuf>,

    /// Create a fresh dataset version instead of reusing the current one
    #[arg(long)]
    pub ignore_cache: bool,

    /// Resolve without touching the store
    #[arg(long)]
    pub no_persist: bool,

    /// Override the environment name of the app config
    #[arg(short = 'e', long, env = "STRATA_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Skip structural validation
    #[arg(long)]
    pub skip_validation: bool,

    /// Print a JSON summary
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Application name
    pub app: String,

    /// Context id
    pub context_id: String,

    /// Print the full context as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Application name
    pub app: String,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct VersionArgs {
    /// Application name
    pub app: String,

    /// Replace the current version with a fresh one
    #[arg(long)]
    pub invalidate: bool,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct KeysArgs {
    /// Application name
    pub app: String,

    /// Context id
    #[arg(long)]
    pub context_id: Option<String>,

    /// Resource id
    #[arg(long)]
    pub resource_id: Option<String>,

    /// Workload id
    #[arg(long)]
    pub workload_id: Option<String>,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Application name
    pub app: String,

    /// Resource id
    pub resource_id: String,

    /// Workload id (default: the latest workload of the resource)
    #[arg(long)]
    pub workload_id: Option<String>,

    /// Print the status record as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to strata.toml
        path: PathBuf,
    },

    /// Print an example configuration
    Generate,

    /// Show the effective configuration
    Show {
        #[command(flatten)]
        common: CommonConfigArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "strata",
            "build",
            "app.toml",
            "--files",
            "src",
            "--ignore-cache",
            "--store-dir",
            "/tmp/store",
        ])
        .unwrap();

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.app_config, PathBuf::from("app.toml"));
                assert_eq!(args.files, Some(PathBuf::from("src")));
                assert!(args.ignore_cache);
                assert!(!args.no_persist);
                assert_eq!(args.common.store_dir.as_deref(), Some("/tmp/store"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_defaults_to_latest() {
        let cli = Cli::try_parse_from(["strata", "status", "fraud", "abc"]).unwrap();
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.app, "fraud");
                assert_eq!(args.resource_id, "abc");
                assert!(args.workload_id.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
