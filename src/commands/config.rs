use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::cli::{CommonConfigArgs, ConfigCommands};
use crate::config::StrataConfig;

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { path } => validate(&path),
        ConfigCommands::Generate => generate(),
        ConfigCommands::Show { common } => show(&common),
    }
}

fn validate(path: &Path) -> Result<()> {
    info!("Validating config file: {}", path.display());

    let config = StrataConfig::from_file(path)?;
    config.validate()?;

    println!("✓ Configuration file is valid: {}", path.display());
    println!("\nSummary:");
    println!("  - Store directory: {}", config.store.dir);
    println!("  - Apps directory: {}", config.namespace.apps_dir);
    println!(
        "  - Environment override: {}",
        config.build.environment.as_deref().unwrap_or("none")
    );
    println!("  - Validation: {}", config.build.validate);

    Ok(())
}

fn generate() -> Result<()> {
    info!("Generating example config");
    println!("{}", StrataConfig::example()?);
    Ok(())
}

fn show(common: &CommonConfigArgs) -> Result<()> {
    let config = super::prepare(common)?;
    info!("Showing effective configuration");

    println!("Effective Configuration:\n");
    match &config.source {
        Some(path) => println!("  Source: {}", path.display()),
        None => println!("  Source: defaults"),
    }
    println!("  Store directory: {}", config.store_dir.display());
    println!("  Apps directory: {}", config.apps_dir);
    println!(
        "  Environment override: {}",
        config.environment.as_deref().unwrap_or("none")
    );
    println!("  Validation: {}", config.validate);
    println!("  Log level: {}", config.log_level);

    Ok(())
}

