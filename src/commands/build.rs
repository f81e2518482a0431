use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::assembler::ContextBuilder;
use crate::cli::BuildArgs;
use crate::context::Context;
use crate::files::load_files;
use crate::gateway::ContextStore;
use crate::storage::{MemoryStore, ObjectStore, VersionStore};
use crate::userconfig::AppConfig;

pub fn run(args: BuildArgs) -> Result<()> {
    let config = super::prepare(&args.common)?;
    let namespace = config.namespace();

    let mut app_config = AppConfig::from_file(&args.app_config)?;
    if let Some(environment) = args.environment.clone().or(config.environment.clone()) {
        app_config.environment.name = environment;
    }
    let app_name = app_config.app.name.clone();

    let files_dir = files_dir(&args);
    let files = load_files(&files_dir)
        .with_context(|| format!("Failed to load files from {}", files_dir.display()))?;

    info!(
        "Building context for {} ({} files from {})",
        app_name,
        files.len(),
        files_dir.display()
    );

    // --no-persist resolves against a throwaway store
    let (objects, versions): (Arc<dyn ObjectStore>, Arc<dyn VersionStore>) = if args.no_persist {
        let store = Arc::new(MemoryStore::new());
        (store.clone() as Arc<dyn ObjectStore>, store as Arc<dyn VersionStore>)
    } else {
        let store = super::open_store(&config)?;
        (store.clone() as Arc<dyn ObjectStore>, store as Arc<dyn VersionStore>)
    };

    let mut builder = ContextBuilder::new(namespace.clone(), versions)?;
    if args.skip_validation || !config.validate {
        builder = builder.with_validator(|_: &Context| -> crate::error::Result<()> { Ok(()) });
    }

    let ctx = builder
        .build(&app_config, &files, args.ignore_cache)
        .with_context(|| format!("Failed to build context for {}", app_name))?;

    let persisted = if args.no_persist {
        None
    } else {
        Some(ContextStore::new(objects, namespace).persist(&ctx)?)
    };

    if args.json {
        print_json(&ctx, persisted.as_deref())?;
    } else {
        print_summary(&ctx, persisted.as_deref());
    }

    Ok(())
}

/// `--files`, or the directory holding the app config
fn files_dir(args: &BuildArgs) -> PathBuf {
    if let Some(dir) = &args.files {
        return dir.clone();
    }

    match args.app_config.parent() {
        Some(parent) if parent != Path::new("") => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resource_counts(ctx: &Context) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for resource in ctx.all_resources() {
        *counts.entry(resource.kind().as_str()).or_insert(0) += 1;
    }
    counts
}

fn print_json(ctx: &Context, persisted: Option<&str>) -> Result<()> {
    let summary = serde_json::json!({
        "context_id": ctx.id(),
        "key": ctx.key(),
        "persisted": persisted.is_some(),
        "app": ctx.app.name,
        "environment": ctx.environment.name,
        "dataset_version": ctx.dataset_version,
        "root": ctx.root,
        "resources": resource_counts(ctx),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_summary(ctx: &Context, persisted: Option<&str>) {
    println!("✓ Context built: {}", ctx.id());
    println!("\nSummary:");
    println!("  - App: {}", ctx.app.name);
    println!("  - Environment: {}", ctx.environment.name);
    println!("  - Dataset version: {}", ctx.dataset_version);
    match persisted {
        Some(key) => println!("  - Stored at: {}", key),
        None => println!("  - Not persisted"),
    }
    println!("  - Resources: {}", ctx.resource_count());

    for (kind, count) in resource_counts(ctx) {
        println!("    {}: {}", kind, count);
    }
}
