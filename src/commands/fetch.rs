use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::cli::{FetchArgs, ListArgs};
use crate::gateway::ContextStore;

pub fn run(args: FetchArgs) -> Result<()> {
    let config = super::prepare(&args.common)?;
    let store = super::open_store(&config)?;
    let gateway = ContextStore::new(store, config.namespace());

    info!("Fetching context {} of {}", args.context_id, args.app);

    let ctx = gateway
        .fetch(&args.context_id, &args.app)
        .with_context(|| format!("Failed to fetch context {}", args.context_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
        return Ok(());
    }

    println!("Context: {}", ctx.id());
    println!("  Key: {}", ctx.key());
    println!("  Environment: {}", ctx.environment.name);
    println!("  Dataset version: {}", ctx.dataset_version);
    println!("  Root: {}", ctx.root);
    println!("\nResources:");

    for resource in ctx.all_resources() {
        println!(
            "  {:<20} {:<32} {}",
            resource.kind().as_str(),
            resource.name(),
            resource.id()
        );
    }

    Ok(())
}

pub fn list(args: ListArgs) -> Result<()> {
    let config = super::prepare(&args.common)?;
    let store = super::open_store(&config)?;
    let namespace = config.namespace();
    let gateway = ContextStore::new(store.clone(), namespace.clone());

    let ids = gateway.list_contexts(&args.app)?;
    if ids.is_empty() {
        println!("No contexts stored for {}", args.app);
        return Ok(());
    }

    for id in &ids {
        let key = namespace.context_key(&args.app, id);
        let stored_at = store
            .created_at(&key)?
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}", id, stored_at);
    }

    let stats = store.stats()?;
    println!(
        "\n{} contexts ({} objects, {} bytes in store)",
        ids.len(),
        stats.total_objects,
        stats.total_bytes
    );
    if let Some(dir) = &stats.store_dir {
        println!("Store: {}", dir.display());
    }

    Ok(())
}
