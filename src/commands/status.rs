use anyhow::Result;

use crate::cli::StatusArgs;
use crate::gateway::ContextStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let config = super::prepare(&args.common)?;
    let store = super::open_store(&config)?;
    let gateway = ContextStore::new(store, config.namespace());

    let record = match &args.workload_id {
        Some(workload_id) => gateway.read_status(&args.app, &args.resource_id, workload_id)?,
        None => gateway.latest_status(&args.app, &args.resource_id)?,
    };

    let Some(record) = record else {
        anyhow::bail!("No status recorded for resource {}", args.resource_id);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Resource: {}", record.resource_id);
    println!("  Workload: {}", record.workload_id);
    println!("  Status: {:?}", record.code);
    if let Some(start) = record.start {
        println!("  Started: {}", start.to_rfc3339());
    }
    if let Some(end) = record.end {
        println!("  Ended: {}", end.to_rfc3339());
    }
    if let Some(message) = &record.message {
        println!("  Message: {}", message);
    }

    Ok(())
}
