use anyhow::Result;

use crate::cli::KeysArgs;
use crate::keys::KeyNamespace;

pub fn run(args: KeysArgs) -> Result<()> {
    let config = super::prepare(&args.common)?;
    for (label, key) in keys(&config.namespace(), &args) {
        println!("{:<16} {}", label, key);
    }
    Ok(())
}

/// Keys derivable from the given ids, in a stable order
fn keys(namespace: &KeyNamespace, args: &KeysArgs) -> Vec<(&'static str, String)> {
    let app = args.app.as_str();
    let mut keys = vec![
        ("app", namespace.app_prefix(app)),
        ("contexts", namespace.contexts_prefix(app)),
        ("statuses", namespace.status_prefix(app)),
    ];

    if let Some(context_id) = &args.context_id {
        keys.push(("context", namespace.context_key(app, context_id)));
    }

    if let Some(resource_id) = &args.resource_id {
        keys.push(("latest_workload", namespace.latest_workload_key(app, resource_id)));
        if let Some(workload_id) = &args.workload_id {
            keys.push(("status", namespace.status_key(app, resource_id, workload_id)));
        }
    }

    if let Some(workload_id) = &args.workload_id {
        keys.push(("workload_spec", namespace.workload_spec_key(app, workload_id)));
    }

    keys
}
