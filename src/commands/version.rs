use anyhow::Result;
use tracing::info;

use crate::cli::VersionArgs;
use crate::storage::VersionStore;
use crate::version::DatasetVersionResolver;

pub fn run(args: VersionArgs) -> Result<()> {
    let config = super::prepare(&args.common)?;
    let store = super::open_store(&config)?;

    if args.invalidate {
        info!("Invalidating dataset version of {}", args.app);
        let version = DatasetVersionResolver::new(store).resolve(&args.app, true)?;
        println!("{}", version);
        return Ok(());
    }

    match store.current(&args.app)? {
        Some(version) => println!("{}", version),
        None => anyhow::bail!("No dataset version for {}; run a build first", args.app),
    }

    Ok(())
}
