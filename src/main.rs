use anyhow::Result;
use clap::Parser;

use strata::cli::{Cli, Commands};
use strata::commands;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler; each one initializes logging
    // from the effective config
    match cli.command {
        Commands::Build(args) => commands::build::run(args),
        Commands::Fetch(args) => commands::fetch::run(args),
        Commands::List(args) => commands::fetch::list(args),
        Commands::Version(args) => commands::version::run(args),
        Commands::Keys(args) => commands::keys::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Config(args) => commands::config::run(args.command),
    }
}
