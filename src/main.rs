use anyhow::Result;
use clap::Parser;

use gddp::cli::{Cli, Commands};
use gddp::commands;
use gddp::logging::{self, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler; commands that read a merged
    // config install their own subscriber
    match cli.command {
        Commands::Build(args) => commands::build::run(args).await,
        Commands::Plan(args) => commands::blocking(move || commands::plan::run(args)).await,
        Commands::Exists(args) => commands::blocking(move || commands::exists::run(args)).await,
        Commands::Fetch(args) => commands::blocking(move || commands::fetch::run(args)).await,
        Commands::PruneRemote(args) => commands::blocking(move || commands::prune::run(args)).await,
        Commands::Cache(args) => commands::blocking(move || commands::cache::run(args.command)).await,
        Commands::Formulas(args) => {
            logging::init(false, LogFormat::from_env());
            commands::formulas::run(args)
        }
        Commands::Config(args) => {
            logging::init(false, LogFormat::from_env());
            commands::config::run(args.command)
        }
    }
}
