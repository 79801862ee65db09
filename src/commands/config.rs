use anyhow::Result;
use tracing::info;

use crate::cli::{CommonConfigArgs, ConfigCommands};
use crate::config::GddpConfig;
use crate::merger::MergedConfig;

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { path } => validate(&path),
        ConfigCommands::Example => example(),
        ConfigCommands::Show { common } => show(&common),
    }
}

fn validate(path: &str) -> Result<()> {
    info!("Validating config file: {}", path);

    let config = GddpConfig::from_file(path)?;
    config.validate()?;

    println!("✓ Configuration file is valid: {}", path);
    println!("\nSummary:");
    println!("  - Store: {} ({}/{})", config.store.endpoint, config.store.bucket, config.store.prefix);
    println!("  - Cache directory: {}", config.cache.dir);
    println!("  - Baseline: {}", config.build.baseline);
    println!(
        "  - Retries: {} every {}",
        config.retry.attempts, config.retry.delay
    );

    Ok(())
}

fn example() -> Result<()> {
    println!("{}", GddpConfig::example()?);
    Ok(())
}

fn show(common: &CommonConfigArgs) -> Result<()> {
    info!("Showing effective configuration");

    let merged = MergedConfig::load(common, None)?;

    println!("Effective Configuration:\n");
    println!("{}", toml::to_string_pretty(&merged)?);

    Ok(())
}
