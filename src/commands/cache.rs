/// `gddp cache` command implementation
use anyhow::{Context, Result};

use crate::cli::CacheCommands;
use crate::cli_utils::gddp_prefix;

pub fn run(command: CacheCommands) -> Result<()> {
    match command {
        CacheCommands::Clean { common } => {
            let merged = super::prepare(&common, None)?;
            let store = super::store(&merged)?;
            let removed = store
                .clean_cache()
                .with_context(|| format!("Failed to clean cache: {}", merged.cache_dir.display()))?;
            println!(
                "{} Removed {} files from {}",
                gddp_prefix(),
                removed,
                merged.cache_dir.display()
            );
            Ok(())
        }
    }
}
