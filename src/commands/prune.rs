/// `gddp prune-remote` command implementation
use anyhow::{Context, Result};

use crate::cli::PruneArgs;
use crate::cli_utils::gddp_prefix;

pub fn run(args: PruneArgs) -> Result<()> {
    let merged = super::prepare(&args.common, None)?;
    let store = super::store(&merged)?;

    let removed = store
        .prune_empty_remote_objects()
        .context("Failed to prune remote store")?;
    println!(
        "{} Removed {} empty objects under {}/{}",
        gddp_prefix(),
        removed,
        merged.bucket,
        merged.prefix
    );
    Ok(())
}
