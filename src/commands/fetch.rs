/// `gddp fetch` command implementation
use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::KeysArgs;
use crate::cli_utils::gddp_prefix;

#[derive(Serialize)]
struct FetchOutput {
    key: String,
    path: String,
}

pub fn run(args: KeysArgs) -> Result<()> {
    let merged = super::prepare(&args.common, None)?;
    let store = super::store(&merged)?;

    let mut outputs = Vec::with_capacity(args.keys.len());
    for key in &args.keys {
        let path = store
            .fetch(key)
            .with_context(|| format!("Failed to fetch: {}", key))?;
        if !args.json {
            println!("{} Fetched {} -> {}", gddp_prefix(), key, path.display());
        }
        outputs.push(FetchOutput {
            key: key.clone(),
            path: path.display().to_string(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }
    Ok(())
}
