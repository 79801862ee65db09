/// `gddp exists` command implementation
///
/// Exits 1 when any key is missing.
use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::KeysArgs;
use crate::cli_utils::gddp_prefix;

#[derive(Serialize)]
struct ExistsOutput {
    key: String,
    exists: bool,
}

pub fn run(args: KeysArgs) -> Result<()> {
    let merged = super::prepare(&args.common, None)?;
    let store = super::store(&merged)?;

    let mut outputs = Vec::with_capacity(args.keys.len());
    for key in &args.keys {
        let exists = store
            .exists(key)
            .with_context(|| format!("Failed to check existence: {}", key))?;
        outputs.push(ExistsOutput {
            key: key.clone(),
            exists,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        for output in &outputs {
            if output.exists {
                println!("{} Exists: {}", gddp_prefix(), output.key);
            } else {
                println!("{} Missing: {}", gddp_prefix(), output.key);
            }
        }
    }

    if outputs.iter().any(|o| !o.exists) {
        std::process::exit(1);
    }
    Ok(())
}
