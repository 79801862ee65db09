/// `gddp plan` command implementation
use anyhow::Result;
use std::sync::Arc;

use crate::build::Builder;
use crate::cli::{PlanArgs, PlanFormat};
use crate::cli_utils::gddp_prefix;
use crate::graph::TaskGraph;
use crate::raster::GridCodec;

pub fn run(args: PlanArgs) -> Result<()> {
    let merged = super::prepare(&args.common, Some(&args.build))?;
    let registry = Arc::new(merged.registry()?);
    let store = Arc::new(super::store(&merged)?);
    let builder = Builder::new(registry, store, Arc::new(GridCodec), merged.build_options());

    let graph = builder.plan(&args.keys)?;

    match args.format {
        PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        PlanFormat::Text => print_text(&graph),
    }
    Ok(())
}

fn print_text(graph: &TaskGraph) {
    println!(
        "{} {} tasks to build, {} satisfied",
        gddp_prefix(),
        graph.nodes.len(),
        graph.skips.len()
    );
    for node in &graph.nodes {
        println!("  build {} = {}({})", node.key, node.compute, node.requires.len());
        for input in &node.requires {
            println!("          <- {}", input);
        }
    }
    for key in &graph.skips {
        println!("  skip  {}", key);
    }
}
