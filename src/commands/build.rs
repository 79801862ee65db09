/// `gddp build` command implementation
///
/// Resolves the requested keys, then fetches, computes and publishes every
/// missing artifact. The build runs on a blocking thread; SIGINT or SIGTERM
/// cancels in-flight transfers and exits with status 130.
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

use crate::build::{BuildReport, Builder};
use crate::cancel::CancelFlag;
use crate::cli::BuildCommandArgs;
use crate::cli_utils::gddp_prefix;
use crate::logging::{operations, status};
use crate::raster::GridCodec;

pub async fn run(args: BuildCommandArgs) -> Result<()> {
    let merged = super::prepare(&args.common, Some(&args.build))?;
    let cancel = CancelFlag::new();
    let json = args.json;

    let worker_cancel = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || -> Result<BuildReport> {
        let mut options = merged.build_options();
        options.dry_run = args.dry_run;
        options.synchronous = args.synchronous;

        let registry = Arc::new(merged.registry()?);
        let store = Arc::new(merged.store_client(worker_cancel)?);
        let builder = Builder::new(registry, store, Arc::new(GridCodec), options);
        Ok(builder.build(&args.keys)?)
    });

    let result = tokio::select! {
        result = &mut handle => result,
        Ok(signal) = super::shutdown_signal() => {
            warn!(
                operation = operations::COMPLETE,
                status = status::ERROR,
                "received {}, cancelling build",
                signal
            );
            cancel.cancel();
            if let Ok(Err(e)) = handle.await {
                tracing::debug!("build stopped: {:#}", e);
            }
            eprintln!("{} Build cancelled", gddp_prefix());
            std::process::exit(super::EXIT_INTERRUPTED);
        }
    };

    let report = result.context("Build task panicked")??;
    print_report(&report, json)?;

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &BuildReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} Built {} artifacts ({} already available)",
        gddp_prefix(),
        report.built.len(),
        report.skipped.len()
    );
    for key in &report.requested {
        println!("  {}", key);
    }
    if !report.failed.is_empty() {
        println!("{} {} tasks failed:", gddp_prefix(), report.failed.len());
        for failure in &report.failed {
            println!("  {}", failure);
        }
    }
    Ok(())
}
