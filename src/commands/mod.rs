pub mod build;
pub mod cache;
pub mod config;
pub mod exists;
pub mod fetch;
pub mod formulas;
pub mod plan;
pub mod prune;

use anyhow::{Context, Result};

use crate::cancel::CancelFlag;
use crate::cli::{BuildArgs, CommonConfigArgs};
use crate::logging;
use crate::merger::MergedConfig;
use crate::store::StoreClient;

/// Exit status after SIGINT/SIGTERM stopped a build
pub const EXIT_INTERRUPTED: i32 = 130;

/// Merge configuration for a command and install the log subscriber it asks for
pub fn prepare(common: &CommonConfigArgs, build: Option<&BuildArgs>) -> Result<MergedConfig> {
    let merged = MergedConfig::load(common, build)?;
    logging::init(merged.verbose, merged.log_format());
    Ok(merged)
}

/// Store client for commands that never need to be cancelled
pub fn store(merged: &MergedConfig) -> Result<StoreClient> {
    merged.store_client(CancelFlag::new())
}

/// Run a synchronous command off the async runtime
///
/// The store talks to S3 through blocking HTTP clients, which must not be
/// created or dropped on a runtime thread.
pub async fn blocking<F>(command: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(command)
        .await
        .context("Command task panicked")?
}

/// Resolves with the name of the first shutdown signal received
pub async fn shutdown_signal() -> Result<&'static str> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        Ok::<_, anyhow::Error>("SIGINT")
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
        sigterm.recv().await;
        Ok::<_, anyhow::Error>("SIGTERM")
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<&'static str>>();

    tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    }
}
