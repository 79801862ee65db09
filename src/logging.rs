//! Structured logging utilities for gddp
//!
//! All logs use structured fields so a build can be followed task by task.
//!
//! # Log Format Conventions
//!
//! - `operation`: The operation being performed (e.g., "fetch", "publish", "dispatch")
//! - `status`: The result status ("success", "hit", "retry", "error")
//! - `key`: Artifact key or source URI
//! - `task`: Scheduler task id (same as the artifact key it builds)
//! - `attempt`: Transport attempt number, starting at 1
//! - `size_bytes`: Size in bytes
//!
//! # Examples
//!
//! ```rust
//! use gddp::logging::{operations, status};
//! use tracing::info;
//!
//! let key = "annual_pr_rcp85_CCSM4_2050_nexgddp.tif";
//! info!(
//!     operation = operations::PUBLISH,
//!     status = status::SUCCESS,
//!     key = %key,
//!     size_bytes = 4096,
//!     "artifact published"
//! );
//! ```

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Custom formatter that shows "gddp" instead of full module path
struct GddpFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for GddpFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:5}(gddp)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(gddp): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    Pretty,
    /// Compact format (for CI/production)
    Compact,
    /// JSON format (for log aggregation systems)
    Json,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to the environment default
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// Parse from environment variable (GDDP_LOG_FORMAT)
    pub fn from_env() -> Self {
        std::env::var("GDDP_LOG_FORMAT")
            .ok()
            .and_then(|value| Self::parse(&value))
            .unwrap_or_else(|| {
                // Default: pretty for dev, compact for CI
                if std::env::var("CI").is_ok() {
                    Self::Compact
                } else {
                    Self::Pretty
                }
            })
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "warn")
/// - `GDDP_LOG_FORMAT`: Set format ("pretty", "compact", "json")
/// - `CI`: If set, defaults to compact format
///
/// `verbose` lowers the default level to debug when `RUST_LOG` is unset.
pub fn init(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init: tests and repeated command invocations may install it twice
    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(GddpFormatter { with_ansi: true })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(GddpFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Standard field names for consistent logging
pub mod fields {
    /// Operation name (e.g., "fetch", "publish")
    pub const OPERATION: &str = "operation";
    /// Status (e.g., "success", "retry", "error")
    pub const STATUS: &str = "status";
    /// Artifact key or source URI
    pub const KEY: &str = "key";
    /// Scheduler task id
    pub const TASK: &str = "task";
    /// Transport attempt number
    pub const ATTEMPT: &str = "attempt";
    /// Size in bytes
    pub const SIZE_BYTES: &str = "size_bytes";
    /// Tasks currently dispatched
    pub const IN_PROCESS: &str = "in_process";
    /// Tasks not yet completed
    pub const REMAINING: &str = "remaining";
}

/// Operation names for consistent logging
pub mod operations {
    pub const RESOLVE: &str = "resolve";
    pub const DISPATCH: &str = "dispatch";
    pub const COMPLETE: &str = "complete";
    pub const FETCH: &str = "fetch";
    pub const PUBLISH: &str = "publish";
    pub const LIST: &str = "list";
    pub const PURGE: &str = "purge";
    pub const PRUNE: &str = "prune";
    pub const COMPUTE: &str = "compute";
}

/// Status values for consistent logging
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const HIT: &str = "hit";
    pub const SKIP: &str = "skip";
    pub const WAIT: &str = "wait";
    pub const RETRY: &str = "retry";
    pub const ERROR: &str = "error";
}
