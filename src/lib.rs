// Library interface for GDDP
// This allows integration tests and external code to use GDDP's modules

pub mod build;
pub mod cancel;
pub mod cli;
pub mod cli_utils;
pub mod commands;
pub mod compute;
pub mod config;
pub mod config_discovery;
pub mod error;
pub mod formula;
pub mod graph;
pub mod key;
pub mod logging;
pub mod merger;
pub mod raster;
pub mod scheduler;
pub mod store;
pub mod worker;
pub mod xdg;

// Re-export commonly used types
pub use build::{BuildOptions, BuildReport, Builder};
pub use cancel::CancelFlag;
pub use formula::{Formula, Registry};
pub use graph::{DependencyResolver, TaskGraph};
pub use raster::{GridCodec, Raster, RasterCodec};
pub use store::StoreClient;
