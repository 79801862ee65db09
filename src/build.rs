//! Build orchestration: validate, resolve, schedule, report

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancelFlag;
use crate::error::{BuildError, KeyError};
use crate::formula::Registry;
use crate::graph::{DependencyResolver, TaskGraph};
use crate::key;
use crate::logging::{operations, status};
use crate::raster::RasterCodec;
use crate::scheduler::{FailurePolicy, RunOptions, TaskOutcome};
use crate::store::StoreClient;
use crate::worker::{Consumers, Worker};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_workers: usize,
    pub timeout: Duration,
    /// Abort on the first failing task; otherwise record it and continue
    pub strict: bool,
    pub skip_existing: bool,
    pub dry_run: bool,
    /// Run every task on the calling thread
    pub synchronous: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        let run = RunOptions::default();
        Self {
            max_workers: run.max_workers,
            timeout: run.timeout,
            strict: true,
            skip_existing: true,
            dry_run: false,
            synchronous: false,
        }
    }
}

impl BuildOptions {
    fn policy(&self) -> FailurePolicy {
        if self.strict {
            FailurePolicy::Strict
        } else {
            FailurePolicy::Permissive
        }
    }
}

/// Outcome of one build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub requested: Vec<String>,
    pub built: Vec<String>,
    pub skipped: Vec<String>,
    /// Permissive mode only: `"{key}: {error}"` per failed task
    pub failed: Vec<String>,
}

impl BuildReport {
    fn from_outcomes(requested: Vec<String>, outcomes: BTreeMap<String, TaskOutcome>) -> Self {
        let mut report = Self {
            requested,
            built: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };
        for (task, outcome) in outcomes {
            match outcome {
                TaskOutcome::Completed(_) => report.built.push(task),
                TaskOutcome::Skipped(_) => report.skipped.push(task),
                TaskOutcome::Failed(message) => report.failed.push(message),
            }
        }
        report
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves requested keys against a registry and builds them through a store
pub struct Builder {
    registry: Arc<Registry>,
    store: Arc<StoreClient>,
    codec: Arc<dyn RasterCodec>,
    options: BuildOptions,
}

impl Builder {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<StoreClient>,
        codec: Arc<dyn RasterCodec>,
        options: BuildOptions,
    ) -> Self {
        Self {
            registry,
            store,
            codec,
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    fn cancel(&self) -> &CancelFlag {
        self.store.cancel_flag()
    }

    /// Check every requested key and return its canonical form
    ///
    /// Legacy five-field keys gain the default dataset, so a key and its
    /// legacy spelling name the same artifact and are built once. Keys
    /// naming an unregistered formula are left for the resolver, which
    /// reports all undefined formulas together.
    pub fn validate(&self, keys: &[String]) -> Result<Vec<String>, KeyError> {
        let mut canonical: Vec<String> = Vec::with_capacity(keys.len());
        for requested in keys {
            let fields = key::decode(requested)?;
            let key = if self.registry.contains(&fields.formula) {
                self.registry.validate_key(requested)?
            } else {
                key::encode(&fields)
            };
            if !canonical.contains(&key) {
                canonical.push(key);
            }
        }
        Ok(canonical)
    }

    /// Resolve requested keys into a plan without running it
    pub fn plan(&self, keys: &[String]) -> Result<TaskGraph, BuildError> {
        let keys = self.validate(keys)?;
        let graph = DependencyResolver::new(&self.registry, self.store.as_ref())
            .skip_existing(self.options.skip_existing)
            .permissive(!self.options.strict)
            .resolve(&keys)?;
        Ok(graph)
    }

    /// Resolve and build the requested keys
    pub fn build(&self, keys: &[String]) -> Result<BuildReport, BuildError> {
        let graph = self.plan(keys)?;
        if graph.nodes.is_empty() {
            info!(
                operation = operations::COMPLETE,
                status = status::SKIP,
                "nothing to build, {} artifacts already available",
                graph.skips.len()
            );
        }

        let worker = Arc::new(
            Worker::new(Arc::clone(&self.store), Arc::clone(&self.codec))
                .with_dry_run(self.options.dry_run)
                .with_consumers(Arc::new(Consumers::from_graph(&graph))),
        );
        let mut tree = graph.into_task_tree(|node| worker.task_fn(node));

        let outcomes = if self.options.synchronous {
            tree.run_synchronous(self.options.policy(), self.cancel())?
        } else {
            let run = RunOptions {
                policy: self.options.policy(),
                max_workers: self.options.max_workers,
                timeout: self.options.timeout,
            };
            tree.run_concurrent(&run, self.cancel())?
        };

        let report = BuildReport::from_outcomes(graph.requested, outcomes);
        for failure in &report.failed {
            warn!(operation = operations::COMPLETE, status = status::ERROR, "{}", failure);
        }
        info!(
            operation = operations::COMPLETE,
            status = if report.is_success() { status::SUCCESS } else { status::ERROR },
            built = report.built.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "build finished"
        );
        Ok(report)
    }
}
