//! Worker: turns one planned task into a published artifact
//!
//! Fetches every input, stacks them along the band axis in requirement order,
//! applies the formula's compute function, publishes the result under its key
//! and only then moves it to its cache name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::cancel::PartialFile;
use crate::compute;
use crate::error::{BoxError, StoreError, WorkerError};
use crate::graph::{TaskGraph, TaskNode};
use crate::key::{self, is_source_uri};
use crate::logging::{operations, status};
use crate::raster::{Raster, RasterCodec};
use crate::scheduler::{TaskFn, TaskOutcome};
use crate::store::StoreClient;

/// Remaining consumers of every input in a plan
///
/// Under nocache an input's cached file is only purged once the last task
/// reading it has finished, so tasks sharing an input never race on it.
#[derive(Debug, Default)]
pub struct Consumers {
    pending: Mutex<HashMap<String, usize>>,
}

impl Consumers {
    pub fn from_graph(graph: &TaskGraph) -> Self {
        let mut pending = HashMap::new();
        for node in &graph.nodes {
            for input in &node.requires {
                *pending.entry(input.clone()).or_insert(0) += 1;
            }
        }
        Self {
            pending: Mutex::new(pending),
        }
    }

    /// Tasks still expected to read `key`
    pub fn pending(&self, key: &str) -> usize {
        match self.pending.lock() {
            Ok(pending) => pending.get(key).copied().unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(key).copied().unwrap_or(0),
        }
    }

    /// Record that one consumer of `key` is done; true once none remain
    pub fn release(&self, key: &str) -> bool {
        let mut pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        match pending.get_mut(key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                pending.remove(key);
                true
            }
            None => true,
        }
    }
}

pub struct Worker {
    store: Arc<StoreClient>,
    codec: Arc<dyn RasterCodec>,
    consumers: Arc<Consumers>,
    dry_run: bool,
}

impl Worker {
    pub fn new(store: Arc<StoreClient>, codec: Arc<dyn RasterCodec>) -> Self {
        Self {
            store,
            codec,
            consumers: Arc::new(Consumers::default()),
            dry_run: false,
        }
    }

    /// Return each task's key without touching the store
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Share input consumer counts across the tasks of one plan
    pub fn with_consumers(mut self, consumers: Arc<Consumers>) -> Self {
        self.consumers = consumers;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Build `key` from `requires` with the named compute function
    pub fn run(&self, key: &str, requires: &[String], function: &str) -> Result<String, WorkerError> {
        let compute = compute::lookup(function)?;
        if self.dry_run {
            debug!(operation = operations::COMPUTE, status = status::SKIP, key = %key, "dry run");
            return Ok(key.to_string());
        }

        let result = self.build(key, requires, function, compute);
        if self.store.nocache() {
            self.release(key, requires, result.is_ok());
        }
        result.map(|()| key.to_string())
    }

    fn build(
        &self,
        key: &str,
        requires: &[String],
        function: &str,
        compute: compute::ComputeFn,
    ) -> Result<(), WorkerError> {
        if requires.is_empty() {
            return Err(WorkerError::NoInputs(key.to_string()));
        }

        let dataset = key::decode(key)?.dataset;
        let mut layers = Vec::with_capacity(requires.len());
        for input in requires {
            let path = self.store.fetch(input)?;
            let mut raster = self.codec.read(&path)?;
            if is_source_uri(input) {
                raster.normalize_source(&dataset);
            }
            layers.push(raster);
        }
        let stacked = Raster::concat(layers)?;

        self.check_cancelled(key)?;
        info!(
            operation = operations::COMPUTE,
            key = %key,
            function,
            bands = stacked.bands(),
            "processing"
        );
        let output = compute(&stacked)?;

        // Only a published artifact may appear under its cache name
        let destination = self.store.local_path(key);
        let partial = PartialFile::create(&destination).map_err(|e| StoreError::io(&destination, e))?;
        self.codec.write(&output, partial.path())?;
        self.store.publish(partial.path(), key)?;
        partial.commit().map_err(|e| StoreError::io(&destination, e))?;
        Ok(())
    }

    /// Purge inputs no other task still needs, and the output if nothing reads it
    fn release(&self, key: &str, requires: &[String], published: bool) {
        let done: Vec<_> = requires
            .iter()
            .filter(|input| self.consumers.release(input))
            .map(|input| self.store.local_path(input))
            .collect();
        self.store.purge(&done);
        if published && self.consumers.pending(key) == 0 {
            self.store.purge(&[self.store.local_path(key)]);
        }
    }

    fn check_cancelled(&self, key: &str) -> Result<(), StoreError> {
        if self.store.cancel_flag().is_cancelled() {
            return Err(StoreError::Cancelled(key.to_string()));
        }
        Ok(())
    }

    /// Scheduler function for one planned node
    pub fn task_fn(self: &Arc<Self>, node: &TaskNode) -> TaskFn {
        let worker = Arc::clone(self);
        let requires = node.requires.clone();
        let function = node.compute.clone();
        Arc::new(move |task: &str, _inputs: &[TaskOutcome]| -> Result<String, BoxError> {
            Ok(worker.run(task, &requires, &function)?)
        })
    }
}
