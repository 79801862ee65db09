//! Dependency resolver
//!
//! Expands requested keys depth-first into a build plan. Each distinct key is
//! expanded at most once (the visited set is keyed by the literal string), so
//! diamond-shaped dependencies collapse into a single node.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ResolveError, StoreError};
use crate::formula::Registry;
use crate::key::{self, is_source_uri};
use crate::logging::{operations, status};
use crate::scheduler::{TaskFn, TaskTree};

/// Answers "is this artifact already materialized?"
pub trait ExistenceCheck {
    fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// One artifact to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    pub key: String,
    pub requires: Vec<String>,
    /// Compute function applied to the concatenated inputs
    pub compute: String,
}

/// Resolved build plan
///
/// `nodes` are in dependency order (every node follows its requirements);
/// `skips` are satisfied leaves: raw sources, existing artifacts, and in
/// permissive mode keys whose formula is undefined.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskGraph {
    pub requested: Vec<String>,
    pub nodes: Vec<TaskNode>,
    pub skips: BTreeSet<String>,
}

impl TaskGraph {
    /// Total number of tasks, skip-tasks included
    pub fn len(&self) -> usize {
        self.nodes.len() + self.skips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.skips.is_empty()
    }

    pub fn node(&self, key: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.skips.contains(key) || self.node(key).is_some()
    }

    pub fn is_skip(&self, key: &str) -> bool {
        self.skips.contains(key)
    }

    /// Skip-tasks that are raw-source URIs
    pub fn external(&self) -> impl Iterator<Item = &String> {
        self.skips.iter().filter(|k| is_source_uri(k))
    }

    /// Load the plan into a scheduler tree, building each task's function
    pub fn into_task_tree<F>(&self, mut task_fn: F) -> TaskTree
    where
        F: FnMut(&TaskNode) -> TaskFn,
    {
        let mut tree = TaskTree::new();
        for skip in &self.skips {
            tree.mark_skip(skip.clone());
        }
        for node in &self.nodes {
            tree.add(task_fn(node), node.key.clone(), node.requires.clone());
        }
        tree
    }
}

pub struct DependencyResolver<'a> {
    registry: &'a Registry,
    store: &'a dyn ExistenceCheck,
    skip_existing: bool,
    permissive: bool,
    visited: HashSet<String>,
    existence: HashMap<String, bool>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn ExistenceCheck) -> Self {
        Self {
            registry,
            store,
            skip_existing: true,
            permissive: false,
            visited: HashSet::new(),
            existence: HashMap::new(),
        }
    }

    /// Treat artifacts the store already has as skip-tasks (default on)
    pub fn skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    /// Turn undefined formulas into skip-tasks instead of failing
    pub fn permissive(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    /// Expand the requested keys into a complete plan
    pub fn resolve(&mut self, requested: &[String]) -> Result<TaskGraph, ResolveError> {
        let mut graph = TaskGraph {
            requested: requested.to_vec(),
            ..TaskGraph::default()
        };
        let mut undefined: BTreeSet<String> = BTreeSet::new();
        let mut undefined_keys: Vec<String> = Vec::new();

        for key in requested {
            self.resolve_recursive(key, &mut graph, &mut undefined, &mut undefined_keys)?;
        }

        if !undefined.is_empty() {
            if !self.permissive {
                return Err(ResolveError::UndefinedFormula(undefined.into_iter().collect()));
            }
            for key in undefined_keys {
                graph.skips.insert(key);
            }
        }

        info!(
            operation = operations::RESOLVE,
            status = status::SUCCESS,
            requested = requested.len(),
            nodes = graph.nodes.len(),
            skips = graph.skips.len(),
            "resolved build plan"
        );
        Ok(graph)
    }

    fn resolve_recursive(
        &mut self,
        key: &str,
        graph: &mut TaskGraph,
        undefined: &mut BTreeSet<String>,
        undefined_keys: &mut Vec<String>,
    ) -> Result<(), ResolveError> {
        if !self.visited.insert(key.to_string()) {
            return Ok(());
        }

        if is_source_uri(key) {
            graph.skips.insert(key.to_string());
            return Ok(());
        }

        if self.skip_existing && self.exists(key)? {
            debug!(operation = operations::RESOLVE, status = status::SKIP, key = %key, "artifact exists");
            graph.skips.insert(key.to_string());
            return Ok(());
        }

        let fields = key::decode(key)?;
        let Ok(formula) = self.registry.lookup(&fields.formula) else {
            undefined.insert(fields.formula);
            undefined_keys.push(key.to_string());
            return Ok(());
        };
        let requires = formula.requires(&fields)?;
        let compute = formula.compute.clone();

        for requirement in &requires {
            self.resolve_recursive(requirement, graph, undefined, undefined_keys)?;
        }

        graph.nodes.push(TaskNode {
            key: key.to_string(),
            requires,
            compute,
        });
        Ok(())
    }

    /// Memoized existence check, at most one store query per key
    fn exists(&mut self, key: &str) -> Result<bool, ResolveError> {
        if let Some(found) = self.existence.get(key) {
            return Ok(*found);
        }
        let found = self
            .store
            .exists(key)
            .map_err(|source| ResolveError::Existence {
                key: key.to_string(),
                source,
            })?;
        self.existence.insert(key.to_string(), found);
        Ok(found)
    }
}
