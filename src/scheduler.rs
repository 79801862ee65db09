//! Task-tree scheduler
//!
//! Every task is in exactly one of four states: blocked (waiting on at least
//! one requirement), unblocked (ready to run), in process (dispatched to a
//! worker) or completed. Completing a task removes it from the `blocked_by`
//! set of each dependent; a dependent whose set becomes empty is unblocked.
//!
//! Skip-tasks (already-materialized artifacts and raw sources) enter the tree
//! through [`TaskTree::mark_skip`] and complete immediately with their own id
//! as the result.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::error::{BoxError, SchedulerError};
use crate::logging::{operations, status};

/// Compute function of a task: receives the task id and the outcomes of its
/// requirements in declaration order.
pub type TaskFn = Arc<dyn Fn(&str, &[TaskOutcome]) -> Result<String, BoxError> + Send + Sync>;

/// How often the coordinator wakes to check for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Result recorded for a completed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The compute function returned this value
    Completed(String),
    /// Skip-task; the value is the task id itself
    Skipped(String),
    /// Permissive mode only: `"{task}: {error}"`
    Failed(String),
}

impl TaskOutcome {
    pub fn value(&self) -> &str {
        match self {
            TaskOutcome::Completed(v) | TaskOutcome::Skipped(v) | TaskOutcome::Failed(v) => v,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }
}

/// What to do when a compute function returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the run with the first error
    #[default]
    Strict,
    /// Record the error string as the task's result and keep going
    Permissive,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: FailurePolicy,
    pub max_workers: usize,
    /// Longest wait for a completion while tasks are in process
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Strict,
            max_workers: num_cpus::get(),
            timeout: Duration::from_secs(900),
        }
    }
}

struct Task {
    /// `None` for skip-tasks
    func: Option<TaskFn>,
    requires: Vec<String>,
}

struct Job {
    task: String,
    func: TaskFn,
    inputs: Vec<TaskOutcome>,
}

type Completion = (String, Result<String, BoxError>);

#[derive(Default)]
pub struct TaskTree {
    tasks: HashMap<String, Task>,
    /// Insertion order, so runs and resets are reproducible
    order: Vec<String>,
    blocked_by: HashMap<String, HashSet<String>>,
    blocks: HashMap<String, Vec<String>>,
    unblocked: VecDeque<String>,
    in_process: HashSet<String>,
    completed: HashMap<String, TaskOutcome>,
}

impl TaskTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; returns false if the id is already registered
    pub fn add(&mut self, func: TaskFn, task: impl Into<String>, requires: Vec<String>) -> bool {
        self.insert(task.into(), Some(func), requires)
    }

    /// Complete a task immediately with its own id as the result
    ///
    /// Unknown ids are registered as leaves first.
    pub fn mark_skip(&mut self, task: impl Into<String>) {
        let task = task.into();
        if self.completed.contains_key(&task) {
            return;
        }
        match self.tasks.get_mut(&task) {
            Some(existing) => existing.func = None,
            None => {
                self.insert(task.clone(), None, Vec::new());
            }
        }
        self.blocked_by.remove(&task);
        self.unblocked.retain(|id| id != &task);
        self.complete(&task, TaskOutcome::Skipped(task.clone()));
    }

    fn insert(&mut self, task: String, func: Option<TaskFn>, requires: Vec<String>) -> bool {
        if self.tasks.contains_key(&task) {
            return false;
        }

        let mut waiting = HashSet::new();
        for requirement in &requires {
            self.blocks
                .entry(requirement.clone())
                .or_default()
                .push(task.clone());
            if !self.completed.contains_key(requirement) {
                waiting.insert(requirement.clone());
            }
        }

        if waiting.is_empty() {
            self.unblocked.push_back(task.clone());
        } else {
            self.blocked_by.insert(task.clone(), waiting);
        }

        self.order.push(task.clone());
        self.tasks.insert(task, Task { func, requires });
        true
    }

    fn complete(&mut self, task: &str, outcome: TaskOutcome) {
        self.in_process.remove(task);
        self.completed.insert(task.to_string(), outcome);

        let dependents = self.blocks.get(task).cloned().unwrap_or_default();
        for dependent in dependents {
            let now_free = match self.blocked_by.get_mut(&dependent) {
                Some(waiting) => {
                    waiting.remove(task);
                    waiting.is_empty()
                }
                None => false,
            };
            if now_free {
                self.blocked_by.remove(&dependent);
                self.unblocked.push_back(dependent);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn exists(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    pub fn requirements(&self, task: &str) -> Option<&[String]> {
        self.tasks.get(task).map(|t| t.requires.as_slice())
    }

    pub fn outcome(&self, task: &str) -> Option<&TaskOutcome> {
        self.completed.get(task)
    }

    pub fn is_done(&self) -> bool {
        self.completed.len() == self.tasks.len()
    }

    /// Requirements that are not themselves registered tasks
    pub fn undefined_tasks(&self) -> Vec<String> {
        let undefined: BTreeSet<&String> = self
            .tasks
            .values()
            .flat_map(|t| t.requires.iter())
            .filter(|r| !self.tasks.contains_key(*r))
            .collect();
        undefined.into_iter().cloned().collect()
    }

    /// Tasks not yet completed, sorted
    pub fn pending(&self) -> Vec<String> {
        let mut pending: Vec<String> = self
            .order
            .iter()
            .filter(|id| !self.completed.contains_key(*id))
            .cloned()
            .collect();
        pending.sort();
        pending
    }

    fn blocked(&self) -> Vec<String> {
        let mut blocked: Vec<String> = self.blocked_by.keys().cloned().collect();
        blocked.sort();
        blocked
    }

    fn in_process_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.in_process.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn results(&self) -> BTreeMap<String, TaskOutcome> {
        self.completed
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Forget all progress so the same tree can run again
    pub fn reset(&mut self) {
        let order = std::mem::take(&mut self.order);
        let mut tasks = std::mem::take(&mut self.tasks);
        self.blocked_by.clear();
        self.blocks.clear();
        self.unblocked.clear();
        self.in_process.clear();
        self.completed.clear();

        let mut skipped = Vec::new();
        for id in order {
            if let Some(task) = tasks.remove(&id) {
                if task.func.is_none() {
                    skipped.push(id.clone());
                }
                self.insert(id, task.func, task.requires);
            }
        }
        for id in skipped {
            self.blocked_by.remove(&id);
            self.unblocked.retain(|u| u != &id);
            self.complete(&id, TaskOutcome::Skipped(id.clone()));
        }
    }

    fn check_defined(&self) -> Result<(), SchedulerError> {
        let undefined = self.undefined_tasks();
        if undefined.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::UndefinedTasks(undefined))
        }
    }

    /// Pop the next runnable task with its compute function and inputs
    fn next_job(&mut self) -> Option<Job> {
        while let Some(task) = self.unblocked.pop_front() {
            if self.completed.contains_key(&task) {
                continue;
            }
            let Some(entry) = self.tasks.get(&task) else {
                continue;
            };
            let inputs = entry
                .requires
                .iter()
                .filter_map(|r| self.completed.get(r).cloned())
                .collect();
            match entry.func.clone() {
                Some(func) => return Some(Job { task, func, inputs }),
                None => self.complete(&task, TaskOutcome::Skipped(task.clone())),
            }
        }
        None
    }

    /// Record a finished task; in strict mode a failure is returned instead
    fn record(
        &mut self,
        task: String,
        result: Result<String, BoxError>,
        policy: FailurePolicy,
    ) -> Result<(), (String, BoxError)> {
        match result {
            Ok(value) => {
                debug!(
                    operation = operations::COMPLETE,
                    status = status::SUCCESS,
                    task = %task,
                    remaining = self.tasks.len().saturating_sub(self.completed.len() + 1),
                    "task completed"
                );
                self.complete(&task, TaskOutcome::Completed(value));
                Ok(())
            }
            Err(err) => match policy {
                FailurePolicy::Strict => {
                    self.in_process.remove(&task);
                    Err((task, err))
                }
                FailurePolicy::Permissive => {
                    warn!(
                        operation = operations::COMPLETE,
                        status = status::ERROR,
                        task = %task,
                        "task failed: {}",
                        err
                    );
                    let message = format!("{}: {}", task, err);
                    self.complete(&task, TaskOutcome::Failed(message));
                    Ok(())
                }
            },
        }
    }

    /// Run every task on the calling thread
    pub fn run_synchronous(
        &mut self,
        policy: FailurePolicy,
        cancel: &CancelFlag,
    ) -> Result<BTreeMap<String, TaskOutcome>, SchedulerError> {
        self.check_defined()?;

        while !self.is_done() {
            if cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled {
                    pending: self.pending(),
                });
            }
            let Some(job) = self.next_job() else {
                if self.is_done() {
                    break;
                }
                return Err(SchedulerError::Deadlock {
                    blocked: self.blocked(),
                });
            };

            let result = run_job(&job);
            if let Err((task, source)) = self.record(job.task, result, policy) {
                return Err(SchedulerError::TaskFailed {
                    task,
                    source,
                    pending: self.pending(),
                });
            }
        }

        Ok(self.results())
    }

    /// Run tasks on a pool of `max_workers` threads
    ///
    /// The calling thread only dispatches and waits on the completion channel.
    pub fn run_concurrent(
        &mut self,
        options: &RunOptions,
        cancel: &CancelFlag,
    ) -> Result<BTreeMap<String, TaskOutcome>, SchedulerError> {
        self.check_defined()?;

        let max_workers = options.max_workers.max(1);
        let pool = WorkerPool::start(max_workers)?;
        info!(
            operation = operations::DISPATCH,
            workers = max_workers,
            tasks = self.len(),
            "starting worker pool"
        );

        let mut failure: Option<(String, BoxError)> = None;
        let mut last_progress = Instant::now();

        loop {
            let stopping = failure.is_some() || cancel.is_cancelled();

            if !stopping {
                while self.in_process.len() < max_workers {
                    let Some(job) = self.next_job() else {
                        break;
                    };
                    debug!(
                        operation = operations::DISPATCH,
                        task = %job.task,
                        in_process = self.in_process.len() + 1,
                        "dispatching task"
                    );
                    self.in_process.insert(job.task.clone());
                    if pool.jobs.send(job).is_err() {
                        pool.shutdown(false);
                        return Err(SchedulerError::Pool("job channel closed".to_string()));
                    }
                }
            }

            if self.in_process.is_empty() {
                let outcome = if let Some((task, source)) = failure.take() {
                    Err(SchedulerError::TaskFailed {
                        task,
                        source,
                        pending: self.pending(),
                    })
                } else if cancel.is_cancelled() && !self.is_done() {
                    Err(SchedulerError::Cancelled {
                        pending: self.pending(),
                    })
                } else if self.is_done() {
                    Ok(self.results())
                } else {
                    Err(SchedulerError::Deadlock {
                        blocked: self.blocked(),
                    })
                };
                pool.shutdown(true);
                return outcome;
            }

            match pool.done.recv_timeout(POLL_INTERVAL) {
                Ok((task, result)) => {
                    last_progress = Instant::now();
                    if let Err(failed) = self.record(task, result, options.policy) {
                        warn!(
                            task = %failed.0,
                            in_process = self.in_process.len(),
                            "task failed, waiting for running tasks before stopping"
                        );
                        failure.get_or_insert(failed);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if last_progress.elapsed() >= options.timeout {
                        let in_process = self.in_process_sorted();
                        // Stuck workers are detached rather than joined
                        pool.shutdown(false);
                        return Err(SchedulerError::Timeout {
                            waited_secs: options.timeout.as_secs(),
                            in_process,
                        });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    pool.shutdown(false);
                    return Err(SchedulerError::Pool("completion channel closed".to_string()));
                }
            }
        }
    }
}

fn run_job(job: &Job) -> Result<String, BoxError> {
    match panic::catch_unwind(AssertUnwindSafe(|| (job.func)(&job.task, &job.inputs))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("task panicked: {}", message).into())
        }
    }
}

struct WorkerPool {
    jobs: Sender<Job>,
    done: Receiver<Completion>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn start(workers: usize) -> Result<Self, SchedulerError> {
        let (job_tx, job_rx) = bounded::<Job>(workers);
        let (done_tx, done_rx) = unbounded::<Completion>();

        let mut handles = Vec::with_capacity(workers);
        for n in 0..workers {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("gddp-worker-{}", n))
                .spawn(move || {
                    for job in jobs.iter() {
                        let result = run_job(&job);
                        if done.send((job.task, result)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| SchedulerError::Pool(e.to_string()))?;
            handles.push(handle);
        }

        Ok(Self {
            jobs: job_tx,
            done: done_rx,
            handles,
        })
    }

    /// Close the job channel; join the workers when `wait` is set
    fn shutdown(self, wait: bool) {
        let WorkerPool { jobs, done, handles } = self;
        drop(jobs);
        drop(done);
        if wait {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn echo() -> TaskFn {
        Arc::new(|task: &str, inputs: &[TaskOutcome]| -> Result<String, BoxError> {
            let parts: Vec<&str> = inputs.iter().map(|i| i.value()).collect();
            Ok(format!("{}({})", task, parts.join(",")))
        })
    }

    fn failing(message: &'static str) -> TaskFn {
        Arc::new(move |_: &str, _: &[TaskOutcome]| -> Result<String, BoxError> {
            Err(message.into())
        })
    }

    fn reqs(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// a <- b <- d, a <- c <- d, with `a` a skip-task
    fn diamond() -> TaskTree {
        let mut tree = TaskTree::new();
        tree.add(echo(), "b", reqs(&["a"]));
        tree.add(echo(), "c", reqs(&["a"]));
        tree.add(echo(), "d", reqs(&["b", "c"]));
        tree.mark_skip("a");
        tree
    }

    fn options(workers: usize) -> RunOptions {
        RunOptions {
            policy: FailurePolicy::Strict,
            max_workers: workers,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_add_blocks_until_requirements_complete() {
        let mut tree = TaskTree::new();
        tree.add(echo(), "b", reqs(&["a"]));
        assert_eq!(tree.blocked(), vec!["b".to_string()]);

        tree.mark_skip("a");
        assert!(tree.blocked().is_empty());
        assert_eq!(tree.outcome("a"), Some(&TaskOutcome::Skipped("a".to_string())));
        assert!(tree.unblocked.contains(&"b".to_string()));
    }

    #[test]
    fn test_add_after_requirement_completed_is_unblocked() {
        let mut tree = TaskTree::new();
        tree.mark_skip("a");
        tree.add(echo(), "b", reqs(&["a"]));
        assert!(tree.blocked().is_empty());
    }

    #[test]
    fn test_add_duplicate_is_ignored() {
        let mut tree = TaskTree::new();
        assert!(tree.add(echo(), "a", vec![]));
        assert!(!tree.add(echo(), "a", reqs(&["x"])));
        assert_eq!(tree.len(), 1);
        assert!(tree.undefined_tasks().is_empty());
    }

    #[test]
    fn test_run_synchronous_passes_inputs_in_order() {
        let mut tree = diamond();
        let results = tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap();
        assert_eq!(results["d"].value(), "d(b(a),c(a))");
        assert_eq!(results["a"], TaskOutcome::Skipped("a".to_string()));
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_sync_and_concurrent_agree() {
        let mut sync_tree = diamond();
        let sync = sync_tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap();

        let mut concurrent_tree = diamond();
        let concurrent = concurrent_tree
            .run_concurrent(&options(3), &CancelFlag::new())
            .unwrap();

        assert_eq!(sync, concurrent);
    }

    #[test]
    fn test_concurrent_never_dispatches_before_requirements() {
        let finished = Arc::new(Mutex::new(Vec::<String>::new()));
        let record = |finished: Arc<Mutex<Vec<String>>>, expect: Vec<&'static str>| -> TaskFn {
            Arc::new(move |task: &str, _: &[TaskOutcome]| -> Result<String, BoxError> {
                let mut done = finished.lock().unwrap();
                for e in &expect {
                    assert!(done.iter().any(|d| d == e), "{} ran before {}", task, e);
                }
                done.push(task.to_string());
                Ok(task.to_string())
            })
        };

        let mut tree = TaskTree::new();
        for i in 0..8 {
            tree.add(record(finished.clone(), vec![]), format!("leaf{}", i), vec![]);
        }
        tree.add(
            record(finished.clone(), vec!["leaf0", "leaf7"]),
            "top",
            reqs(&["leaf0", "leaf7"]),
        );

        tree.run_concurrent(&options(4), &CancelFlag::new()).unwrap();
        assert_eq!(finished.lock().unwrap().last().unwrap(), "top");
    }

    #[test]
    fn test_deadlock_on_cycle() {
        let mut tree = TaskTree::new();
        tree.add(echo(), "a", reqs(&["b"]));
        tree.add(echo(), "b", reqs(&["a"]));

        let err = tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Deadlock { .. }));
        assert_eq!(err.pending(), &["a".to_string(), "b".to_string()]);

        tree.reset();
        let err = tree.run_concurrent(&options(2), &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SchedulerError::Deadlock { .. }));
    }

    #[test]
    fn test_undefined_requirement_is_reported() {
        let mut tree = TaskTree::new();
        tree.add(echo(), "a", reqs(&["missing"]));
        assert_eq!(tree.undefined_tasks(), vec!["missing".to_string()]);
        let err = tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UndefinedTasks(_)));
    }

    #[test]
    fn test_strict_failure_stops_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            Arc::new(move |task: &str, _: &[TaskOutcome]| -> Result<String, BoxError> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(task.to_string())
            }) as TaskFn
        };

        let mut tree = TaskTree::new();
        tree.add(failing("boom"), "bad", vec![]);
        tree.add(counted.clone(), "after", reqs(&["bad"]));

        let err = tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap_err();
        match err {
            SchedulerError::TaskFailed { task, pending, .. } => {
                assert_eq!(task, "bad");
                assert_eq!(pending, vec!["after".to_string(), "bad".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tree.reset();
        let err = tree.run_concurrent(&options(2), &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SchedulerError::TaskFailed { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_permissive_failure_records_error_string() {
        let mut tree = TaskTree::new();
        tree.add(failing("boom"), "bad", vec![]);
        tree.add(echo(), "after", reqs(&["bad"]));

        let results = tree
            .run_concurrent(
                &RunOptions {
                    policy: FailurePolicy::Permissive,
                    ..options(2)
                },
                &CancelFlag::new(),
            )
            .unwrap();
        assert_eq!(results["bad"], TaskOutcome::Failed("bad: boom".to_string()));
        assert_eq!(results["after"].value(), "after(bad: boom)");
    }

    #[test]
    fn test_panicking_task_becomes_failure() {
        let mut tree = TaskTree::new();
        tree.add(
            Arc::new(|_: &str, _: &[TaskOutcome]| -> Result<String, BoxError> { panic!("oops") }),
            "bad",
            vec![],
        );
        let err = tree.run_concurrent(&options(1), &CancelFlag::new()).unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_timeout_reports_in_process() {
        let mut tree = TaskTree::new();
        tree.add(
            Arc::new(|task: &str, _: &[TaskOutcome]| -> Result<String, BoxError> {
                thread::sleep(Duration::from_millis(800));
                Ok(task.to_string())
            }),
            "slow",
            vec![],
        );
        let err = tree
            .run_concurrent(
                &RunOptions {
                    timeout: Duration::from_millis(100),
                    ..options(1)
                },
                &CancelFlag::new(),
            )
            .unwrap_err();
        match err {
            SchedulerError::Timeout { in_process, .. } => assert_eq!(in_process, vec!["slow".to_string()]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_run_stops_dispatching() {
        let cancel = CancelFlag::new();
        let mut tree = TaskTree::new();
        {
            let cancel = cancel.clone();
            tree.add(
                Arc::new(move |task: &str, _: &[TaskOutcome]| -> Result<String, BoxError> {
                    cancel.cancel();
                    Ok(task.to_string())
                }),
                "first",
                vec![],
            );
        }
        tree.add(echo(), "second", reqs(&["first"]));

        let err = tree.run_concurrent(&options(2), &cancel).unwrap_err();
        match err {
            SchedulerError::Cancelled { pending } => assert_eq!(pending, vec!["second".to_string()]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_reset_allows_rerun() {
        let mut tree = diamond();
        let first = tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap();
        tree.reset();
        assert!(!tree.is_done());
        assert_eq!(tree.outcome("a"), Some(&TaskOutcome::Skipped("a".to_string())));
        let second = tree
            .run_synchronous(FailurePolicy::Strict, &CancelFlag::new())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_requirements_and_exists() {
        let tree = diamond();
        assert!(tree.exists("d"));
        assert!(!tree.exists("e"));
        assert_eq!(tree.requirements("d"), Some(&["b".to_string(), "c".to_string()][..]));
        assert_eq!(tree.len(), 4);
    }
}
