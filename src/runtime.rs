//! Lifecycle facade: `initialize` (via `new`), `add_processing_unit`,
//! `add_task`, `run`, `finalize`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use log::info;
use parking_lot::Mutex as PlMutex;

use crate::config::RuntimeConfig;
use crate::current;
use crate::error::{Error, Result};
use crate::processing_unit::ProcessingUnit;
use crate::scheduler::Scheduler;
use crate::task::{Callback, EventKind, Task};
use crate::worker::{GlobalCallbacks, Worker};

/// Admission order: `Runtime::new` → `add_processing_unit`* →
/// `add_task`* → `run` → `finalize`.
pub struct Runtime {
    config: RuntimeConfig,
    scheduler: Arc<Scheduler>,
    processing_units: PlMutex<Vec<Arc<dyn ProcessingUnit>>>,
    global_callbacks: GlobalCallbacks,
    next_worker_id: AtomicUsize,
}

impl Runtime {
    /// Constructs the scheduler and finished-set. This crate takes the
    /// compute backend implicitly through the `ProcessingUnit`s later added
    /// via [`Runtime::add_processing_unit`], rather than a single backend
    /// provider argument.
    pub fn new(config: RuntimeConfig) -> Runtime {
        config.validate().expect("invalid RuntimeConfig");
        Runtime {
            scheduler: Arc::new(Scheduler::new(config.max_simultaneous_tasks)),
            config,
            processing_units: PlMutex::new(Vec::new()),
            global_callbacks: Arc::new(PlMutex::new(HashMap::new())),
            next_worker_id: AtomicUsize::new(0),
        }
    }

    /// Adds a compute resource binding `run()` will spawn a worker on.
    /// Fails with [`Error::CapacityExhausted`] past
    /// `max_simultaneous_workers`.
    pub fn add_processing_unit(&self, unit: Box<dyn ProcessingUnit>) -> Result<()> {
        let mut units = self.processing_units.lock();
        if units.len() >= self.config.max_simultaneous_workers {
            return Err(Error::CapacityExhausted);
        }
        units.push(Arc::from(unit));
        Ok(())
    }

    /// Admits a task. Valid before `run()`, and from inside a running
    /// task's own body once `run()` has begun; admission from outside a
    /// worker after `run()` has begun works (the scheduler's admission path
    /// is safe to call concurrently) but is not exercised by this crate's
    /// test suite as a first-class path.
    pub fn add_task(&self, task: Task) -> Result<()> {
        self.scheduler.admit(Arc::new(task))
    }

    /// Installs a global hook for `event`, run before any per-task hook
    /// for the same event; a global callback runs before any per-task
    /// callback registered for the same event kind.
    pub fn set_callback<F>(&self, event: EventKind, callback: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        self.global_callbacks.lock().insert(event, Arc::new(callback) as Callback);
    }

    /// Spawns one OS thread per added `ProcessingUnit`, each pinned to its
    /// compute resource, and blocks until every admitted task has finished.
    /// Fails with [`Error::Configuration`] if no processing units were
    /// added. Aggregates at most one task failure and re-raises it.
    pub fn run(&self) -> Result<()> {
        let units: Vec<Arc<dyn ProcessingUnit>> = self.processing_units.lock().clone();
        if units.is_empty() {
            return Err(Error::Configuration(
                "run() called with no processing units added".into(),
            ));
        }

        let first_failure = Arc::new(PlMutex::new(None));
        info!("starting {} worker(s)", units.len());

        let handles: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
                let worker = Arc::new(Worker::new(id, unit));
                let scheduler = Arc::clone(&self.scheduler);
                let global_callbacks = Arc::clone(&self.global_callbacks);
                let first_failure = Arc::clone(&first_failure);

                thread::Builder::new()
                    .name(format!("taskr-worker-{id}"))
                    .spawn(move || worker.run_loop(&scheduler, &global_callbacks, &first_failure))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        for handle in handles {
            // A worker thread only panics on a bug in the runtime itself
            // (user task panics are caught inside `Task::run`); propagate
            // such a panic rather than silently losing it.
            handle.join().expect("worker thread panicked");
        }

        info!("all workers drained");

        match first_failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Releases coroutine stacks (already dropped as each task finishes;
    /// see `Task::run`), resets this thread's current-task/current-worker
    /// keys, and clears the scheduler's finished-set, admitted-labels set,
    /// and pending counter so a subsequent `run()` starts a fresh run: a
    /// label used in this run may be reused, and this run's finished labels
    /// no longer satisfy a future run's dependencies. Call after `run()`
    /// returns.
    pub fn finalize(&self) {
        current::clear_current();
        self.scheduler.reset_for_run();
    }

    /// True once every admitted task has finished or failed.
    pub fn is_drained(&self) -> bool {
        self.scheduler.is_drained()
    }

    /// Direct access to the scheduler, for callers composing their own
    /// admission/readiness logic (e.g. tests).
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_unit::ExecutionUnit;
    use crate::processing_unit::HostProcessingUnit;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    fn any_core() -> core_affinity::CoreId {
        core_affinity::get_core_ids()
            .and_then(|mut ids| ids.pop())
            .unwrap_or(core_affinity::CoreId { id: 0 })
    }

    #[test]
    fn run_without_processing_units_is_a_configuration_error() {
        let runtime = Runtime::new(RuntimeConfig::default());
        match runtime.run() {
            Err(Error::Configuration(_)) => {}
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn single_dependency_free_task_runs_and_finishes() {
        let runtime = Runtime::new(RuntimeConfig::default());
        runtime
            .add_processing_unit(Box::new(HostProcessingUnit::new(any_core())))
            .unwrap();

        let ran = Arc::new(StdAtomicUsize::new(0));
        let ran2 = ran.clone();
        runtime
            .add_task(Task::new(
                0,
                ExecutionUnit::new(move || {
                    ran2.fetch_add(1, Ordering::SeqCst);
                }),
            ))
            .unwrap();

        runtime.run().unwrap();
        runtime.finalize();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(runtime.scheduler().is_finished(0));
    }

    #[test]
    fn task_failure_is_surfaced_and_label_withheld() {
        let runtime = Runtime::new(RuntimeConfig::default());
        runtime
            .add_processing_unit(Box::new(HostProcessingUnit::new(any_core())))
            .unwrap();
        runtime
            .add_task(Task::new(0, ExecutionUnit::new(|| panic!("deliberate"))))
            .unwrap();

        match runtime.run() {
            Err(Error::TaskFailure(msg)) => assert_eq!(msg, "deliberate"),
            other => panic!("expected TaskFailure, got {other:?}"),
        }
        assert!(!runtime.scheduler().is_finished(0));
    }
}
