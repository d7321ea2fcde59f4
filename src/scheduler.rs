//! Global ready/waiting queues, dependency check, task admission and
//! completion.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use dashmap::DashSet;
use log::{debug, error, trace};

use crate::error::{Error, Result};
use crate::task::{State, Task, TaskLabel};

/// Bounded lock-free FIFOs plus the monotonic finished-set and
/// admitted-but-not-finished counter. `finished`, `admitted_labels`, and
/// `pending` are scoped to a single `run`: label uniqueness and finished-set
/// membership hold only within the run that admitted the label, not across
/// the `Scheduler`'s whole lifetime, so `reset_for_run` clears them between
/// successive runs.
pub struct Scheduler {
    ready: ArrayQueue<Arc<Task>>,
    waiting: ArrayQueue<Arc<Task>>,
    finished: DashSet<TaskLabel>,
    admitted_labels: DashSet<TaskLabel>,
    pending: AtomicI64,
}

impl Scheduler {
    /// Creates a scheduler whose ready and waiting queues each hold up to
    /// `capacity` tasks.
    pub fn new(capacity: usize) -> Scheduler {
        Scheduler {
            ready: ArrayQueue::new(capacity),
            waiting: ArrayQueue::new(capacity),
            finished: DashSet::new(),
            admitted_labels: DashSet::new(),
            pending: AtomicI64::new(0),
        }
    }

    /// Pushes `task` onto the waiting queue and increments the
    /// admitted-but-not-finished counter.
    ///
    /// Fails with [`Error::DuplicateLabel`] if a task with this label is
    /// already admitted, or [`Error::CapacityExhausted`] if the waiting
    /// queue is full.
    pub fn admit(&self, task: Arc<Task>) -> Result<()> {
        let label = task.label();
        if !self.admitted_labels.insert(label) {
            return Err(Error::DuplicateLabel);
        }

        task.set_state(State::Waiting);
        if let Err(task) = self.waiting.push(task) {
            self.admitted_labels.remove(&label);
            drop(task);
            return Err(Error::CapacityExhausted);
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        debug!("admitted task {label}");
        Ok(())
    }

    /// Pops one task from the ready queue, if any.
    pub fn next_ready(&self) -> Option<Arc<Task>> {
        self.ready.pop()
    }

    /// Pushes a task directly onto the ready queue (used when a sync
    /// primitive hands a task back to the scheduler rather than through the
    /// waiting-queue readiness scan).
    pub fn push_ready(&self, task: Arc<Task>) {
        task.set_state(State::Ready);
        if self.ready.push(task).is_err() {
            error!("ready queue is full; a woken task could not be requeued");
        }
    }

    /// Pushes a task directly onto the waiting queue (used when a sync
    /// primitive wakes a task: it re-enters scheduling through the normal
    /// waiting-queue readiness scan rather than jumping straight to ready,
    /// so it executes only once a worker re-pulls it).
    pub fn push_waiting(&self, task: Arc<Task>) {
        task.set_state(State::Waiting);
        if self.waiting.push(task).is_err() {
            error!("waiting queue is full; a woken task could not be requeued");
        }
    }

    /// One dependency-satisfaction scan: pops a task
    /// from the waiting queue, promotes it to ready if satisfied, else
    /// requeues it at the tail. Returns `false` if the waiting queue was
    /// empty (nothing to scan this step).
    ///
    /// Lock-free and safe to call concurrently from every worker.
    pub fn try_promote_one(&self) -> bool {
        let Some(task) = self.waiting.pop() else {
            return false;
        };

        if task.is_ready(&self.finished) {
            trace!("task {} is ready", task.label());
            self.push_to_ready_with_retry(task);
        } else {
            self.push_to_waiting_with_retry(task);
        }
        true
    }

    fn push_to_ready_with_retry(&self, task: Arc<Task>) {
        task.set_state(State::Ready);
        let mut remaining = task;
        for _ in 0..2 {
            match self.ready.push(remaining) {
                Ok(()) => return,
                Err(returned) => remaining = returned,
            }
        }
        error!(
            "task {} could not be promoted to the ready queue after retry; dropped",
            remaining.label()
        );
    }

    fn push_to_waiting_with_retry(&self, task: Arc<Task>) {
        let mut remaining = task;
        for _ in 0..2 {
            match self.waiting.push(remaining) {
                Ok(()) => return,
                Err(returned) => remaining = returned,
            }
        }
        error!(
            "task {} could not be requeued onto the waiting queue after retry; dropped",
            remaining.label()
        );
    }

    /// Inserts `label` into the finished-set and decrements the
    /// admitted-but-not-finished counter. The finished-set is monotonic
    /// within a run: labels are never removed until `reset_for_run` starts
    /// the next one.
    pub fn mark_finished(&self, label: TaskLabel) {
        self.finished.insert(label);
        self.pending.fetch_sub(1, Ordering::SeqCst);
        debug!("task {label} finished");
    }

    /// A failed task's label is deliberately *not* inserted into the
    /// finished-set: its dependents never
    /// become ready. Still decrements the admitted-but-not-finished counter
    /// so `run()` can observe drain once every other task completes.
    pub fn mark_failed(&self, label: TaskLabel) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        debug!("task {label} failed; label withheld from the finished-set");
    }

    /// True once every admitted task has finished (or failed).
    pub fn is_drained(&self) -> bool {
        self.pending.load(Ordering::SeqCst) <= 0
    }

    /// Snapshot of the finished-set, for tasks that need to check
    /// readiness of another label outside the waiting-queue scan (e.g.
    /// tests, or "wait for completion inside another task").
    pub fn is_finished(&self, label: TaskLabel) -> bool {
        self.finished.contains(&label)
    }

    /// Clears the finished-set, the admitted-labels set, and the pending
    /// counter so the next `run` starts with a clean slate: a label used in
    /// a prior run may be reused, and a label finished in a prior run is no
    /// longer treated as satisfying a fresh dependency. Called by
    /// `Runtime::finalize` once a run has fully drained; the ready/waiting
    /// queues need no equivalent clearing, since a drained run has already
    /// emptied them by construction (every admitted task leaves its queue
    /// before `pending` can reach zero).
    pub fn reset_for_run(&self) {
        self.finished.clear();
        self.admitted_labels.clear();
        self.pending.store(0, Ordering::SeqCst);
    }
}
