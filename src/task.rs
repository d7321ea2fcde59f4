//! Labeled node of the dependency graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use log::trace;
use parking_lot::Mutex;

use crate::config;
use crate::coroutine::{self, Coroutine, SuspendReason};
use crate::execution_unit::ExecutionUnit;

/// A user-chosen, 64-bit label. Unique among admitted tasks for the
/// lifetime of a `run`; label zero is legal.
pub type TaskLabel = u64;

/// One hook a caller may install for a task lifecycle event.
pub type Callback = Arc<dyn Fn(&Task) + Send + Sync + 'static>;

/// Events a `Task` (or the `Runtime`, globally) may hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fired once, inside the coroutine's own stack, just before the
    /// execution unit's callable runs for the first time.
    OnTaskExecute,
    /// Fired by the worker after an explicit `yield_now()`.
    OnTaskYield,
    /// Fired by the worker after the task parks on a sync primitive.
    OnTaskSuspend,
    /// Fired by a sync primitive (mutex/condvar) the instant a task parks
    /// on it, before the coroutine actually yields. The runtime wires this
    /// to mark the task suspended outside the ready/waiting queues.
    OnTaskSync,
    /// Fired by the worker after the coroutine returns successfully.
    OnTaskFinish,
}

/// Lifecycle state of a `Task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, not yet admitted.
    Initial,
    /// Admitted; waiting for prerequisites (in the waiting queue).
    Waiting,
    /// All prerequisites satisfied; sitting in the ready queue.
    Ready,
    /// Currently executing on some worker's OS thread.
    Running,
    /// Suspended: yielded, or parked on a sync primitive.
    Suspended,
    /// Coroutine returned normally.
    Finished,
    /// Coroutine panicked; the label is never inserted into the
    /// finished-set.
    Failed,
}

/// What a worker should do after a single `Task::run` call returns.
#[derive(Debug)]
pub enum RunOutcome {
    /// The coroutine returned normally.
    Completed,
    /// The coroutine panicked; carries the panic message.
    Failed(String),
    /// The task called `yield_now()`.
    Yielded,
    /// The task parked on a mutex or condition variable.
    SyncSuspended,
}

/// Labeled, dependency-tracked unit of scheduling.
///
/// Dependencies are frozen at admission not by a runtime check but by
/// ownership: `add_task_dependency` takes `&mut self`, so once a `Task` is
/// wrapped in the `Arc<Task>` the scheduler shares across workers, the
/// dependency list can no longer be mutated.
pub struct Task {
    label: TaskLabel,
    execution_unit: ExecutionUnit,
    dependencies: Vec<TaskLabel>,
    stack_size: usize,
    state: Mutex<State>,
    coroutine: Mutex<Option<Coroutine>>,
    callbacks: Mutex<HashMap<EventKind, Callback>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("dependencies", &self.dependencies)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Creates a task with the default coroutine stack size
    /// ([`config::COROUTINE_STACK_SIZE`]).
    pub fn new(label: TaskLabel, execution_unit: ExecutionUnit) -> Task {
        Task::with_stack_size(label, execution_unit, config::COROUTINE_STACK_SIZE)
    }

    /// Creates a task whose coroutine will be given a stack of
    /// `stack_size` bytes.
    pub fn with_stack_size(label: TaskLabel, execution_unit: ExecutionUnit, stack_size: usize) -> Task {
        Task {
            label,
            execution_unit,
            dependencies: Vec::new(),
            stack_size,
            state: Mutex::new(State::Initial),
            coroutine: Mutex::new(None),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// This task's user-chosen label.
    pub fn label(&self) -> TaskLabel {
        self.label
    }

    /// Appends a prerequisite label. Valid only before admission (enforced
    /// by `&mut self`, see the struct-level doc comment).
    pub fn add_task_dependency(&mut self, label: TaskLabel) {
        self.dependencies.push(label);
    }

    /// The prerequisite labels frozen at admission.
    pub fn dependencies(&self) -> &[TaskLabel] {
        &self.dependencies
    }

    /// Registers a hook for one event kind, replacing any previous hook for
    /// that kind. Valid only before admission, same as dependencies.
    pub fn set_callback<F>(&mut self, event: EventKind, callback: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        self.callbacks.lock().insert(event, Arc::new(callback));
    }

    pub(crate) fn fire_callback(&self, event: EventKind) {
        if let Some(cb) = self.callbacks.lock().get(&event).cloned() {
            cb(self);
        }
    }

    /// True iff every prerequisite label is in `finished`.
    pub fn is_ready(&self, finished: &DashSet<TaskLabel>) -> bool {
        self.dependencies.iter().all(|dep| finished.contains(dep))
    }

    pub fn state(&self) -> State {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: State) {
        *self.state.lock() = state;
    }

    /// Worker-internal: resumes this task's coroutine, creating it on first
    /// invocation from the execution unit's callable. `onTaskExecute` fires
    /// exactly once, inside the coroutine's own stack, right before the
    /// callable runs for the first time; everything else (`onTaskYield`,
    /// `onTaskSuspend`, `onTaskFinish`) is the worker's responsibility once
    /// this call returns.
    pub fn run(self: &Arc<Task>) -> RunOutcome {
        let mut slot = self.coroutine.lock();
        if slot.is_none() {
            let task = Arc::clone(self);
            *slot = Some(Coroutine::new(
                self.stack_size,
                Box::new(move || {
                    task.fire_callback(EventKind::OnTaskExecute);
                    task.execution_unit.invoke();
                }),
            ));
        }
        let reason = slot.as_mut().expect("coroutine just constructed").resume();
        if matches!(reason, SuspendReason::Completed | SuspendReason::Panicked(_)) {
            *slot = None;
        }
        drop(slot);

        match reason {
            SuspendReason::Completed => {
                trace!("task {}: completed", self.label);
                RunOutcome::Completed
            }
            SuspendReason::Panicked(msg) => {
                trace!("task {}: panicked: {msg}", self.label);
                RunOutcome::Failed(msg)
            }
            SuspendReason::Yielded => {
                trace!("task {}: yielded", self.label);
                RunOutcome::Yielded
            }
            SuspendReason::SyncSuspended => {
                trace!("task {}: parked on a sync primitive", self.label);
                RunOutcome::SyncSuspended
            }
        }
    }
}

/// Suspends the current task, requeuing it onto the waiting queue once a
/// worker next observes the yield.
///
/// Valid only from within a running task's coroutine.
pub fn yield_now() {
    coroutine::yield_now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn is_ready_respects_finished_set() {
        let mut task = Task::new(1, ExecutionUnit::new(|| {}));
        task.add_task_dependency(0);
        let finished: DashSet<TaskLabel> = DashSet::new();
        assert!(!task.is_ready(&finished));
        finished.insert(0);
        assert!(task.is_ready(&finished));
    }

    #[test]
    fn on_task_execute_fires_inside_coroutine() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let mut task = Task::new(7, ExecutionUnit::new(|| {}));
        task.set_callback(EventKind::OnTaskExecute, move |_| {
            fired2.store(true, Ordering::SeqCst);
        });
        let task = Arc::new(task);
        let outcome = task.run();
        assert!(matches!(outcome, RunOutcome::Completed));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn failed_task_is_not_finished() {
        let task = Arc::new(Task::new(9, ExecutionUnit::new(|| panic!("nope"))));
        let outcome = task.run();
        match outcome {
            RunOutcome::Failed(msg) => assert_eq!(msg, "nope"),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!matches!(task.state(), State::Finished));
    }
}
