//! Long-running agent on a `ProcessingUnit`: pulls ready tasks, resumes
//! their coroutines, services yields and suspensions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_utils::Backoff;
use log::trace;
use parking_lot::Mutex as PlMutex;

use crate::current;
use crate::processing_unit::ProcessingUnit;
use crate::scheduler::Scheduler;
use crate::task::{Callback, EventKind, RunOutcome, State, Task};

/// Lifecycle state of a `Worker`. The invariant "current-task
/// pointer is non-null iff state is `Executing`" holds because
/// `current_task` is only ever set in the same scope that transitions to
/// `Executing`, and cleared before transitioning away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Executing,
    Terminating,
}

impl From<u8> for WorkerState {
    fn from(value: u8) -> WorkerState {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Executing,
            _ => WorkerState::Terminating,
        }
    }
}

impl From<WorkerState> for u8 {
    fn from(value: WorkerState) -> u8 {
        match value {
            WorkerState::Idle => 0,
            WorkerState::Executing => 1,
            WorkerState::Terminating => 2,
        }
    }
}

pub(crate) type GlobalCallbacks = Arc<PlMutex<HashMap<EventKind, Callback>>>;

/// A worker thread's agent: a `ProcessingUnit` binding plus the loop that
/// drains the scheduler until drain.
pub struct Worker {
    id: usize,
    processing_unit: Arc<dyn ProcessingUnit>,
    state: AtomicU8,
    current_task: PlMutex<Option<Arc<Task>>>,
}

impl Worker {
    pub(crate) fn new(id: usize, processing_unit: Arc<dyn ProcessingUnit>) -> Worker {
        Worker {
            id,
            processing_unit,
            state: AtomicU8::new(WorkerState::Idle.into()),
            current_task: PlMutex::new(None),
        }
    }

    /// This worker's id, stable for the lifetime of a `run`.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state.load(Ordering::Acquire).into()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state.into(), Ordering::Release);
    }

    /// The task this worker is currently executing, if any.
    pub fn current_task(&self) -> Option<Arc<Task>> {
        self.current_task.lock().clone()
    }

    /// Runs the pull loop until `scheduler`
    /// reports drained. Intended to be the body of the worker's dedicated
    /// OS thread.
    pub(crate) fn run_loop(
        &self,
        scheduler: &Arc<Scheduler>,
        global_callbacks: &GlobalCallbacks,
        first_failure: &PlMutex<Option<crate::error::Error>>,
    ) {
        self.processing_unit.initialize();
        self.processing_unit.pin_current_thread();
        let backoff = Backoff::new();

        loop {
            if scheduler.is_drained() {
                break;
            }

            // Step 1: try the ready queue.
            let task = match scheduler.next_ready() {
                Some(task) => task,
                None => {
                    // Step 2: one dependency-satisfaction scan of the waiting queue.
                    let made_progress = scheduler.try_promote_one();
                    if made_progress {
                        backoff.reset();
                    } else {
                        backoff.snooze();
                    }
                    continue;
                }
            };
            backoff.reset();

            // Step 3: resume it.
            *self.current_task.lock() = Some(Arc::clone(&task));
            self.set_state(WorkerState::Executing);
            task.set_state(State::Running);

            let scheduler_handle = Arc::clone(scheduler);
            let outcome = current::with_current(Arc::clone(&task), self.id, scheduler_handle, || {
                self.processing_unit.start(&task)
            });

            // Step 4: dispatch on the reason the coroutine gave control back.
            match outcome {
                RunOutcome::Completed => {
                    task.set_state(State::Finished);
                    self.fire(&task, EventKind::OnTaskFinish, global_callbacks);
                    scheduler.mark_finished(task.label());
                }
                RunOutcome::Failed(message) => {
                    task.set_state(State::Failed);
                    trace!("worker {}: task {} failed: {message}", self.id, task.label());
                    let mut slot = first_failure.lock();
                    if slot.is_none() {
                        *slot = Some(crate::error::Error::TaskFailure(message));
                    }
                    scheduler.mark_failed(task.label());
                }
                RunOutcome::Yielded => {
                    self.fire(&task, EventKind::OnTaskYield, global_callbacks);
                    scheduler.push_waiting(task);
                }
                RunOutcome::SyncSuspended => {
                    // Already on a sync primitive's wait list; the worker
                    // must not requeue it itself.
                    self.fire(&task, EventKind::OnTaskSuspend, global_callbacks);
                }
            }

            // Step 5: clear per-thread keys (handled by the `with_current`
            // guard above) and the worker's own current-task pointer.
            *self.current_task.lock() = None;
            self.set_state(WorkerState::Idle);
        }

        self.set_state(WorkerState::Terminating);
        self.processing_unit.terminate();
    }

    fn fire(&self, task: &Arc<Task>, event: EventKind, global_callbacks: &GlobalCallbacks) {
        if let Some(cb) = global_callbacks.lock().get(&event).cloned() {
            cb(task);
        }
        task.fire_callback(event);
    }
}
