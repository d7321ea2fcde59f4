//! Process-wide thread-local handles for "current task", "current worker",
//! and "current scheduler", established by a `Worker` before resuming a
//! task and cleared after.
//!
//! A single global `Runtime*` singleton would serve the same lookup
//! purpose, but a thread-local triple avoids preventing two `Runtime`s from
//! running concurrently on different OS thread pools within one process
//! (each test in this crate's suite does exactly that).

use std::cell::Cell;
use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::task::Task;

thread_local! {
    static CURRENT_TASK: Cell<Option<Arc<Task>>> = Cell::new(None);
    static CURRENT_WORKER_ID: Cell<Option<usize>> = Cell::new(None);
    static CURRENT_SCHEDULER: Cell<Option<Arc<Scheduler>>> = Cell::new(None);
}

/// Returns the task currently executing on this OS thread, if any.
///
/// Valid only when called from within a running task's body (directly, or
/// from a callback the runtime invokes on the task's behalf); outside that
/// context this returns `None`.
pub fn current_task() -> Option<Arc<Task>> {
    CURRENT_TASK.with(|cell| {
        let task = cell.take();
        let clone = task.clone();
        cell.set(task);
        clone
    })
}

/// Returns the id of the worker driving this OS thread, if any.
pub fn current_worker_id() -> Option<usize> {
    CURRENT_WORKER_ID.with(|cell| cell.get())
}

/// Returns the scheduler backing the runtime currently executing on this
/// OS thread, if any. Used by the task-aware sync primitives to requeue a
/// woken task without needing an explicit handle threaded through user code.
pub(crate) fn current_scheduler() -> Option<Arc<Scheduler>> {
    CURRENT_SCHEDULER.with(|cell| {
        let scheduler = cell.take();
        let clone = scheduler.clone();
        cell.set(scheduler);
        clone
    })
}

/// Installs `task`, `worker_id`, and `scheduler` as current for the
/// duration of `f`, restoring the previous values (normally `None`)
/// afterwards even if `f` panics. Used by `Worker::run_loop` around each
/// `ProcessingUnit::start` call.
pub(crate) fn with_current<F, R>(
    task: Arc<Task>,
    worker_id: usize,
    scheduler: Arc<Scheduler>,
    f: F,
) -> R
where
    F: FnOnce() -> R,
{
    let previous_task = CURRENT_TASK.with(|cell| cell.replace(Some(task)));
    let previous_worker = CURRENT_WORKER_ID.with(|cell| cell.replace(Some(worker_id)));
    let previous_scheduler = CURRENT_SCHEDULER.with(|cell| cell.replace(Some(scheduler)));

    struct Guard(Option<Arc<Task>>, Option<usize>, Option<Arc<Scheduler>>);
    impl Drop for Guard {
        fn drop(&mut self) {
            CURRENT_TASK.with(|cell| cell.set(self.0.take()));
            CURRENT_WORKER_ID.with(|cell| cell.set(self.1.take()));
            CURRENT_SCHEDULER.with(|cell| cell.set(self.2.take()));
        }
    }
    let _guard = Guard(previous_task, previous_worker, previous_scheduler);

    f()
}

/// Clears all three thread-local handles for the calling thread. Called by
/// `Runtime::finalize` after all workers have joined.
pub fn clear_current() {
    CURRENT_TASK.with(|cell| cell.set(None));
    CURRENT_WORKER_ID.with(|cell| cell.set(None));
    CURRENT_SCHEDULER.with(|cell| cell.set(None));
}
