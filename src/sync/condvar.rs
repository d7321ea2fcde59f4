//! Task-aware condition variable.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{trace, warn};
use parking_lot::Mutex as PlMutex;

use crate::current;
use crate::coroutine;
use crate::error::{Error, Result};
use crate::task::{EventKind, State, Task};

/// A FIFO of parked tasks. No associated mutex is required, since this is
/// not a Mesa-style monitor primitive, so `notify` before `wait` is a lost
/// wakeup by design. Callers needing Mesa semantics must pair this with a
/// [`crate::sync::Mutex`] and a predicate loop.
pub struct ConditionVariable {
    waiters: PlMutex<VecDeque<Arc<Task>>>,
}

impl Default for ConditionVariable {
    fn default() -> ConditionVariable {
        ConditionVariable::new()
    }
}

impl ConditionVariable {
    pub fn new() -> ConditionVariable {
        ConditionVariable {
            waiters: PlMutex::new(VecDeque::new()),
        }
    }

    /// Parks the currently running task until a matching `notify_one` or
    /// `notify_all`. Fails with [`Error::NotInTaskContext`] outside a
    /// running task.
    pub fn wait(&self) -> Result<()> {
        let task = current::current_task().ok_or(Error::NotInTaskContext)?;

        self.waiters.lock().push_back(Arc::clone(&task));

        trace!("task {}: waiting on condition variable", task.label());
        task.fire_callback(EventKind::OnTaskSync);
        task.set_state(State::Suspended);
        coroutine::suspend_for_sync();

        Ok(())
    }

    /// Wakes the longest-waiting parked task, if any. A no-op if nothing is
    /// waiting.
    pub fn notify_one(&self) {
        if let Some(task) = self.waiters.lock().pop_front() {
            self.requeue(task);
        }
    }

    /// Wakes every parked task, in the order they called `wait`.
    pub fn notify_all(&self) {
        let drained: Vec<_> = self.waiters.lock().drain(..).collect();
        for task in drained {
            self.requeue(task);
        }
    }

    fn requeue(&self, task: Arc<Task>) {
        match current::current_scheduler() {
            Some(scheduler) => scheduler.push_waiting(task),
            None => warn!(
                "task {} notified outside a running scheduler; dropping wakeup",
                task.label()
            ),
        }
    }
}
