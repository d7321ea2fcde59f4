//! Task-aware mutex.

use std::collections::VecDeque;
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex as PlMutex;

use crate::current;
use crate::coroutine;
use crate::error::{Error, Result};
use crate::task::{EventKind, State, Task};

struct Inner {
    owner: Option<Arc<Task>>,
    waiters: VecDeque<Arc<Task>>,
}

/// A mutex whose `lock`/`unlock` suspend and resume tasks rather than OS
/// threads. Owner and waiters are guarded by one `parking_lot::Mutex` so
/// the "am I contended" check and the FIFO append happen atomically with
/// respect to a concurrent `unlock`.
pub struct Mutex {
    inner: PlMutex<Inner>,
}

impl Default for Mutex {
    fn default() -> Mutex {
        Mutex::new()
    }
}

impl Mutex {
    pub fn new() -> Mutex {
        Mutex {
            inner: PlMutex::new(Inner {
                owner: None,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Locks the mutex for the currently running task.
    ///
    /// If uncontended, takes ownership and returns immediately. Otherwise
    /// appends the current task to the FIFO waiter list, fires
    /// `OnTaskSync`, and yields the coroutine; on resumption the task is
    /// the owner. Fails with [`Error::NotInTaskContext`] if called outside
    /// a running task.
    pub fn lock(&self) -> Result<()> {
        let task = current::current_task().ok_or(Error::NotInTaskContext)?;

        let mut inner = self.inner.lock();
        if inner.owner.is_none() {
            inner.owner = Some(task);
            return Ok(());
        }
        inner.waiters.push_back(Arc::clone(&task));
        drop(inner);

        trace!("task {}: parking on mutex", task.label());
        task.fire_callback(EventKind::OnTaskSync);
        task.set_state(State::Suspended);
        coroutine::suspend_for_sync();

        Ok(())
    }

    /// Unlocks the mutex. Requires the caller to be the current owner;
    /// otherwise fails with [`Error::InvalidUnlock`]: released by a
    /// non-owner, or while already unlocked.
    ///
    /// If waiters are queued, ownership transfers to the head waiter and
    /// that task is handed back to the scheduler's waiting queue. It does
    /// not re-enter the ready queue directly, so it only executes once a
    /// worker re-pulls it.
    pub fn unlock(&self) -> Result<()> {
        let task = current::current_task().ok_or(Error::NotInTaskContext)?;

        let mut inner = self.inner.lock();
        match &inner.owner {
            Some(owner) if Arc::ptr_eq(owner, &task) => {}
            _ => return Err(Error::InvalidUnlock),
        }

        match inner.waiters.pop_front() {
            Some(next) => {
                inner.owner = Some(Arc::clone(&next));
                drop(inner);
                trace!("task {}: mutex transferred to task {}", task.label(), next.label());
                if let Some(scheduler) = current::current_scheduler() {
                    scheduler.push_waiting(next);
                }
            }
            None => {
                inner.owner = None;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_without_ownership_fails_outside_task_context() {
        let mutex = Mutex::new();
        assert!(matches!(mutex.lock(), Err(Error::NotInTaskContext)));
        assert!(matches!(mutex.unlock(), Err(Error::NotInTaskContext)));
    }
}
