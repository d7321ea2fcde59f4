// The MIT License (MIT)
//
// Copyright (c) 2015 Rustcc developers
// Copyright (c) 2024 HiCR/TaskR Contributors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Stackful cooperative context: `start`, `resume`, `yield_now`, on a fixed
//! per-task stack.
//!
//! A `Coroutine` is a (register context, stack) pair. A task's coroutine
//! never resumes another coroutine from within itself on the same OS
//! thread (a `Worker` always resumes at most one task coroutine directly
//! from its own stack), so a single thread-local "parent context" slot is
//! enough; there is no need for a per-thread stack of parent environments.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use context::stack::ProtectedFixedSizeStack;
use context::{Context, Transfer};

thread_local! {
    /// The context to jump back into when the running coroutine suspends.
    /// Set by `Coroutine::resume` before the jump, updated by `switch_to_parent`
    /// on every return trip.
    static PARENT_CONTEXT: Cell<Option<Context>> = Cell::new(None);

    /// Why the coroutine most recently occupying this thread suspended.
    /// Read by `Coroutine::resume` immediately after the context switch
    /// returns control to it.
    static LAST_SUSPEND: Cell<SuspendReason> = Cell::new(SuspendReason::Yielded);
}

/// Why a coroutine handed control back to its resumer.
#[derive(Debug, Clone)]
pub enum SuspendReason {
    /// `yield_now()` was called explicitly.
    Yielded,
    /// The task parked on a sync primitive.
    SyncSuspended,
    /// The coroutine function returned normally.
    Completed,
    /// The coroutine function panicked; carries the panic message.
    Panicked(String),
}

/// Lifecycle state of a single coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed but never resumed.
    NotStarted,
    /// Suspended; `resume()` will continue it where it left off.
    Suspended,
    /// Currently executing (only meaningful from the resuming thread's view).
    Running,
    /// The coroutine function has returned or panicked; cannot be resumed again.
    Finished,
}

type Body = Box<dyn FnOnce() + Send + 'static>;

/// A coroutine is nothing more than a (register context, stack) pair.
///
/// Non-shareable: exactly one caller (a `Worker`) drives a given coroutine,
/// matching the invariant that a task's coroutine is resumed by at most one
/// worker at a time.
pub struct Coroutine {
    stack: Option<ProtectedFixedSizeStack>,
    context: Option<Context>,
    state: State,
    /// Raw pointer (as `usize`) to the boxed body, carried as the first
    /// `Transfer::data` so the trampoline can reconstruct and call it.
    /// Consumed by the first `resume()`.
    pending_start_data: Option<usize>,
}

// The raw `Context`/stack pair contains no thread-affine state beyond what
// the `context` crate's assembly trampoline expects; ownership transfers
// cleanly across threads between resumptions.
unsafe impl Send for Coroutine {}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine").field("state", &self.state).finish()
    }
}

impl Coroutine {
    /// Creates a coroutine with a fresh stack of `stack_size` bytes. The
    /// coroutine does not begin executing `body` until the first call to
    /// `resume()`.
    pub fn new(stack_size: usize, body: Body) -> Coroutine {
        let stack =
            ProtectedFixedSizeStack::new(stack_size).expect("failed to allocate coroutine stack");
        let context = unsafe { Context::new(&stack, coroutine_trampoline) };

        // The body is boxed twice so its fat/thin pointer fits in the
        // `usize` the initial resume can carry as `Transfer::data`.
        let body_ptr = Box::into_raw(Box::new(body)) as usize;

        Coroutine {
            stack: Some(stack),
            context: Some(context),
            state: State::NotStarted,
            pending_start_data: Some(body_ptr),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// True once the coroutine function has returned or panicked. Resuming
    /// a finished coroutine is a programmer error; the next `resume()` is
    /// undefined behavior from the caller's point of view, so this crate
    /// turns that into a debug-only assertion rather than a runtime check,
    /// leaving release builds undefended against it.
    pub fn finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Resumes the coroutine, transferring control into it until it yields,
    /// suspends, completes, or panics.
    pub fn resume(&mut self) -> SuspendReason {
        debug_assert_ne!(self.state, State::Finished, "resuming a finished coroutine");

        let ctx = self.context.take().expect("coroutine has no context left to resume");
        self.state = State::Running;

        let carried = self.pending_start_data.take().unwrap_or(0);
        let transfer = unsafe { ctx.resume(carried) };

        let reason = LAST_SUSPEND.with(|cell| cell.replace(SuspendReason::Yielded));
        match &reason {
            SuspendReason::Completed | SuspendReason::Panicked(_) => {
                self.state = State::Finished;
                self.stack = None;
            }
            SuspendReason::Yielded | SuspendReason::SyncSuspended => {
                self.context = Some(transfer.context);
                self.state = State::Suspended;
            }
        }
        reason
    }
}

/// Suspends the currently running coroutine and transfers control back to
/// whichever call resumed it most recently. Callable only from within a
/// running coroutine; calling it outside one panics.
pub fn yield_now() {
    switch_to_parent(SuspendReason::Yielded);
}

/// Like [`yield_now`] but tags the suspension as a sync-primitive park
/// so the worker does not requeue the
/// task onto the waiting queue.
pub fn suspend_for_sync() {
    switch_to_parent(SuspendReason::SyncSuspended);
}

fn switch_to_parent(reason: SuspendReason) {
    LAST_SUSPEND.with(|cell| cell.set(reason));
    let parent = PARENT_CONTEXT
        .with(|cell| cell.take())
        .expect("yield_now/suspend_for_sync called outside a running coroutine");
    let transfer = unsafe { parent.resume(0) };
    PARENT_CONTEXT.with(|cell| cell.set(Some(transfer.context)));
}

extern "C" fn coroutine_trampoline(t: Transfer) -> ! {
    PARENT_CONTEXT.with(|cell| cell.set(Some(t.context)));

    let body_ptr = t.data as *mut Body;
    let body = unsafe { Box::from_raw(body_ptr) };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        (*body)();
    }));

    let reason = match result {
        Ok(()) => SuspendReason::Completed,
        Err(payload) => SuspendReason::Panicked(panic_message(&payload)),
    };
    LAST_SUSPEND.with(|cell| cell.set(reason));

    let parent = PARENT_CONTEXT
        .with(|cell| cell.take())
        .expect("trampoline has no parent context to return to");
    unsafe {
        parent.resume(0);
    }
    unreachable!("resuming past a finished coroutine's trampoline");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_to_completion() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        let mut co = Coroutine::new(
            64 * 1024,
            Box::new(move || {
                ran2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let reason = co.resume();
        assert!(matches!(reason, SuspendReason::Completed));
        assert!(co.finished());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn yields_then_resumes() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order2 = order.clone();
        let mut co = Coroutine::new(
            64 * 1024,
            Box::new(move || {
                order2.lock().unwrap().push("before");
                yield_now();
                order2.lock().unwrap().push("after");
            }),
        );

        let first = co.resume();
        assert!(matches!(first, SuspendReason::Yielded));
        assert_eq!(*order.lock().unwrap(), vec!["before"]);

        let second = co.resume();
        assert!(matches!(second, SuspendReason::Completed));
        assert_eq!(*order.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn captures_panic_as_reason() {
        let mut co = Coroutine::new(
            64 * 1024,
            Box::new(|| {
                panic!("boom");
            }),
        );
        let reason = co.resume();
        match reason {
            SuspendReason::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }
}
