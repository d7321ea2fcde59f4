//! Opaque, replicable description of work.

use std::fmt;
use std::sync::Arc;

/// A stateless, immutable, zero-argument callable. Many tasks may share one
/// `ExecutionUnit`; cloning is cheap (it is a reference-counted handle to
/// the same closure).
#[derive(Clone)]
pub struct ExecutionUnit {
    callable: Arc<dyn Fn() + Send + Sync + 'static>,
}

impl ExecutionUnit {
    /// Wraps `callable` as an execution unit.
    pub fn new<F>(callable: F) -> ExecutionUnit
    where
        F: Fn() + Send + Sync + 'static,
    {
        ExecutionUnit {
            callable: Arc::new(callable),
        }
    }

    /// Invokes the wrapped callable.
    pub(crate) fn invoke(&self) {
        (self.callable)()
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn many_tasks_share_one_unit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let unit = ExecutionUnit::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        let a = unit.clone();
        let b = unit.clone();
        a.invoke();
        b.invoke();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
