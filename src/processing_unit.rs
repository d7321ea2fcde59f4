//! Binding of a compute resource able to host one running coroutine at a
//! time.

use std::fmt;
use std::sync::Arc;

use core_affinity::CoreId;
use log::{debug, warn};

use crate::task::{RunOutcome, Task};

/// A runtime-owned binding of one compute resource. Implementations are
/// accessed through this small capability set, same shape as the original
/// HiCR backends (`initialize`, `start`, `getType` and friends), though the
/// concrete topology/compute backends themselves are out of this crate's
/// scope; this trait is the seam external collaborators implement.
pub trait ProcessingUnit: Send + Sync {
    /// Prepares the resource for use. Called once before the worker loop
    /// starts.
    fn initialize(&self);

    /// Pins the calling OS thread to this processing unit's compute
    /// resource. Called once, from the worker thread, before it enters its
    /// pull loop.
    fn pin_current_thread(&self);

    /// Resumes `task`'s coroutine on the calling thread. The default
    /// implementation just calls `task.run()`; a backend with its own
    /// notion of "run on this resource" (a GPU stream, a NUMA-aware queue)
    /// can override it, as long as it still resumes the task's coroutine
    /// rather than running the execution unit's callable directly.
    fn start(&self, task: &Arc<Task>) -> RunOutcome {
        task.run()
    }

    /// Optional worker-level pause; default no-op.
    fn suspend(&self) {}

    /// Optional worker-level resume; default no-op.
    fn resume(&self) {}

    /// Releases the resource. Called once after the worker loop exits.
    fn terminate(&self);

    /// A short, human-readable identifier for logs.
    fn describe(&self) -> String;
}

/// The only backend this crate ships: a single pinned logical CPU,
/// reached through `core_affinity` (the crate `beekeeper`, a worker-pool
/// library in this retrieval pack, uses the same crate under its
/// `affinity` feature for exactly this purpose).
pub struct HostProcessingUnit {
    core_id: CoreId,
}

impl HostProcessingUnit {
    pub fn new(core_id: CoreId) -> HostProcessingUnit {
        HostProcessingUnit { core_id }
    }
}

impl fmt::Debug for HostProcessingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProcessingUnit")
            .field("core_id", &self.core_id.id)
            .finish()
    }
}

impl ProcessingUnit for HostProcessingUnit {
    fn initialize(&self) {
        debug!("initializing host processing unit on core {}", self.core_id.id);
    }

    fn pin_current_thread(&self) {
        if !core_affinity::set_for_current(self.core_id) {
            warn!(
                "failed to pin worker thread to core {}; continuing unpinned",
                self.core_id.id
            );
        }
    }

    fn terminate(&self) {
        debug!("terminating host processing unit on core {}", self.core_id.id);
    }

    fn describe(&self) -> String {
        format!("host-core-{}", self.core_id.id)
    }
}
