//! Finished-before-admitted dependency: task X is admitted and runs to
//! completion; task Y, running concurrently, spins until it observes X
//! finished and then admits Z depending on X directly through the
//! scheduler. Z must still be scheduled and run even though its one
//! dependency had already finished before Z itself was admitted.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use taskr::{ExecutionUnit, Runtime, RuntimeConfig, Task};

const LABEL_X: u64 = 0;
const LABEL_Y: u64 = 1;
const LABEL_Z: u64 = 2;

#[test]
fn dependency_finished_before_admission_still_schedules() {
    let runtime = Runtime::new(RuntimeConfig::default());
    common::add_workers(&runtime, 2);

    let z_ran = Arc::new(AtomicBool::new(false));

    runtime
        .add_task(Task::new(LABEL_X, ExecutionUnit::new(|| {})))
        .unwrap();

    let scheduler = Arc::clone(runtime.scheduler());
    let z_ran_for_y = Arc::clone(&z_ran);
    let y = Task::new(
        LABEL_Y,
        ExecutionUnit::new(move || {
            while !scheduler.is_finished(LABEL_X) {
                taskr::task::yield_now();
            }

            let z_ran = Arc::clone(&z_ran_for_y);
            let mut z = Task::new(
                LABEL_Z,
                ExecutionUnit::new(move || {
                    z_ran.store(true, Ordering::SeqCst);
                }),
            );
            z.add_task_dependency(LABEL_X);
            scheduler.admit(Arc::new(z)).expect("Z should still be admissible");
        }),
    );
    runtime.add_task(y).unwrap();

    runtime.run().unwrap();
    runtime.finalize();

    assert!(z_ran.load(Ordering::SeqCst));
    assert!(runtime.scheduler().is_finished(LABEL_Z));
}
