//! Condition variable handshake. T1 sleeps, sets `value = 7`, notifies,
//! then waits for T2's own notify before adding 7. T2 waits first, adds 7
//! once woken, sleeps, then notifies T1. Expected final value: 7 · 3 = 21.
//! The ordering only resolves correctly because T2 calls `wait` well before
//! T1's delayed `notify_one`.

mod common;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskr::sync::ConditionVariable;
use taskr::{ExecutionUnit, Runtime, RuntimeConfig, Task};

#[test]
fn handshake_reaches_twenty_one() {
    let runtime = Runtime::new(RuntimeConfig::default());
    common::add_workers(&runtime, 2);

    let value = Arc::new(AtomicI64::new(0));
    let cv = Arc::new(ConditionVariable::new());

    let value1 = Arc::clone(&value);
    let cv1 = Arc::clone(&cv);
    let t1 = Task::new(
        0,
        ExecutionUnit::new(move || {
            std::thread::sleep(Duration::from_millis(100));
            value1.store(7, Ordering::SeqCst);
            cv1.notify_one();
            cv1.wait().unwrap();
            value1.fetch_add(7, Ordering::SeqCst);
        }),
    );

    let value2 = Arc::clone(&value);
    let cv2 = Arc::clone(&cv);
    let t2 = Task::new(
        1,
        ExecutionUnit::new(move || {
            cv2.wait().unwrap();
            value2.fetch_add(7, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            cv2.notify_one();
        }),
    );

    runtime.add_task(t1).unwrap();
    runtime.add_task(t2).unwrap();
    runtime.run().unwrap();
    runtime.finalize();

    assert_eq!(value.load(Ordering::SeqCst), 21);
}
