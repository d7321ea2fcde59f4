//! ABC dependency chain: for every i, A_i must print before B_i, which
//! must print before C_i; A_{i+1} must print after A_i. B's and C's of
//! different i may interleave freely.

mod common;

use std::sync::{Arc, Mutex};

use taskr::{ExecutionUnit, Runtime, RuntimeConfig, Task};

const CHAIN_LEN: u64 = 9;

#[test]
fn abc_chain_respects_per_chain_order() {
    let runtime = Runtime::new(RuntimeConfig::default());
    common::add_workers(&runtime, 4);

    let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

    for i in 0..CHAIN_LEN {
        let label_a = i * 3;
        let label_b = i * 3 + 1;
        let label_c = i * 3 + 2;

        let order_a = Arc::clone(&order);
        let mut a = Task::new(
            label_a,
            ExecutionUnit::new(move || order_a.lock().unwrap().push(label_a)),
        );
        if i > 0 {
            a.add_task_dependency((i - 1) * 3);
        }
        runtime.add_task(a).unwrap();

        let order_b = Arc::clone(&order);
        let mut b = Task::new(
            label_b,
            ExecutionUnit::new(move || order_b.lock().unwrap().push(label_b)),
        );
        b.add_task_dependency(label_a);
        runtime.add_task(b).unwrap();

        let order_c = Arc::clone(&order);
        let mut c = Task::new(
            label_c,
            ExecutionUnit::new(move || order_c.lock().unwrap().push(label_c)),
        );
        c.add_task_dependency(label_b);
        runtime.add_task(c).unwrap();
    }

    runtime.run().unwrap();
    runtime.finalize();

    let recorded = order.lock().unwrap();
    assert_eq!(recorded.len(), (CHAIN_LEN * 3) as usize);
    let position = |label: u64| recorded.iter().position(|&l| l == label).unwrap();

    for i in 0..CHAIN_LEN {
        let a = i * 3;
        let b = i * 3 + 1;
        let c = i * 3 + 2;
        assert!(position(a) < position(b), "A_{i} must print before B_{i}");
        assert!(position(b) < position(c), "B_{i} must print before C_{i}");
        if i > 0 {
            let prev_a = (i - 1) * 3;
            assert!(position(prev_a) < position(a), "A_{} must print before A_{i}", i - 1);
        }
    }
}
