//! Shared helper for the integration suite: binds `count` `HostProcessingUnit`s
//! to a `Runtime`, cycling through whatever logical cores are available so
//! the suite still runs on a single-core CI box (these scenarios don't
//! depend on distinct physical cores, only on having ≥N workers).

use taskr::processing_unit::HostProcessingUnit;
use taskr::Runtime;

pub fn add_workers(runtime: &Runtime, count: usize) {
    let cores = core_affinity::get_core_ids().unwrap_or_else(|| vec![core_affinity::CoreId { id: 0 }]);
    for i in 0..count {
        let core = cores[i % cores.len()];
        runtime
            .add_processing_unit(Box::new(HostProcessingUnit::new(core)))
            .expect("failed to add processing unit");
    }
}
