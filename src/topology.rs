//! Interfaces consumed from external collaborators: topology
//! discovery and compute/processing-unit construction. The core only ever
//! calls through these traits; NUMA-aware enumeration, accelerator
//! backends, and cross-node instance management are out of scope and are
//! left to implementations this crate does not provide beyond
//! the `sequential` one below.

use core_affinity::CoreId;

use crate::execution_unit::ExecutionUnit;
use crate::processing_unit::{HostProcessingUnit, ProcessingUnit};

/// A single addressable logical processor offered by the topology layer.
pub type ComputeResource = CoreId;

/// `queryTopology() -> Topology` with `getDevices()`; each device exposes
/// `getComputeResourceList()` and `getMemorySpaceList()`. This crate's core
/// only consumes the compute-resource list, so the trait surfaces just that.
pub trait TopologyManager {
    /// The compute resources available to bind workers to.
    fn compute_resources(&self) -> Vec<ComputeResource>;
}

/// `createExecutionUnit(callable)` and `createProcessingUnit(computeResource)`.
pub trait ComputeManager {
    fn create_execution_unit<F>(&self, callable: F) -> ExecutionUnit
    where
        F: Fn() + Send + Sync + 'static,
    {
        ExecutionUnit::new(callable)
    }

    fn create_processing_unit(&self, resource: ComputeResource) -> Box<dyn ProcessingUnit>;
}

/// Enumerates compute resources via `core_affinity`, one per logical CPU,
/// as this crate's stand-in for HiCR's `sequential`/`hwloc` backends, which
/// are out of scope beyond the interface they implement.
pub struct SequentialTopologyManager;

impl TopologyManager for SequentialTopologyManager {
    fn compute_resources(&self) -> Vec<ComputeResource> {
        match core_affinity::get_core_ids() {
            Some(ids) if !ids.is_empty() => ids,
            _ => (0..num_cpus::get()).map(|id| CoreId { id }).collect(),
        }
    }
}

/// Binds each compute resource to a [`HostProcessingUnit`].
pub struct SequentialComputeManager;

impl ComputeManager for SequentialComputeManager {
    fn create_processing_unit(&self, resource: ComputeResource) -> Box<dyn ProcessingUnit> {
        Box::new(HostProcessingUnit::new(resource))
    }
}
