//! Optimizer which never recommends anything.

use crate::allocation_optimizer::{AllocationOptimizer, MigrationDirective};
use crate::allocation_table::AllocationTable;
use crate::capacity_tracker::CapacityTracker;
use crate::vm::Vm;

/// Keeps the current placement as is.
#[derive(Default)]
pub struct NoOptimization;

impl NoOptimization {
    pub fn new() -> Self {
        Default::default()
    }
}

impl AllocationOptimizer for NoOptimization {
    fn optimize(
        &self,
        _vms: &[&dyn Vm],
        _capacity: &CapacityTracker,
        _allocations: &AllocationTable,
    ) -> Vec<MigrationDirective> {
        Vec::new()
    }
}
