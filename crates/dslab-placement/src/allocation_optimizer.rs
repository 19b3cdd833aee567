//! Cluster-wide allocation optimization.

use serde::Serialize;

use crate::allocation_optimizers::no_optimization::NoOptimization;
use crate::allocation_optimizers::pe_rebalancer::PeRebalancer;
use crate::allocation_table::AllocationTable;
use crate::capacity_tracker::CapacityTracker;
use crate::config::options::parse_config_value;
use crate::error::ConfigError;
use crate::vm::{Vm, VmUid};

/// Recommendation to move an allocated VM to another host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationDirective {
    pub vm: VmUid,
    pub target_host: usize,
}

/// Trait for implementation of allocation optimizers.
///
/// The optimizer looks at a batch of VMs and the current placement state and returns the migrations it recommends.
/// An empty result means that no change is recommended. The optimizer only proposes, applying the directives (or
/// not) is up to the caller.
pub trait AllocationOptimizer {
    fn optimize(
        &self,
        vms: &[&dyn Vm],
        capacity: &CapacityTracker,
        allocations: &AllocationTable,
    ) -> Vec<MigrationDirective>;
}

/// Creates optimizer from config string such as `PeRebalancer[threshold=0.8]`.
pub fn allocation_optimizer_resolver(config_str: &str) -> Result<Box<dyn AllocationOptimizer>, ConfigError> {
    let (optimizer_name, options) = parse_config_value(config_str);
    match optimizer_name.as_str() {
        "NoOptimization" => Ok(Box::new(NoOptimization::new())),
        "PeRebalancer" => Ok(Box::new(PeRebalancer::from_options(&options.unwrap_or_default())?)),
        _ => Err(ConfigError::UnknownOptimizer(config_str.to_string())),
    }
}
