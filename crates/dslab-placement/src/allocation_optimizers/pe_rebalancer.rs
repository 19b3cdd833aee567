//! PE load rebalancing.

use std::collections::HashSet;

use log::debug;

use crate::allocation_optimizer::{AllocationOptimizer, MigrationDirective};
use crate::allocation_table::AllocationTable;
use crate::capacity_tracker::{pe_load, CapacityTracker};
use crate::config::options::parse_options;
use crate::error::ConfigError;
use crate::vm::Vm;

const DEFAULT_THRESHOLD: f64 = 0.8;

/// Moves VMs away from hosts whose PE load exceeds the threshold.
///
/// VMs of an overloaded host are considered in batch order until the projected load of the host drops to the
/// threshold. Each of them goes to the host with the most free PEs which stays at or under the threshold after
/// receiving the VM. Projected free PE counts are updated after each directive, so a round never over-commits a
/// target. Hosts that lose VMs are not used as targets and hosts that receive VMs are not used as sources.
pub struct PeRebalancer {
    threshold: f64,
}

impl PeRebalancer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Creates rebalancer from options string, e.g. `threshold=0.7`.
    pub fn from_options(s: &str) -> Result<Self, ConfigError> {
        let options = parse_options(s)?;
        if let Some(name) = options.keys().find(|name| name.as_str() != "threshold") {
            return Err(ConfigError::BadOption {
                option: name.clone(),
                config: s.to_string(),
            });
        }
        let threshold = match options.get("threshold") {
            Some(value) => value
                .parse::<f64>()
                .ok()
                .filter(|t| *t > 0. && *t <= 1.)
                .ok_or_else(|| ConfigError::BadOption {
                    option: format!("threshold={}", value),
                    config: s.to_string(),
                })?,
            None => DEFAULT_THRESHOLD,
        };
        Ok(Self::new(threshold))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl AllocationOptimizer for PeRebalancer {
    fn optimize(
        &self,
        vms: &[&dyn Vm],
        capacity: &CapacityTracker,
        allocations: &AllocationTable,
    ) -> Vec<MigrationDirective> {
        let host_count = capacity.host_count();
        let total: Vec<u32> = (0..host_count).map(|h| capacity.total_pes(h)).collect();
        let mut free = capacity.free_pes_list();

        let mut directives = Vec::new();
        let mut source_hosts = HashSet::<usize>::new();
        let mut target_hosts = HashSet::<usize>::new();

        for source in 0..host_count {
            if target_hosts.contains(&source) || pe_load(free[source], total[source]) <= self.threshold {
                continue;
            }
            debug!(
                "host #{} is overloaded ({:.3} PE load)",
                source,
                pe_load(free[source], total[source])
            );

            for vm in vms {
                if pe_load(free[source], total[source]) <= self.threshold {
                    break;
                }
                let uid = vm.uid();
                let pes = match allocations.get(&uid) {
                    Some(allocation) if allocation.host == source => allocation.pes,
                    _ => continue,
                };

                let mut target: Option<usize> = None;
                for host in 0..host_count {
                    if host == source || source_hosts.contains(&host) || free[host] < pes {
                        continue;
                    }
                    if pe_load(free[host] - pes, total[host]) > self.threshold {
                        continue;
                    }
                    if target.map_or(true, |best| free[host] > free[best]) {
                        target = Some(host);
                    }
                }

                match target {
                    Some(target_host) => {
                        debug!("propose migration of vm {} from host #{} to host #{}", uid, source, target_host);
                        free[source] += pes;
                        free[target_host] -= pes;
                        source_hosts.insert(source);
                        target_hosts.insert(target_host);
                        directives.push(MigrationDirective { vm: uid, target_host });
                    }
                    None => {
                        debug!("no suitable target to migrate vm {} from host #{}", uid, source);
                    }
                }
            }
        }
        directives
    }
}
