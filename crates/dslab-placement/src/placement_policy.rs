//! Worst-fit VM placement policy.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, error, info};

use crate::allocation_optimizer::{allocation_optimizer_resolver, AllocationOptimizer, MigrationDirective};
use crate::allocation_optimizers::no_optimization::NoOptimization;
use crate::allocation_table::{Allocation, AllocationTable};
use crate::capacity_tracker::CapacityTracker;
use crate::config::PlacementConfig;
use crate::error::{ConfigError, PlacementError};
use crate::host::Host;
use crate::vm::{Vm, VmUid};

/// Where the second phase of a migration places the VM.
#[derive(Clone, Copy)]
enum Target {
    Select,
    Host(usize),
}

/// Places VMs on a fixed pool of hosts and keeps track of the consumed PEs.
///
/// The policy exclusively owns its [`CapacityTracker`] and [`AllocationTable`] and updates both of them in every
/// operation, so a VM is either recorded in the table and charged in the tracker or neither. Hosts are shared with the
/// caller and addressed by their index in the pool.
///
/// Host selection is worst fit: the host with the most free PEs is tried first. The policy does not compare the VM
/// requirement with the tracked free PEs before asking the host, the host itself decides whether the VM fits.
///
/// If an operation finds the bookkeeping inconsistent it returns [`PlacementError::CorruptedState`] and the policy
/// becomes poisoned: every later mutating call fails with the same error and leaves the tables untouched.
pub struct PlacementPolicy {
    hosts: Vec<Rc<RefCell<dyn Host>>>,
    capacity: CapacityTracker,
    allocations: AllocationTable,
    optimizer: Box<dyn AllocationOptimizer>,
    retry_on_reject: bool,
    poisoned: Option<String>,
}

impl PlacementPolicy {
    /// Creates policy for the specified host pool, all hosts are considered empty.
    pub fn new(hosts: Vec<Rc<RefCell<dyn Host>>>) -> Self {
        let capacity = CapacityTracker::from_hosts(&hosts);
        Self {
            hosts,
            capacity,
            allocations: AllocationTable::new(),
            optimizer: Box::new(NoOptimization::new()),
            retry_on_reject: true,
            poisoned: None,
        }
    }

    /// Creates policy together with the hosts described by the config.
    pub fn from_config(config: &PlacementConfig) -> Result<Self, ConfigError> {
        let hosts = config
            .build_hosts()
            .into_iter()
            .map(|host| host as Rc<RefCell<dyn Host>>)
            .collect();
        let optimizer = allocation_optimizer_resolver(&config.optimizer)?;
        Ok(Self::new(hosts)
            .with_retry_on_reject(config.retry_on_reject)
            .with_optimizer(optimizer))
    }

    /// Sets the optimizer used by [`optimize_allocation`](Self::optimize_allocation).
    pub fn with_optimizer(mut self, optimizer: Box<dyn AllocationOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets whether allocation falls back to the other hosts when the worst-fit candidate rejects a VM.
    pub fn with_retry_on_reject(mut self, retry_on_reject: bool) -> Self {
        self.retry_on_reject = retry_on_reject;
        self
    }

    /// Places the VM on the host with the most free PEs.
    ///
    /// If that host rejects the VM and retries are enabled, the remaining hosts are tried in the order of decreasing
    /// free PEs, each of them once. Returns the index of the selected host or [`PlacementError::CapacityExhausted`]
    /// if no host accepted the VM.
    pub fn allocate(&mut self, vm: &dyn Vm) -> Result<usize, PlacementError> {
        self.ensure_consistent()?;
        self.ensure_not_allocated(vm.uid())?;

        let candidates = if self.retry_on_reject {
            self.capacity.candidates_by_free_pes()
        } else {
            self.capacity.best_candidate().into_iter().collect()
        };
        for host in candidates {
            if self.try_place(vm, host)? {
                return Ok(host);
            }
            debug!("host {} rejected vm {}", self.host_name(host), vm.uid());
        }
        Err(PlacementError::CapacityExhausted { vm: vm.uid() })
    }

    /// Places the VM on the specified host without host selection.
    pub fn allocate_on(&mut self, vm: &dyn Vm, host: usize) -> Result<usize, PlacementError> {
        self.ensure_consistent()?;
        self.ensure_host(host)?;
        self.ensure_not_allocated(vm.uid())?;

        if self.try_place(vm, host)? {
            Ok(host)
        } else {
            debug!("host {} rejected vm {}", self.host_name(host), vm.uid());
            Err(PlacementError::CapacityExhausted { vm: vm.uid() })
        }
    }

    /// Removes the VM from its host and returns the PEs charged for it to the host.
    ///
    /// The credited amount is the one charged at allocation time, not the current VM requirement. Releasing a VM that
    /// is not allocated does nothing and returns `None`.
    pub fn deallocate(&mut self, vm: &dyn Vm) -> Result<Option<Allocation>, PlacementError> {
        self.ensure_consistent()?;
        let uid = vm.uid();
        let allocation = match self.allocations.remove_allocation(&uid) {
            Ok(allocation) => allocation,
            Err(_) => {
                debug!("vm {} is not allocated, nothing to release", uid);
                return Ok(None);
            }
        };
        self.hosts[allocation.host].borrow_mut().destroy(vm);
        if let Err(e) = self.capacity.credit(allocation.host, allocation.pes) {
            return Err(self.poison(e));
        }
        debug!(
            "released {} PEs of vm {} on host {}",
            allocation.pes,
            uid,
            self.host_name(allocation.host)
        );
        Ok(Some(allocation))
    }

    /// Moves the VM to the host selected as in [`allocate`](Self::allocate), which may be the same host.
    ///
    /// The VM is released first and then placed again. If the placement fails, the VM is put back on its original
    /// host and the placement error is returned. If even that fails, the VM is left unallocated and
    /// [`PlacementError::NotAllocated`] is returned. Migrating a VM that is not allocated also returns
    /// [`PlacementError::NotAllocated`].
    pub fn migrate(&mut self, vm: &dyn Vm) -> Result<usize, PlacementError> {
        self.migrate_with(vm, Target::Select)
    }

    /// Moves the VM to the specified host, failures are handled as in [`migrate`](Self::migrate).
    pub fn migrate_to(&mut self, vm: &dyn Vm, host: usize) -> Result<usize, PlacementError> {
        self.ensure_consistent()?;
        self.ensure_host(host)?;
        self.migrate_with(vm, Target::Host(host))
    }

    /// Returns the index of the host the VM is allocated to.
    pub fn host_of(&self, vm: &dyn Vm) -> Option<usize> {
        self.allocations.host_of(&vm.uid())
    }

    /// Returns the index of the host the VM with the specified VM and user IDs is allocated to.
    pub fn host_of_uid(&self, vm_id: u32, user_id: u32) -> Option<usize> {
        self.allocations.host_of(&VmUid::new(user_id, vm_id))
    }

    /// Returns the host with the specified index.
    pub fn host(&self, host: usize) -> Option<Rc<RefCell<dyn Host>>> {
        self.hosts.get(host).cloned()
    }

    /// Returns the number of hosts in the pool.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Returns the name of the host with the specified index.
    pub fn host_name(&self, host: usize) -> String {
        match self.hosts.get(host) {
            Some(h) => h.borrow().name().to_string(),
            None => format!("#{}", host),
        }
    }

    /// Returns migrations recommended by the configured optimizer for the VM batch.
    pub fn optimize_allocation(&self, vms: &[&dyn Vm]) -> Vec<MigrationDirective> {
        self.optimizer.optimize(vms, &self.capacity, &self.allocations)
    }

    pub fn capacity(&self) -> &CapacityTracker {
        &self.capacity
    }

    pub fn allocations(&self) -> &AllocationTable {
        &self.allocations
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Checks that PEs charged in the tracker match the allocation table on every host.
    pub fn verify(&self) -> Result<(), PlacementError> {
        self.ensure_consistent()?;
        for host in 0..self.capacity.host_count() {
            let charged = (self.capacity.total_pes(host) - self.capacity.free_pes(host)) as u64;
            let recorded = self.allocations.used_pes_on(host);
            if charged != recorded {
                return Err(PlacementError::CorruptedState(format!(
                    "host #{} has {} PEs charged but {} PEs recorded for its vms",
                    host, charged, recorded
                )));
            }
        }
        Ok(())
    }

    fn migrate_with(&mut self, vm: &dyn Vm, target: Target) -> Result<usize, PlacementError> {
        self.ensure_consistent()?;
        let uid = vm.uid();
        let source = self
            .allocations
            .host_of(&uid)
            .ok_or(PlacementError::NotAllocated { vm: uid })?;

        self.deallocate(vm)?;
        let placed = match target {
            Target::Select => self.allocate(vm),
            Target::Host(host) => self.allocate_on(vm, host),
        };
        match placed {
            Ok(host) => {
                info!(
                    "migrated vm {} from host {} to host {}",
                    uid,
                    self.host_name(source),
                    self.host_name(host)
                );
                Ok(host)
            }
            Err(e @ PlacementError::CorruptedState(_)) => Err(e),
            Err(e) => {
                debug!(
                    "migration of vm {} failed ({}), returning it to host {}",
                    uid,
                    e,
                    self.host_name(source)
                );
                match self.allocate_on(vm, source) {
                    Ok(_) => Err(e),
                    Err(restore @ PlacementError::CorruptedState(_)) => Err(restore),
                    Err(restore) => {
                        error!(
                            "vm {} was lost during migration from host {}: {}",
                            uid,
                            self.host_name(source),
                            restore
                        );
                        Err(PlacementError::NotAllocated { vm: uid })
                    }
                }
            }
        }
    }

    /// Asks the host to accept the VM and commits the placement if it does.
    ///
    /// Returns `false` without touching the tables if the host rejects the VM.
    fn try_place(&mut self, vm: &dyn Vm, host: usize) -> Result<bool, PlacementError> {
        let accepted = self.hosts[host].borrow_mut().try_create(vm);
        if !accepted {
            return Ok(false);
        }

        let uid = vm.uid();
        let pes = vm.required_pes();
        if let Err(e) = self.capacity.debit(host, pes) {
            self.hosts[host].borrow_mut().destroy(vm);
            return Err(self.poison(e));
        }
        if let Err(e) = self.allocations.record_allocation(uid, host, pes) {
            self.hosts[host].borrow_mut().destroy(vm);
            self.capacity.credit(host, pes).map_err(|e| self.poison(e))?;
            return Err(e);
        }
        info!("vm {} has been allocated to host {}", uid, self.host_name(host));
        Ok(true)
    }

    fn ensure_consistent(&self) -> Result<(), PlacementError> {
        match &self.poisoned {
            Some(reason) => Err(PlacementError::CorruptedState(format!("policy is poisoned: {}", reason))),
            None => Ok(()),
        }
    }

    fn ensure_host(&self, host: usize) -> Result<(), PlacementError> {
        if host >= self.hosts.len() {
            return Err(PlacementError::InvalidHost {
                host,
                host_count: self.hosts.len(),
            });
        }
        Ok(())
    }

    fn ensure_not_allocated(&self, uid: VmUid) -> Result<(), PlacementError> {
        match self.allocations.host_of(&uid) {
            Some(host) => Err(PlacementError::DuplicateAllocation { vm: uid, host }),
            None => Ok(()),
        }
    }

    fn poison(&mut self, e: PlacementError) -> PlacementError {
        if let PlacementError::CorruptedState(reason) = &e {
            error!("{}", e);
            self.poisoned = Some(reason.clone());
        }
        e
    }
}
