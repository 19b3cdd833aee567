//! Authoritative record of VM placements.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::PlacementError;
use crate::vm::VmUid;

/// Placement of a single VM: the host it runs on and the PEs charged on that host when it was allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub host: usize,
    pub pes: u32,
}

/// Maps each allocated VM to its [`Allocation`].
///
/// A VM present in the table is allocated, an absent one is not. Entries keep the order in which VMs were
/// allocated.
#[derive(Clone, Debug, Default)]
pub struct AllocationTable {
    entries: IndexMap<VmUid, Allocation>,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new placement. An already allocated VM is never overwritten.
    pub fn record_allocation(&mut self, vm: VmUid, host: usize, pes: u32) -> Result<(), PlacementError> {
        if let Some(existing) = self.entries.get(&vm) {
            return Err(PlacementError::DuplicateAllocation {
                vm,
                host: existing.host,
            });
        }
        self.entries.insert(vm, Allocation { host, pes });
        Ok(())
    }

    /// Removes the placement of the VM and returns it.
    pub fn remove_allocation(&mut self, vm: &VmUid) -> Result<Allocation, PlacementError> {
        self.entries
            .shift_remove(vm)
            .ok_or(PlacementError::NotAllocated { vm: *vm })
    }

    /// Returns the host the VM is allocated to.
    pub fn host_of(&self, vm: &VmUid) -> Option<usize> {
        self.entries.get(vm).map(|allocation| allocation.host)
    }

    pub fn get(&self, vm: &VmUid) -> Option<&Allocation> {
        self.entries.get(vm)
    }

    pub fn contains(&self, vm: &VmUid) -> bool {
        self.entries.contains_key(vm)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over placements in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (&VmUid, &Allocation)> {
        self.entries.iter()
    }

    /// Returns VMs allocated to the specified host.
    pub fn vms_on(&self, host: usize) -> Vec<VmUid> {
        self.entries
            .iter()
            .filter(|(_, allocation)| allocation.host == host)
            .map(|(vm, _)| *vm)
            .collect()
    }

    /// Returns the sum of PEs charged on the specified host.
    pub fn used_pes_on(&self, host: usize) -> u64 {
        self.entries
            .values()
            .filter(|allocation| allocation.host == host)
            .map(|allocation| allocation.pes as u64)
            .sum()
    }

    /// Returns the sum of PEs charged for all VMs.
    pub fn used_pes_total(&self) -> u64 {
        self.entries.values().map(|allocation| allocation.pes as u64).sum()
    }
}
