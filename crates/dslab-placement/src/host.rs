//! Physical host capability used by the placement policy.

use std::collections::BTreeMap;

use crate::vm::{Vm, VmUid};

/// What the placement policy needs from a physical host.
///
/// The host has the final word on whether a VM can run on it: the policy only tracks PE bookkeeping and always asks
/// the host before committing a placement.
pub trait Host {
    /// Returns the host name used in logs.
    fn name(&self) -> &str;

    /// Returns the total number of PEs of the host.
    fn total_pes(&self) -> u32;

    /// Tries to start the VM on the host, returns `true` if the VM was accepted.
    fn try_create(&mut self, vm: &dyn Vm) -> bool;

    /// Releases the resources held by the VM. Releasing an unknown VM does nothing.
    fn destroy(&mut self, vm: &dyn Vm);
}

/// Host which accepts VMs as long as their PE requirements fit into its capacity.
#[derive(Clone, Debug)]
pub struct SimpleHost {
    name: String,
    total_pes: u32,
    used_pes: u32,
    vms: BTreeMap<VmUid, u32>,
}

impl SimpleHost {
    pub fn new(name: &str, total_pes: u32) -> Self {
        Self {
            name: name.to_string(),
            total_pes,
            used_pes: 0,
            vms: BTreeMap::new(),
        }
    }

    /// Returns the number of PEs used by VMs running on the host.
    pub fn used_pes(&self) -> u32 {
        self.used_pes
    }

    /// Returns the number of VMs running on the host.
    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    /// Checks whether the VM is running on the host.
    pub fn has_vm(&self, uid: &VmUid) -> bool {
        self.vms.contains_key(uid)
    }
}

impl Host for SimpleHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn total_pes(&self) -> u32 {
        self.total_pes
    }

    fn try_create(&mut self, vm: &dyn Vm) -> bool {
        let uid = vm.uid();
        let pes = vm.required_pes();
        if self.vms.contains_key(&uid) || pes > self.total_pes - self.used_pes {
            return false;
        }
        self.used_pes += pes;
        self.vms.insert(uid, pes);
        true
    }

    fn destroy(&mut self, vm: &dyn Vm) {
        if let Some(pes) = self.vms.remove(&vm.uid()) {
            self.used_pes -= pes;
        }
    }
}
