//! Virtual machine identity and the VM capability used by the placement policy.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Unique VM key built from the owner (user) ID and the VM ID.
///
/// Two VMs of different users may share a VM ID, so the pair is what identifies a VM in the allocation table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VmUid {
    pub user_id: u32,
    pub vm_id: u32,
}

impl VmUid {
    pub fn new(user_id: u32, vm_id: u32) -> Self {
        Self { user_id, vm_id }
    }
}

impl Display for VmUid {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}-{}", self.user_id, self.vm_id)
    }
}

/// What the placement policy needs to know about a VM.
pub trait Vm {
    /// Returns the unique key of the VM.
    fn uid(&self) -> VmUid;

    /// Returns the number of PEs the VM currently requires.
    fn required_pes(&self) -> u32;
}

/// Virtual machine described only by its identity and PE requirement.
///
/// The requirement can be changed while the VM is placed, the policy keeps charging the amount it saw at allocation
/// time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleVm {
    pub id: u32,
    pub user_id: u32,
    pes: u32,
}

impl SimpleVm {
    pub fn new(id: u32, user_id: u32, pes: u32) -> Self {
        Self { id, user_id, pes }
    }

    /// Changes the number of PEs required by the VM.
    pub fn set_required_pes(&mut self, pes: u32) {
        self.pes = pes;
    }
}

impl Vm for SimpleVm {
    fn uid(&self) -> VmUid {
        VmUid::new(self.user_id, self.id)
    }

    fn required_pes(&self) -> u32 {
        self.pes
    }
}
