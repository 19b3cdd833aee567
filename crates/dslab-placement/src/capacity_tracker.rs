//! Free PE accounting for the host pool.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::rc::Rc;

use crate::error::PlacementError;
use crate::host::Host;

/// Returns the ratio of charged to total PEs for a host with the specified free and total PE counts.
///
/// A host without PEs has zero load.
pub fn pe_load(free_pes: u32, total_pes: u32) -> f64 {
    if total_pes == 0 {
        return 0.;
    }
    1. - free_pes as f64 / total_pes as f64
}

/// Capacity of a single host: its total PE count and the part of it not charged to any VM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostCapacity {
    pub total_pes: u32,
    pub free_pes: u32,
}

/// Stores per-host free PE counts, index-aligned with the policy host list.
///
/// The counts are updated incrementally by [`credit`](Self::credit) and [`debit`](Self::debit) and are never
/// recomputed from the allocation table. Both operations keep `free_pes` within `0..=total_pes` and report
/// [`PlacementError::CorruptedState`] instead of leaving the range.
#[derive(Clone, Debug, Default)]
pub struct CapacityTracker {
    hosts: Vec<HostCapacity>,
}

impl CapacityTracker {
    /// Creates tracker for hosts with the specified total PE counts, all of them fully free.
    pub fn new<I: IntoIterator<Item = u32>>(total_pes: I) -> Self {
        Self {
            hosts: total_pes
                .into_iter()
                .map(|total_pes| HostCapacity {
                    total_pes,
                    free_pes: total_pes,
                })
                .collect(),
        }
    }

    /// Creates tracker for the specified hosts.
    pub fn from_hosts(hosts: &[Rc<RefCell<dyn Host>>]) -> Self {
        Self::new(hosts.iter().map(|host| host.borrow().total_pes()))
    }

    /// Returns the number of tracked hosts.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Returns the number of free PEs on the specified host.
    ///
    /// Panics if the host index is out of range.
    pub fn free_pes(&self, host: usize) -> u32 {
        self.hosts[host].free_pes
    }

    /// Returns the total number of PEs on the specified host.
    ///
    /// Panics if the host index is out of range.
    pub fn total_pes(&self, host: usize) -> u32 {
        self.hosts[host].total_pes
    }

    /// Returns the PE allocation rate (ratio of charged to total PEs) of the specified host.
    ///
    /// Panics if the host index is out of range.
    pub fn load(&self, host: usize) -> f64 {
        let state = &self.hosts[host];
        pe_load(state.free_pes, state.total_pes)
    }

    /// Returns the total number of PEs in the pool.
    pub fn total_capacity(&self) -> u64 {
        self.hosts.iter().map(|h| h.total_pes as u64).sum()
    }

    /// Returns the number of free PEs in the pool.
    pub fn total_free(&self) -> u64 {
        self.hosts.iter().map(|h| h.free_pes as u64).sum()
    }

    /// Returns the free PE counts of all hosts in host order.
    pub fn free_pes_list(&self) -> Vec<u32> {
        self.hosts.iter().map(|h| h.free_pes).collect()
    }

    /// Returns PEs charged on the host back to it.
    pub fn credit(&mut self, host: usize, pes: u32) -> Result<(), PlacementError> {
        let host_count = self.hosts.len();
        let state = self
            .hosts
            .get_mut(host)
            .ok_or(PlacementError::InvalidHost { host, host_count })?;
        match state.free_pes.checked_add(pes) {
            Some(free_pes) if free_pes <= state.total_pes => {
                state.free_pes = free_pes;
                Ok(())
            }
            _ => Err(PlacementError::CorruptedState(format!(
                "crediting {} PEs to host #{} exceeds its capacity ({} of {} PEs are free)",
                pes, host, state.free_pes, state.total_pes
            ))),
        }
    }

    /// Charges PEs on the host.
    ///
    /// The caller is expected to have checked that the host has room, running out of free PEs here means the
    /// bookkeeping disagrees with the host.
    pub fn debit(&mut self, host: usize, pes: u32) -> Result<(), PlacementError> {
        let host_count = self.hosts.len();
        let state = self
            .hosts
            .get_mut(host)
            .ok_or(PlacementError::InvalidHost { host, host_count })?;
        match state.free_pes.checked_sub(pes) {
            Some(free_pes) => {
                state.free_pes = free_pes;
                Ok(())
            }
            None => Err(PlacementError::CorruptedState(format!(
                "debiting {} PEs from host #{} which has only {} free PEs",
                pes, host, state.free_pes
            ))),
        }
    }

    /// Returns the host with the most free PEs (worst fit), ties are broken by the lowest index.
    ///
    /// Returns `None` only for an empty pool.
    pub fn best_candidate(&self) -> Option<usize> {
        let mut result: Option<usize> = None;
        let mut max_free_pes: u32 = 0;

        for (host, state) in self.hosts.iter().enumerate() {
            if result.is_none() || state.free_pes > max_free_pes {
                max_free_pes = state.free_pes;
                result = Some(host);
            }
        }
        result
    }

    /// Returns all hosts ordered by decreasing number of free PEs, ties are broken by the lowest index.
    ///
    /// The first element is always [`best_candidate`](Self::best_candidate).
    pub fn candidates_by_free_pes(&self) -> Vec<usize> {
        let mut hosts: Vec<usize> = (0..self.hosts.len()).collect();
        hosts.sort_by_key(|&host| Reverse(self.hosts[host].free_pes));
        hosts
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(vec![2, 5, 1, 5, 3], Some(1))]
    #[case(vec![7], Some(0))]
    #[case(vec![0, 0, 0], Some(0))]
    #[case(vec![1, 2, 3], Some(2))]
    #[case(vec![], None)]
    fn best_candidate_is_first_max(#[case] free_pes: Vec<u32>, #[case] expected: Option<usize>) {
        let tracker = CapacityTracker::new(free_pes);
        assert_eq!(tracker.best_candidate(), expected);
    }

    #[rstest]
    #[case(8, 8, 0.)]
    #[case(2, 8, 0.75)]
    #[case(0, 4, 1.)]
    #[case(0, 0, 0.)]
    fn pe_load_is_charged_share(#[case] free_pes: u32, #[case] total_pes: u32, #[case] expected: f64) {
        assert_eq!(pe_load(free_pes, total_pes), expected);
    }

    #[test]
    fn candidates_are_ordered_by_free_pes() {
        let tracker = CapacityTracker::new(vec![2, 5, 1, 5, 3]);
        assert_eq!(tracker.candidates_by_free_pes(), vec![1, 3, 4, 0, 2]);
    }

    #[test]
    fn debit_and_credit_stay_in_range() {
        let mut tracker = CapacityTracker::new(vec![4, 8]);
        tracker.debit(1, 6).unwrap();
        assert_eq!(tracker.free_pes(1), 2);
        assert_eq!(tracker.load(1), 0.75);
        assert!(matches!(tracker.debit(1, 3), Err(PlacementError::CorruptedState(_))));
        assert_eq!(tracker.free_pes(1), 2);

        tracker.credit(1, 6).unwrap();
        assert_eq!(tracker.free_pes(1), 8);
        assert!(matches!(tracker.credit(0, 1), Err(PlacementError::CorruptedState(_))));
        assert_eq!(tracker.free_pes(0), 4);
    }

    #[test]
    fn unknown_host_is_rejected() {
        let mut tracker = CapacityTracker::new(vec![4]);
        assert_eq!(
            tracker.debit(3, 1),
            Err(PlacementError::InvalidHost { host: 3, host_count: 1 })
        );
        assert_eq!(
            tracker.credit(1, 1),
            Err(PlacementError::InvalidHost { host: 1, host_count: 1 })
        );
    }
}
