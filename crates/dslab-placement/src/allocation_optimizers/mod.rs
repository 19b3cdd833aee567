//! Implementations of allocation optimizers.

pub mod no_optimization;
pub mod pe_rebalancer;
