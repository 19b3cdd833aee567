#![doc = include_str!("../readme.md")]

pub mod allocation_optimizer;
pub mod allocation_optimizers;
pub mod allocation_table;
pub mod capacity_tracker;
pub mod config;
pub mod error;
pub mod host;
pub mod placement_policy;
pub mod vm;
