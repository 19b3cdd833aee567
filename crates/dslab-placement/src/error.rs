//! Error types.

use thiserror::Error;

use crate::vm::VmUid;

/// Outcome of a placement operation that did not go through.
///
/// `CapacityExhausted`, `NotAllocated` and `DuplicateAllocation` are ordinary outcomes the caller is expected to
/// handle. `InvalidHost` means the caller passed a host index that does not belong to the pool. `CorruptedState` means
/// the bookkeeping is broken: the policy refuses any further mutation after reporting it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("no host accepted vm {vm}")]
    CapacityExhausted { vm: VmUid },
    #[error("vm {vm} is not allocated")]
    NotAllocated { vm: VmUid },
    #[error("vm {vm} is already allocated to host #{host}")]
    DuplicateAllocation { vm: VmUid, host: usize },
    #[error("host #{host} does not exist (pool has {host_count} hosts)")]
    InvalidHost { host: usize, host_count: usize },
    #[error("corrupted placement state: {0}")]
    CorruptedState(String),
}

/// Error raised while loading the placement configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("can't resolve allocation optimizer: {0}")]
    UnknownOptimizer(String),
    #[error("bad option `{option}` in `{config}`")]
    BadOption { option: String, config: String },
}
