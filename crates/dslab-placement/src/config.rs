//! Cluster and policy configuration.

pub mod options;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::host::SimpleHost;
use crate::vm::SimpleVm;

/// Holds raw config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawPlacementConfig {
    pub hosts: Option<Vec<HostConfig>>,
    pub vms: Option<Vec<VmConfig>>,
    pub retry_on_reject: Option<bool>,
    pub optimizer: Option<String>,
    pub rebalance_rounds: Option<u32>,
}

/// Holds configuration of a single physical host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Host name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Host name prefix.
    /// Full name is produced by appending host instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    /// Number of host PEs.
    pub pes: u32,
    /// Number of such hosts.
    pub count: Option<u32>,
}

/// Holds configuration of a set of identical VMs owned by one user.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmConfig {
    /// Owner ID, 0 if absent.
    pub user_id: Option<u32>,
    /// Number of PEs required by each VM.
    pub pes: u32,
    /// Number of such VMs.
    pub count: Option<u32>,
}

/// Represents placement configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct PlacementConfig {
    /// Physical hosts in pool order.
    pub hosts: Vec<HostConfig>,
    /// VMs to place, in placement order.
    pub vms: Vec<VmConfig>,
    /// Whether allocation tries the remaining hosts after the worst-fit candidate rejects a VM.
    pub retry_on_reject: bool,
    /// Allocation optimizer in `Name[option=value]` form.
    pub optimizer: String,
    /// Maximum number of optimization rounds performed by a driver.
    pub rebalance_rounds: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            vms: Vec::new(),
            retry_on_reject: true,
            optimizer: "NoOptimization".to_string(),
            rebalance_rounds: 1,
        }
    }
}

impl PlacementConfig {
    /// Creates config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Creates config from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawPlacementConfig = serde_yaml::from_str(yaml)?;
        let default = Self::default();
        Ok(Self {
            hosts: raw.hosts.unwrap_or_default(),
            vms: raw.vms.unwrap_or_default(),
            retry_on_reject: raw.retry_on_reject.unwrap_or(default.retry_on_reject),
            optimizer: raw.optimizer.unwrap_or(default.optimizer),
            rebalance_rounds: raw.rebalance_rounds.unwrap_or(default.rebalance_rounds),
        })
    }

    /// Creates hosts described by the config in pool order.
    pub fn build_hosts(&self) -> Vec<Rc<RefCell<SimpleHost>>> {
        let mut hosts = Vec::new();
        for host in &self.hosts {
            let count = host.count.unwrap_or(1);
            for i in 0..count {
                let name = match (&host.name, &host.name_prefix) {
                    (Some(name), _) if count == 1 => name.clone(),
                    (_, Some(prefix)) => format!("{}{}", prefix, i + 1),
                    _ => format!("host{}", hosts.len()),
                };
                hosts.push(Rc::new(RefCell::new(SimpleHost::new(&name, host.pes))));
            }
        }
        hosts
    }

    /// Creates VMs described by the config. VM IDs are assigned sequentially per user starting from 0.
    pub fn build_vms(&self) -> Vec<SimpleVm> {
        let mut next_id: HashMap<u32, u32> = HashMap::new();
        let mut vms = Vec::new();
        for vm in &self.vms {
            let user_id = vm.user_id.unwrap_or(0);
            for _ in 0..vm.count.unwrap_or(1) {
                let id = next_id.entry(user_id).or_insert(0);
                vms.push(SimpleVm::new(*id, user_id, vm.pes));
                *id += 1;
            }
        }
        vms
    }
}
