use std::{
    collections::{BTreeMap, HashMap},
    net::IpAddr,
};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

// Number of addresses in every subnet that can never be assigned (network and broadcast).
pub const RESERVED_ADDRESSES: i128 = 2;

pub type InstanceMap = HashMap<String, Instance>;
pub type SubnetMap = HashMap<String, Subnet>;
pub type VirtualNetworkMap = HashMap<String, VirtualNetwork>;
pub type PoolQuotaMap = BTreeMap<String, PoolQuota>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetwork {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_cidr: Option<IpNet>,
    #[serde(default)]
    pub cidrs: Vec<IpNet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub id: String,
    pub cidr: IpNet,
    pub virtual_network_id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Subnet {
    // Count of addresses covered by the prefix, saturated at i128::MAX for ::/1 and ::/0.
    pub fn total_addresses(&self) -> i128 {
        let host_bits = (self.cidr.max_prefix_len() - self.cidr.prefix_len()) as u32;
        2i128.checked_pow(host_bits).unwrap_or(i128::MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub interfaces: BTreeMap<String, Interface>,
}

impl Instance {
    pub fn new(id: &str) -> Instance {
        Instance {
            id: id.to_string(),
            interfaces: BTreeMap::new(),
        }
    }

    pub fn with_interface(mut self, interface: Interface) -> Instance {
        self.interfaces.insert(interface.id.clone(), interface);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub id: String,
    #[serde(default)]
    pub security_group: String,
    #[serde(default)]
    pub state: ProvisioningState,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub ip: IpAddr,
    pub subnet: String,
    #[serde(default)]
    pub state: ProvisioningState,
}

impl Address {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// Lifecycle state the provider reports for interfaces and addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningState {
    #[default]
    Pending,
    Updating,
    Succeeded,
    Deleting,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ProvisioningState {
    pub fn is_active(&self) -> bool {
        matches!(self, ProvisioningState::Succeeded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolQuota {
    #[serde(rename = "availableIPs")]
    pub available_ips: i128,
}
