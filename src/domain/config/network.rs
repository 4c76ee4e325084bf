// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkFacet {
    pub hostname: String,
    pub nameservers: Vec<String>,
    pub extra_host_entries: Vec<HostEntryFacet>,
    pub devices: Vec<NetworkDeviceFacet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostEntryFacet {
    pub ip: String,
    pub aliases: Vec<String>,
}

/// A network device with its bond and VLAN overrides.
///
/// Devices are keyed by `interface`; VLANs by `vlan_id` within their device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDeviceFacet {
    pub interface: String,
    pub addresses: Vec<String>,
    pub dhcp: Option<bool>,
    pub mtu: i64,
    pub ignore: Option<bool>,
    pub routes: Vec<RouteFacet>,
    pub bond: Option<BondFacet>,
    pub vlans: Vec<VlanFacet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFacet {
    pub network: String,
    pub gateway: String,
    pub metric: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BondFacet {
    pub interfaces: Vec<String>,
    pub arp_ip_targets: Vec<String>,
    pub mode: String,
    pub xmit_hash_policy: String,
    pub lacp_rate: String,
    pub primary: String,
    pub use_carrier: Option<bool>,
    pub miimon: i64,
    pub updelay: i64,
    pub downdelay: i64,
    pub arp_interval: i64,
    pub ad_actor_sys_prio: i64,
    pub ad_user_port_key: i64,
    pub packets_per_slave: i64,
    pub num_peer_notif: i64,
    pub tlb_dynamic_lb: i64,
    pub all_slaves_active: i64,
    pub min_links: i64,
    pub resend_igmp: i64,
    pub peer_notify_delay: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlanFacet {
    pub vlan_id: i64,
    pub addresses: Vec<String>,
    pub dhcp: Option<bool>,
    pub mtu: i64,
    pub routes: Vec<RouteFacet>,
}
