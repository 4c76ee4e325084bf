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

//! Machine network: hostname, resolvers, static hosts and devices.
//!
//! A device's bond and VLAN overrides travel with the device, so the whole
//! `machine.network` subtree is written by this one contributor.

use super::convert::{checked, optional, widen};
use super::{collapse, FacetValue};
use crate::domain::config::document::{
    Bond, Device, ExtraHost, MachineConfig, NetworkConfig, Route, Vlan,
};
use crate::domain::config::network::{
    BondFacet, HostEntryFacet, NetworkDeviceFacet, NetworkFacet, RouteFacet, VlanFacet,
};
use crate::shared::error::Result;

pub(super) fn contribute(facet: &NetworkFacet, doc: &mut MachineConfig) -> Result<()> {
    let interfaces = facet
        .devices
        .iter()
        .map(to_device)
        .collect::<Result<Vec<_>>>()?;

    doc.machine.network = NetworkConfig {
        hostname: facet.hostname.clone(),
        interfaces,
        nameservers: facet.nameservers.clone(),
        extra_host_entries: facet
            .extra_host_entries
            .iter()
            .map(|h| ExtraHost {
                ip: h.ip.clone(),
                aliases: h.aliases.clone(),
            })
            .collect(),
    };
    Ok(())
}

fn to_device(dev: &NetworkDeviceFacet) -> Result<Device> {
    let prefix = format!("network.devices[{}]", dev.interface);
    Ok(Device {
        interface: dev.interface.clone(),
        addresses: dev.addresses.clone(),
        routes: to_routes(&prefix, &dev.routes)?,
        bond: dev
            .bond
            .as_ref()
            .map(|b| to_bond(&format!("{}.bond", prefix), b))
            .transpose()?,
        vlans: dev
            .vlans
            .iter()
            .map(|v| to_vlan(&prefix, v))
            .collect::<Result<Vec<_>>>()?,
        mtu: optional(&format!("{}.mtu", prefix), dev.mtu)?,
        dhcp: dev.dhcp,
        ignore: dev.ignore,
    })
}

fn to_routes(prefix: &str, routes: &[RouteFacet]) -> Result<Vec<Route>> {
    routes
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Ok(Route {
                network: r.network.clone(),
                gateway: r.gateway.clone(),
                metric: optional(&format!("{}.routes[{}].metric", prefix, i), r.metric)?,
            })
        })
        .collect()
}

fn to_vlan(prefix: &str, vlan: &VlanFacet) -> Result<Vlan> {
    let prefix = format!("{}.vlans[{}]", prefix, vlan.vlan_id);
    Ok(Vlan {
        addresses: vlan.addresses.clone(),
        routes: to_routes(&prefix, &vlan.routes)?,
        dhcp: vlan.dhcp,
        vlan_id: checked(&format!("{}.vlan_id", prefix), vlan.vlan_id)?,
        mtu: optional(&format!("{}.mtu", prefix), vlan.mtu)?,
    })
}

fn to_bond(prefix: &str, bond: &BondFacet) -> Result<Bond> {
    let field = |name: &str| format!("{}.{}", prefix, name);
    Ok(Bond {
        interfaces: bond.interfaces.clone(),
        arp_ip_target: bond.arp_ip_targets.clone(),
        mode: bond.mode.clone(),
        xmit_hash_policy: bond.xmit_hash_policy.clone(),
        lacp_rate: bond.lacp_rate.clone(),
        primary: bond.primary.clone(),
        miimon: optional(&field("miimon"), bond.miimon)?,
        updelay: optional(&field("updelay"), bond.updelay)?,
        downdelay: optional(&field("downdelay"), bond.downdelay)?,
        use_carrier: bond.use_carrier,
        arp_interval: optional(&field("arp_interval"), bond.arp_interval)?,
        ad_actor_sys_prio: optional(&field("ad_actor_sys_prio"), bond.ad_actor_sys_prio)?,
        ad_user_port_key: optional(&field("ad_user_port_key"), bond.ad_user_port_key)?,
        packets_per_slave: optional(&field("packets_per_slave"), bond.packets_per_slave)?,
        num_peer_notif: optional(&field("num_peer_notif"), bond.num_peer_notif)?,
        tlb_dynamic_lb: optional(&field("tlb_dynamic_lb"), bond.tlb_dynamic_lb)?,
        all_slaves_active: optional(&field("all_slaves_active"), bond.all_slaves_active)?,
        min_links: optional(&field("min_links"), bond.min_links)?,
        resend_igmp: optional(&field("resend_igmp"), bond.resend_igmp)?,
        peer_notify_delay: optional(&field("peer_notify_delay"), bond.peer_notify_delay)?,
    })
}

impl FacetValue for NetworkFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let net = &doc.machine.network;
        collapse(NetworkFacet {
            hostname: net.hostname.clone(),
            nameservers: net.nameservers.clone(),
            extra_host_entries: net
                .extra_host_entries
                .iter()
                .map(|h| HostEntryFacet {
                    ip: h.ip.clone(),
                    aliases: h.aliases.clone(),
                })
                .collect(),
            devices: net.interfaces.iter().map(from_device).collect(),
        })
    }
}

fn from_device(dev: &Device) -> NetworkDeviceFacet {
    NetworkDeviceFacet {
        interface: dev.interface.clone(),
        addresses: dev.addresses.clone(),
        dhcp: dev.dhcp,
        mtu: widen(dev.mtu),
        ignore: dev.ignore,
        routes: from_routes(&dev.routes),
        bond: dev.bond.as_ref().and_then(from_bond),
        vlans: dev
            .vlans
            .iter()
            .map(|v| VlanFacet {
                vlan_id: i64::from(v.vlan_id),
                addresses: v.addresses.clone(),
                dhcp: v.dhcp,
                mtu: widen(v.mtu),
                routes: from_routes(&v.routes),
            })
            .collect(),
    }
}

fn from_routes(routes: &[Route]) -> Vec<RouteFacet> {
    routes
        .iter()
        .map(|r| RouteFacet {
            network: r.network.clone(),
            gateway: r.gateway.clone(),
            metric: widen(r.metric),
        })
        .collect()
}

/// An all-default bond reads back as no bond.
fn from_bond(bond: &Bond) -> Option<BondFacet> {
    collapse(BondFacet {
        interfaces: bond.interfaces.clone(),
        arp_ip_targets: bond.arp_ip_target.clone(),
        mode: bond.mode.clone(),
        xmit_hash_policy: bond.xmit_hash_policy.clone(),
        lacp_rate: bond.lacp_rate.clone(),
        primary: bond.primary.clone(),
        use_carrier: bond.use_carrier,
        miimon: widen(bond.miimon),
        updelay: widen(bond.updelay),
        downdelay: widen(bond.downdelay),
        arp_interval: widen(bond.arp_interval),
        ad_actor_sys_prio: widen(bond.ad_actor_sys_prio),
        ad_user_port_key: widen(bond.ad_user_port_key),
        packets_per_slave: widen(bond.packets_per_slave),
        num_peer_notif: widen(bond.num_peer_notif),
        tlb_dynamic_lb: widen(bond.tlb_dynamic_lb),
        all_slaves_active: widen(bond.all_slaves_active),
        min_links: widen(bond.min_links),
        resend_igmp: widen(bond.resend_igmp),
        peer_notify_delay: widen(bond.peer_notify_delay),
    })
}
