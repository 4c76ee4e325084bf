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

//! Declared-value validation, run before any contributor touches a document.

use crate::domain::config::facets::*;
use crate::domain::config::network::{NetworkDeviceFacet, NetworkFacet, RouteFacet};
use crate::domain::secrets::VersionContract;
use crate::shared::error::{ProvisionError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;

const PROXY_MODES: &[&str] = &["iptables", "ipvs", "nftables"];
const CNI_NAMES: &[&str] = &["flannel", "custom", "none"];

// registry[:port]/path[:tag][@digest]
const IMAGE_PATTERN: &str = r"^[a-zA-Z0-9]+(?:[._-][a-zA-Z0-9]+)*(?::[0-9]+)?(?:/[a-z0-9]+(?:[._-]+[a-z0-9]+)*)*(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?(?:@sha256:[a-f0-9]{64})?$";

/// Validate every declared facet.
pub fn validate(facets: &MachineFacets, contract: VersionContract) -> Result<()> {
    if let Some(install) = &facets.install {
        validate_install(install)?;
    }
    if let Some(network) = &facets.network {
        validate_network(network)?;
    }
    if let Some(sans) = &facets.cert_sans {
        for san in sans.machine.iter().chain(sans.api_server.iter()) {
            if san.trim().is_empty() {
                return Err(ProvisionError::validation("certificate SANs cannot be empty"));
            }
        }
    }
    if let Some(kubelet) = &facets.kubelet {
        validate_image("kubelet.image", &kubelet.image)?;
        for ip in &kubelet.cluster_dns {
            validate_ip("kubelet.cluster_dns", ip)?;
        }
        for subnet in &kubelet.node_ip_valid_subnets {
            validate_cidr("kubelet.node_ip_valid_subnets", subnet.trim_start_matches('!'))?;
        }
        for mount in &kubelet.extra_mounts {
            if !mount.destination.starts_with('/') {
                return Err(ProvisionError::validation(format!(
                    "kubelet mount destination must be absolute: '{}'",
                    mount.destination
                )));
            }
        }
    }
    if let Some(encryption) = &facets.encryption {
        validate_encryption(encryption)?;
    }
    if let Some(net) = &facets.cluster_network {
        for subnet in net.pod_subnets.iter().chain(net.service_subnets.iter()) {
            validate_cidr("cluster_network", subnet)?;
        }
        if !net.cni_name.is_empty() && !CNI_NAMES.contains(&net.cni_name.as_str()) {
            return Err(ProvisionError::validation(format!(
                "unknown CNI '{}', expected one of {:?}",
                net.cni_name, CNI_NAMES
            )));
        }
        if !net.cni_urls.is_empty() && net.cni_name != "custom" {
            return Err(ProvisionError::validation(
                "CNI URLs are only allowed with the custom CNI",
            ));
        }
    }
    if let Some(api) = &facets.api_server {
        validate_image("api_server.image", &api.image)?;
        for volume in &api.extra_volumes {
            if !volume.host_path.starts_with('/') || !volume.mount_path.starts_with('/') {
                return Err(ProvisionError::validation(format!(
                    "api server volume paths must be absolute: '{}' -> '{}'",
                    volume.host_path, volume.mount_path
                )));
            }
        }
    }
    if let Some(cm) = &facets.controller_manager {
        validate_image("controller_manager.image", &cm.image)?;
    }
    if let Some(sched) = &facets.scheduler {
        validate_image("scheduler.image", &sched.image)?;
    }
    if let Some(proxy) = &facets.proxy {
        validate_image("proxy.image", &proxy.image)?;
        if !proxy.mode.is_empty() && !PROXY_MODES.contains(&proxy.mode.as_str()) {
            return Err(ProvisionError::validation(format!(
                "invalid proxy mode '{}', expected one of {:?}",
                proxy.mode, PROXY_MODES
            )));
        }
    }
    if let Some(etcd) = &facets.etcd {
        validate_image("etcd.image", &etcd.image)?;
        for subnet in &etcd.advertised_subnets {
            validate_cidr("etcd.advertised_subnets", subnet.trim_start_matches('!'))?;
        }
    }
    if let Some(dns) = &facets.coredns {
        validate_image("coredns.image", &dns.image)?;
    }
    if let Some(discovery) = &facets.discovery {
        if !contract.cluster_discovery_supported() {
            return Err(ProvisionError::validation(format!(
                "cluster discovery requires contract v0.13 or newer, got {}",
                contract
            )));
        }
        if !discovery.service_endpoint.is_empty() {
            validate_url("discovery.service_endpoint", &discovery.service_endpoint)?;
        }
    }
    if let Some(manifests) = &facets.extra_manifests {
        for url in &manifests.urls {
            validate_url("extra_manifests.urls", url)?;
        }
        let mut names = HashSet::new();
        for inline in &manifests.inline {
            if inline.name.trim().is_empty() {
                return Err(ProvisionError::validation("inline manifest name cannot be empty"));
            }
            if !names.insert(inline.name.as_str()) {
                return Err(ProvisionError::validation(format!(
                    "duplicate inline manifest '{}'",
                    inline.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_install(install: &InstallFacet) -> Result<()> {
    if !install.disk.is_empty() && !install.disk.starts_with("/dev/") {
        return Err(ProvisionError::validation(format!(
            "install disk must be a /dev path, got '{}'",
            install.disk
        )));
    }
    validate_image("install.image", &install.image)
}

fn validate_network(network: &NetworkFacet) -> Result<()> {
    for ns in &network.nameservers {
        validate_ip("network.nameservers", ns)?;
    }
    for host in &network.extra_host_entries {
        validate_ip("network.extra_host_entries", &host.ip)?;
    }

    let mut interfaces = HashSet::new();
    for dev in &network.devices {
        if dev.interface.trim().is_empty() {
            return Err(ProvisionError::validation("network device interface cannot be empty"));
        }
        if !interfaces.insert(dev.interface.as_str()) {
            return Err(ProvisionError::validation(format!(
                "duplicate network device '{}'",
                dev.interface
            )));
        }
        validate_device(dev)?;
    }
    Ok(())
}

fn validate_device(dev: &NetworkDeviceFacet) -> Result<()> {
    let field = format!("network.devices[{}]", dev.interface);
    for addr in &dev.addresses {
        validate_cidr(&field, addr)?;
    }
    validate_routes(&field, &dev.routes)?;

    if let Some(bond) = &dev.bond {
        if bond.interfaces.iter().any(|m| m == &dev.interface) {
            return Err(ProvisionError::validation(format!(
                "bond '{}' cannot list itself as a member",
                dev.interface
            )));
        }
        for target in &bond.arp_ip_targets {
            validate_ip(&format!("{}.bond.arp_ip_targets", field), target)?;
        }
    }

    let mut vlan_ids = HashSet::new();
    for vlan in &dev.vlans {
        if !(1..=4094).contains(&vlan.vlan_id) {
            return Err(ProvisionError::validation(format!(
                "{}: VLAN id {} outside 1-4094",
                field, vlan.vlan_id
            )));
        }
        if !vlan_ids.insert(vlan.vlan_id) {
            return Err(ProvisionError::validation(format!(
                "{}: duplicate VLAN id {}",
                field, vlan.vlan_id
            )));
        }
        for addr in &vlan.addresses {
            validate_cidr(&field, addr)?;
        }
        validate_routes(&field, &vlan.routes)?;
    }
    Ok(())
}

fn validate_routes(field: &str, routes: &[RouteFacet]) -> Result<()> {
    for route in routes {
        validate_cidr(field, &route.network)?;
        if !route.gateway.is_empty() {
            validate_ip(field, &route.gateway)?;
        }
    }
    Ok(())
}

fn validate_encryption(encryption: &EncryptionFacet) -> Result<()> {
    for (name, partition) in [
        ("state", encryption.state.as_ref()),
        ("ephemeral", encryption.ephemeral.as_ref()),
    ] {
        let Some(partition) = partition else { continue };
        if partition.provider != "luks2" {
            return Err(ProvisionError::validation(format!(
                "encryption.{}: provider must be 'luks2', got '{}'",
                name, partition.provider
            )));
        }
        if partition.keys.is_empty() {
            return Err(ProvisionError::validation(format!(
                "encryption.{}: at least one key is required",
                name
            )));
        }
        let mut slots = HashSet::new();
        for key in &partition.keys {
            let has_static = key.passphrase.is_some();
            if has_static == key.node_id {
                return Err(ProvisionError::validation(format!(
                    "encryption.{}: slot {} needs exactly one of a passphrase or nodeID",
                    name, key.slot
                )));
            }
            if !slots.insert(key.slot) {
                return Err(ProvisionError::validation(format!(
                    "encryption.{}: duplicate key slot {}",
                    name, key.slot
                )));
            }
        }
    }
    Ok(())
}

fn validate_image(field: &str, image: &str) -> Result<()> {
    let re = Regex::new(IMAGE_PATTERN)
        .map_err(|e| ProvisionError::validation(format!("image pattern: {}", e)))?;
    if image.is_empty() || re.is_match(image) {
        Ok(())
    } else {
        Err(ProvisionError::validation(format!(
            "{}: '{}' is not a valid image reference",
            field, image
        )))
    }
}

fn validate_ip(field: &str, value: &str) -> Result<()> {
    value.parse::<IpAddr>().map(|_| ()).map_err(|_| {
        ProvisionError::validation(format!("{}: '{}' is not a valid IP address", field, value))
    })
}

fn validate_cidr(field: &str, value: &str) -> Result<()> {
    let invalid = || {
        ProvisionError::validation(format!("{}: '{}' is not a valid CIDR", field, value))
    };
    let (addr, prefix) = value.split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(invalid());
    }
    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ProvisionError::validation(format!(
            "{}: '{}' must be an http(s) URL",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::network::{BondFacet, VlanFacet};

    fn install_only() -> MachineFacets {
        MachineFacets {
            install: Some(InstallFacet {
                disk: "/dev/sda".to_string(),
                image: "repo/os:v1".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn expect_invalid(facets: &MachineFacets) {
        assert!(matches!(
            validate(facets, VersionContract::V1_5),
            Err(ProvisionError::Validation(_))
        ));
    }

    #[test]
    fn test_install_only_is_valid() {
        validate(&install_only(), VersionContract::V1_5).unwrap();
    }

    #[test]
    fn test_image_references() {
        for ok in [
            "repo/os:v1",
            "ghcr.io/siderolabs/installer:v1.5.0",
            "registry.k8s.io/kube-apiserver:v1.28.0",
            "localhost:5000/talos/installer:latest",
            "busybox",
        ] {
            validate_image("image", ok).unwrap();
        }
        for bad in ["Repo With Spaces", "repo/os:", "ghcr.io//double"] {
            assert!(validate_image("image", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_install_disk_must_be_device_path() {
        let mut facets = install_only();
        facets.install.as_mut().unwrap().disk = "sda".to_string();
        expect_invalid(&facets);
    }

    #[test]
    fn test_duplicate_interfaces_rejected() {
        let dev = NetworkDeviceFacet {
            interface: "eth0".to_string(),
            ..Default::default()
        };
        let facets = MachineFacets {
            network: Some(NetworkFacet {
                devices: vec![dev.clone(), dev],
                ..Default::default()
            }),
            ..Default::default()
        };
        expect_invalid(&facets);
    }

    #[test]
    fn test_bond_cannot_contain_itself() {
        let facets = MachineFacets {
            network: Some(NetworkFacet {
                devices: vec![NetworkDeviceFacet {
                    interface: "bond0".to_string(),
                    bond: Some(BondFacet {
                        interfaces: vec!["bond0".to_string(), "eth0".to_string()],
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        expect_invalid(&facets);
    }

    #[test]
    fn test_duplicate_vlan_ids_rejected() {
        let vlan = VlanFacet {
            vlan_id: 10,
            ..Default::default()
        };
        let facets = MachineFacets {
            network: Some(NetworkFacet {
                devices: vec![NetworkDeviceFacet {
                    interface: "eth0".to_string(),
                    vlans: vec![vlan.clone(), vlan],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        expect_invalid(&facets);
    }

    #[test]
    fn test_cidr_and_ip_parsing() {
        validate_cidr("f", "10.0.0.0/8").unwrap();
        validate_cidr("f", "fd00::/64").unwrap();
        assert!(validate_cidr("f", "10.0.0.0/33").is_err());
        assert!(validate_cidr("f", "10.0.0.0").is_err());
        assert!(validate_ip("f", "10.0.0.256").is_err());
    }

    #[test]
    fn test_proxy_mode() {
        let mut facets = MachineFacets {
            proxy: Some(ProxyFacet {
                mode: "ipvs".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        validate(&facets, VersionContract::V1_5).unwrap();
        facets.proxy.as_mut().unwrap().mode = "userspace".to_string();
        expect_invalid(&facets);
    }

    #[test]
    fn test_discovery_gated_by_contract() {
        let facets = MachineFacets {
            discovery: Some(DiscoveryFacet {
                enabled: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        validate(&facets, VersionContract::V1_5).unwrap();
        assert!(validate(&facets, VersionContract::new(0, 12)).is_err());
    }

    #[test]
    fn test_encryption_key_needs_exactly_one_source() {
        let partition = |key: EncryptionKeyFacet| EncryptionPartitionFacet {
            provider: "luks2".to_string(),
            keys: vec![key],
            ..Default::default()
        };
        let both = MachineFacets {
            encryption: Some(EncryptionFacet {
                state: Some(partition(EncryptionKeyFacet {
                    slot: 0,
                    passphrase: Some("x".to_string()),
                    node_id: true,
                })),
                ephemeral: None,
            }),
            ..Default::default()
        };
        expect_invalid(&both);

        let node_id = MachineFacets {
            encryption: Some(EncryptionFacet {
                state: Some(partition(EncryptionKeyFacet {
                    slot: 0,
                    passphrase: None,
                    node_id: true,
                })),
                ephemeral: None,
            }),
            ..Default::default()
        };
        validate(&node_id, VersionContract::V1_5).unwrap();

        let neither = MachineFacets {
            encryption: Some(EncryptionFacet {
                state: Some(partition(EncryptionKeyFacet {
                    slot: 0,
                    ..Default::default()
                })),
                ephemeral: None,
            }),
            ..Default::default()
        };
        expect_invalid(&neither);
    }

    #[test]
    fn test_custom_cni_urls() {
        let facets = MachineFacets {
            cluster_network: Some(ClusterNetworkFacet {
                cni_name: "flannel".to_string(),
                cni_urls: vec!["https://example.com/cni.yaml".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };
        expect_invalid(&facets);
    }
}
