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

//! Machine configuration document (`v1alpha1`).
//!
//! The document is a plain value: synthesis always works on a clone, so a
//! caller's base document is never touched by a failing pipeline run.
//! `install` and `network` are always present under `machine`; every other
//! subtree is optional and omitted from the YAML when absent.

use crate::shared::error::{ProvisionError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONFIG_VERSION: &str = "v1alpha1";

fn default_true() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !*v
}

// ============================================================================
// Root document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    pub version: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub debug: bool,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default)]
    pub machine: MachineSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterSection>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            debug: false,
            persist: true,
            machine: MachineSection::default(),
            cluster: None,
        }
    }
}

impl MachineConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let doc: Self = serde_yaml::from_str(content)?;
        if doc.version != CONFIG_VERSION {
            return Err(ProvisionError::config_error(format!(
                "unsupported machine config version '{}', expected '{}'",
                doc.version, CONFIG_VERSION
            )));
        }
        Ok(doc)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn is_control_plane(&self) -> bool {
        self.machine.machine_type.is_control_plane()
    }

    /// Mutable access to the cluster section, required by cluster-scoped facets.
    pub fn cluster_mut(&mut self, facet: &str) -> Result<&mut ClusterSection> {
        self.cluster.as_mut().ok_or_else(|| {
            ProvisionError::validation(format!(
                "facet '{}' targets the cluster section, which this document does not have",
                facet
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    Init,
    #[serde(rename = "controlplane")]
    ControlPlane,
    #[default]
    Worker,
}

impl MachineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineType::Init => "init",
            MachineType::ControlPlane => "controlplane",
            MachineType::Worker => "worker",
        }
    }

    pub fn is_control_plane(&self) -> bool {
        matches!(self, MachineType::Init | MachineType::ControlPlane)
    }
}

impl std::fmt::Display for MachineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MachineType {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "init" => Ok(MachineType::Init),
            "controlplane" | "control-plane" => Ok(MachineType::ControlPlane),
            "worker" => Ok(MachineType::Worker),
            _ => Err(ProvisionError::validation(format!(
                "Invalid machine type: {}",
                s
            ))),
        }
    }
}

/// Certificate and key, each holding base64-encoded PEM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PemEncodedCertificateAndKey {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crt: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
}

impl PemEncodedCertificateAndKey {
    pub fn from_pem(crt_pem: &str, key_pem: &str) -> Self {
        Self {
            crt: encode_pem(crt_pem),
            key: encode_pem(key_pem),
        }
    }

    /// Certificate only; worker nodes never receive root keys.
    pub fn certificate_only(crt_pem: &str) -> Self {
        Self {
            crt: encode_pem(crt_pem),
            key: String::new(),
        }
    }

    pub fn crt_pem(&self) -> Result<String> {
        decode_pem(&self.crt)
    }
}

fn encode_pem(pem: &str) -> String {
    if pem.is_empty() {
        String::new()
    } else {
        STANDARD.encode(pem.as_bytes())
    }
}

fn decode_pem(encoded: &str) -> Result<String> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| ProvisionError::config_error(format!("invalid base64 PEM: {}", e)))?;
    String::from_utf8(raw)
        .map_err(|e| ProvisionError::config_error(format!("PEM is not UTF-8: {}", e)))
}

// ============================================================================
// Machine section
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineSection {
    #[serde(rename = "type")]
    pub machine_type: MachineType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<PemEncodedCertificateAndKey>,
    #[serde(rename = "certSANs", skip_serializing_if = "Vec::is_empty")]
    pub cert_sans: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletConfig>,
    pub network: NetworkConfig,
    pub install: InstallConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_disk_encryption: Option<SystemDiskEncryptionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub disk: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootloader: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wipe: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_kernel_args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KubeletConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_mounts: Vec<ExtraMount>,
    #[serde(rename = "clusterDNS", skip_serializing_if = "Vec::is_empty")]
    pub cluster_dns: Vec<String>,
    #[serde(rename = "nodeIP", skip_serializing_if = "Option::is_none")]
    pub node_ip: Option<KubeletNodeIp>,
    #[serde(rename = "registerWithFQDN", skip_serializing_if = "Option::is_none")]
    pub register_with_fqdn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_runtime_seccomp_profile_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KubeletNodeIp {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valid_subnets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraMount {
    pub destination: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub mount_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Device>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_host_entries: Vec<ExtraHost>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraHost {
    pub ip: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Device {
    pub interface: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<Bond>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vlans: Vec<Vlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bond {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(rename = "arpIPTarget", skip_serializing_if = "Vec::is_empty")]
    pub arp_ip_target: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub xmit_hash_policy: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lacp_rate: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub primary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miimon: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updelay: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downdelay: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_carrier: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_actor_sys_prio: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_user_port_key: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_per_slave: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_peer_notif: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tlb_dynamic_lb: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_slaves_active: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_links: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resend_igmp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_notify_delay: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vlan {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<bool>,
    pub vlan_id: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

// ---------------------------------------------------------------------------
// System disk encryption
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemDiskEncryptionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<EncryptionPartitionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<EncryptionPartitionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncryptionPartitionConfig {
    pub provider: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<EncryptionKey>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cipher: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionKey {
    #[serde(rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_key: Option<EncryptionKeyStatic>,
    #[serde(rename = "nodeID", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<EncryptionKeyNodeId>,
    pub slot: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionKeyStatic {
    pub passphrase: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKeyNodeId {}

// ============================================================================
// Cluster section
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterSection {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret: String,
    pub control_plane: ControlPlaneConfig,
    pub cluster_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<ClusterNetworkConfig>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aescbc_encryption_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secretbox_encryption_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<PemEncodedCertificateAndKey>,
    #[serde(rename = "aggregatorCA", skip_serializing_if = "Option::is_none")]
    pub aggregator_ca: Option<PemEncodedCertificateAndKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server: Option<ApiServerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_manager: Option<ComponentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<ComponentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd: Option<EtcdConfig>,
    #[serde(rename = "coreDNS", skip_serializing_if = "Option::is_none")]
    pub core_dns: Option<CoreDnsConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_manifests: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inline_manifests: Vec<InlineManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_scheduling_on_control_planes: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_api_server_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterNetworkConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dns_domain: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pod_subnets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_subnets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cni: Option<CniConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CniConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAccountKey {
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiServerConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_volumes: Vec<VolumeMount>,
    #[serde(rename = "certSANs", skip_serializing_if = "Vec::is_empty")]
    pub cert_sans: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_pod_security_policy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VolumeMount {
    pub host_path: String,
    pub mount_path: String,
    #[serde(skip_serializing_if = "is_false")]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComponentConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registries: Option<DiscoveryRegistries>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryRegistries {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesRegistry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRegistry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesRegistry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRegistry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtcdConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<PemEncodedCertificateAndKey>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_args: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advertised_subnets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreDnsConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineManifest {
    pub name: String,
    pub contents: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_serializes_minimal_yaml() {
        let yaml = MachineConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("version: v1alpha1"));
        assert!(yaml.contains("type: worker"));
        assert!(!yaml.contains("cluster:"));
        assert!(!yaml.contains("kubelet"));
    }

    #[test]
    fn test_yaml_keys_follow_machine_config_naming() {
        let mut doc = MachineConfig::default();
        doc.machine.cert_sans = vec!["10.0.0.10".to_string()];
        doc.machine.network.interfaces.push(Device {
            interface: "bond0".to_string(),
            bond: Some(Bond {
                interfaces: vec!["eth0".to_string(), "eth1".to_string()],
                arp_ip_target: vec!["10.0.0.1".to_string()],
                ad_actor_sys_prio: Some(65535),
                ..Default::default()
            }),
            vlans: vec![Vlan {
                vlan_id: 42,
                ..Default::default()
            }],
            ..Default::default()
        });
        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("certSANs:"));
        assert!(yaml.contains("arpIPTarget:"));
        assert!(yaml.contains("adActorSysPrio: 65535"));
        assert!(yaml.contains("vlanId: 42"));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_version() {
        let err = MachineConfig::from_yaml("version: v2\nmachine:\n  type: worker\n").unwrap_err();
        assert!(err.to_string().contains("unsupported machine config version"));
    }

    #[test]
    fn test_document_yaml_roundtrip_preserves_value() {
        let mut doc = MachineConfig::default();
        doc.machine.machine_type = MachineType::ControlPlane;
        doc.machine.install.disk = "/dev/sda".to_string();
        doc.cluster = Some(ClusterSection {
            cluster_name: "demo".to_string(),
            control_plane: ControlPlaneConfig {
                endpoint: "https://10.0.0.10:6443".to_string(),
                local_api_server_port: None,
            },
            core_dns: Some(CoreDnsConfig {
                image: String::new(),
                disabled: Some(true),
            }),
            ..Default::default()
        });
        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("coreDNS:"));
        assert_eq!(MachineConfig::from_yaml(&yaml).unwrap(), doc);
    }

    #[test]
    fn test_cluster_mut_requires_cluster_section() {
        let mut doc = MachineConfig::default();
        let err = doc.cluster_mut("etcd").unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[test]
    fn test_pem_roundtrip_through_base64() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let encoded = PemEncodedCertificateAndKey::certificate_only(pem);
        assert!(encoded.key.is_empty());
        assert_eq!(encoded.crt_pem().unwrap(), pem);
    }
}
