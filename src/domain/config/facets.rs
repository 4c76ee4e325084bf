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

//! Declared facet values, as supplied by the schema layer.
//!
//! Presence of a whole facet is tracked by `Option<Facet>` in [`MachineFacets`].
//! Inside a facet, knobs whose explicit `false` must still be written are
//! `Option<bool>`. Numbers arrive as `i64` and are range-checked when
//! contributed; `0` means "not set".

use super::network::NetworkFacet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Machine-scoped facets
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallFacet {
    pub disk: String,
    pub image: String,
    pub bootloader: Option<bool>,
    pub wipe: Option<bool>,
    pub extra_kernel_args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeletFacet {
    pub image: String,
    pub extra_args: BTreeMap<String, String>,
    pub extra_mounts: Vec<KubeletMount>,
    pub cluster_dns: Vec<String>,
    pub node_ip_valid_subnets: Vec<String>,
    pub register_with_fqdn: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeletMount {
    pub destination: String,
    pub mount_type: String,
    pub source: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertSansFacet {
    pub machine: Vec<String>,
    pub api_server: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionFacet {
    pub state: Option<EncryptionPartitionFacet>,
    pub ephemeral: Option<EncryptionPartitionFacet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionPartitionFacet {
    pub provider: String,
    pub cipher: String,
    pub key_size: i64,
    pub block_size: i64,
    pub options: Vec<String>,
    pub keys: Vec<EncryptionKeyFacet>,
}

/// One key slot. Exactly one of `passphrase` or `node_id` is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionKeyFacet {
    pub slot: i64,
    pub passphrase: Option<String>,
    /// Derive the key from the node identity.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub node_id: bool,
}

// ============================================================================
// Cluster-scoped facets
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterNetworkFacet {
    pub dns_domain: String,
    pub pod_subnets: Vec<String>,
    pub service_subnets: Vec<String>,
    pub cni_name: String,
    pub cni_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiServerFacet {
    pub image: String,
    pub extra_args: BTreeMap<String, String>,
    pub extra_volumes: Vec<HostVolume>,
    pub disable_pod_security_policy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostVolume {
    pub host_path: String,
    pub mount_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerManagerFacet {
    pub image: String,
    pub extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerFacet {
    pub image: String,
    pub extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyFacet {
    pub image: String,
    pub mode: String,
    pub disabled: Option<bool>,
    pub extra_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtcdFacet {
    pub image: String,
    pub extra_args: BTreeMap<String, String>,
    pub advertised_subnets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreDnsFacet {
    pub image: String,
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryFacet {
    pub enabled: Option<bool>,
    pub kubernetes_registry_disabled: Option<bool>,
    pub service_registry_disabled: Option<bool>,
    pub service_endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraManifestsFacet {
    pub urls: Vec<String>,
    pub inline: Vec<InlineManifestFacet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineManifestFacet {
    pub name: String,
    pub contents: String,
}

// ============================================================================
// Declared state
// ============================================================================

/// Every facet of one node, each either declared (`Some`) or absent.
///
/// The same shape is used for what the operator declared and for what the
/// reverse readers extracted from a live document, so the two compare
/// directly for drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineFacets {
    pub install: Option<InstallFacet>,
    pub network: Option<NetworkFacet>,
    pub cert_sans: Option<CertSansFacet>,
    pub kubelet: Option<KubeletFacet>,
    pub encryption: Option<EncryptionFacet>,
    pub cluster_network: Option<ClusterNetworkFacet>,
    pub api_server: Option<ApiServerFacet>,
    pub controller_manager: Option<ControllerManagerFacet>,
    pub scheduler: Option<SchedulerFacet>,
    pub proxy: Option<ProxyFacet>,
    pub etcd: Option<EtcdFacet>,
    pub coredns: Option<CoreDnsFacet>,
    pub discovery: Option<DiscoveryFacet>,
    pub extra_manifests: Option<ExtraManifestsFacet>,
}

impl MachineFacets {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
