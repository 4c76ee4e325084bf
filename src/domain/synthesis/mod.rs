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

//! Config synthesis and read-back.
//!
//! Each facet owns a disjoint set of document fields. Its contributor
//! replaces exactly those fields and its reader extracts exactly those
//! fields, so contributors commute and reading a synthesized document
//! returns what was declared.

mod cluster;
mod control_plane;
pub mod convert;
mod encryption;
mod install;
mod kubelet;
mod network;
mod pipeline;
pub mod validate;

pub use self::pipeline::{read_back, Synthesizer};

use crate::domain::config::document::{ClusterSection, MachineConfig};
use crate::domain::config::facets::*;
use crate::domain::config::network::NetworkFacet;
use crate::shared::error::Result;
use serde::{Deserialize, Serialize};

/// Facet categories in canonical contribution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    Install,
    Network,
    CertSans,
    Kubelet,
    Encryption,
    ClusterNetwork,
    ApiServer,
    ControllerManager,
    Scheduler,
    Proxy,
    Etcd,
    CoreDns,
    Discovery,
    ExtraManifests,
}

impl FacetKind {
    pub const ALL: [FacetKind; 14] = [
        FacetKind::Install,
        FacetKind::Network,
        FacetKind::CertSans,
        FacetKind::Kubelet,
        FacetKind::Encryption,
        FacetKind::ClusterNetwork,
        FacetKind::ApiServer,
        FacetKind::ControllerManager,
        FacetKind::Scheduler,
        FacetKind::Proxy,
        FacetKind::Etcd,
        FacetKind::CoreDns,
        FacetKind::Discovery,
        FacetKind::ExtraManifests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::Install => "install",
            FacetKind::Network => "network",
            FacetKind::CertSans => "cert_sans",
            FacetKind::Kubelet => "kubelet",
            FacetKind::Encryption => "encryption",
            FacetKind::ClusterNetwork => "cluster_network",
            FacetKind::ApiServer => "api_server",
            FacetKind::ControllerManager => "controller_manager",
            FacetKind::Scheduler => "scheduler",
            FacetKind::Proxy => "proxy",
            FacetKind::Etcd => "etcd",
            FacetKind::CoreDns => "coredns",
            FacetKind::Discovery => "discovery",
            FacetKind::ExtraManifests => "extra_manifests",
        }
    }

    /// Whether the facet writes under `cluster` and so needs a cluster section.
    pub fn is_cluster_scoped(&self) -> bool {
        !matches!(
            self,
            FacetKind::Install
                | FacetKind::Network
                | FacetKind::CertSans
                | FacetKind::Kubelet
                | FacetKind::Encryption
        )
    }
}

impl std::fmt::Display for FacetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared facet, ready to be contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet {
    Install(InstallFacet),
    Network(NetworkFacet),
    CertSans(CertSansFacet),
    Kubelet(KubeletFacet),
    Encryption(EncryptionFacet),
    ClusterNetwork(ClusterNetworkFacet),
    ApiServer(ApiServerFacet),
    ControllerManager(ControllerManagerFacet),
    Scheduler(SchedulerFacet),
    Proxy(ProxyFacet),
    Etcd(EtcdFacet),
    CoreDns(CoreDnsFacet),
    Discovery(DiscoveryFacet),
    ExtraManifests(ExtraManifestsFacet),
}

impl Facet {
    pub fn kind(&self) -> FacetKind {
        match self {
            Facet::Install(_) => FacetKind::Install,
            Facet::Network(_) => FacetKind::Network,
            Facet::CertSans(_) => FacetKind::CertSans,
            Facet::Kubelet(_) => FacetKind::Kubelet,
            Facet::Encryption(_) => FacetKind::Encryption,
            Facet::ClusterNetwork(_) => FacetKind::ClusterNetwork,
            Facet::ApiServer(_) => FacetKind::ApiServer,
            Facet::ControllerManager(_) => FacetKind::ControllerManager,
            Facet::Scheduler(_) => FacetKind::Scheduler,
            Facet::Proxy(_) => FacetKind::Proxy,
            Facet::Etcd(_) => FacetKind::Etcd,
            Facet::CoreDns(_) => FacetKind::CoreDns,
            Facet::Discovery(_) => FacetKind::Discovery,
            Facet::ExtraManifests(_) => FacetKind::ExtraManifests,
        }
    }

    /// Write this facet's fields into `doc`, replacing whatever was there.
    ///
    /// On error `doc` may be partially written; callers contribute into a
    /// clone and drop it on failure.
    pub fn contribute(&self, doc: &mut MachineConfig) -> Result<()> {
        match self {
            Facet::Install(f) => install::contribute(f, doc),
            Facet::Network(f) => network::contribute(f, doc),
            Facet::CertSans(f) => control_plane::contribute_cert_sans(f, doc),
            Facet::Kubelet(f) => kubelet::contribute(f, doc),
            Facet::Encryption(f) => encryption::contribute(f, doc),
            Facet::ClusterNetwork(f) => cluster::contribute_network(f, doc),
            Facet::ApiServer(f) => control_plane::contribute_api_server(f, doc),
            Facet::ControllerManager(f) => control_plane::contribute_controller_manager(f, doc),
            Facet::Scheduler(f) => control_plane::contribute_scheduler(f, doc),
            Facet::Proxy(f) => control_plane::contribute_proxy(f, doc),
            Facet::Etcd(f) => control_plane::contribute_etcd(f, doc),
            Facet::CoreDns(f) => control_plane::contribute_coredns(f, doc),
            Facet::Discovery(f) => cluster::contribute_discovery(f, doc),
            Facet::ExtraManifests(f) => cluster::contribute_extra_manifests(f, doc),
        }
    }
}

/// Reverse reader: extract a facet's declared form from a document.
///
/// Returns `None` when the extracted value equals `Self::default()`, so a
/// facet declared with all defaults and one never declared read back alike.
pub trait FacetValue: Sized + Default + PartialEq {
    fn read_from(doc: &MachineConfig) -> Option<Self>;
}

/// Zero-collapse helper shared by every reader.
pub(crate) fn collapse<T: Default + PartialEq>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

impl MachineFacets {
    /// Declared facets in canonical order.
    pub fn facets(&self) -> Vec<Facet> {
        let mut out = Vec::new();
        if let Some(f) = &self.install {
            out.push(Facet::Install(f.clone()));
        }
        if let Some(f) = &self.network {
            out.push(Facet::Network(f.clone()));
        }
        if let Some(f) = &self.cert_sans {
            out.push(Facet::CertSans(f.clone()));
        }
        if let Some(f) = &self.kubelet {
            out.push(Facet::Kubelet(f.clone()));
        }
        if let Some(f) = &self.encryption {
            out.push(Facet::Encryption(f.clone()));
        }
        if let Some(f) = &self.cluster_network {
            out.push(Facet::ClusterNetwork(f.clone()));
        }
        if let Some(f) = &self.api_server {
            out.push(Facet::ApiServer(f.clone()));
        }
        if let Some(f) = &self.controller_manager {
            out.push(Facet::ControllerManager(f.clone()));
        }
        if let Some(f) = &self.scheduler {
            out.push(Facet::Scheduler(f.clone()));
        }
        if let Some(f) = &self.proxy {
            out.push(Facet::Proxy(f.clone()));
        }
        if let Some(f) = &self.etcd {
            out.push(Facet::Etcd(f.clone()));
        }
        if let Some(f) = &self.coredns {
            out.push(Facet::CoreDns(f.clone()));
        }
        if let Some(f) = &self.discovery {
            out.push(Facet::Discovery(f.clone()));
        }
        if let Some(f) = &self.extra_manifests {
            out.push(Facet::ExtraManifests(f.clone()));
        }
        out
    }

    /// Run every reader against `doc`.
    pub fn read_from(doc: &MachineConfig) -> Self {
        Self {
            install: InstallFacet::read_from(doc),
            network: NetworkFacet::read_from(doc),
            cert_sans: CertSansFacet::read_from(doc),
            kubelet: KubeletFacet::read_from(doc),
            encryption: EncryptionFacet::read_from(doc),
            cluster_network: ClusterNetworkFacet::read_from(doc),
            api_server: ApiServerFacet::read_from(doc),
            controller_manager: ControllerManagerFacet::read_from(doc),
            scheduler: SchedulerFacet::read_from(doc),
            proxy: ProxyFacet::read_from(doc),
            etcd: EtcdFacet::read_from(doc),
            coredns: CoreDnsFacet::read_from(doc),
            discovery: DiscoveryFacet::read_from(doc),
            extra_manifests: ExtraManifestsFacet::read_from(doc),
        }
    }

    /// The snapshot a node would report for these declared facets, so that
    /// declared defaults compare equal to their absent read-back.
    pub fn normalized(&self) -> Result<Self> {
        let mut doc = MachineConfig {
            cluster: Some(ClusterSection::default()),
            ..Default::default()
        };
        for facet in self.facets() {
            facet.contribute(&mut doc)?;
        }
        Ok(Self::read_from(&doc))
    }

    /// Facet kinds whose values differ between `self` and `other`.
    pub fn differing_kinds(&self, other: &MachineFacets) -> Vec<FacetKind> {
        FacetKind::ALL
            .into_iter()
            .filter(|kind| !self.same_kind(other, *kind))
            .collect()
    }

    fn same_kind(&self, other: &MachineFacets, kind: FacetKind) -> bool {
        match kind {
            FacetKind::Install => self.install == other.install,
            FacetKind::Network => self.network == other.network,
            FacetKind::CertSans => self.cert_sans == other.cert_sans,
            FacetKind::Kubelet => self.kubelet == other.kubelet,
            FacetKind::Encryption => self.encryption == other.encryption,
            FacetKind::ClusterNetwork => self.cluster_network == other.cluster_network,
            FacetKind::ApiServer => self.api_server == other.api_server,
            FacetKind::ControllerManager => self.controller_manager == other.controller_manager,
            FacetKind::Scheduler => self.scheduler == other.scheduler,
            FacetKind::Proxy => self.proxy == other.proxy,
            FacetKind::Etcd => self.etcd == other.etcd,
            FacetKind::CoreDns => self.coredns == other.coredns,
            FacetKind::Discovery => self.discovery == other.discovery,
            FacetKind::ExtraManifests => self.extra_manifests == other.extra_manifests,
        }
    }

    /// YAML rendering of one facet, `null` when absent.
    pub fn render_kind(&self, kind: FacetKind) -> Result<String> {
        let yaml = match kind {
            FacetKind::Install => serde_yaml::to_string(&self.install)?,
            FacetKind::Network => serde_yaml::to_string(&self.network)?,
            FacetKind::CertSans => serde_yaml::to_string(&self.cert_sans)?,
            FacetKind::Kubelet => serde_yaml::to_string(&self.kubelet)?,
            FacetKind::Encryption => serde_yaml::to_string(&self.encryption)?,
            FacetKind::ClusterNetwork => serde_yaml::to_string(&self.cluster_network)?,
            FacetKind::ApiServer => serde_yaml::to_string(&self.api_server)?,
            FacetKind::ControllerManager => serde_yaml::to_string(&self.controller_manager)?,
            FacetKind::Scheduler => serde_yaml::to_string(&self.scheduler)?,
            FacetKind::Proxy => serde_yaml::to_string(&self.proxy)?,
            FacetKind::Etcd => serde_yaml::to_string(&self.etcd)?,
            FacetKind::CoreDns => serde_yaml::to_string(&self.coredns)?,
            FacetKind::Discovery => serde_yaml::to_string(&self.discovery)?,
            FacetKind::ExtraManifests => serde_yaml::to_string(&self.extra_manifests)?,
        };
        Ok(yaml.trim_end().to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::domain::config::document::{ClusterSection, MachineConfig};

    pub fn empty_doc() -> MachineConfig {
        MachineConfig::default()
    }

    /// Empty document with an empty cluster section, for cluster-scoped facets.
    pub fn empty_cluster_doc() -> MachineConfig {
        MachineConfig {
            cluster: Some(ClusterSection::default()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_kind_order() {
        let mut sorted = FacetKind::ALL;
        sorted.sort();
        assert_eq!(sorted, FacetKind::ALL);
    }

    #[test]
    fn test_facets_listed_in_canonical_order() {
        let facets = MachineFacets {
            extra_manifests: Some(ExtraManifestsFacet {
                urls: vec!["https://example.com/a.yaml".to_string()],
                ..Default::default()
            }),
            install: Some(InstallFacet {
                disk: "/dev/sda".to_string(),
                ..Default::default()
            }),
            proxy: Some(ProxyFacet::default()),
            ..Default::default()
        };
        let kinds: Vec<_> = facets.facets().iter().map(Facet::kind).collect();
        assert_eq!(
            kinds,
            vec![FacetKind::Install, FacetKind::Proxy, FacetKind::ExtraManifests]
        );
    }

    #[test]
    fn test_differing_kinds() {
        let declared = MachineFacets {
            coredns: Some(CoreDnsFacet {
                disabled: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let observed = MachineFacets::default();
        assert_eq!(declared.differing_kinds(&observed), vec![FacetKind::CoreDns]);
        assert!(declared.differing_kinds(&declared.clone()).is_empty());
        assert_eq!(declared.render_kind(FacetKind::Install).unwrap(), "null");
    }

    #[test]
    fn test_normalized_drops_declared_defaults() {
        let declared = MachineFacets {
            proxy: Some(ProxyFacet::default()),
            coredns: Some(CoreDnsFacet {
                disabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let normalized = declared.normalized().unwrap();
        assert_eq!(normalized.proxy, None);
        assert_eq!(normalized.coredns, declared.coredns);
    }

    #[test]
    fn test_cluster_scope() {
        assert!(!FacetKind::Kubelet.is_cluster_scoped());
        assert!(FacetKind::Etcd.is_cluster_scoped());
        assert!(FacetKind::Discovery.is_cluster_scoped());
    }
}
