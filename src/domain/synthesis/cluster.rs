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

use super::{collapse, FacetValue};
use crate::domain::config::document::{
    ClusterNetworkConfig, CniConfig, DiscoveryConfig, DiscoveryRegistries, InlineManifest,
    KubernetesRegistry, MachineConfig, ServiceRegistry,
};
use crate::domain::config::facets::{
    ClusterNetworkFacet, DiscoveryFacet, ExtraManifestsFacet, InlineManifestFacet,
};
use crate::shared::error::Result;

pub(super) fn contribute_network(facet: &ClusterNetworkFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("cluster_network")?;
    let cni = if facet.cni_name.is_empty() && facet.cni_urls.is_empty() {
        None
    } else {
        Some(CniConfig {
            name: facet.cni_name.clone(),
            urls: facet.cni_urls.clone(),
        })
    };
    let network = ClusterNetworkConfig {
        dns_domain: facet.dns_domain.clone(),
        pod_subnets: facet.pod_subnets.clone(),
        service_subnets: facet.service_subnets.clone(),
        cni,
    };
    cluster.network = collapse(network);
    Ok(())
}

impl FacetValue for ClusterNetworkFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let network = doc.cluster.as_ref()?.network.as_ref()?;
        let (cni_name, cni_urls) = network
            .cni
            .as_ref()
            .map(|c| (c.name.clone(), c.urls.clone()))
            .unwrap_or_default();
        collapse(ClusterNetworkFacet {
            dns_domain: network.dns_domain.clone(),
            pod_subnets: network.pod_subnets.clone(),
            service_subnets: network.service_subnets.clone(),
            cni_name,
            cni_urls,
        })
    }
}

pub(super) fn contribute_discovery(facet: &DiscoveryFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("discovery")?;
    let kubernetes = facet
        .kubernetes_registry_disabled
        .map(|disabled| KubernetesRegistry {
            disabled: Some(disabled),
        });
    let service = if facet.service_registry_disabled.is_none() && facet.service_endpoint.is_empty()
    {
        None
    } else {
        Some(ServiceRegistry {
            disabled: facet.service_registry_disabled,
            endpoint: facet.service_endpoint.clone(),
        })
    };
    let registries = collapse(DiscoveryRegistries {
        kubernetes,
        service,
    });
    cluster.discovery = collapse(DiscoveryConfig {
        enabled: facet.enabled,
        registries,
    });
    Ok(())
}

impl FacetValue for DiscoveryFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let discovery = doc.cluster.as_ref()?.discovery.as_ref()?;
        let registries = discovery.registries.as_ref();
        let service = registries.and_then(|r| r.service.as_ref());
        collapse(DiscoveryFacet {
            enabled: discovery.enabled,
            kubernetes_registry_disabled: registries
                .and_then(|r| r.kubernetes.as_ref())
                .and_then(|k| k.disabled),
            service_registry_disabled: service.and_then(|s| s.disabled),
            service_endpoint: service.map(|s| s.endpoint.clone()).unwrap_or_default(),
        })
    }
}

pub(super) fn contribute_extra_manifests(
    facet: &ExtraManifestsFacet,
    doc: &mut MachineConfig,
) -> Result<()> {
    let cluster = doc.cluster_mut("extra_manifests")?;
    cluster.extra_manifests = facet.urls.clone();
    cluster.inline_manifests = facet
        .inline
        .iter()
        .map(|m| InlineManifest {
            name: m.name.clone(),
            contents: m.contents.clone(),
        })
        .collect();
    Ok(())
}

impl FacetValue for ExtraManifestsFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let cluster = doc.cluster.as_ref()?;
        collapse(ExtraManifestsFacet {
            urls: cluster.extra_manifests.clone(),
            inline: cluster
                .inline_manifests
                .iter()
                .map(|m| InlineManifestFacet {
                    name: m.name.clone(),
                    contents: m.contents.clone(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthesis::test_utils::{empty_cluster_doc, empty_doc};
    use crate::shared::error::ProvisionError;

    fn cluster_network() -> ClusterNetworkFacet {
        ClusterNetworkFacet {
            dns_domain: "cluster.local".to_string(),
            pod_subnets: vec!["10.244.0.0/16".to_string()],
            service_subnets: vec!["10.96.0.0/12".to_string()],
            cni_name: "custom".to_string(),
            cni_urls: vec!["https://example.com/cilium.yaml".to_string()],
        }
    }

    fn manifests() -> ExtraManifestsFacet {
        ExtraManifestsFacet {
            urls: vec!["https://example.com/a.yaml".to_string()],
            inline: vec![InlineManifestFacet {
                name: "ns".to_string(),
                contents: "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: demo\n"
                    .to_string(),
            }],
        }
    }

    #[test]
    fn test_cluster_network_roundtrip() {
        let mut doc = empty_cluster_doc();
        contribute_network(&cluster_network(), &mut doc).unwrap();
        assert_eq!(ClusterNetworkFacet::read_from(&doc), Some(cluster_network()));
    }

    #[test]
    fn test_cluster_network_default_collapses() {
        let mut doc = empty_cluster_doc();
        contribute_network(&ClusterNetworkFacet::default(), &mut doc).unwrap();
        assert!(doc.cluster.as_ref().unwrap().network.is_none());
        assert_eq!(ClusterNetworkFacet::read_from(&doc), None);
    }

    #[test]
    fn test_discovery_explicit_false_contributes() {
        let facet = DiscoveryFacet {
            enabled: Some(false),
            ..Default::default()
        };
        let mut doc = empty_cluster_doc();
        contribute_discovery(&facet, &mut doc).unwrap();
        assert!(doc.to_yaml().unwrap().contains("enabled: false"));
        assert_eq!(DiscoveryFacet::read_from(&doc), Some(facet));
    }

    #[test]
    fn test_discovery_registries_roundtrip() {
        let facet = DiscoveryFacet {
            enabled: Some(true),
            kubernetes_registry_disabled: Some(true),
            service_registry_disabled: Some(false),
            service_endpoint: "https://discovery.example.com/".to_string(),
        };
        let mut doc = empty_cluster_doc();
        contribute_discovery(&facet, &mut doc).unwrap();
        assert_eq!(DiscoveryFacet::read_from(&doc), Some(facet));
    }

    #[test]
    fn test_discovery_default_collapses_transitively() {
        let mut doc = empty_cluster_doc();
        let cluster = doc.cluster.as_mut().unwrap();
        cluster.discovery = Some(DiscoveryConfig {
            enabled: None,
            registries: Some(DiscoveryRegistries {
                kubernetes: Some(KubernetesRegistry::default()),
                service: Some(ServiceRegistry::default()),
            }),
        });
        assert_eq!(DiscoveryFacet::read_from(&doc), None);
    }

    #[test]
    fn test_extra_manifests_roundtrip_and_replace() {
        let mut doc = empty_cluster_doc();
        contribute_extra_manifests(&manifests(), &mut doc).unwrap();
        contribute_extra_manifests(&manifests(), &mut doc).unwrap();
        assert_eq!(doc.cluster.as_ref().unwrap().extra_manifests.len(), 1);
        assert_eq!(doc.cluster.as_ref().unwrap().inline_manifests.len(), 1);
        assert_eq!(ExtraManifestsFacet::read_from(&doc), Some(manifests()));
    }

    #[test]
    fn test_no_cluster_section_is_validation_error() {
        let err = contribute_extra_manifests(&manifests(), &mut empty_doc()).unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
        assert_eq!(ExtraManifestsFacet::read_from(&empty_doc()), None);
    }
}
