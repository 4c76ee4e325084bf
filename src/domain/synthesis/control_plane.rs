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

//! Control-plane components: API server, controller manager, scheduler,
//! proxy, etcd and CoreDNS, plus certificate SANs.
//!
//! `apiServer` is shared between the api_server facet and the SANs facet,
//! and `etcd` between the etcd facet and the base document's CA. Each writer
//! touches only its own fields and drops the block once it is empty.

use super::{collapse, FacetValue};
use crate::domain::config::document::{
    ApiServerConfig, ComponentConfig, CoreDnsConfig, EtcdConfig, MachineConfig, ProxyConfig,
    VolumeMount,
};
use crate::domain::config::facets::{
    ApiServerFacet, CertSansFacet, ControllerManagerFacet, CoreDnsFacet, EtcdFacet, HostVolume,
    ProxyFacet, SchedulerFacet,
};
use crate::shared::error::Result;

fn prune<T: Default + PartialEq>(slot: &mut Option<T>) {
    if slot.as_ref().is_some_and(|v| *v == T::default()) {
        *slot = None;
    }
}

// ============================================================================
// Certificate SANs
// ============================================================================

pub(super) fn contribute_cert_sans(facet: &CertSansFacet, doc: &mut MachineConfig) -> Result<()> {
    doc.machine.cert_sans = facet.machine.clone();

    // Machine-only SANs are valid on documents without a cluster section.
    if facet.api_server.is_empty() && doc.cluster.is_none() {
        return Ok(());
    }
    let cluster = doc.cluster_mut("cert_sans")?;
    let api = cluster.api_server.get_or_insert_with(Default::default);
    api.cert_sans = facet.api_server.clone();
    prune(&mut cluster.api_server);
    Ok(())
}

impl FacetValue for CertSansFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        collapse(CertSansFacet {
            machine: doc.machine.cert_sans.clone(),
            api_server: doc
                .cluster
                .as_ref()
                .and_then(|c| c.api_server.as_ref())
                .map(|a| a.cert_sans.clone())
                .unwrap_or_default(),
        })
    }
}

// ============================================================================
// API server
// ============================================================================

pub(super) fn contribute_api_server(facet: &ApiServerFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("api_server")?;
    let api = cluster.api_server.get_or_insert_with(ApiServerConfig::default);
    api.image = facet.image.clone();
    api.extra_args = facet.extra_args.clone();
    api.extra_volumes = facet
        .extra_volumes
        .iter()
        .map(|v| VolumeMount {
            host_path: v.host_path.clone(),
            mount_path: v.mount_path.clone(),
            read_only: v.read_only,
        })
        .collect();
    api.disable_pod_security_policy = facet.disable_pod_security_policy;
    prune(&mut cluster.api_server);
    Ok(())
}

impl FacetValue for ApiServerFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let api = doc.cluster.as_ref()?.api_server.as_ref()?;
        collapse(ApiServerFacet {
            image: api.image.clone(),
            extra_args: api.extra_args.clone(),
            extra_volumes: api
                .extra_volumes
                .iter()
                .map(|v| HostVolume {
                    host_path: v.host_path.clone(),
                    mount_path: v.mount_path.clone(),
                    read_only: v.read_only,
                })
                .collect(),
            disable_pod_security_policy: api.disable_pod_security_policy,
        })
    }
}

// ============================================================================
// Controller manager and scheduler
// ============================================================================

pub(super) fn contribute_controller_manager(
    facet: &ControllerManagerFacet,
    doc: &mut MachineConfig,
) -> Result<()> {
    let cluster = doc.cluster_mut("controller_manager")?;
    cluster.controller_manager = Some(ComponentConfig {
        image: facet.image.clone(),
        extra_args: facet.extra_args.clone(),
    });
    prune(&mut cluster.controller_manager);
    Ok(())
}

impl FacetValue for ControllerManagerFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let cm = doc.cluster.as_ref()?.controller_manager.as_ref()?;
        collapse(ControllerManagerFacet {
            image: cm.image.clone(),
            extra_args: cm.extra_args.clone(),
        })
    }
}

pub(super) fn contribute_scheduler(facet: &SchedulerFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("scheduler")?;
    cluster.scheduler = Some(ComponentConfig {
        image: facet.image.clone(),
        extra_args: facet.extra_args.clone(),
    });
    prune(&mut cluster.scheduler);
    Ok(())
}

impl FacetValue for SchedulerFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let sched = doc.cluster.as_ref()?.scheduler.as_ref()?;
        collapse(SchedulerFacet {
            image: sched.image.clone(),
            extra_args: sched.extra_args.clone(),
        })
    }
}

// ============================================================================
// Proxy
// ============================================================================

pub(super) fn contribute_proxy(facet: &ProxyFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("proxy")?;
    cluster.proxy = Some(ProxyConfig {
        image: facet.image.clone(),
        mode: facet.mode.clone(),
        disabled: facet.disabled,
        extra_args: facet.extra_args.clone(),
    });
    prune(&mut cluster.proxy);
    Ok(())
}

impl FacetValue for ProxyFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let proxy = doc.cluster.as_ref()?.proxy.as_ref()?;
        collapse(ProxyFacet {
            image: proxy.image.clone(),
            mode: proxy.mode.clone(),
            disabled: proxy.disabled,
            extra_args: proxy.extra_args.clone(),
        })
    }
}

// ============================================================================
// etcd
// ============================================================================

pub(super) fn contribute_etcd(facet: &EtcdFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("etcd")?;
    let etcd = cluster.etcd.get_or_insert_with(EtcdConfig::default);
    etcd.image = facet.image.clone();
    etcd.extra_args = facet.extra_args.clone();
    etcd.advertised_subnets = facet.advertised_subnets.clone();
    prune(&mut cluster.etcd);
    Ok(())
}

impl FacetValue for EtcdFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let etcd = doc.cluster.as_ref()?.etcd.as_ref()?;
        collapse(EtcdFacet {
            image: etcd.image.clone(),
            extra_args: etcd.extra_args.clone(),
            advertised_subnets: etcd.advertised_subnets.clone(),
        })
    }
}

// ============================================================================
// CoreDNS
// ============================================================================

pub(super) fn contribute_coredns(facet: &CoreDnsFacet, doc: &mut MachineConfig) -> Result<()> {
    let cluster = doc.cluster_mut("coredns")?;
    cluster.core_dns = Some(CoreDnsConfig {
        image: facet.image.clone(),
        disabled: facet.disabled,
    });
    prune(&mut cluster.core_dns);
    Ok(())
}

impl FacetValue for CoreDnsFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let dns = doc.cluster.as_ref()?.core_dns.as_ref()?;
        collapse(CoreDnsFacet {
            image: dns.image.clone(),
            disabled: dns.disabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::document::PemEncodedCertificateAndKey;
    use crate::domain::synthesis::test_utils::{empty_cluster_doc, empty_doc};
    use crate::shared::error::ProvisionError;
    use std::collections::BTreeMap;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn api_server() -> ApiServerFacet {
        ApiServerFacet {
            image: "registry.k8s.io/kube-apiserver:v1.28.0".to_string(),
            extra_args: args(&[("feature-gates", "ServerSideApply=true")]),
            extra_volumes: vec![HostVolume {
                host_path: "/var/lib/audit".to_string(),
                mount_path: "/var/lib/audit".to_string(),
                read_only: true,
            }],
            disable_pod_security_policy: Some(true),
        }
    }

    fn sans() -> CertSansFacet {
        CertSansFacet {
            machine: vec!["10.0.0.10".to_string()],
            api_server: vec!["k8s.example.com".to_string()],
        }
    }

    #[test]
    fn test_api_server_roundtrip() {
        let mut doc = empty_cluster_doc();
        contribute_api_server(&api_server(), &mut doc).unwrap();
        assert_eq!(ApiServerFacet::read_from(&doc), Some(api_server()));
        assert_eq!(CertSansFacet::read_from(&doc), None);
    }

    #[test]
    fn test_sans_and_api_server_share_block_in_either_order() {
        let mut a = empty_cluster_doc();
        contribute_cert_sans(&sans(), &mut a).unwrap();
        contribute_api_server(&api_server(), &mut a).unwrap();

        let mut b = empty_cluster_doc();
        contribute_api_server(&api_server(), &mut b).unwrap();
        contribute_cert_sans(&sans(), &mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(CertSansFacet::read_from(&a), Some(sans()));
        assert_eq!(ApiServerFacet::read_from(&a), Some(api_server()));
    }

    #[test]
    fn test_default_api_server_with_sans_collapses_to_absent() {
        let mut doc = empty_cluster_doc();
        contribute_cert_sans(&sans(), &mut doc).unwrap();
        contribute_api_server(&ApiServerFacet::default(), &mut doc).unwrap();
        assert_eq!(ApiServerFacet::read_from(&doc), None);
        assert_eq!(CertSansFacet::read_from(&doc), Some(sans()));
    }

    #[test]
    fn test_machine_sans_without_cluster_section() {
        let facet = CertSansFacet {
            machine: vec!["node.example".to_string()],
            api_server: vec![],
        };
        let mut doc = empty_doc();
        contribute_cert_sans(&facet, &mut doc).unwrap();
        assert_eq!(CertSansFacet::read_from(&doc), Some(facet));

        let err = contribute_cert_sans(&sans(), &mut empty_doc()).unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[test]
    fn test_sans_replace_not_append() {
        let mut doc = empty_cluster_doc();
        contribute_cert_sans(&sans(), &mut doc).unwrap();
        contribute_cert_sans(&sans(), &mut doc).unwrap();
        assert_eq!(doc.machine.cert_sans.len(), 1);

        let narrowed = CertSansFacet {
            machine: vec![],
            api_server: vec![],
        };
        contribute_cert_sans(&narrowed, &mut doc).unwrap();
        assert!(doc.cluster.as_ref().unwrap().api_server.is_none());
        assert_eq!(CertSansFacet::read_from(&doc), None);
    }

    #[test]
    fn test_component_roundtrips() {
        let mut doc = empty_cluster_doc();
        let cm = ControllerManagerFacet {
            image: "registry.k8s.io/kube-controller-manager:v1.28.0".to_string(),
            extra_args: args(&[("bind-address", "0.0.0.0")]),
        };
        let sched = SchedulerFacet {
            image: String::new(),
            extra_args: args(&[("bind-address", "0.0.0.0")]),
        };
        let proxy = ProxyFacet {
            mode: "ipvs".to_string(),
            disabled: Some(false),
            ..Default::default()
        };
        let dns = CoreDnsFacet {
            image: String::new(),
            disabled: Some(true),
        };
        contribute_controller_manager(&cm, &mut doc).unwrap();
        contribute_scheduler(&sched, &mut doc).unwrap();
        contribute_proxy(&proxy, &mut doc).unwrap();
        contribute_coredns(&dns, &mut doc).unwrap();

        assert_eq!(ControllerManagerFacet::read_from(&doc), Some(cm));
        assert_eq!(SchedulerFacet::read_from(&doc), Some(sched));
        assert_eq!(ProxyFacet::read_from(&doc), Some(proxy));
        assert_eq!(CoreDnsFacet::read_from(&doc), Some(dns));
    }

    #[test]
    fn test_default_components_collapse() {
        let mut doc = empty_cluster_doc();
        contribute_controller_manager(&Default::default(), &mut doc).unwrap();
        contribute_scheduler(&Default::default(), &mut doc).unwrap();
        contribute_proxy(&Default::default(), &mut doc).unwrap();
        contribute_coredns(&Default::default(), &mut doc).unwrap();
        contribute_etcd(&Default::default(), &mut doc).unwrap();
        assert_eq!(doc, empty_cluster_doc());
    }

    #[test]
    fn test_etcd_keeps_base_ca() {
        let mut doc = empty_cluster_doc();
        let ca = PemEncodedCertificateAndKey::from_pem("crt", "key");
        doc.cluster.as_mut().unwrap().etcd = Some(EtcdConfig {
            ca: Some(ca.clone()),
            ..Default::default()
        });
        assert_eq!(EtcdFacet::read_from(&doc), None);

        let facet = EtcdFacet {
            advertised_subnets: vec!["10.0.0.0/24".to_string()],
            ..Default::default()
        };
        contribute_etcd(&facet, &mut doc).unwrap();
        let etcd = doc.cluster.as_ref().unwrap().etcd.as_ref().unwrap();
        assert_eq!(etcd.ca.as_ref(), Some(&ca));
        assert_eq!(EtcdFacet::read_from(&doc), Some(facet));
    }

    #[test]
    fn test_cluster_facets_need_cluster_section() {
        let mut doc = empty_doc();
        assert!(matches!(
            contribute_proxy(&ProxyFacet::default(), &mut doc),
            Err(ProvisionError::Validation(_))
        ));
    }
}
