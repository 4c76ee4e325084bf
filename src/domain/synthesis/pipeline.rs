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

use super::validate::validate;
use super::Facet;
use crate::domain::config::document::MachineConfig;
use crate::domain::config::facets::MachineFacets;
use crate::domain::secrets::VersionContract;
use crate::shared::error::Result;
use tracing::{debug, warn};

/// Merges declared facets into a base document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer {
    contract: VersionContract,
}

impl Synthesizer {
    pub fn new(contract: VersionContract) -> Self {
        Self { contract }
    }

    /// Validate, then contribute every declared facet in canonical order.
    ///
    /// `base` is cloned first and never modified; on error nothing is returned.
    pub fn synthesize(&self, base: &MachineConfig, facets: &MachineFacets) -> Result<MachineConfig> {
        validate(facets, self.contract)?;
        self.apply(base, &facets.facets())
    }

    /// Contribute an explicit facet list in the given order, without validation.
    pub fn apply(&self, base: &MachineConfig, facets: &[Facet]) -> Result<MachineConfig> {
        let mut doc = base.clone();
        for facet in facets {
            if let Err(e) = facet.contribute(&mut doc) {
                warn!("Facet '{}' failed to contribute: {}", facet.kind(), e);
                return Err(e);
            }
            debug!("Contributed facet '{}'", facet.kind());
        }
        Ok(doc)
    }
}

/// Reverse pipeline: the declared-state snapshot of an authoritative document.
pub fn read_back(doc: &MachineConfig) -> MachineFacets {
    MachineFacets::read_from(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::document::MachineType;
    use crate::domain::config::facets::*;
    use crate::domain::config::generate::generate_base;
    use crate::domain::config::network::{BondFacet, NetworkDeviceFacet, NetworkFacet, VlanFacet};
    use crate::domain::secrets::{SecretsBundle, SystemClock};
    use crate::domain::synthesis::test_utils::empty_doc;
    use crate::shared::error::ProvisionError;
    use std::collections::BTreeMap;

    fn base() -> MachineConfig {
        let bundle = SecretsBundle::generate("demo", VersionContract::V1_5, &SystemClock).unwrap();
        generate_base(&bundle, MachineType::ControlPlane, "https://10.0.0.10:6443").unwrap()
    }

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

    fn everything() -> MachineFacets {
        let mut args = BTreeMap::new();
        args.insert("v".to_string(), "2".to_string());
        MachineFacets {
            install: install_only().install,
            network: Some(NetworkFacet {
                hostname: "cp-1".to_string(),
                devices: vec![NetworkDeviceFacet {
                    interface: "bond0".to_string(),
                    addresses: vec!["10.0.0.10/24".to_string()],
                    bond: Some(BondFacet {
                        interfaces: vec!["eth0".to_string(), "eth1".to_string()],
                        mode: "active-backup".to_string(),
                        miimon: 100,
                        ..Default::default()
                    }),
                    vlans: vec![VlanFacet {
                        vlan_id: 20,
                        dhcp: Some(true),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            cert_sans: Some(CertSansFacet {
                machine: vec!["10.0.0.10".to_string()],
                api_server: vec!["k8s.example.com".to_string()],
            }),
            kubelet: Some(KubeletFacet {
                extra_args: args.clone(),
                ..Default::default()
            }),
            cluster_network: Some(ClusterNetworkFacet {
                pod_subnets: vec!["10.244.0.0/16".to_string()],
                ..Default::default()
            }),
            api_server: Some(ApiServerFacet {
                extra_args: args.clone(),
                ..Default::default()
            }),
            controller_manager: Some(ControllerManagerFacet {
                extra_args: args.clone(),
                ..Default::default()
            }),
            scheduler: Some(SchedulerFacet {
                extra_args: args,
                ..Default::default()
            }),
            proxy: Some(ProxyFacet {
                mode: "ipvs".to_string(),
                ..Default::default()
            }),
            etcd: Some(EtcdFacet {
                advertised_subnets: vec!["10.0.0.0/24".to_string()],
                ..Default::default()
            }),
            coredns: Some(CoreDnsFacet {
                disabled: Some(true),
                ..Default::default()
            }),
            discovery: Some(DiscoveryFacet {
                enabled: Some(true),
                ..Default::default()
            }),
            extra_manifests: Some(ExtraManifestsFacet {
                urls: vec!["https://example.com/a.yaml".to_string()],
                ..Default::default()
            }),
            encryption: None,
        }
    }

    #[test]
    fn test_install_only_scenario() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let doc = synth.synthesize(&empty_doc(), &install_only()).unwrap();

        let install = &doc.machine.install;
        assert_eq!(install.disk, "/dev/sda");
        assert_eq!(install.image, "repo/os:v1");
        assert_eq!(install.bootloader, None);
        assert_eq!(install.wipe, None);
        assert!(install.extra_kernel_args.is_empty());

        assert_eq!(read_back(&doc), install_only());
    }

    #[test]
    fn test_install_only_on_generated_base() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let doc = synth.synthesize(&base(), &install_only()).unwrap();
        assert_eq!(read_back(&doc), install_only());
    }

    #[test]
    fn test_full_roundtrip_on_generated_base() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let doc = synth.synthesize(&base(), &everything()).unwrap();
        assert_eq!(read_back(&doc), everything());

        // through YAML, as a live node would return it
        let parsed = MachineConfig::from_yaml(&doc.to_yaml().unwrap()).unwrap();
        assert_eq!(read_back(&parsed), everything());
    }

    #[test]
    fn test_resynthesis_is_idempotent() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let once = synth.synthesize(&base(), &everything()).unwrap();
        let twice = synth.synthesize(&once, &everything()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_order_permutations_produce_identical_documents() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let base = base();
        let forward = everything().facets();
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut rotated = forward.clone();
        rotated.rotate_left(5);

        let expected = synth.apply(&base, &forward).unwrap();
        assert_eq!(synth.apply(&base, &reversed).unwrap(), expected);
        assert_eq!(synth.apply(&base, &rotated).unwrap(), expected);
    }

    #[test]
    fn test_all_default_facets_read_back_as_never_set() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let defaults = MachineFacets {
            install: Some(Default::default()),
            network: Some(Default::default()),
            cert_sans: Some(Default::default()),
            kubelet: Some(Default::default()),
            cluster_network: Some(Default::default()),
            api_server: Some(Default::default()),
            controller_manager: Some(Default::default()),
            scheduler: Some(Default::default()),
            proxy: Some(Default::default()),
            etcd: Some(Default::default()),
            coredns: Some(Default::default()),
            discovery: Some(Default::default()),
            extra_manifests: Some(Default::default()),
            encryption: Some(Default::default()),
        };
        let base = base();
        let doc = synth.synthesize(&base, &defaults).unwrap();
        assert_eq!(read_back(&doc), MachineFacets::default());
        assert_eq!(read_back(&doc), read_back(&base));
        assert_eq!(doc, base);
    }

    #[test]
    fn test_conversion_failure_leaves_base_untouched() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let base = base();
        let snapshot = base.clone();
        let mut facets = everything();
        if let Some(bond) = facets.network.as_mut().unwrap().devices[0].bond.as_mut() {
            bond.all_slaves_active = 1000;
        }
        let err = synth.synthesize(&base, &facets).unwrap_err();
        assert!(matches!(err, ProvisionError::Conversion { .. }));
        assert_eq!(base, snapshot);
    }

    #[test]
    fn test_validation_runs_before_contribution() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let mut facets = install_only();
        facets.install.as_mut().unwrap().disk = "sda".to_string();
        assert!(matches!(
            synth.synthesize(&empty_doc(), &facets),
            Err(ProvisionError::Validation(_))
        ));
    }

    #[test]
    fn test_cluster_facet_on_document_without_cluster() {
        let synth = Synthesizer::new(VersionContract::V1_5);
        let facets = MachineFacets {
            etcd: Some(EtcdFacet::default()),
            ..Default::default()
        };
        assert!(matches!(
            synth.synthesize(&empty_doc(), &facets),
            Err(ProvisionError::Validation(_))
        ));
    }
}
