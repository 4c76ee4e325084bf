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
use crate::domain::config::document::{ExtraMount, KubeletConfig, KubeletNodeIp, MachineConfig};
use crate::domain::config::facets::{KubeletFacet, KubeletMount};
use crate::shared::error::Result;

/// The seccomp default belongs to the base document and survives contribution.
pub(super) fn contribute(facet: &KubeletFacet, doc: &mut MachineConfig) -> Result<()> {
    let seccomp = doc
        .machine
        .kubelet
        .as_ref()
        .and_then(|k| k.default_runtime_seccomp_profile_enabled);

    let kubelet = KubeletConfig {
        image: facet.image.clone(),
        extra_args: facet.extra_args.clone(),
        extra_mounts: facet
            .extra_mounts
            .iter()
            .map(|m| ExtraMount {
                destination: m.destination.clone(),
                mount_type: m.mount_type.clone(),
                source: m.source.clone(),
                options: m.options.clone(),
            })
            .collect(),
        cluster_dns: facet.cluster_dns.clone(),
        node_ip: if facet.node_ip_valid_subnets.is_empty() {
            None
        } else {
            Some(KubeletNodeIp {
                valid_subnets: facet.node_ip_valid_subnets.clone(),
            })
        },
        register_with_fqdn: facet.register_with_fqdn,
        default_runtime_seccomp_profile_enabled: seccomp,
    };

    doc.machine.kubelet = if kubelet == KubeletConfig::default() {
        None
    } else {
        Some(kubelet)
    };
    Ok(())
}

impl FacetValue for KubeletFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let kubelet = doc.machine.kubelet.as_ref()?;
        collapse(KubeletFacet {
            image: kubelet.image.clone(),
            extra_args: kubelet.extra_args.clone(),
            extra_mounts: kubelet
                .extra_mounts
                .iter()
                .map(|m| KubeletMount {
                    destination: m.destination.clone(),
                    mount_type: m.mount_type.clone(),
                    source: m.source.clone(),
                    options: m.options.clone(),
                })
                .collect(),
            cluster_dns: kubelet.cluster_dns.clone(),
            node_ip_valid_subnets: kubelet
                .node_ip
                .as_ref()
                .map(|n| n.valid_subnets.clone())
                .unwrap_or_default(),
            register_with_fqdn: kubelet.register_with_fqdn,
        })
    }
}
