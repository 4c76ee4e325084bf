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

//! Base document generation.
//!
//! The base carries identity and trust material only. Everything a facet can
//! own is left empty here so that reading a synthesized document back never
//! reports values the operator did not declare.

use super::document::{
    ClusterSection, ControlPlaneConfig, EtcdConfig, KubeletConfig, MachineConfig, MachineType,
    PemEncodedCertificateAndKey, ServiceAccountKey,
};
use crate::domain::secrets::SecretsBundle;
use crate::shared::error::{ProvisionError, Result};
use tracing::debug;

/// Build the base document for one node of the bundle's cluster.
pub fn generate_base(
    bundle: &SecretsBundle,
    machine_type: MachineType,
    endpoint: &str,
) -> Result<MachineConfig> {
    validate_endpoint(endpoint)?;
    let contract = bundle.contract;
    let certs = &bundle.certs;
    let control_plane = machine_type.is_control_plane();

    let mut doc = MachineConfig::default();
    doc.machine.machine_type = machine_type;
    doc.machine.token = bundle.trustd_token.clone();
    doc.machine.ca = Some(if control_plane {
        PemEncodedCertificateAndKey::from_pem(&certs.os.crt, &certs.os.key)
    } else {
        PemEncodedCertificateAndKey::certificate_only(&certs.os.crt)
    });

    if contract.kubelet_default_runtime_seccomp_supported() {
        doc.machine.kubelet = Some(KubeletConfig {
            default_runtime_seccomp_profile_enabled: Some(true),
            ..Default::default()
        });
    }

    let mut cluster = ClusterSection {
        id: bundle.cluster_id.clone(),
        secret: bundle.cluster_secret.clone(),
        control_plane: ControlPlaneConfig {
            endpoint: endpoint.to_string(),
            local_api_server_port: None,
        },
        cluster_name: bundle.cluster_name.clone(),
        token: bundle.bootstrap_token.clone(),
        ca: Some(if control_plane {
            PemEncodedCertificateAndKey::from_pem(&certs.k8s.crt, &certs.k8s.key)
        } else {
            PemEncodedCertificateAndKey::certificate_only(&certs.k8s.crt)
        }),
        ..Default::default()
    };

    if control_plane {
        if contract.secretbox_encryption_supported() {
            cluster.secretbox_encryption_secret = Some(bundle.disk_encryption_secret.clone());
        } else {
            cluster.aescbc_encryption_secret = Some(bundle.disk_encryption_secret.clone());
        }
        cluster.aggregator_ca = Some(PemEncodedCertificateAndKey::from_pem(
            &certs.k8s_aggregator.crt,
            &certs.k8s_aggregator.key,
        ));
        cluster.service_account = Some(ServiceAccountKey {
            key: PemEncodedCertificateAndKey::from_pem("", &certs.k8s_service_account.key).key,
        });
        cluster.etcd = Some(EtcdConfig {
            ca: Some(PemEncodedCertificateAndKey::from_pem(
                &certs.etcd.crt,
                &certs.etcd.key,
            )),
            ..Default::default()
        });
    }

    doc.cluster = Some(cluster);
    debug!(
        "Generated base {} document for cluster '{}' (contract {})",
        machine_type, bundle.cluster_name, contract
    );
    Ok(doc)
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let rest = endpoint.strip_prefix("https://").ok_or_else(|| {
        ProvisionError::validation(format!(
            "cluster endpoint must be an https URL, got '{}'",
            endpoint
        ))
    })?;
    if rest.trim_end_matches('/').is_empty() {
        return Err(ProvisionError::validation(
            "cluster endpoint is missing a host",
        ));
    }
    Ok(())
}
