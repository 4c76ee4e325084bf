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

//! Client configuration files derived from a [`SecretsBundle`].

use super::bundle::SecretsBundle;
use super::clock::Clock;
use super::pki::{CertificateAuthority, CLIENT_CERT_VALIDITY_DAYS};
use crate::shared::error::{ProvisionError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const KUBE_ADMIN_ORGANIZATION: &str = "system:masters";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalosConfig {
    pub context: String,
    pub contexts: BTreeMap<String, TalosContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalosContext {
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<String>,
    pub ca: String,
    pub crt: String,
    pub key: String,
}

impl TalosConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// OS client configuration carrying the OS root and the admin identity.
pub fn talosconfig(
    bundle: &SecretsBundle,
    context: &str,
    endpoints: &[String],
    nodes: &[String],
) -> Result<TalosConfig> {
    if endpoints.is_empty() {
        return Err(ProvisionError::validation(
            "talosconfig needs at least one endpoint",
        ));
    }
    let ctx = TalosContext {
        endpoints: endpoints.to_vec(),
        nodes: nodes.to_vec(),
        ca: STANDARD.encode(bundle.certs.os.crt.as_bytes()),
        crt: STANDARD.encode(bundle.certs.admin.crt.as_bytes()),
        key: STANDARD.encode(bundle.certs.admin.key.as_bytes()),
    };
    let mut contexts = BTreeMap::new();
    contexts.insert(context.to_string(), ctx);
    Ok(TalosConfig {
        context: context.to_string(),
        contexts,
    })
}

// ----------------------------------------------------------------------------
// kubeconfig
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
struct KubeConfigFile {
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster>,
    users: Vec<NamedUser>,
    contexts: Vec<NamedContext>,
    current_context: String,
    preferences: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority_data: String,
}

#[derive(Debug, Clone, Serialize)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
struct UserEntry {
    client_certificate_data: String,
    client_key_data: String,
}

#[derive(Debug, Clone, Serialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Clone, Serialize)]
struct ContextEntry {
    cluster: String,
    user: String,
}

/// Admin kubeconfig, with a fresh client certificate from the Kubernetes root.
pub fn kubeconfig(
    bundle: &SecretsBundle,
    cluster_name: &str,
    endpoint: &str,
    clock: &dyn Clock,
) -> Result<String> {
    if !endpoint.starts_with("https://") {
        return Err(ProvisionError::validation(format!(
            "Kubernetes endpoint must be an https URL, got '{}'",
            endpoint
        )));
    }
    let root = CertificateAuthority::from_pem(&bundle.certs.k8s)?;
    let user_name = format!("admin@{}", cluster_name);
    let client = root.issue_client(
        "admin",
        KUBE_ADMIN_ORGANIZATION,
        clock.now(),
        CLIENT_CERT_VALIDITY_DAYS,
    )?;

    let file = KubeConfigFile {
        api_version: "v1",
        kind: "Config",
        clusters: vec![NamedCluster {
            name: cluster_name.to_string(),
            cluster: ClusterEntry {
                server: endpoint.to_string(),
                certificate_authority_data: STANDARD.encode(bundle.certs.k8s.crt.as_bytes()),
            },
        }],
        users: vec![NamedUser {
            name: user_name.clone(),
            user: UserEntry {
                client_certificate_data: STANDARD.encode(client.crt.as_bytes()),
                client_key_data: STANDARD.encode(client.key.as_bytes()),
            },
        }],
        contexts: vec![NamedContext {
            name: user_name.clone(),
            context: ContextEntry {
                cluster: cluster_name.to_string(),
                user: user_name.clone(),
            },
        }],
        current_context: user_name,
        preferences: BTreeMap::new(),
    };
    Ok(serde_yaml::to_string(&file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::secrets::clock::SystemClock;
    use crate::domain::secrets::pki;
    use crate::domain::secrets::version::VersionContract;

    fn bundle() -> SecretsBundle {
        SecretsBundle::generate("demo", VersionContract::V1_5, &SystemClock).unwrap()
    }

    #[test]
    fn test_talosconfig_embeds_admin_identity() {
        let b = bundle();
        let cfg = talosconfig(&b, "demo", &["10.0.0.10".to_string()], &[]).unwrap();
        let parsed = TalosConfig::from_yaml(&cfg.to_yaml().unwrap()).unwrap();
        let ctx = &parsed.contexts["demo"];
        assert_eq!(parsed.context, "demo");
        let ca = String::from_utf8(STANDARD.decode(&ctx.ca).unwrap()).unwrap();
        assert_eq!(ca, b.certs.os.crt);
        assert!(ctx.nodes.is_empty());
    }

    #[test]
    fn test_talosconfig_requires_endpoint() {
        assert!(talosconfig(&bundle(), "demo", &[], &[]).is_err());
    }

    #[test]
    fn test_kubeconfig_parses_and_is_signed_by_k8s_root() {
        let b = bundle();
        let yaml = kubeconfig(&b, "demo", "https://10.0.0.10:6443", &SystemClock).unwrap();
        let parsed = kube::config::Kubeconfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.current_context.as_deref(), Some("admin@demo"));

        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let crt_b64 = value["users"][0]["user"]["client-certificate-data"]
            .as_str()
            .unwrap();
        let crt = String::from_utf8(STANDARD.decode(crt_b64).unwrap()).unwrap();
        assert!(pki::verify_issued_by(&crt, &b.certs.k8s.crt).unwrap());
        assert!(!pki::verify_issued_by(&crt, &b.certs.os.crt).unwrap());
    }

    #[test]
    fn test_kubeconfig_rejects_plain_http() {
        assert!(kubeconfig(&bundle(), "demo", "http://10.0.0.10:6443", &SystemClock).is_err());
    }
}
