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

//! TOML declaration of a cluster and its nodes.
//!
//! ```toml
//! [cluster]
//! name = "demo"
//! endpoint = "https://10.0.0.10:6443"
//! talos_version = "v1.5"
//!
//! [cluster.facets.install]
//! image = "ghcr.io/siderolabs/installer:v1.5.5"
//!
//! [lifecycle]
//! ready_deadline_secs = 300
//!
//! [[nodes]]
//! name = "cp-1"
//! machine_type = "controlplane"
//! provisioning_address = "10.0.0.10"
//! bootstrap = true
//!
//! [nodes.facets.install]
//! disk = "/dev/sda"
//! ```

use super::document::MachineType;
use super::facets::MachineFacets;
use crate::domain::node::{ApplyMode, LifecycleOptions};
use crate::domain::secrets::VersionContract;
use crate::shared::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::read_to_string;
use std::path::PathBuf;
use std::time::Duration;

fn default_talos_version() -> String {
    VersionContract::default().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDeclaration {
    pub name: String,
    /// Kubernetes API endpoint, `https://host:port`.
    pub endpoint: String,
    #[serde(default = "default_talos_version")]
    pub talos_version: String,
    /// Facets every node inherits unless it declares its own.
    #[serde(default)]
    pub facets: MachineFacets,
}

/// Overrides for [`LifecycleOptions`], in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleDeclaration {
    pub dial_timeout_secs: Option<u64>,
    pub retry_interval_secs: Option<u64>,
    pub ready_deadline_secs: Option<u64>,
    pub rpc_timeout_secs: Option<u64>,
    pub reset_grace_secs: Option<u64>,
    pub hypervisor_socket: Option<String>,
}

impl LifecycleDeclaration {
    pub fn options(&self) -> LifecycleOptions {
        let defaults = LifecycleOptions::default();
        let secs = |v: Option<u64>, d: Duration| v.map(Duration::from_secs).unwrap_or(d);
        LifecycleOptions {
            dial_timeout: secs(self.dial_timeout_secs, defaults.dial_timeout),
            retry_interval: secs(self.retry_interval_secs, defaults.retry_interval),
            ready_deadline: secs(self.ready_deadline_secs, defaults.ready_deadline),
            rpc_timeout: secs(self.rpc_timeout_secs, defaults.rpc_timeout),
            reset_grace: secs(self.reset_grace_secs, defaults.reset_grace),
            hypervisor_socket: self.hypervisor_socket.as_ref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub machine_type: MachineType,
    /// Address reachable while the node is in maintenance mode.
    pub provisioning_address: String,
    /// Address once configured; defaults to the provisioning address.
    #[serde(default)]
    pub runtime_address: Option<String>,
    #[serde(default)]
    pub apply_mode: ApplyMode,
    #[serde(default)]
    pub bootstrap: bool,
    #[serde(default)]
    pub facets: MachineFacets,
}

impl NodeSpec {
    pub fn runtime_address(&self) -> &str {
        self.runtime_address
            .as_deref()
            .unwrap_or(&self.provisioning_address)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDeclaration {
    pub cluster: ClusterDeclaration,
    #[serde(default)]
    pub lifecycle: LifecycleDeclaration,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl NodeDeclaration {
    pub fn from<T: AsRef<str>>(path: T) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|e| {
            ProvisionError::config_error(format!(
                "Failed to read declaration file {}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let decl: Self = toml::from_str(content)?;
        Ok(decl)
    }

    pub fn contract(&self) -> Result<VersionContract> {
        VersionContract::parse(&self.cluster.talos_version)
    }

    pub fn node(&self, name: &str) -> Result<&NodeSpec> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| ProvisionError::config_error(format!("no node named '{}'", name)))
    }

    /// Nodes selected by name, or all of them when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&NodeSpec>> {
        if names.is_empty() {
            return Ok(self.nodes.iter().collect());
        }
        names.iter().map(|n| self.node(n)).collect()
    }

    /// The node's facets, falling back to the cluster-wide ones per kind.
    pub fn effective_facets(&self, node: &NodeSpec) -> MachineFacets {
        let own = &node.facets;
        let shared = &self.cluster.facets;
        MachineFacets {
            install: own.install.clone().or_else(|| shared.install.clone()),
            network: own.network.clone().or_else(|| shared.network.clone()),
            cert_sans: own.cert_sans.clone().or_else(|| shared.cert_sans.clone()),
            kubelet: own.kubelet.clone().or_else(|| shared.kubelet.clone()),
            encryption: own.encryption.clone().or_else(|| shared.encryption.clone()),
            cluster_network: own
                .cluster_network
                .clone()
                .or_else(|| shared.cluster_network.clone()),
            api_server: own.api_server.clone().or_else(|| shared.api_server.clone()),
            controller_manager: own
                .controller_manager
                .clone()
                .or_else(|| shared.controller_manager.clone()),
            scheduler: own.scheduler.clone().or_else(|| shared.scheduler.clone()),
            proxy: own.proxy.clone().or_else(|| shared.proxy.clone()),
            etcd: own.etcd.clone().or_else(|| shared.etcd.clone()),
            coredns: own.coredns.clone().or_else(|| shared.coredns.clone()),
            discovery: own.discovery.clone().or_else(|| shared.discovery.clone()),
            extra_manifests: own
                .extra_manifests
                .clone()
                .or_else(|| shared.extra_manifests.clone()),
        }
    }

    /// Structural checks; facet contents are validated during synthesis.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.name.trim().is_empty() {
            return Err(ProvisionError::validation("cluster.name must not be empty"));
        }
        if !self.cluster.endpoint.starts_with("https://") {
            return Err(ProvisionError::validation(format!(
                "cluster.endpoint '{}' must be an https URL",
                self.cluster.endpoint
            )));
        }
        self.contract()?;

        let mut names = HashSet::new();
        let mut bootstrap_nodes = Vec::new();
        for node in &self.nodes {
            if node.name.trim().is_empty() {
                return Err(ProvisionError::validation("node name must not be empty"));
            }
            if !names.insert(node.name.as_str()) {
                return Err(ProvisionError::validation(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
            if node.provisioning_address.trim().is_empty() {
                return Err(ProvisionError::validation(format!(
                    "node '{}' has no provisioning_address",
                    node.name
                )));
            }
            if node.bootstrap {
                if !node.machine_type.is_control_plane() {
                    return Err(ProvisionError::validation(format!(
                        "node '{}' is a {} node and cannot bootstrap",
                        node.name,
                        node.machine_type.as_str()
                    )));
                }
                bootstrap_nodes.push(node.name.as_str());
            }
        }
        if bootstrap_nodes.len() > 1 {
            return Err(ProvisionError::validation(format!(
                "only one node may bootstrap the cluster, found: {}",
                bootstrap_nodes.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[cluster]
name = "demo"
endpoint = "https://10.0.0.10:6443"

[cluster.facets.install]
disk = "/dev/sda"
image = "ghcr.io/siderolabs/installer:v1.5.5"

[lifecycle]
ready_deadline_secs = 120
hypervisor_socket = "/tmp/qmp.sock"

[[nodes]]
name = "cp-1"
machine_type = "controlplane"
provisioning_address = "10.0.0.10"
bootstrap = true

[nodes.facets.network]
hostname = "cp-1"

[[nodes]]
name = "w-1"
provisioning_address = "10.0.0.20"
runtime_address = "10.0.1.20"
apply_mode = "no_reboot"

[nodes.facets.install]
disk = "/dev/nvme0n1"
"#;

    #[test]
    fn test_parse_sample() {
        let decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        decl.validate().unwrap();
        assert_eq!(decl.contract().unwrap(), VersionContract::default());
        assert_eq!(decl.nodes.len(), 2);

        let cp = decl.node("cp-1").unwrap();
        assert_eq!(cp.machine_type, MachineType::ControlPlane);
        assert_eq!(cp.runtime_address(), "10.0.0.10");
        assert_eq!(cp.apply_mode, ApplyMode::Auto);

        let worker = decl.node("w-1").unwrap();
        assert_eq!(worker.machine_type, MachineType::Worker);
        assert_eq!(worker.runtime_address(), "10.0.1.20");
        assert_eq!(worker.apply_mode, ApplyMode::NoReboot);
    }

    #[test]
    fn test_effective_facets_prefer_node() {
        let decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        let cp = decl.effective_facets(decl.node("cp-1").unwrap());
        assert_eq!(cp.install.as_ref().unwrap().disk, "/dev/sda");
        assert_eq!(cp.network.as_ref().unwrap().hostname, "cp-1");

        // whole facet replaced, not merged field by field
        let worker = decl.effective_facets(decl.node("w-1").unwrap());
        let install = worker.install.unwrap();
        assert_eq!(install.disk, "/dev/nvme0n1");
        assert!(install.image.is_empty());
    }

    #[test]
    fn test_lifecycle_overrides() {
        let decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        let options = decl.lifecycle.options();
        assert_eq!(options.ready_deadline, Duration::from_secs(120));
        assert_eq!(options.rpc_timeout, LifecycleOptions::default().rpc_timeout);
        assert_eq!(options.hypervisor_socket, Some(PathBuf::from("/tmp/qmp.sock")));
    }

    #[test]
    fn test_rejects_two_bootstrap_nodes() {
        let mut decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        let mut second = decl.nodes[0].clone();
        second.name = "cp-2".to_string();
        decl.nodes.push(second);
        assert!(matches!(decl.validate(), Err(ProvisionError::Validation(_))));
    }

    #[test]
    fn test_rejects_worker_bootstrap_and_http_endpoint() {
        let mut decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        decl.nodes[1].bootstrap = true;
        assert!(decl.validate().is_err());

        let mut decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        decl.cluster.endpoint = "http://10.0.0.10:6443".to_string();
        assert!(decl.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let decl = NodeDeclaration::from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(decl.cluster.name, "demo");

        assert!(matches!(
            NodeDeclaration::from("/nonexistent/cluster.toml"),
            Err(ProvisionError::Config(_))
        ));
    }

    #[test]
    fn test_select() {
        let decl = NodeDeclaration::from_toml(SAMPLE).unwrap();
        assert_eq!(decl.select(&[]).unwrap().len(), 2);
        assert_eq!(decl.select(&["w-1".to_string()]).unwrap()[0].name, "w-1");
        assert!(decl.select(&["nope".to_string()]).is_err());
    }
}
