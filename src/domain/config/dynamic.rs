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

use super::declaration::{NodeDeclaration, NodeSpec};
use crate::domain::config::facets::InstallFacet;
use crate::domain::node::ApplyMode;
use crate::shared::error::{ProvisionError, Result};
use std::collections::HashMap;

/// Parse `key=value` pairs given with `-D`.
pub fn parse_dynamic_configs(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| {
                    ProvisionError::config_error(format!(
                        "Invalid dynamic config '{}', expected key=value",
                        pair
                    ))
                })
        })
        .collect()
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        ProvisionError::config_error(format!("{} expects whole seconds, got '{}'", key, value))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value.parse::<bool>().map_err(|_| {
        ProvisionError::config_error(format!("{} expects true or false, got '{}'", key, value))
    })
}

/// Apply command-line overrides on top of a loaded declaration.
///
/// Recognized keys:
/// - `cluster.name`, `cluster.endpoint`, `cluster.talos-version`
/// - `lifecycle.dial-timeout`, `lifecycle.retry-interval`,
///   `lifecycle.ready-deadline`, `lifecycle.rpc-timeout`,
///   `lifecycle.reset-grace` (seconds), `lifecycle.hypervisor-socket`
/// - `install.image`: installer image for every node
/// - `nodes.<name>.provisioning-address`, `nodes.<name>.runtime-address`,
///   `nodes.<name>.apply-mode`, `nodes.<name>.bootstrap`,
///   `nodes.<name>.install.disk`, `nodes.<name>.install.image`
pub fn apply_dynamic_overrides(
    configs: &HashMap<String, String>,
    decl: &mut NodeDeclaration,
) -> Result<()> {
    // sorted so that cluster-wide keys land before per-node ones
    let mut keys: Vec<&String> = configs.keys().collect();
    keys.sort();

    for key in keys {
        let value = &configs[key];
        match key.as_str() {
            "cluster.name" => decl.cluster.name = value.clone(),
            "cluster.endpoint" => decl.cluster.endpoint = value.clone(),
            "cluster.talos-version" => decl.cluster.talos_version = value.clone(),
            "lifecycle.dial-timeout" => {
                decl.lifecycle.dial_timeout_secs = Some(parse_secs(key, value)?)
            }
            "lifecycle.retry-interval" => {
                decl.lifecycle.retry_interval_secs = Some(parse_secs(key, value)?)
            }
            "lifecycle.ready-deadline" => {
                decl.lifecycle.ready_deadline_secs = Some(parse_secs(key, value)?)
            }
            "lifecycle.rpc-timeout" => {
                decl.lifecycle.rpc_timeout_secs = Some(parse_secs(key, value)?)
            }
            "lifecycle.reset-grace" => {
                decl.lifecycle.reset_grace_secs = Some(parse_secs(key, value)?)
            }
            "lifecycle.hypervisor-socket" => {
                decl.lifecycle.hypervisor_socket = Some(value.clone())
            }
            "install.image" => {
                decl.cluster
                    .facets
                    .install
                    .get_or_insert_with(InstallFacet::default)
                    .image = value.clone();
                for node in decl.nodes.iter_mut() {
                    if let Some(install) = node.facets.install.as_mut() {
                        install.image = value.clone();
                    }
                }
            }
            other => match other.strip_prefix("nodes.") {
                Some(rest) => apply_node_override(decl, key, rest, value)?,
                None => {
                    return Err(ProvisionError::config_error(format!(
                        "Unknown dynamic config key '{}'",
                        key
                    )))
                }
            },
        }
    }
    Ok(())
}

fn apply_node_override(
    decl: &mut NodeDeclaration,
    key: &str,
    rest: &str,
    value: &str,
) -> Result<()> {
    let (name, field) = rest.split_once('.').ok_or_else(|| {
        ProvisionError::config_error(format!("Dynamic config '{}' names no node field", key))
    })?;
    let node: &mut NodeSpec = decl
        .nodes
        .iter_mut()
        .find(|n| n.name == name)
        .ok_or_else(|| {
            ProvisionError::config_error(format!("Dynamic config '{}': no node named '{}'", key, name))
        })?;

    match field {
        "provisioning-address" => node.provisioning_address = value.to_string(),
        "runtime-address" => node.runtime_address = Some(value.to_string()),
        "apply-mode" => node.apply_mode = value.parse::<ApplyMode>()?,
        "bootstrap" => node.bootstrap = parse_bool(key, value)?,
        "install.disk" => {
            node.facets
                .install
                .get_or_insert_with(InstallFacet::default)
                .disk = value.to_string()
        }
        "install.image" => {
            node.facets
                .install
                .get_or_insert_with(InstallFacet::default)
                .image = value.to_string()
        }
        _ => {
            return Err(ProvisionError::config_error(format!(
                "Unknown dynamic config key '{}'",
                key
            )))
        }
    }
    Ok(())
}
