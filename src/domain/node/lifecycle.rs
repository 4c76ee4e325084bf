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

//! Node lifecycle over the machine API.
//!
//! Every operation works on a copy of the record and writes it back only on
//! success, so a failed dial or RPC never persists a partial state change.
//! Two facts survive a failure: that an apply RPC was sent, and a completed
//! apply whose follow-up bootstrap failed. Reset relies on both to decide
//! whether the node has to be wiped.

use super::patch::{ApplyMode, PatchDescriptor};
use crate::domain::config::document::{MachineConfig, MachineType};
use crate::domain::secrets::SecretsBundle;
use crate::infrastructure::constants::{
    DEFAULT_DIAL_TIMEOUT_SECS, DEFAULT_READY_DEADLINE_SECS, DEFAULT_RESET_GRACE_SECS,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_RPC_TIMEOUT_SECS,
};
use crate::infrastructure::hypervisor;
use crate::infrastructure::talos::{DialOptions, NodeConnector, TlsMode};
use crate::shared::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Unprovisioned,
    AwaitingReady,
    Applying,
    Bootstrapping,
    Applied,
    Resetting,
    Gone,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Unprovisioned => "unprovisioned",
            NodeState::AwaitingReady => "awaiting_ready",
            NodeState::Applying => "applying",
            NodeState::Bootstrapping => "bootstrapping",
            NodeState::Applied => "applied",
            NodeState::Resetting => "resetting",
            NodeState::Gone => "gone",
        }
    }

    pub fn can_transition_to(&self, next: NodeState) -> bool {
        use NodeState::*;
        match (*self, next) {
            (Gone, _) => false,
            (_, Resetting) => true,
            (Unprovisioned, AwaitingReady) => true,
            // configuration update on a running node
            (Applied, AwaitingReady) => true,
            (AwaitingReady, Applying) => true,
            (Applying, Bootstrapping) | (Applying, Applied) => true,
            (Applied, Bootstrapping) => true,
            (Bootstrapping, Applied) => true,
            (Resetting, Gone) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing knobs for lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub dial_timeout: Duration,
    pub retry_interval: Duration,
    pub ready_deadline: Duration,
    pub rpc_timeout: Duration,
    /// Wait between the reset RPC and the hypervisor drain.
    pub reset_grace: Duration,
    /// QMP socket of a local test VM; enables the post-reset drain.
    pub hypervisor_socket: Option<PathBuf>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            ready_deadline: Duration::from_secs(DEFAULT_READY_DEADLINE_SECS),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            reset_grace: Duration::from_secs(DEFAULT_RESET_GRACE_SECS),
            hypervisor_socket: None,
        }
    }
}

impl LifecycleOptions {
    pub fn dial_options(&self) -> DialOptions {
        DialOptions {
            dial_timeout: self.dial_timeout,
            retry_interval: self.retry_interval,
            deadline: self.ready_deadline,
        }
    }
}

/// Persistent per-node lifecycle state.
///
/// The secrets bundle is stored separately by the caller and attached after
/// loading with [`NodeLifecycleRecord::with_secrets`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLifecycleRecord {
    pub node_name: String,
    pub machine_type: MachineType,
    pub provisioning_address: String,
    pub runtime_address: String,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub last_applied: Option<PatchDescriptor>,
    #[serde(default)]
    pub bootstrapped: bool,
    /// An apply RPC was sent, whether or not it was acknowledged.
    #[serde(default)]
    pub apply_attempted: bool,
    #[serde(skip)]
    secrets: Option<Arc<SecretsBundle>>,
}

impl NodeLifecycleRecord {
    pub fn new(
        node_name: impl Into<String>,
        machine_type: MachineType,
        provisioning_address: impl Into<String>,
        runtime_address: impl Into<String>,
        secrets: Arc<SecretsBundle>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            machine_type,
            provisioning_address: provisioning_address.into(),
            runtime_address: runtime_address.into(),
            state: NodeState::Unprovisioned,
            last_applied: None,
            bootstrapped: false,
            apply_attempted: false,
            secrets: Some(secrets),
        }
    }

    pub fn with_secrets(mut self, secrets: Arc<SecretsBundle>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn secrets(&self) -> Result<&Arc<SecretsBundle>> {
        self.secrets.as_ref().ok_or_else(|| {
            ProvisionError::config_error(format!(
                "node '{}' has no secrets bundle attached",
                self.node_name
            ))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str, secrets: Arc<SecretsBundle>) -> Result<Self> {
        let record: NodeLifecycleRecord = serde_json::from_str(content)?;
        Ok(record.with_secrets(secrets))
    }

    fn transition(&mut self, next: NodeState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ProvisionError::invalid_transition(self.state, next));
        }
        debug!("Node '{}': {} -> {}", self.node_name, self.state, next);
        self.state = next;
        Ok(())
    }

    fn secure_channel(&self) -> Result<TlsMode> {
        Ok(TlsMode::mutual(self.secrets()?))
    }

    /// Whether the node may hold any configuration from this record.
    fn may_be_configured(&self) -> bool {
        self.state != NodeState::Unprovisioned || self.last_applied.is_some() || self.apply_attempted
    }
}

pub struct NodeLifecycleManager {
    connector: Arc<dyn NodeConnector>,
    options: LifecycleOptions,
}

impl NodeLifecycleManager {
    pub fn new(connector: Arc<dyn NodeConnector>, options: LifecycleOptions) -> Self {
        Self { connector, options }
    }

    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    /// Apply `config` to the node.
    ///
    /// A first apply reaches the provisioning address over an unauthenticated
    /// channel; later applies reach the runtime address over mTLS.
    pub async fn apply(
        &self,
        record: &mut NodeLifecycleRecord,
        config: &MachineConfig,
        mode: ApplyMode,
        cancel: &CancellationToken,
    ) -> Result<PatchDescriptor> {
        let mut working = record.clone();
        let patch = match self.apply_on(&mut working, config, mode, cancel).await {
            Ok(patch) => patch,
            Err(e) => {
                record.apply_attempted |= working.apply_attempted;
                return Err(e);
            }
        };
        working.transition(NodeState::Applied)?;
        *record = working;
        Ok(patch)
    }

    /// Apply, then bootstrap the control plane when `bootstrap` is set.
    ///
    /// A bootstrap failure is returned after the apply has been recorded.
    pub async fn provision(
        &self,
        record: &mut NodeLifecycleRecord,
        config: &MachineConfig,
        mode: ApplyMode,
        bootstrap: bool,
        cancel: &CancellationToken,
    ) -> Result<PatchDescriptor> {
        let mut working = record.clone();
        let patch = match self.apply_on(&mut working, config, mode, cancel).await {
            Ok(patch) => patch,
            Err(e) => {
                record.apply_attempted |= working.apply_attempted;
                return Err(e);
            }
        };
        let bootstrapped = if bootstrap && !working.bootstrapped {
            self.bootstrap_on(&mut working, cancel).await
        } else {
            Ok(())
        };
        // the node runs the new config even when bootstrap failed
        working.transition(NodeState::Applied)?;
        *record = working;
        bootstrapped.map(|()| patch)
    }

    /// Bootstrap etcd on an applied control-plane node, at most once per record.
    ///
    /// Returns whether the bootstrap RPC was issued.
    pub async fn bootstrap(
        &self,
        record: &mut NodeLifecycleRecord,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if record.bootstrapped {
            info!("Node '{}' already bootstrapped, skipping", record.node_name);
            return Ok(false);
        }
        let mut working = record.clone();
        self.bootstrap_on(&mut working, cancel).await?;
        working.transition(NodeState::Applied)?;
        *record = working;
        Ok(true)
    }

    /// Wipe the node and reboot it into maintenance mode.
    ///
    /// With a hypervisor socket configured, the VM is also hard-reset after
    /// the grace wait. That step is best-effort and never replaces the result
    /// of the reset RPC.
    pub async fn reset(
        &self,
        record: &mut NodeLifecycleRecord,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if record.state == NodeState::Gone {
            info!("Node '{}' already gone", record.node_name);
            return Ok(());
        }

        let mut working = record.clone();
        let was_provisioned = working.may_be_configured();
        working.transition(NodeState::Resetting)?;

        let rpc_result = if was_provisioned {
            self.reset_rpc(&working, cancel).await
        } else {
            debug!(
                "Node '{}' was never provisioned, skipping reset RPC",
                working.node_name
            );
            Ok(())
        };

        if let Some(socket) = &self.options.hypervisor_socket {
            let drain = async {
                tokio::time::sleep(self.options.reset_grace).await;
                hypervisor::system_reset(socket, self.options.rpc_timeout).await
            };
            tokio::select! {
                _ = cancel.cancelled() => warn!(
                    "Hypervisor reset of '{}' skipped: cancelled",
                    working.node_name
                ),
                drained = drain => match drained {
                    Ok(()) => info!("Hypervisor reset of '{}' via {}", working.node_name, socket.display()),
                    Err(e) => warn!(
                        "Hypervisor reset of '{}' via {} failed: {}",
                        working.node_name,
                        socket.display(),
                        e
                    ),
                },
            }
        }

        rpc_result?;
        working.transition(NodeState::Gone)?;
        working.last_applied = None;
        working.bootstrapped = false;
        working.apply_attempted = false;
        *record = working;
        Ok(())
    }

    async fn apply_on(
        &self,
        working: &mut NodeLifecycleRecord,
        config: &MachineConfig,
        mode: ApplyMode,
        cancel: &CancellationToken,
    ) -> Result<PatchDescriptor> {
        let first = working.state == NodeState::Unprovisioned;
        working.transition(NodeState::AwaitingReady)?;

        let (address, tls) = if first {
            (working.provisioning_address.clone(), TlsMode::Insecure)
        } else {
            (working.runtime_address.clone(), working.secure_channel()?)
        };
        info!(
            "Waiting for node '{}' at {} ({})",
            working.node_name,
            address,
            tls.as_str()
        );
        let client = self.connector.connect(&address, &tls, cancel).await?;

        working.transition(NodeState::Applying)?;
        let data = config.to_yaml()?.into_bytes();
        working.apply_attempted = true;
        let patch = client.apply_configuration(data, mode, cancel).await?;
        for warning in &patch.warnings {
            warn!("Node '{}': {}", working.node_name, warning);
        }
        info!(
            "Applied configuration to '{}' at {} (mode {})",
            working.node_name,
            client.address(),
            patch.mode
        );
        working.last_applied = Some(patch.clone());
        Ok(patch)
    }

    async fn bootstrap_on(
        &self,
        working: &mut NodeLifecycleRecord,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !working.machine_type.is_control_plane() {
            return Err(ProvisionError::validation(format!(
                "node '{}' is a {} node; only control-plane nodes bootstrap",
                working.node_name,
                working.machine_type.as_str()
            )));
        }
        working.transition(NodeState::Bootstrapping)?;

        let tls = working.secure_channel()?;
        let client = self
            .connector
            .connect(&working.runtime_address, &tls, cancel)
            .await?;
        match client.bootstrap(cancel).await {
            Ok(()) => info!(
                "Bootstrapped etcd on '{}' at {}",
                working.node_name,
                client.address()
            ),
            Err(e) if e.rpc_code() == Some("AlreadyExists") => {
                info!("Node '{}' reports etcd already bootstrapped", working.node_name)
            }
            Err(e) => return Err(e),
        }
        working.bootstrapped = true;
        Ok(())
    }

    async fn reset_rpc(&self, working: &NodeLifecycleRecord, cancel: &CancellationToken) -> Result<()> {
        let tls = working.secure_channel()?;
        let client = self
            .connector
            .connect(&working.runtime_address, &tls, cancel)
            .await?;
        client.reset(false, true, cancel).await?;
        info!("Reset issued to '{}' at {}", working.node_name, client.address());
        Ok(())
    }
}
