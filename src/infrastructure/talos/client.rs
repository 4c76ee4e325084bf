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

use super::dial::{dial_with_retry, DialOptions, NodeAddress};
use super::proto::{
    self, ApplyConfigurationMode, ApplyConfigurationRequest, ApplyConfigurationResponse,
    BootstrapRequest, BootstrapResponse, GetRequest, GetResponse, Metadata, ResetRequest,
    ResetResponse,
};
use super::tls::TlsMode;
use crate::domain::node::{ApplyMode, PatchDescriptor};
use crate::infrastructure::constants::DEFAULT_RPC_TIMEOUT_SECS;
use crate::shared::error::{ProvisionError, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::Request;
use tracing::debug;

#[async_trait::async_trait]
pub trait MachineClient: Send + Sync {
    fn address(&self) -> &str;

    async fn apply_configuration(
        &self,
        data: Vec<u8>,
        mode: ApplyMode,
        cancel: &CancellationToken,
    ) -> Result<PatchDescriptor>;

    async fn bootstrap(&self, cancel: &CancellationToken) -> Result<()>;

    async fn reset(&self, graceful: bool, reboot: bool, cancel: &CancellationToken) -> Result<()>;

    /// YAML spec of one resource.
    async fn get_resource(
        &self,
        namespace: &str,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;
}

/// Opens machine API sessions.
#[async_trait::async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        tls: &TlsMode,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn MachineClient>>;
}

pub struct MachineClientImpl {
    grpc: Grpc<Channel>,
    address: String,
    rpc_timeout: Duration,
}

impl MachineClientImpl {
    pub fn new(channel: Channel, address: impl Into<String>, rpc_timeout: Duration) -> Self {
        Self {
            grpc: Grpc::new(channel),
            address: address.into(),
            rpc_timeout,
        }
    }

    async fn call<Req, Resp>(
        &self,
        path: &'static str,
        request: Req,
        cancel: &CancellationToken,
    ) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.grpc.clone();
        let exchange = async {
            grpc.ready()
                .await
                .map_err(|e| ProvisionError::connectivity(self.address.clone(), e.to_string()))?;
            let response = grpc
                .unary(
                    Request::new(request),
                    PathAndQuery::from_static(path),
                    ProstCodec::default(),
                )
                .await?;
            Ok::<Resp, ProvisionError>(response.into_inner())
        };

        debug!("Calling {} on {}", path, self.address);
        tokio::select! {
            _ = cancel.cancelled() => {
                Err(ProvisionError::Cancelled(format!("{} on {}", path, self.address)))
            }
            res = tokio::time::timeout(self.rpc_timeout, exchange) => match res {
                Ok(inner) => inner,
                Err(_) => Err(ProvisionError::Timeout(format!(
                    "{} on {} exceeded {:?}",
                    path, self.address, self.rpc_timeout
                ))),
            },
        }
    }
}

/// Per-node errors are reported inside the response body, not as a status.
fn check_metadata(metadata: Option<&Metadata>) -> Result<()> {
    match metadata {
        Some(m) if !m.error.is_empty() => Err(ProvisionError::Rpc {
            code: "Unknown".to_string(),
            message: if m.hostname.is_empty() {
                m.error.clone()
            } else {
                format!("{}: {}", m.hostname, m.error)
            },
        }),
        _ => Ok(()),
    }
}

fn to_wire_mode(mode: ApplyMode) -> ApplyConfigurationMode {
    match mode {
        ApplyMode::Reboot => ApplyConfigurationMode::Reboot,
        ApplyMode::Auto => ApplyConfigurationMode::Auto,
        ApplyMode::NoReboot => ApplyConfigurationMode::NoReboot,
        ApplyMode::Staged => ApplyConfigurationMode::Staged,
    }
}

fn from_wire_mode(mode: i32, requested: ApplyMode) -> ApplyMode {
    match ApplyConfigurationMode::try_from(mode) {
        Ok(ApplyConfigurationMode::Reboot) => ApplyMode::Reboot,
        Ok(ApplyConfigurationMode::Auto) => ApplyMode::Auto,
        Ok(ApplyConfigurationMode::NoReboot) => ApplyMode::NoReboot,
        Ok(ApplyConfigurationMode::Staged) => ApplyMode::Staged,
        _ => requested,
    }
}

#[async_trait::async_trait]
impl MachineClient for MachineClientImpl {
    fn address(&self) -> &str {
        &self.address
    }

    async fn apply_configuration(
        &self,
        data: Vec<u8>,
        mode: ApplyMode,
        cancel: &CancellationToken,
    ) -> Result<PatchDescriptor> {
        let request = ApplyConfigurationRequest {
            data,
            mode: to_wire_mode(mode) as i32,
            dry_run: false,
        };
        let response: ApplyConfigurationResponse = self
            .call(proto::APPLY_CONFIGURATION_PATH, request, cancel)
            .await?;

        let message = response.messages.into_iter().next().ok_or_else(|| ProvisionError::Rpc {
            code: "Unknown".to_string(),
            message: format!("{} returned an empty apply response", self.address),
        })?;
        check_metadata(message.metadata.as_ref())?;

        Ok(PatchDescriptor {
            hostname: message.metadata.map(|m| m.hostname).unwrap_or_default(),
            mode: from_wire_mode(message.mode, mode),
            mode_details: message.mode_details,
            warnings: message.warnings,
        })
    }

    async fn bootstrap(&self, cancel: &CancellationToken) -> Result<()> {
        let response: BootstrapResponse = self
            .call(proto::BOOTSTRAP_PATH, BootstrapRequest::default(), cancel)
            .await?;
        for message in &response.messages {
            check_metadata(message.metadata.as_ref())?;
        }
        Ok(())
    }

    async fn reset(&self, graceful: bool, reboot: bool, cancel: &CancellationToken) -> Result<()> {
        let response: ResetResponse = self
            .call(proto::RESET_PATH, ResetRequest { graceful, reboot }, cancel)
            .await?;
        for message in &response.messages {
            check_metadata(message.metadata.as_ref())?;
            debug!("Reset accepted by {} (actor {})", self.address, message.actor_id);
        }
        Ok(())
    }

    async fn get_resource(
        &self,
        namespace: &str,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let request = GetRequest {
            namespace: namespace.to_string(),
            r#type: resource_type.to_string(),
            id: id.to_string(),
        };
        let response: GetResponse = self.call(proto::RESOURCE_GET_PATH, request, cancel).await?;

        let message = response.messages.into_iter().next().ok_or_else(|| ProvisionError::Rpc {
            code: "NotFound".to_string(),
            message: format!("{}/{}/{} returned no messages", namespace, resource_type, id),
        })?;
        check_metadata(message.metadata.as_ref())?;

        message
            .resource
            .and_then(|r| r.spec)
            .map(|s| s.yaml)
            .ok_or_else(|| ProvisionError::Rpc {
                code: "NotFound".to_string(),
                message: format!("{}/{}/{} has no spec", namespace, resource_type, id),
            })
    }
}

/// Dials over TLS with fixed-interval retry.
#[derive(Debug, Clone)]
pub struct NodeConnectorImpl {
    dial: DialOptions,
    rpc_timeout: Duration,
}

impl Default for NodeConnectorImpl {
    fn default() -> Self {
        Self::new(DialOptions::default(), Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS))
    }
}

impl NodeConnectorImpl {
    pub fn new(dial: DialOptions, rpc_timeout: Duration) -> Self {
        Self { dial, rpc_timeout }
    }
}

#[async_trait::async_trait]
impl NodeConnector for NodeConnectorImpl {
    async fn connect(
        &self,
        address: &str,
        tls: &TlsMode,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn MachineClient>> {
        let node = NodeAddress::parse(address)?;
        let channel = dial_with_retry(&node, tls, &self.dial, cancel).await?;
        Ok(Box::new(MachineClientImpl::new(
            channel,
            node.to_string(),
            self.rpc_timeout,
        )))
    }
}
