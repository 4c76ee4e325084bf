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

use crate::shared::error::{ProvisionError, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};

#[async_trait::async_trait]
pub trait KubeNodeClient: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

pub struct KubeNodeClientImpl {
    client: Client,
}

impl KubeNodeClientImpl {
    /// Build a client from kubeconfig text, such as the generated admin kubeconfig.
    pub async fn from_kubeconfig_yaml(yaml: &str, context: Option<String>) -> Result<Self> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = Kubeconfig::from_yaml(yaml)
            .map_err(|e| ProvisionError::Kube(format!("Failed to parse kubeconfig: {}", e)))?;

        let config_options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
            .await
            .map_err(|e| {
                ProvisionError::Kube(format!("Failed to create Kubernetes config: {}", e))
            })?;

        let client = Client::try_from(config).map_err(|e| {
            ProvisionError::Kube(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client })
    }

    pub fn get_client(&self) -> Client {
        self.client.clone()
    }
}

#[async_trait::async_trait]
impl KubeNodeClient for KubeNodeClientImpl {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;
        Ok(nodes.items)
    }
}
