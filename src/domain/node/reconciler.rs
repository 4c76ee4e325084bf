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

use super::drift::DriftReport;
use super::lifecycle::NodeLifecycleRecord;
use crate::domain::config::document::MachineConfig;
use crate::domain::config::facets::MachineFacets;
use crate::domain::synthesis::read_back;
use crate::infrastructure::constants::{
    MACHINE_CONFIG_ID, MACHINE_CONFIG_NAMESPACE, MACHINE_CONFIG_TYPE,
};
use crate::infrastructure::talos::{NodeConnector, TlsMode};
use crate::shared::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Fetch the node's authoritative config; unreachable is an error.
    #[default]
    Live,
    /// Trust the declared state without contacting the node.
    Skip,
}

/// Reads live machine config back into declared form.
pub struct Reconciler {
    connector: Arc<dyn NodeConnector>,
}

impl Reconciler {
    pub fn new(connector: Arc<dyn NodeConnector>) -> Self {
        Self { connector }
    }

    /// The node's current config document.
    ///
    /// Every failure except cancellation is reported as a drift read error.
    pub async fn fetch_config(
        &self,
        record: &NodeLifecycleRecord,
        cancel: &CancellationToken,
    ) -> Result<MachineConfig> {
        let address = record.runtime_address.as_str();
        let fetch = async {
            let tls = TlsMode::mutual(record.secrets()?);
            let client = self.connector.connect(address, &tls, cancel).await?;
            let yaml = client
                .get_resource(
                    MACHINE_CONFIG_NAMESPACE,
                    MACHINE_CONFIG_TYPE,
                    MACHINE_CONFIG_ID,
                    cancel,
                )
                .await?;
            let text = String::from_utf8(yaml).map_err(|e| {
                ProvisionError::validation(format!("machine config is not UTF-8: {}", e))
            })?;
            MachineConfig::from_yaml(&text)
        };

        fetch.await.map_err(|e| match e {
            ProvisionError::Cancelled(_) => e,
            other => ProvisionError::drift_read(address, other.to_string()),
        })
    }

    /// Observed facets of the node, or `declared` unchanged with [`ReadMode::Skip`].
    pub async fn read(
        &self,
        record: &NodeLifecycleRecord,
        declared: &MachineFacets,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Result<MachineFacets> {
        match mode {
            ReadMode::Skip => {
                debug!("Skipping live read of '{}'", record.node_name);
                Ok(declared.clone())
            }
            ReadMode::Live => {
                let config = self.fetch_config(record, cancel).await?;
                info!("Read machine config of '{}'", record.node_name);
                Ok(read_back(&config))
            }
        }
    }

    pub async fn drift(
        &self,
        record: &NodeLifecycleRecord,
        declared: &MachineFacets,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Result<DriftReport> {
        let observed = self.read(record, declared, mode, cancel).await?;
        DriftReport::between(declared, &observed)
    }
}
