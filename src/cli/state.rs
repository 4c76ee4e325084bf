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

//! On-disk state of the CLI.
//!
//! ```text
//! <state-dir>/
//!   secrets.yaml        cluster secrets bundle
//!   talosconfig         machine API client config
//!   kubeconfig          admin kubeconfig
//!   configs/<node>.yaml synthesized machine configs
//!   nodes/<node>.json   lifecycle records
//! ```

use crate::domain::config::NodeSpec;
use crate::domain::node::NodeLifecycleRecord;
use crate::domain::secrets::{SecretsBundle, SystemClock, VersionContract};
use crate::infrastructure::constants::DEFAULT_SECRETS_FILE;
use crate::shared::error::{ProvisionError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn secrets_path(&self) -> PathBuf {
        self.dir.join(DEFAULT_SECRETS_FILE)
    }

    fn record_path(&self, node: &str) -> PathBuf {
        self.dir.join("nodes").join(format!("{}.json", node))
    }

    /// Write `contents` under the state dir, creating parents.
    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.dir.join(relative);
        fs::read_to_string(&path).map_err(|e| {
            ProvisionError::config_error(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    pub fn load_secrets(&self) -> Result<Arc<SecretsBundle>> {
        let content = fs::read_to_string(self.secrets_path()).map_err(|e| {
            ProvisionError::config_error(format!(
                "No secrets bundle at {} (run gen first): {}",
                self.secrets_path().display(),
                e
            ))
        })?;
        Ok(Arc::new(SecretsBundle::from_yaml(&content)?))
    }

    /// The stored bundle, or a new one written to disk when there is none.
    pub fn load_or_generate_secrets(
        &self,
        cluster_name: &str,
        contract: VersionContract,
    ) -> Result<Arc<SecretsBundle>> {
        if self.secrets_path().exists() {
            let bundle = self.load_secrets()?;
            if bundle.cluster_name != cluster_name {
                return Err(ProvisionError::config_error(format!(
                    "secrets at {} belong to cluster '{}', not '{}'",
                    self.secrets_path().display(),
                    bundle.cluster_name,
                    cluster_name
                )));
            }
            return Ok(bundle);
        }

        let bundle = SecretsBundle::generate(cluster_name, contract, &SystemClock)?;
        let path = self.write(DEFAULT_SECRETS_FILE, &bundle.to_yaml()?)?;
        info!("Generated secrets bundle at {}", path.display());
        Ok(Arc::new(bundle))
    }

    /// The stored record of `node`, or a fresh unprovisioned one.
    pub fn load_record(
        &self,
        node: &NodeSpec,
        secrets: Arc<SecretsBundle>,
    ) -> Result<NodeLifecycleRecord> {
        let path = self.record_path(&node.name);
        if !path.exists() {
            return Ok(NodeLifecycleRecord::new(
                node.name.clone(),
                node.machine_type,
                node.provisioning_address.clone(),
                node.runtime_address(),
                secrets,
            ));
        }

        let mut record = NodeLifecycleRecord::from_json(&fs::read_to_string(&path)?, secrets)?;
        // addresses follow the declaration
        record.provisioning_address = node.provisioning_address.clone();
        record.runtime_address = node.runtime_address().to_string();
        Ok(record)
    }

    pub fn save_record(&self, record: &NodeLifecycleRecord) -> Result<()> {
        self.write(
            Path::new("nodes").join(format!("{}.json", record.node_name)),
            &record.to_json()?,
        )?;
        Ok(())
    }
}
