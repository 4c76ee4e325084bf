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

use super::client::KubeNodeClient;
use crate::infrastructure::constants::NODE_CONDITION_READY;
use crate::shared::error::{ProvisionError, Result};
use k8s_openapi::api::core::v1::Node;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Names of nodes whose `Ready` condition is `True`.
pub fn ready_node_names(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter(|node| {
            node.status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .map(|conditions| {
                    conditions
                        .iter()
                        .any(|c| c.type_ == NODE_CONDITION_READY && c.status == "True")
                })
                .unwrap_or(false)
        })
        .filter_map(|node| node.metadata.name.clone())
        .collect()
}

/// Poll until at least `expected` nodes are ready.
///
/// List failures are expected while the API server is still coming up and
/// are retried until the deadline.
pub async fn wait_for_ready_nodes(
    client: &dyn KubeNodeClient,
    expected: usize,
    deadline: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let until = Instant::now() + deadline;
    let mut last_seen = 0usize;

    loop {
        match client.list_nodes().await {
            Ok(nodes) => {
                let ready = ready_node_names(&nodes);
                if ready.len() != last_seen {
                    info!("{}/{} nodes ready", ready.len(), expected);
                    last_seen = ready.len();
                }
                if ready.len() >= expected {
                    return Ok(ready);
                }
            }
            Err(e) => debug!("Listing nodes failed: {}", e),
        }

        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ProvisionError::Timeout(format!(
                "only {}/{} nodes ready after {:?}",
                last_seen, expected, deadline
            )));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ProvisionError::Cancelled("cluster health wait".to_string()));
            }
            _ = tokio::time::sleep(poll_interval.min(remaining)) => {}
        }
    }
}
