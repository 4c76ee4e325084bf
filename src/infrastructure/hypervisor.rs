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

//! QMP control socket of a local test VM.
//!
//! Used only by ephemeral test environments to hard-reset a VM after the
//! machine API reset. Messages are one JSON object per line.

use crate::infrastructure::constants::{QMP_CAPABILITIES, QMP_SYSTEM_RESET};
use crate::shared::error::{ProvisionError, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

pub struct QmpClient {
    path: PathBuf,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl QmpClient {
    /// Connect and consume the server greeting.
    pub async fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await.map_err(|e| {
            ProvisionError::connectivity(path.display().to_string(), e.to_string())
        })?;
        let (read, writer) = stream.into_split();
        let mut client = Self {
            path: path.to_path_buf(),
            lines: BufReader::new(read).lines(),
            writer,
        };

        let greeting = client.next_message().await?;
        if greeting.get("QMP").is_none() {
            return Err(client.protocol_error(format!("expected QMP greeting, got {}", greeting)));
        }
        debug!("QMP greeting from {}", client.path.display());
        Ok(client)
    }

    /// Send one command and wait for its `return`.
    pub async fn execute(&mut self, command: &str) -> Result<Value> {
        let mut line = json!({ "execute": command }).to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        let reply = self.next_message().await?;
        if let Some(ret) = reply.get("return") {
            debug!("QMP {} on {} returned", command, self.path.display());
            return Ok(ret.clone());
        }
        if let Some(err) = reply.get("error") {
            return Err(ProvisionError::Rpc {
                code: err
                    .get("class")
                    .and_then(Value::as_str)
                    .unwrap_or("GenericError")
                    .to_string(),
                message: err
                    .get("desc")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Err(self.protocol_error(format!("unexpected reply to {}: {}", command, reply)))
    }

    /// Next non-event message.
    async fn next_message(&mut self) -> Result<Value> {
        loop {
            let line = self
                .lines
                .next_line()
                .await?
                .ok_or_else(|| self.protocol_error("socket closed".to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line)?;
            if let Some(event) = value.get("event") {
                debug!("Skipping QMP event {} on {}", event, self.path.display());
                continue;
            }
            return Ok(value);
        }
    }

    fn protocol_error(&self, reason: String) -> ProvisionError {
        ProvisionError::connectivity(self.path.display().to_string(), reason)
    }
}

/// Greeting, capability negotiation, then `system_reset`, all within `timeout`.
pub async fn system_reset(path: &Path, timeout: Duration) -> Result<()> {
    let drain = async {
        let mut client = QmpClient::connect(path).await?;
        client.execute(QMP_CAPABILITIES).await?;
        client.execute(QMP_SYSTEM_RESET).await?;
        Ok::<(), ProvisionError>(())
    };
    tokio::time::timeout(timeout, drain).await.map_err(|_| {
        ProvisionError::Timeout(format!(
            "QMP reset on {} exceeded {:?}",
            path.display(),
            timeout
        ))
    })?
}
