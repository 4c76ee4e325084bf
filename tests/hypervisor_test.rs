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

use serde_json::Value;
use std::time::Duration;
use talos_forge::infrastructure::hypervisor::system_reset;
use talos_forge::ProvisionError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

#[tokio::test]
async fn test_system_reset_negotiates_then_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qmp.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();

        write
            .write_all(b"{\"QMP\": {\"version\": {}, \"capabilities\": []}}\n")
            .await
            .unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        received.push(serde_json::from_str::<Value>(&line).unwrap());
        write
            .write_all(b"{\"event\": \"RESUME\", \"timestamp\": {}}\n{\"return\": {}}\n")
            .await
            .unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        received.push(serde_json::from_str::<Value>(&line).unwrap());
        write.write_all(b"{\"return\": {}}\n").await.unwrap();
        received
    });

    system_reset(&path, Duration::from_secs(5)).await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["execute"], "qmp_capabilities");
    assert_eq!(received[1]["execute"], "system_reset");
}

#[tokio::test]
async fn test_silent_socket_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qmp.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let err = system_reset(&path, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Timeout(_)), "{}", err);
    drop(listener);
}
