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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use talos_forge::domain::config::facets::InstallFacet;
use talos_forge::domain::config::generate_base;
use talos_forge::domain::secrets::SystemClock;
use talos_forge::infrastructure::talos::DialOptions;
use talos_forge::*;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn bundle() -> Arc<SecretsBundle> {
    Arc::new(SecretsBundle::generate("lifecycle", VersionContract::V1_5, &SystemClock).unwrap())
}

fn short_options() -> LifecycleOptions {
    LifecycleOptions {
        dial_timeout: Duration::from_millis(300),
        retry_interval: Duration::from_millis(100),
        ready_deadline: Duration::from_secs(1),
        rpc_timeout: Duration::from_secs(1),
        reset_grace: Duration::from_millis(10),
        hypervisor_socket: None,
    }
}

fn real_connector(options: &LifecycleOptions) -> Arc<dyn NodeConnector> {
    Arc::new(NodeConnectorImpl::new(options.dial_options(), options.rpc_timeout))
}

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

fn worker_config(bundle: &SecretsBundle) -> MachineConfig {
    generate_base(bundle, MachineType::Worker, "https://10.0.0.10:6443").unwrap()
}

#[tokio::test]
async fn test_apply_to_silent_node_fails_within_deadline() {
    // accepts TCP but never answers the TLS handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let options = short_options();
    let manager = NodeLifecycleManager::new(real_connector(&options), options.clone());
    let secrets = bundle();
    let mut record = NodeLifecycleRecord::new(
        "silent",
        MachineType::Worker,
        address.clone(),
        address,
        secrets.clone(),
    );

    let started = Instant::now();
    let err = manager
        .apply(
            &mut record,
            &worker_config(&secrets),
            ApplyMode::Auto,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Connectivity { .. }), "{}", err);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(record.state, NodeState::Unprovisioned);
    drop(listener);
}

#[tokio::test]
async fn test_reset_of_unreachable_node_reports_connectivity() {
    let address = closed_port().await;
    let options = short_options();
    let manager = NodeLifecycleManager::new(real_connector(&options), options.clone());
    let mut record = NodeLifecycleRecord::new(
        "gone-away",
        MachineType::Worker,
        address.clone(),
        address,
        bundle(),
    );
    record.state = NodeState::Applied;

    let started = Instant::now();
    let err = manager
        .reset(&mut record, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Connectivity { .. }), "{}", err);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(record.state, NodeState::Applied);
}

#[tokio::test]
async fn test_cancelled_apply_stops_retrying() {
    let address = closed_port().await;
    let mut options = short_options();
    options.ready_deadline = Duration::from_secs(30);
    let manager = NodeLifecycleManager::new(real_connector(&options), options.clone());
    let secrets = bundle();
    let mut record = NodeLifecycleRecord::new(
        "cancelled",
        MachineType::Worker,
        address.clone(),
        address,
        secrets.clone(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = manager
        .apply(&mut record, &worker_config(&secrets), ApplyMode::Auto, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Cancelled(_)), "{}", err);
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Counts bootstrap calls across every client it hands out.
#[derive(Default)]
struct CountingConnector {
    bootstraps: Arc<AtomicUsize>,
}

struct CountingClient {
    address: String,
    bootstraps: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl MachineClient for CountingClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn apply_configuration(
        &self,
        _data: Vec<u8>,
        mode: ApplyMode,
        _cancel: &CancellationToken,
    ) -> Result<PatchDescriptor> {
        Ok(PatchDescriptor {
            hostname: self.address.clone(),
            mode: if mode == ApplyMode::Auto { ApplyMode::Reboot } else { mode },
            mode_details: String::new(),
            warnings: Vec::new(),
        })
    }

    async fn bootstrap(&self, _cancel: &CancellationToken) -> Result<()> {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self, _graceful: bool, _reboot: bool, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn get_resource(
        &self,
        _namespace: &str,
        _resource_type: &str,
        _id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        Err(ProvisionError::Rpc {
            code: "NotFound".to_string(),
            message: "no resource".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl NodeConnector for CountingConnector {
    async fn connect(
        &self,
        address: &str,
        _tls: &TlsMode,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn MachineClient>> {
        Ok(Box::new(CountingClient {
            address: address.to_string(),
            bootstraps: self.bootstraps.clone(),
        }))
    }
}

#[tokio::test]
async fn test_bootstrap_issued_once() {
    let connector = Arc::new(CountingConnector::default());
    let bootstraps = connector.bootstraps.clone();
    let manager = NodeLifecycleManager::new(connector, short_options());
    let secrets = bundle();
    let config =
        generate_base(&secrets, MachineType::ControlPlane, "https://10.0.0.10:6443").unwrap();
    let mut record = NodeLifecycleRecord::new(
        "cp-1",
        MachineType::ControlPlane,
        "10.0.0.10",
        "10.0.0.10",
        secrets,
    );
    let cancel = CancellationToken::new();

    let patch = manager
        .provision(&mut record, &config, ApplyMode::Auto, true, &cancel)
        .await
        .unwrap();
    assert_eq!(patch.mode, ApplyMode::Reboot);
    assert!(record.bootstrapped);
    assert_eq!(record.state, NodeState::Applied);

    assert!(!manager.bootstrap(&mut record, &cancel).await.unwrap());
    manager
        .provision(&mut record, &config, ApplyMode::NoReboot, true, &cancel)
        .await
        .unwrap();
    assert_eq!(bootstraps.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_skip_read_returns_declared_without_dialing() {
    let address = closed_port().await;
    let options = short_options();
    let reconciler = Reconciler::new(real_connector(&options));
    let mut record = NodeLifecycleRecord::new(
        "offline",
        MachineType::Worker,
        address.clone(),
        address,
        bundle(),
    );
    record.state = NodeState::Applied;
    let declared = MachineFacets {
        install: Some(InstallFacet {
            disk: "/dev/vda".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let cancel = CancellationToken::new();

    let skipped = reconciler
        .read(&record, &declared, ReadMode::Skip, &cancel)
        .await
        .unwrap();
    assert_eq!(skipped, declared);
    assert!(reconciler
        .drift(&record, &declared, ReadMode::Skip, &cancel)
        .await
        .unwrap()
        .is_clean());

    let err = reconciler
        .read(&record, &declared, ReadMode::Live, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::DriftRead { .. }), "{}", err);
}
