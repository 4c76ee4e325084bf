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

/// Machine API (apid) port
pub const DEFAULT_APID_PORT: u16 = 50000;

/// Kubernetes API port used when the endpoint omits one
pub const DEFAULT_KUBE_API_PORT: u16 = 6443;

/// Authoritative machine config resource
pub const MACHINE_CONFIG_NAMESPACE: &str = "config";
pub const MACHINE_CONFIG_TYPE: &str = "MachineConfigs.config.talos.dev";
pub const MACHINE_CONFIG_ID: &str = "v1alpha1";

/// Default lifecycle timing (seconds)
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_READY_DEADLINE_SECS: u64 = 600;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RESET_GRACE_SECS: u64 = 10;

/// Cluster health probe
pub const DEFAULT_HEALTH_DEADLINE_SECS: u64 = 900;
pub const HEALTH_POLL_INTERVAL_SECS: u64 = 10;
pub const NODE_CONDITION_READY: &str = "Ready";

/// Client config defaults
pub const DEFAULT_TALOSCONFIG_FILE: &str = "talosconfig";
pub const DEFAULT_KUBECONFIG_FILE: &str = "kubeconfig";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.yaml";
pub const DEFAULT_STATE_DIR: &str = ".talos-forge";

/// QMP commands
pub const QMP_CAPABILITIES: &str = "qmp_capabilities";
pub const QMP_SYSTEM_RESET: &str = "system_reset";
