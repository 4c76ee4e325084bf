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

//! Cluster secrets and PKI

pub mod bundle;
pub mod client_config;
pub mod clock;
pub mod pki;
pub mod version;

pub use self::bundle::{CertificateSet, SecretsBundle};
pub use self::client_config::{kubeconfig, talosconfig, TalosConfig, TalosContext};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::pki::CertAndKey;
pub use self::version::VersionContract;
