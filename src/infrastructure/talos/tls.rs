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

//! TLS settings for the machine API.
//!
//! A node in maintenance mode serves a self-signed certificate and accepts
//! anonymous clients, so the first apply uses [`TlsMode::Insecure`]. Once
//! configured, the node only talks to holders of an admin certificate from
//! the OS root, which [`TlsMode::Mutual`] presents.

use crate::domain::secrets::SecretsBundle;
use crate::shared::error::{ProvisionError, Result};
use openssl::pkey::PKey;
use openssl::ssl::{Ssl, SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use std::sync::Arc;

/// ALPN protocol list advertising HTTP/2 only.
const ALPN_H2: &[u8] = b"\x02h2";

/// PEM material for an mTLS session.
#[derive(Clone)]
pub struct ClientIdentity {
    pub ca_pem: String,
    pub crt_pem: String,
    pub key_pem: String,
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity").finish_non_exhaustive()
    }
}

impl ClientIdentity {
    /// The admin identity: OS root plus the admin client certificate.
    pub fn from_bundle(bundle: &SecretsBundle) -> Self {
        Self {
            ca_pem: bundle.certs.os.crt.clone(),
            crt_pem: bundle.certs.admin.crt.clone(),
            key_pem: bundle.certs.admin.key.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TlsMode {
    /// No client certificate; the server certificate is not verified.
    Insecure,
    /// Client certificate presented; server verified against the OS root.
    Mutual(Arc<ClientIdentity>),
}

impl TlsMode {
    pub fn mutual(bundle: &SecretsBundle) -> Self {
        TlsMode::Mutual(Arc::new(ClientIdentity::from_bundle(bundle)))
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, TlsMode::Mutual(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::Insecure => "insecure",
            TlsMode::Mutual(_) => "mtls",
        }
    }
}

/// Build a reusable connector for `mode`.
pub fn build_connector(mode: &TlsMode) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    builder.set_alpn_protos(ALPN_H2)?;

    match mode {
        TlsMode::Insecure => builder.set_verify(SslVerifyMode::NONE),
        TlsMode::Mutual(identity) => {
            let ca = X509::from_pem(identity.ca_pem.as_bytes())
                .map_err(|e| ProvisionError::pki(format!("invalid OS CA certificate: {}", e)))?;
            let crt = X509::from_pem(identity.crt_pem.as_bytes())
                .map_err(|e| ProvisionError::pki(format!("invalid client certificate: {}", e)))?;
            let key = PKey::private_key_from_pem(identity.key_pem.as_bytes())
                .map_err(|e| ProvisionError::pki(format!("invalid client key: {}", e)))?;

            builder.cert_store_mut().add_cert(ca)?;
            builder.set_certificate(&crt)?;
            builder.set_private_key(&key)?;
            builder.check_private_key()?;
            builder.set_verify(SslVerifyMode::PEER);
        }
    }
    Ok(builder.build())
}

/// Per-connection SSL state for `host`.
pub fn configure(connector: &SslConnector, mode: &TlsMode, host: &str) -> Result<Ssl> {
    let mut config = connector.configure()?;
    if !mode.is_secure() {
        config.set_verify_hostname(false);
    }
    Ok(config.into_ssl(host)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::secrets::{SystemClock, VersionContract};

    #[test]
    fn test_insecure_connector_builds() {
        let connector = build_connector(&TlsMode::Insecure).unwrap();
        configure(&connector, &TlsMode::Insecure, "10.0.0.10").unwrap();
    }

    #[test]
    fn test_mutual_connector_from_bundle() {
        let bundle = SecretsBundle::generate("demo", VersionContract::V1_5, &SystemClock).unwrap();
        let mode = TlsMode::mutual(&bundle);
        assert!(mode.is_secure());
        let connector = build_connector(&mode).unwrap();
        configure(&connector, &mode, "10.0.0.10").unwrap();
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let a = SecretsBundle::generate("a", VersionContract::V1_5, &SystemClock).unwrap();
        let b = SecretsBundle::generate("b", VersionContract::V1_5, &SystemClock).unwrap();
        let mut identity = ClientIdentity::from_bundle(&a);
        identity.key_pem = b.certs.admin.key.clone();
        let err = build_connector(&TlsMode::Mutual(Arc::new(identity))).unwrap_err();
        assert!(matches!(err, ProvisionError::Pki(_)));
    }
}
