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

use super::clock::Clock;
use super::pki::{self, CertAndKey, CertificateAuthority, CLIENT_CERT_VALIDITY_DAYS};
use super::version::VersionContract;
use crate::shared::error::{ProvisionError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const TOKEN_PATTERN: &str = r"^[a-z0-9]{6}\.[a-z0-9]{16}$";
const SECRET_BYTES: usize = 32;

pub const ADMIN_COMMON_NAME: &str = "admin";
pub const ADMIN_ORGANIZATION: &str = "os:admin";

/// One certificate/key pair per trust domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSet {
    pub os: CertAndKey,
    pub etcd: CertAndKey,
    pub k8s: CertAndKey,
    pub k8s_aggregator: CertAndKey,
    /// Key only; service-account tokens are verified against the public half.
    pub k8s_service_account: CertAndKey,
    /// Client certificate issued by the OS root.
    pub admin: CertAndKey,
}

/// Cluster-wide secret material, generated once and shared read-only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsBundle {
    pub cluster_name: String,
    pub contract: VersionContract,
    /// RFC 3339 timestamp of generation.
    pub created_at: String,
    pub cluster_id: String,
    pub cluster_secret: String,
    pub bootstrap_token: String,
    pub trustd_token: String,
    pub disk_encryption_secret: String,
    pub certs: CertificateSet,
}

impl std::fmt::Debug for SecretsBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsBundle")
            .field("cluster_name", &self.cluster_name)
            .field("contract", &self.contract)
            .field("created_at", &self.created_at)
            .field("cluster_id", &self.cluster_id)
            .finish_non_exhaustive()
    }
}

impl SecretsBundle {
    /// Generate a complete bundle. Either every field is produced or none is.
    pub fn generate(
        cluster_name: &str,
        contract: VersionContract,
        clock: &dyn Clock,
    ) -> Result<Self> {
        if cluster_name.trim().is_empty() {
            return Err(ProvisionError::validation("cluster name cannot be empty"));
        }

        let now = clock.now();
        info!(
            "Generating secrets bundle for cluster '{}' (contract {})",
            cluster_name, contract
        );

        let os = CertificateAuthority::generate("talos", "talos", now)?;
        let etcd = CertificateAuthority::generate("etcd", "etcd", now)?;
        let k8s = CertificateAuthority::generate("kubernetes", "kubernetes", now)?;
        let aggregator = CertificateAuthority::generate("front-proxy", "", now)?;
        debug!("Generated trust roots");

        let admin = os.issue_client(
            ADMIN_COMMON_NAME,
            ADMIN_ORGANIZATION,
            now,
            CLIENT_CERT_VALIDITY_DAYS,
        )?;

        let certs = CertificateSet {
            os: os.to_pem()?,
            etcd: etcd.to_pem()?,
            k8s: k8s.to_pem()?,
            k8s_aggregator: aggregator.to_pem()?,
            k8s_service_account: CertAndKey {
                crt: String::new(),
                key: pki::generate_key_pem()?,
            },
            admin,
        };

        Ok(Self {
            cluster_name: cluster_name.to_string(),
            contract,
            created_at: now.to_rfc3339(),
            cluster_id: random_secret()?,
            cluster_secret: random_secret()?,
            bootstrap_token: random_token()?,
            trustd_token: random_token()?,
            disk_encryption_secret: random_secret()?,
            certs,
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let bundle: Self = serde_yaml::from_str(content)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Check that every PEM parses, the tokens are well-formed and the admin
    /// certificate chains to the OS root.
    pub fn validate(&self) -> Result<()> {
        let token_re = Regex::new(TOKEN_PATTERN)
            .map_err(|e| ProvisionError::validation(format!("token pattern: {}", e)))?;
        if !token_re.is_match(&self.bootstrap_token) {
            return Err(ProvisionError::validation(
                "bootstrap token must match [a-z0-9]{6}.[a-z0-9]{16}",
            ));
        }
        if !token_re.is_match(&self.trustd_token) {
            return Err(ProvisionError::validation(
                "trustd token must match [a-z0-9]{6}.[a-z0-9]{16}",
            ));
        }

        for (name, value) in [
            ("cluster id", &self.cluster_id),
            ("cluster secret", &self.cluster_secret),
            ("disk encryption secret", &self.disk_encryption_secret),
        ] {
            let decoded = STANDARD.decode(value).map_err(|e| {
                ProvisionError::validation(format!("{} is not valid base64: {}", name, e))
            })?;
            if decoded.len() != SECRET_BYTES {
                return Err(ProvisionError::validation(format!(
                    "{} must decode to {} bytes, got {}",
                    name,
                    SECRET_BYTES,
                    decoded.len()
                )));
            }
        }

        pki::check_pair(&self.certs.os, "os")?;
        pki::check_pair(&self.certs.etcd, "etcd")?;
        pki::check_pair(&self.certs.k8s, "k8s")?;
        pki::check_pair(&self.certs.k8s_aggregator, "k8s aggregator")?;
        pki::check_pair(&self.certs.k8s_service_account, "k8s service account")?;
        pki::check_pair(&self.certs.admin, "admin")?;
        let admin = &self.certs.admin;
        if pki::common_name(&admin.crt)? != ADMIN_COMMON_NAME
            || !pki::verify_issued_by(&admin.crt, &self.certs.os.crt)?
        {
            return Err(ProvisionError::validation(
                "admin certificate must be CN=admin and issued by the OS root",
            ));
        }
        if !self.certs.k8s_service_account.crt.is_empty() {
            return Err(ProvisionError::validation(
                "service account material is a key only",
            ));
        }
        Ok(())
    }
}

fn random_secret() -> Result<String> {
    let mut buf = [0u8; SECRET_BYTES];
    openssl::rand::rand_bytes(&mut buf)?;
    Ok(STANDARD.encode(buf))
}

fn random_token() -> Result<String> {
    Ok(format!("{}.{}", random_chars(6)?, random_chars(16)?))
}

/// Uniform characters from the token alphabet via rejection sampling.
fn random_chars(len: usize) -> Result<String> {
    let limit = (256 / TOKEN_ALPHABET.len() * TOKEN_ALPHABET.len()) as u8;
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        openssl::rand::rand_bytes(&mut buf)?;
        for b in buf {
            if b < limit && out.len() < len {
                out.push(TOKEN_ALPHABET[(b as usize) % TOKEN_ALPHABET.len()] as char);
            }
        }
    }
    Ok(out)
}
