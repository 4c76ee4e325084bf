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

//! Certificate authorities and leaf certificates.
//!
//! Every trust domain gets its own self-signed ECDSA P-256 root. Leaf
//! certificates are issued for client authentication only; server
//! certificates are minted on the node itself from the OS root.

use crate::shared::error::{ProvisionError, Result};
use chrono::{DateTime, Duration, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Name, X509NameBuilder, X509};
use serde::{Deserialize, Serialize};

/// Root certificate validity (10 years)
pub const CA_VALIDITY_DAYS: i64 = 3650;

/// Client certificate validity (1 year)
pub const CLIENT_CERT_VALIDITY_DAYS: i64 = 365;

/// Backdate `not_before` to tolerate clock skew between us and the nodes.
const NOT_BEFORE_SKEW_SECONDS: i64 = 300;

/// PEM-encoded certificate and private key.
///
/// `crt` is empty for key-only material such as the service-account key.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAndKey {
    #[serde(default)]
    pub crt: String,
    pub key: String,
}

impl std::fmt::Debug for CertAndKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertAndKey")
            .field("crt", &format_args!("{} bytes", self.crt.len()))
            .field("key", &"<redacted>")
            .finish()
    }
}

pub struct CertificateAuthority {
    cert: X509,
    key: PKey<Private>,
}

impl CertificateAuthority {
    pub fn generate(common_name: &str, organization: &str, now: DateTime<Utc>) -> Result<Self> {
        let key = generate_key()?;
        let name = build_name(common_name, organization)?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        let serial = random_serial()?.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key)?;
        set_validity(&mut builder, now, CA_VALIDITY_DAYS)?;

        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .digital_signature()
                .build()?,
        )?;
        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(ski)?;

        builder.sign(&key, MessageDigest::sha256())?;

        Ok(Self {
            cert: builder.build(),
            key,
        })
    }

    pub fn from_pem(pair: &CertAndKey) -> Result<Self> {
        let cert = X509::from_pem(pair.crt.as_bytes())
            .map_err(|e| ProvisionError::pki(format!("failed to parse CA certificate: {}", e)))?;
        let key = PKey::private_key_from_pem(pair.key.as_bytes())
            .map_err(|e| ProvisionError::pki(format!("failed to parse CA key: {}", e)))?;
        Ok(Self { cert, key })
    }

    pub fn to_pem(&self) -> Result<CertAndKey> {
        Ok(CertAndKey {
            crt: pem_string(self.cert.to_pem()?)?,
            key: pem_string(self.key.private_key_to_pem_pkcs8()?)?,
        })
    }

    pub fn cert_pem(&self) -> Result<String> {
        pem_string(self.cert.to_pem()?)
    }

    /// Issue a client-auth certificate signed by this root.
    pub fn issue_client(
        &self,
        common_name: &str,
        organization: &str,
        now: DateTime<Utc>,
        validity_days: i64,
    ) -> Result<CertAndKey> {
        let key = generate_key()?;
        let name = build_name(common_name, organization)?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        let serial = random_serial()?.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(self.cert.subject_name())?;
        builder.set_pubkey(&key)?;
        set_validity(&mut builder, now, validity_days)?;

        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        builder.append_extension(ExtendedKeyUsage::new().client_auth().build()?)?;
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(&*self.cert), None))?;
        builder.append_extension(aki)?;

        builder.sign(&self.key, MessageDigest::sha256())?;

        Ok(CertAndKey {
            crt: pem_string(builder.build().to_pem()?)?,
            key: pem_string(key.private_key_to_pem_pkcs8()?)?,
        })
    }
}

/// Generate a standalone private key (PEM), e.g. for service-account signing.
pub fn generate_key_pem() -> Result<String> {
    pem_string(generate_key()?.private_key_to_pem_pkcs8()?)
}

/// Whether `leaf_pem` carries a valid signature from `ca_pem`.
pub fn verify_issued_by(leaf_pem: &str, ca_pem: &str) -> Result<bool> {
    let leaf = X509::from_pem(leaf_pem.as_bytes())?;
    let ca = X509::from_pem(ca_pem.as_bytes())?;
    let ca_key = ca.public_key()?;
    Ok(leaf.verify(&ca_key)?)
}

/// Subject common name of a PEM certificate.
pub fn common_name(cert_pem: &str) -> Result<String> {
    let cert = X509::from_pem(cert_pem.as_bytes())?;
    let cn = cert
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .ok_or_else(|| ProvisionError::pki("certificate has no common name"))?;
    Ok(cn.data().as_utf8()?.to_string())
}

/// Check that a PEM certificate and key parse; used when loading a persisted bundle.
pub fn check_pair(pair: &CertAndKey, role: &str) -> Result<()> {
    if !pair.crt.is_empty() {
        X509::from_pem(pair.crt.as_bytes())
            .map_err(|e| ProvisionError::pki(format!("{} certificate is invalid: {}", role, e)))?;
    }
    PKey::private_key_from_pem(pair.key.as_bytes())
        .map_err(|e| ProvisionError::pki(format!("{} key is invalid: {}", role, e)))?;
    Ok(())
}

fn generate_key() -> Result<PKey<Private>> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    let ec = EcKey::generate(&group)?;
    Ok(PKey::from_ec_key(ec)?)
}

fn build_name(common_name: &str, organization: &str) -> Result<X509Name> {
    let mut name = X509NameBuilder::new()?;
    if !organization.is_empty() {
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)?;
    }
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
    Ok(name.build())
}

fn random_serial() -> Result<BigNum> {
    let mut serial = BigNum::new()?;
    serial.rand(127, MsbOption::MAYBE_ZERO, false)?;
    Ok(serial)
}

fn set_validity(
    builder: &mut openssl::x509::X509Builder,
    now: DateTime<Utc>,
    days: i64,
) -> Result<()> {
    let not_before = now - Duration::seconds(NOT_BEFORE_SKEW_SECONDS);
    let not_after = now + Duration::days(days);
    let not_before = asn1_time(not_before)?;
    let not_after = asn1_time(not_after)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    Ok(())
}

fn asn1_time(t: DateTime<Utc>) -> Result<Asn1Time> {
    Ok(Asn1Time::from_str(&t.format("%Y%m%d%H%M%SZ").to_string())?)
}

fn pem_string(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).map_err(|e| ProvisionError::pki(format!("PEM is not UTF-8: {}", e)))
}
