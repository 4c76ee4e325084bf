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

use thiserror::Error;
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conversion error: {field}: value {value} does not fit in {target}")]
    Conversion {
        field: String,
        value: i64,
        target: &'static str,
    },

    #[error("Connectivity error: {address}: {reason}")]
    Connectivity { address: String, reason: String },

    #[error("RPC error: {code}: {message}")]
    Rpc { code: String, message: String },

    #[error("Drift read error: {address}: {reason}")]
    DriftRead { address: String, reason: String },

    #[error("PKI error: {0}")]
    Pki(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kubernetes API error: {0}")]
    Kube(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for ProvisionError {
    fn from(err: kube::Error) -> Self {
        ProvisionError::Kube(err.to_string())
    }
}

impl From<openssl::error::ErrorStack> for ProvisionError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        ProvisionError::Pki(err.to_string())
    }
}

impl From<tonic::Status> for ProvisionError {
    fn from(status: tonic::Status) -> Self {
        ProvisionError::Rpc {
            code: format!("{:?}", status.code()),
            message: status.message().to_string(),
        }
    }
}

impl ProvisionError {
    pub fn validation(context: impl Into<String>) -> Self {
        Self::Validation(context.into())
    }

    pub fn config_error(context: impl Into<String>) -> Self {
        Self::Config(context.into())
    }

    pub fn pki(context: impl Into<String>) -> Self {
        Self::Pki(context.into())
    }

    pub fn conversion(field: impl Into<String>, value: i64, target: &'static str) -> Self {
        Self::Conversion {
            field: field.into(),
            value,
            target,
        }
    }

    pub fn connectivity(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connectivity {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn drift_read(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DriftRead {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Connectivity failures are the only ones retried by the dial loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// gRPC code name, when this error came from a remote status.
    pub fn rpc_code(&self) -> Option<&str> {
        match self {
            Self::Rpc { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
