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

use crate::shared::error::ProvisionError;
use serde::{Deserialize, Serialize};

/// Target OS version whose feature gates shape generation.
///
/// Only major and minor matter; a patch component is accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionContract {
    pub major: u32,
    pub minor: u32,
}

impl VersionContract {
    pub const V0_13: VersionContract = VersionContract::new(0, 13);
    pub const V1_2: VersionContract = VersionContract::new(1, 2);
    pub const V1_5: VersionContract = VersionContract::new(1, 5);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn parse(s: &str) -> Result<Self, ProvisionError> {
        let trimmed = s.trim().trim_start_matches('v');
        let mut parts = trimmed.split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
        match (major, minor) {
            (Some(major), Some(minor)) => {
                if let Some(patch) = parts.next() {
                    // allow pre-release suffixes like 3-alpha.1
                    let digits: String = patch.chars().take_while(|c| c.is_ascii_digit()).collect();
                    if digits.is_empty() {
                        return Err(invalid(s));
                    }
                }
                Ok(Self::new(major, minor))
            }
            _ => Err(invalid(s)),
        }
    }

    pub fn secretbox_encryption_supported(&self) -> bool {
        *self >= Self::V0_13
    }

    pub fn cluster_discovery_supported(&self) -> bool {
        *self >= Self::V0_13
    }

    pub fn kubelet_default_runtime_seccomp_supported(&self) -> bool {
        *self >= Self::V1_2
    }
}

fn invalid(s: &str) -> ProvisionError {
    ProvisionError::validation(format!(
        "Invalid version contract '{}', expected e.g. v1.5",
        s
    ))
}

impl Default for VersionContract {
    fn default() -> Self {
        Self::V1_5
    }
}

impl std::fmt::Display for VersionContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for VersionContract {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionContract {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionContract> for String {
    fn from(value: VersionContract) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_forms() {
        assert_eq!(VersionContract::parse("v1.5").unwrap(), VersionContract::new(1, 5));
        assert_eq!(VersionContract::parse("1.5").unwrap(), VersionContract::new(1, 5));
        assert_eq!(VersionContract::parse("v1.5.3").unwrap(), VersionContract::new(1, 5));
        assert_eq!(
            VersionContract::parse("v1.6.0-alpha.1").unwrap(),
            VersionContract::new(1, 6)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(VersionContract::parse("latest").is_err());
        assert!(VersionContract::parse("v1").is_err());
        assert!(VersionContract::parse("v1.x").is_err());
    }

    #[test]
    fn test_feature_gates() {
        let old = VersionContract::new(0, 12);
        assert!(!old.secretbox_encryption_supported());
        assert!(!old.cluster_discovery_supported());
        assert!(VersionContract::new(0, 13).secretbox_encryption_supported());
        assert!(!VersionContract::new(1, 1).kubelet_default_runtime_seccomp_supported());
        assert!(VersionContract::new(1, 2).kubelet_default_runtime_seccomp_supported());
    }

    #[test]
    fn test_serde_as_string() {
        let yaml = serde_yaml::to_string(&VersionContract::new(1, 4)).unwrap();
        assert_eq!(yaml.trim(), "v1.4");
        let parsed: VersionContract = serde_yaml::from_str("v1.7").unwrap();
        assert_eq!(parsed, VersionContract::new(1, 7));
    }
}
