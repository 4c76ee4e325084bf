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

use crate::shared::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the node takes a new configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Install or apply, then reboot immediately.
    Reboot,
    /// Apply in place when possible, reboot otherwise.
    #[default]
    Auto,
    NoReboot,
    /// Apply on the next reboot.
    Staged,
}

impl ApplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMode::Reboot => "reboot",
            ApplyMode::Auto => "auto",
            ApplyMode::NoReboot => "no_reboot",
            ApplyMode::Staged => "staged",
        }
    }
}

impl std::fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplyMode {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "reboot" => Ok(ApplyMode::Reboot),
            "auto" => Ok(ApplyMode::Auto),
            "no_reboot" => Ok(ApplyMode::NoReboot),
            "staged" => Ok(ApplyMode::Staged),
            other => Err(ProvisionError::validation(format!(
                "unknown apply mode '{}', expected reboot, auto, no_reboot or staged",
                other
            ))),
        }
    }
}

/// What the node reported after accepting a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDescriptor {
    pub hostname: String,
    /// Mode the node actually used; `Auto` resolves to one of the others.
    pub mode: ApplyMode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode_details: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_mode_parsing() {
        assert_eq!("reboot".parse::<ApplyMode>().unwrap(), ApplyMode::Reboot);
        assert_eq!("AUTO".parse::<ApplyMode>().unwrap(), ApplyMode::Auto);
        assert_eq!("no-reboot".parse::<ApplyMode>().unwrap(), ApplyMode::NoReboot);
        assert!("try".parse::<ApplyMode>().is_err());
    }
}
