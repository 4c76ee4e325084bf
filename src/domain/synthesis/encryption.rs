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

use super::convert::{checked, optional, widen, widen_u64};
use super::{collapse, FacetValue};
use crate::domain::config::document::{
    EncryptionKey, EncryptionKeyNodeId, EncryptionKeyStatic, EncryptionPartitionConfig,
    MachineConfig, SystemDiskEncryptionConfig,
};
use crate::domain::config::facets::{
    EncryptionFacet, EncryptionKeyFacet, EncryptionPartitionFacet,
};
use crate::shared::error::Result;

pub(super) fn contribute(facet: &EncryptionFacet, doc: &mut MachineConfig) -> Result<()> {
    let config = SystemDiskEncryptionConfig {
        state: facet
            .state
            .as_ref()
            .map(|p| to_partition("encryption.state", p))
            .transpose()?,
        ephemeral: facet
            .ephemeral
            .as_ref()
            .map(|p| to_partition("encryption.ephemeral", p))
            .transpose()?,
    };
    doc.machine.system_disk_encryption = if config == SystemDiskEncryptionConfig::default() {
        None
    } else {
        Some(config)
    };
    Ok(())
}

fn to_partition(prefix: &str, p: &EncryptionPartitionFacet) -> Result<EncryptionPartitionConfig> {
    let keys = p
        .keys
        .iter()
        .enumerate()
        .map(|(i, k)| {
            Ok(EncryptionKey {
                static_key: k.passphrase.as_ref().map(|passphrase| EncryptionKeyStatic {
                    passphrase: passphrase.clone(),
                }),
                node_id: k.node_id.then_some(EncryptionKeyNodeId {}),
                slot: checked(&format!("{}.keys[{}].slot", prefix, i), k.slot)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EncryptionPartitionConfig {
        provider: p.provider.clone(),
        keys,
        cipher: p.cipher.clone(),
        key_size: optional(&format!("{}.key_size", prefix), p.key_size)?,
        block_size: optional(&format!("{}.block_size", prefix), p.block_size)?,
        options: p.options.clone(),
    })
}

impl FacetValue for EncryptionFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let config = doc.machine.system_disk_encryption.as_ref()?;
        collapse(EncryptionFacet {
            state: config.state.as_ref().and_then(from_partition),
            ephemeral: config.ephemeral.as_ref().and_then(from_partition),
        })
    }
}

fn from_partition(p: &EncryptionPartitionConfig) -> Option<EncryptionPartitionFacet> {
    collapse(EncryptionPartitionFacet {
        provider: p.provider.clone(),
        cipher: p.cipher.clone(),
        key_size: widen(p.key_size),
        block_size: widen_u64(p.block_size),
        options: p.options.clone(),
        keys: p
            .keys
            .iter()
            .map(|k| EncryptionKeyFacet {
                slot: i64::from(k.slot),
                passphrase: k.static_key.as_ref().map(|s| s.passphrase.clone()),
                node_id: k.node_id.is_some(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthesis::test_utils::empty_doc;
    use crate::shared::error::ProvisionError;

    fn sample() -> EncryptionFacet {
        EncryptionFacet {
            state: Some(EncryptionPartitionFacet {
                provider: "luks2".to_string(),
                keys: vec![EncryptionKeyFacet {
                    slot: 0,
                    node_id: true,
                    passphrase: None,
                }],
                ..Default::default()
            }),
            ephemeral: Some(EncryptionPartitionFacet {
                provider: "luks2".to_string(),
                cipher: "aes-xts-plain64".to_string(),
                key_size: 512,
                block_size: 4096,
                options: vec!["no_read_workqueue".to_string()],
                keys: vec![EncryptionKeyFacet {
                    slot: 1,
                    passphrase: Some("hunter2".to_string()),
                    node_id: false,
                }],
            }),
        }
    }

    #[test]
    fn test_roundtrip() {
        let mut doc = empty_doc();
        contribute(&sample(), &mut doc).unwrap();
        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("nodeID: {}"));
        assert_eq!(EncryptionFacet::read_from(&doc), Some(sample()));
    }

    #[test]
    fn test_node_id_flag_from_toml_roundtrips() {
        let key: EncryptionKeyFacet = toml::from_str("slot = 0\nnode_id = true").unwrap();
        assert!(key.node_id);
        let facet = EncryptionFacet {
            state: Some(EncryptionPartitionFacet {
                provider: "luks2".to_string(),
                keys: vec![key],
                ..Default::default()
            }),
            ephemeral: None,
        };
        let mut doc = empty_doc();
        contribute(&facet, &mut doc).unwrap();
        assert_eq!(EncryptionFacet::read_from(&doc), Some(facet));

        let passphrase_only: EncryptionKeyFacet =
            toml::from_str("slot = 1\npassphrase = \"hunter2\"").unwrap();
        assert!(!passphrase_only.node_id);
        assert!(!toml::to_string(&passphrase_only).unwrap().contains("node_id"));
    }

    #[test]
    fn test_all_default_collapses_wholesale() {
        let facet = EncryptionFacet {
            state: Some(EncryptionPartitionFacet::default()),
            ephemeral: None,
        };
        let mut doc = empty_doc();
        contribute(&facet, &mut doc).unwrap();
        assert_eq!(EncryptionFacet::read_from(&doc), None);
        assert_eq!(
            EncryptionFacet::read_from(&doc),
            EncryptionFacet::read_from(&empty_doc())
        );
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut facet = sample();
        if let Some(state) = facet.state.as_mut() {
            state.keys[0].slot = 300;
        }
        assert!(matches!(
            contribute(&facet, &mut empty_doc()),
            Err(ProvisionError::Conversion { .. })
        ));
    }

    #[test]
    fn test_negative_block_size() {
        let mut facet = sample();
        if let Some(eph) = facet.ephemeral.as_mut() {
            eph.block_size = -1;
        }
        assert!(contribute(&facet, &mut empty_doc()).is_err());
    }
}
