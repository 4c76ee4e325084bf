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

use crate::domain::config::facets::MachineFacets;
use crate::domain::synthesis::FacetKind;
use crate::shared::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    pub kind: FacetKind,
    pub declared: String,
    pub observed: String,
}

/// Facets whose declared and observed values differ.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub entries: Vec<DriftEntry>,
}

impl DriftReport {
    /// Declared defaults are normalized first, so declaring a facet at its
    /// default does not count as drift against a node that omits it.
    pub fn between(declared: &MachineFacets, observed: &MachineFacets) -> Result<Self> {
        let declared = declared.normalized()?;
        let entries = declared
            .differing_kinds(observed)
            .into_iter()
            .map(|kind| {
                Ok(DriftEntry {
                    kind,
                    declared: declared.render_kind(kind)?,
                    observed: observed.render_kind(kind)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kinds(&self) -> Vec<FacetKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }
}
