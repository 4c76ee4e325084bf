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

use super::{collapse, FacetValue};
use crate::domain::config::document::{InstallConfig, MachineConfig};
use crate::domain::config::facets::InstallFacet;
use crate::shared::error::Result;

pub(super) fn contribute(facet: &InstallFacet, doc: &mut MachineConfig) -> Result<()> {
    doc.machine.install = InstallConfig {
        disk: facet.disk.clone(),
        image: facet.image.clone(),
        bootloader: facet.bootloader,
        wipe: facet.wipe,
        extra_kernel_args: facet.extra_kernel_args.clone(),
    };
    Ok(())
}

impl FacetValue for InstallFacet {
    fn read_from(doc: &MachineConfig) -> Option<Self> {
        let install = &doc.machine.install;
        collapse(InstallFacet {
            disk: install.disk.clone(),
            image: install.image.clone(),
            bootloader: install.bootloader,
            wipe: install.wipe,
            extra_kernel_args: install.extra_kernel_args.clone(),
        })
    }
}
