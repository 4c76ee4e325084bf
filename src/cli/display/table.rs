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

use super::{ColorTheme, StatusIcon};
use crate::domain::node::{DriftReport, NodeLifecycleRecord};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render node lifecycle records as a formatted table
    pub fn render_nodes(&self, cluster: &str, records: &[NodeLifecycleRecord]) -> String {
        if records.is_empty() {
            return "No nodes declared".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("NODE").set_alignment(CellAlignment::Left),
                Cell::new("TYPE").set_alignment(CellAlignment::Left),
                Cell::new("ADDRESS").set_alignment(CellAlignment::Left),
                Cell::new("STATE").set_alignment(CellAlignment::Center),
                Cell::new("MODE").set_alignment(CellAlignment::Center),
                Cell::new("BOOTSTRAPPED").set_alignment(CellAlignment::Center),
            ]);

        for record in records {
            let mode = record
                .last_applied
                .as_ref()
                .map(|p| p.mode.to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(&record.node_name),
                Cell::new(record.machine_type.as_str()),
                Cell::new(&record.runtime_address),
                Cell::new(format!(
                    "{} {}",
                    StatusIcon::for_state(record.state),
                    record.state
                ))
                .fg(self.theme.get_state_color(record.state)),
                Cell::new(mode),
                Cell::new(if record.bootstrapped { StatusIcon::SUCCESS } else { "" })
                    .fg(self.theme.success),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ {} {} ─╮\n",
            cluster,
            format!("[{} nodes]", records.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Legend: {} Applied  {} In progress  {} Gone  {} Unprovisioned\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::PENDING.cyan(),
            StatusIcon::ERROR.red(),
            StatusIcon::UNKNOWN.bright_black()
        ));
        output
    }

    /// Render declared against observed facets of one node
    pub fn render_drift(&self, node: &str, report: &DriftReport) -> String {
        if report.is_clean() {
            return format!("{} {}: no drift", StatusIcon::SUCCESS.green(), node);
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("FACET").set_alignment(CellAlignment::Left),
                Cell::new("DECLARED").set_alignment(CellAlignment::Left),
                Cell::new("OBSERVED").set_alignment(CellAlignment::Left),
            ]);
        for entry in &report.entries {
            table.add_row(vec![
                Cell::new(entry.kind.as_str()).fg(self.theme.warning),
                Cell::new(&entry.declared),
                Cell::new(&entry.observed),
            ]);
        }

        format!(
            "{} {}: {} facet(s) drifted\n{}",
            StatusIcon::WARNING.yellow(),
            node,
            report.entries.len(),
            table
        )
    }

    /// Render the Kubernetes nodes that reported ready
    pub fn render_ready_nodes(&self, ready: &[String], expected: usize) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![Cell::new("READY NODE").set_alignment(CellAlignment::Left)]);
        for name in ready {
            table.add_row(vec![Cell::new(name).fg(self.theme.success)]);
        }

        let summary = format!(
            "{} {}/{} nodes ready",
            StatusIcon::get_ready_icon(ready.len(), expected),
            ready.len(),
            expected
        );
        format!("{}\n{}", summary, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::document::MachineType;
    use crate::domain::node::DriftEntry;
    use crate::domain::secrets::{SecretsBundle, SystemClock, VersionContract};
    use crate::domain::synthesis::FacetKind;
    use std::sync::Arc;

    #[test]
    fn test_render_nodes() {
        let bundle = SecretsBundle::generate("demo", VersionContract::V1_5, &SystemClock).unwrap();
        let record = NodeLifecycleRecord::new(
            "cp-1",
            MachineType::ControlPlane,
            "10.0.0.10",
            "10.0.0.10",
            Arc::new(bundle),
        );
        let output = TableRenderer::new().render_nodes("demo", &[record]);
        assert!(output.contains("cp-1"));
        assert!(output.contains("controlplane"));
        assert!(output.contains("unprovisioned"));
        assert_eq!(TableRenderer::new().render_nodes("demo", &[]), "No nodes declared");
    }

    #[test]
    fn test_render_drift() {
        let renderer = TableRenderer::new();
        assert!(renderer
            .render_drift("cp-1", &DriftReport::default())
            .contains("no drift"));

        let report = DriftReport {
            entries: vec![DriftEntry {
                kind: FacetKind::Proxy,
                declared: "mode: ipvs".to_string(),
                observed: "null".to_string(),
            }],
        };
        let output = renderer.render_drift("cp-1", &report);
        assert!(output.contains("1 facet(s) drifted"));
        assert!(output.contains("mode: ipvs"));
    }

    #[test]
    fn test_render_ready_nodes() {
        let output = TableRenderer::new().render_ready_nodes(&["cp-1".to_string()], 2);
        assert!(output.contains("1/2 nodes ready"));
        assert!(output.contains("cp-1"));
    }
}
