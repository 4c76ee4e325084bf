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

use crate::domain::node::NodeState;
use comfy_table::Color as TableColor;

#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    pub fn get_state_color(&self, state: NodeState) -> TableColor {
        match state {
            NodeState::Applied => self.success,
            NodeState::AwaitingReady
            | NodeState::Applying
            | NodeState::Bootstrapping
            | NodeState::Resetting => self.info,
            NodeState::Gone => self.error,
            NodeState::Unprovisioned => self.muted,
        }
    }

    /// Get color based on ready node count
    pub fn get_ready_color(&self, ready: usize, total: usize) -> TableColor {
        if total == 0 {
            self.muted
        } else if ready >= total {
            self.success
        } else if ready > 0 {
            self.warning
        } else {
            self.error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_theme() {
        let theme = ColorTheme::default();
        assert_eq!(theme.success, TableColor::Green);
        assert_eq!(theme.warning, TableColor::Yellow);
        assert_eq!(theme.error, TableColor::Red);
    }

    #[test]
    fn test_state_colors() {
        let theme = ColorTheme::default();
        assert_eq!(theme.get_state_color(NodeState::Applied), TableColor::Green);
        assert_eq!(theme.get_state_color(NodeState::Applying), TableColor::Cyan);
        assert_eq!(theme.get_state_color(NodeState::Unprovisioned), TableColor::DarkGrey);
    }

    #[test]
    fn test_get_ready_color() {
        let theme = ColorTheme::default();
        assert_eq!(theme.get_ready_color(3, 3), TableColor::Green);
        assert_eq!(theme.get_ready_color(1, 3), TableColor::Yellow);
        assert_eq!(theme.get_ready_color(0, 3), TableColor::Red);
        assert_eq!(theme.get_ready_color(0, 0), TableColor::DarkGrey);
    }
}
