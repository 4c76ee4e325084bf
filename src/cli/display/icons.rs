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

pub struct StatusIcon;

impl StatusIcon {
    /// Settled and healthy
    pub const SUCCESS: &'static str = "✓";

    /// Drifted or partially ready
    pub const WARNING: &'static str = "⚠";

    pub const ERROR: &'static str = "✗";

    /// Operation in flight
    pub const PENDING: &'static str = "⏳";

    pub const UNKNOWN: &'static str = "?";

    pub fn for_state(state: NodeState) -> &'static str {
        match state {
            NodeState::Applied => Self::SUCCESS,
            NodeState::AwaitingReady
            | NodeState::Applying
            | NodeState::Bootstrapping
            | NodeState::Resetting => Self::PENDING,
            NodeState::Gone => Self::ERROR,
            NodeState::Unprovisioned => Self::UNKNOWN,
        }
    }

    /// Icon for `ready` of `total` nodes
    pub fn get_ready_icon(ready: usize, total: usize) -> &'static str {
        if total == 0 {
            Self::UNKNOWN
        } else if ready >= total {
            Self::SUCCESS
        } else if ready > 0 {
            Self::WARNING
        } else {
            Self::ERROR
        }
    }
}
