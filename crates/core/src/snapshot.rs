// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::Wires;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EngineSnapshot {
    pub timestamp: u64,
    /// Outputs committed at the end of the last tick.
    pub wires: Wires,
    pub components: HashMap<String, serde_json::Value>,
    pub collaborators: HashMap<String, serde_json::Value>,
}

impl EngineSnapshot {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
