use serde::{Deserialize, Serialize};

use crate::convert::DEFAULT_POSITION_SCALE;

pub const DEFAULT_MATERIAL: &str = "/Engine/EngineMaterials/WorldGridMaterial";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Host units per engine unit.
    pub position_scale_factor: f32,
    /// Material path written for faces without a material.
    pub default_material: String,
    /// Slot rebuilds per pass; 0 means no limit. Remaining dirty slots wait for
    /// the next pass.
    pub max_slot_rebuilds_per_pass: usize,
    /// Whether newly created input nodes may be deleted on teardown.
    pub input_nodes_can_be_deleted: bool,
    /// Path under which container nodes for object directories are created.
    pub root_container: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            position_scale_factor: DEFAULT_POSITION_SCALE,
            default_material: DEFAULT_MATERIAL.to_string(),
            max_slot_rebuilds_per_pass: 0,
            input_nodes_can_be_deleted: true,
            root_container: "/Conduit".to_string(),
        }
    }
}

impl BridgeSettings {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn rebuild_budget(&self) -> Option<usize> {
        (self.max_slot_rebuilds_per_pass > 0).then_some(self.max_slot_rebuilds_per_pass)
    }
}
