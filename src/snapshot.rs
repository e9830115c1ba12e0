//! Serializable debug view of controller state.
//!
//! Hosts render or log this to see what the controller thinks: per-agent
//! roles and active options, per-team threat and reservation pressure.
//! This is diagnostics only — persisted role catalogs live with the
//! evolution layer, not here.

use serde::{Deserialize, Serialize};

use crate::roles::RoleKind;
use crate::world::Stance;

/// One agent's decision state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub role_kind: Option<RoleKind>,
    pub role_id: Option<usize>,
    pub active_option: Option<usize>,
    pub option_ticks: u32,
    pub escaping: bool,
    pub stance: Stance,
    pub stopped: bool,
}

/// One team's shared-state counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub threat_count: usize,
    pub reservation_count: usize,
    pub revealed_tiles: usize,
    pub delay_chance: f32,
}

/// Complete controller state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    /// Last world step seen by `update_controller`.
    pub step: Option<u64>,
    /// All tracked agents, id ascending.
    pub agents: Vec<AgentSnapshot>,
    pub teams: Vec<TeamSnapshot>,
}

impl ControllerSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
