//! Controller configuration.

use serde::{Deserialize, Serialize};

use crate::grid::GridDims;

/// Configuration for a controller instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Grid extents shared with the host world.
    pub dims: GridDims,
    /// Number of teams the controller tracks state for.
    pub team_count: u8,
    /// Nominal agents per team; drives slot-based default roles.
    pub team_size: u32,
    /// Seed for the controller RNG. Decisions are deterministic per seed.
    pub rng_seed: u64,
    /// Relic count at which goblins stop hoarding and go idle.
    pub goblin_relic_cap: u32,
    /// Minimum co-travelers before a settler group aborts migration.
    pub settler_group_min: u32,
    /// Initial per-team difficulty.
    pub difficulty: DifficultyConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dims: GridDims::default(),
            team_count: 4,
            team_size: 6,
            rng_seed: 0x5eed,
            goblin_relic_cap: 3,
            settler_group_min: 2,
            difficulty: DifficultyConfig::default(),
        }
    }
}

/// Per-team difficulty knobs.
///
/// The delay chance simulates reaction lag: each `decide_action` call rolls
/// against it and returns no action on a hit. The adaptive economy tick may
/// nudge the chance between the configured bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Probability in `[0, 1]` of skipping a decision this tick.
    pub decision_delay_chance: f32,
    /// Lower/upper bounds the adaptive tick may move the chance between.
    pub delay_chance_min: f32,
    pub delay_chance_max: f32,
    /// Whether agents of this team maintain the shared threat map.
    pub threat_updates: bool,
    /// Whether the economy tick is allowed to adjust the delay chance.
    pub adaptive: bool,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            decision_delay_chance: 0.0,
            delay_chance_min: 0.0,
            delay_chance_max: 0.35,
            threat_updates: true,
            adaptive: false,
        }
    }
}

impl DifficultyConfig {
    /// Clamp the live delay chance into the configured band.
    pub fn clamp_delay(&self, chance: f32) -> f32 {
        chance.clamp(self.delay_chance_min, self.delay_chance_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sane() {
        let config = ControllerConfig::default();
        assert!(config.team_count > 0);
        assert!(config.team_size > 0);
        assert_eq!(config.difficulty.decision_delay_chance, 0.0);
    }

    #[test]
    fn test_delay_clamp() {
        let difficulty = DifficultyConfig {
            delay_chance_min: 0.1,
            delay_chance_max: 0.3,
            ..Default::default()
        };
        assert_eq!(difficulty.clamp_delay(0.05), 0.1);
        assert_eq!(difficulty.clamp_delay(0.9), 0.3);
        assert_eq!(difficulty.clamp_delay(0.2), 0.2);
    }
}
