//! Shared per-team state: threat map, building counts and claims, resource
//! reservations, fog of war, and the economy/difficulty bookkeeping.
//!
//! Everything here is shared by all agents of one team within a tick.
//! Claims and reservations are first-wins: later agents observing an entry
//! must pick different work. Invalid team ids degrade to no-ops at the
//! registry level.

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::config::{ControllerConfig, DifficultyConfig};
use crate::grid::{GridDims, TilePos};
use crate::visibility::FogMap;
use crate::world::{AgentId, BuildingKind, ResourceKind, TeamId, WorldView};

/// Upper bound on tracked threat entries per team.
pub const MAX_THREAT_ENTRIES: usize = 32;

/// Steps after which an unseen threat entry is dead.
pub const THREAT_DECAY_STEPS: u64 = 100;

/// Steps a resource reservation lives (roughly one harvest round-trip).
pub const RESERVATION_LIFETIME: u64 = 40;

// ============================================================================
// THREAT MAP
// ============================================================================

/// One remembered enemy sighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatEntry {
    pub pos: TilePos,
    /// Strength tier 1..=5.
    pub strength: u8,
    pub last_seen_step: u64,
    pub source_id: u32,
    pub is_structure: bool,
}

/// Bounded ring of decaying enemy sightings shared by a team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatMap {
    entries: Vec<ThreatEntry>,
    last_decay_stride: Option<u64>,
}

impl ThreatMap {
    /// Record a sighting. Reporting is idempotent: an entry with the same
    /// source or position is refreshed in place, keeping the higher
    /// strength. A full map evicts its stalest entry.
    pub fn report(&mut self, entry: ThreatEntry) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.source_id == entry.source_id || e.pos == entry.pos)
        {
            existing.pos = entry.pos;
            existing.strength = existing.strength.max(entry.strength);
            existing.last_seen_step = entry.last_seen_step;
            existing.is_structure = entry.is_structure;
            return;
        }
        if self.entries.len() < MAX_THREAT_ENTRIES {
            self.entries.push(entry);
            return;
        }
        if let Some(stalest) = self
            .entries
            .iter_mut()
            .min_by_key(|e| e.last_seen_step)
        {
            *stalest = entry;
        }
    }

    /// Drop entries unseen for [`THREAT_DECAY_STEPS`]. Runs at most once
    /// per `stride` bucket of steps; extra calls inside the same bucket are
    /// free.
    pub fn decay_staggered(&mut self, step: u64, stride: u64) {
        let bucket = step / stride.max(1);
        if self.last_decay_stride == Some(bucket) {
            return;
        }
        self.last_decay_stride = Some(bucket);
        self.entries
            .retain(|e| step.saturating_sub(e.last_seen_step) < THREAT_DECAY_STEPS);
    }

    /// The entry closest to `pos`, if any.
    pub fn nearest(&self, pos: TilePos) -> Option<&ThreatEntry> {
        self.entries.iter().min_by_key(|e| e.pos.chebyshev(pos))
    }

    /// The nearest non-structure threat (mobile attackers first).
    pub fn nearest_mobile(&self, pos: TilePos) -> Option<&ThreatEntry> {
        self.entries
            .iter()
            .filter(|e| !e.is_structure)
            .min_by_key(|e| e.pos.chebyshev(pos))
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ThreatEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_decay_stride = None;
    }
}

// ============================================================================
// BUILDING COUNTS & CLAIMS
// ============================================================================

/// Lazily rebuilt per-kind building tally plus per-step build claims.
///
/// The tally is only trusted for the step it was built on; the first query
/// of a new step re-counts through the world's per-kind index and clears
/// all claims, giving claims exactly one step of scope.
#[derive(Debug, Clone, Default)]
pub struct BuildingCounts {
    counts: [u32; BuildingKind::COUNT],
    counts_step: Option<u64>,
    claimed: [bool; BuildingKind::COUNT],
}

impl BuildingCounts {
    fn refresh(&mut self, world: &dyn WorldView, team: TeamId) {
        let step = world.current_step();
        if self.counts_step == Some(step) {
            return;
        }
        for kind in [
            BuildingKind::House,
            BuildingKind::Altar,
            BuildingKind::Temple,
            BuildingKind::Barracks,
            BuildingKind::Tower,
            BuildingKind::Stockpile,
            BuildingKind::Wall,
        ] {
            self.counts[kind.index()] = world.count_of_kind(team, kind.thing_kind());
        }
        self.claimed = [false; BuildingKind::COUNT];
        self.counts_step = Some(step);
    }

    /// Current count of `kind` buildings owned by `team`.
    pub fn count(&mut self, world: &dyn WorldView, team: TeamId, kind: BuildingKind) -> u32 {
        self.refresh(world, team);
        self.counts[kind.index()]
    }

    /// Whether some builder already claimed `kind` this step.
    pub fn is_claimed(&mut self, world: &dyn WorldView, team: TeamId, kind: BuildingKind) -> bool {
        self.refresh(world, team);
        self.claimed[kind.index()]
    }

    /// Claim `kind` for this step. Returns `false` if it was already
    /// claimed (the caller must pick other work).
    pub fn try_claim(&mut self, world: &dyn WorldView, team: TeamId, kind: BuildingKind) -> bool {
        self.refresh(world, team);
        if self.claimed[kind.index()] {
            return false;
        }
        self.claimed[kind.index()] = true;
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// RESOURCE RESERVATIONS
// ============================================================================

/// Per-tile harvest reservations, deduplicating gatherers on one team.
#[derive(Debug, Clone, Default)]
pub struct ResourceReservations {
    map: HashMap<TilePos, (AgentId, u64)>,
}

impl ResourceReservations {
    /// Reserve `pos` for `agent`. Re-reservation by the same agent
    /// refreshes the expiry; a live foreign reservation rejects.
    pub fn reserve(&mut self, agent: AgentId, pos: TilePos, step: u64) -> bool {
        match self.map.get(&pos) {
            Some(&(owner, expires)) if owner != agent && step < expires => false,
            _ => {
                self.map.insert(pos, (agent, step + RESERVATION_LIFETIME));
                true
            }
        }
    }

    /// Whether another agent holds a live reservation on `pos`.
    pub fn is_reserved_by_other(&self, agent: AgentId, pos: TilePos, step: u64) -> bool {
        self.map
            .get(&pos)
            .is_some_and(|&(owner, expires)| owner != agent && step < expires)
    }

    pub fn release(&mut self, agent: AgentId, pos: TilePos) {
        if self.map.get(&pos).is_some_and(|&(owner, _)| owner == agent) {
            self.map.remove(&pos);
        }
    }

    /// Drop expired reservations and those whose owner no longer lives.
    pub fn sweep(&mut self, step: u64, is_alive: impl Fn(AgentId) -> bool) {
        self.map
            .retain(|_, &mut (owner, expires)| step < expires && is_alive(owner));
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

// ============================================================================
// ECONOMY & DIFFICULTY
// ============================================================================

/// Smoothed per-resource stockpile flow for one team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EconomySnapshot {
    last_stockpiles: [u32; ResourceKind::COUNT],
    rates: [f32; ResourceKind::COUNT],
    last_step: Option<u64>,
}

impl EconomySnapshot {
    const SMOOTHING: f32 = 0.9;

    /// Fold the current stockpiles into the smoothed per-step rates.
    pub fn tick(&mut self, stockpiles: [u32; ResourceKind::COUNT], step: u64) {
        if let Some(last) = self.last_step {
            let elapsed = step.saturating_sub(last).max(1) as f32;
            for i in 0..ResourceKind::COUNT {
                let delta = stockpiles[i] as f32 - self.last_stockpiles[i] as f32;
                self.rates[i] =
                    Self::SMOOTHING * self.rates[i] + (1.0 - Self::SMOOTHING) * delta / elapsed;
            }
        }
        self.last_stockpiles = stockpiles;
        self.last_step = Some(step);
    }

    /// Smoothed per-step income of a resource.
    pub fn rate(&self, resource: ResourceKind) -> f32 {
        self.rates[resource.index()]
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// TEAM STATE & REGISTRY
// ============================================================================

/// Everything one team's agents share.
#[derive(Debug)]
pub struct TeamState {
    pub threats: ThreatMap,
    pub buildings: BuildingCounts,
    pub reservations: ResourceReservations,
    pub fog: FogMap,
    pub economy: EconomySnapshot,
    pub difficulty: DifficultyConfig,
    /// Live decision-delay chance; adaptive ticks nudge it within bounds.
    pub delay_chance: f32,
}

impl TeamState {
    pub fn new(dims: GridDims, difficulty: DifficultyConfig) -> Self {
        Self {
            threats: ThreatMap::default(),
            buildings: BuildingCounts::default(),
            reservations: ResourceReservations::default(),
            fog: FogMap::new(dims),
            economy: EconomySnapshot::default(),
            difficulty,
            delay_chance: difficulty.decision_delay_chance,
        }
    }

    /// Wipe everything back to a fresh episode.
    pub fn reset(&mut self) {
        self.threats.clear();
        self.buildings.clear();
        self.reservations.clear();
        self.fog.clear();
        self.economy.clear();
        self.delay_chance = self.difficulty.decision_delay_chance;
    }
}

/// All team states, stored as a resource in the controller's ECS world.
#[derive(Resource)]
pub struct TeamRegistry {
    teams: Vec<TeamState>,
}

impl TeamRegistry {
    pub fn new(config: &ControllerConfig) -> Self {
        let teams = (0..config.team_count)
            .map(|_| TeamState::new(config.dims, config.difficulty))
            .collect();
        Self { teams }
    }

    pub fn get(&self, team: TeamId) -> Option<&TeamState> {
        self.teams.get(team.index())
    }

    pub fn get_mut(&mut self, team: TeamId) -> Option<&mut TeamState> {
        self.teams.get_mut(team.index())
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamState> {
        self.teams.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TeamState> {
        self.teams.iter_mut()
    }

    #[cfg(feature = "parallel")]
    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, TeamState> {
        use rayon::prelude::*;
        self.teams.par_iter_mut()
    }

    pub fn reset_all(&mut self) {
        for team in &mut self.teams {
            team.reset();
        }
    }
}
