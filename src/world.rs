//! The read-only interface to the simulation world.
//!
//! The controller never owns terrain, entities, or stockpiles; the host
//! simulation does. Everything the decision pipeline needs to observe is
//! expressed through the [`WorldView`] trait, and every query is total:
//! out-of-range positions and unknown ids return defaults, never panic.

use serde::{Deserialize, Serialize};

use crate::grid::{GridDims, TilePos};

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Unique identifier for a controlled or observed agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Team identifier. Teams are dense small integers assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TeamId(pub u8);

impl TeamId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// TERRAIN & THINGS
// ============================================================================

/// Terrain at a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerrainKind {
    #[default]
    Grass,
    Dirt,
    Sand,
    Rock,
    Water,
    Magma,
    Snow,
}

impl TerrainKind {
    /// Whether ground agents can stand on this terrain at all.
    pub fn walkable(self) -> bool {
        !matches!(self, TerrainKind::Water | TerrainKind::Magma)
    }
}

/// Stockpile resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceKind {
    Wood = 0,
    Stone = 1,
    Gold = 2,
    Food = 3,
    Bars = 4,
    Hearts = 5,
    Relics = 6,
}

impl ResourceKind {
    pub const COUNT: usize = 7;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Buildings the controller can order placed. The discriminant doubles as
/// the build-choice index in the `Build` action arg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuildingKind {
    House = 0,
    Altar = 1,
    Temple = 2,
    Barracks = 3,
    Tower = 4,
    Stockpile = 5,
    Wall = 6,
}

impl BuildingKind {
    pub const COUNT: usize = 7;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The build-choice arg for a `Build` action.
    #[inline]
    pub fn build_choice(self) -> u8 {
        self as u8
    }

    pub fn from_choice(choice: u8) -> Option<BuildingKind> {
        match choice {
            0 => Some(BuildingKind::House),
            1 => Some(BuildingKind::Altar),
            2 => Some(BuildingKind::Temple),
            3 => Some(BuildingKind::Barracks),
            4 => Some(BuildingKind::Tower),
            5 => Some(BuildingKind::Stockpile),
            6 => Some(BuildingKind::Wall),
            _ => None,
        }
    }

    pub fn thing_kind(self) -> ThingKind {
        match self {
            BuildingKind::House => ThingKind::House,
            BuildingKind::Altar => ThingKind::Altar,
            BuildingKind::Temple => ThingKind::Temple,
            BuildingKind::Barracks => ThingKind::Barracks,
            BuildingKind::Tower => ThingKind::Tower,
            BuildingKind::Stockpile => ThingKind::Stockpile,
            BuildingKind::Wall => ThingKind::Wall,
        }
    }
}

/// Kinds of non-agent entities that can occupy a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThingKind {
    Tree = 0,
    Sapling = 1,
    StoneNode = 2,
    GoldNode = 3,
    BerryBush = 4,
    MagmaVent = 5,
    Lantern = 6,
    Relic = 7,
    Tumor = 8,
    Spawner = 9,
    House = 10,
    Altar = 11,
    Temple = 12,
    Barracks = 13,
    Tower = 14,
    Stockpile = 15,
    Wall = 16,
    Door = 17,
}

impl ThingKind {
    pub const COUNT: usize = 18;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Resource yielded when an agent harvests this thing.
    pub fn harvest_resource(self) -> Option<ResourceKind> {
        match self {
            ThingKind::Tree => Some(ResourceKind::Wood),
            ThingKind::StoneNode => Some(ResourceKind::Stone),
            ThingKind::GoldNode => Some(ResourceKind::Gold),
            ThingKind::BerryBush => Some(ResourceKind::Food),
            _ => None,
        }
    }

    /// The source thing an agent harvests a given resource from.
    pub fn for_resource(resource: ResourceKind) -> Option<ThingKind> {
        match resource {
            ResourceKind::Wood => Some(ThingKind::Tree),
            ResourceKind::Stone => Some(ThingKind::StoneNode),
            ResourceKind::Gold => Some(ThingKind::GoldNode),
            ResourceKind::Food => Some(ThingKind::BerryBush),
            _ => None,
        }
    }

    /// Whether this thing is a built structure (walls, houses, towers, ...).
    pub fn is_structure(self) -> bool {
        matches!(
            self,
            ThingKind::House
                | ThingKind::Altar
                | ThingKind::Temple
                | ThingKind::Barracks
                | ThingKind::Tower
                | ThingKind::Stockpile
                | ThingKind::Wall
                | ThingKind::Door
                | ThingKind::Spawner
        )
    }

    /// Corruption entities get top attack priority for non-siege units.
    pub fn is_corruption(self) -> bool {
        matches!(self, ThingKind::Tumor | ThingKind::Spawner)
    }
}

/// A snapshot of a thing on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThingRef {
    pub id: u32,
    pub kind: ThingKind,
    pub pos: TilePos,
    /// Owning team, if any (resources and corruption are unowned).
    pub team: Option<TeamId>,
    /// Remaining yield for resources, hit points for structures.
    pub amount: u32,
}

impl ThingRef {
    /// Whether a gatherer can still pull the mapped resource out of this.
    pub fn has_harvestable_resource(&self) -> bool {
        self.amount > 0 && self.kind.harvest_resource().is_some()
    }
}

// ============================================================================
// AGENTS
// ============================================================================

/// Broad unit class; drives vision, attack ranges and target priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentClass {
    #[default]
    Worker,
    Scout,
    Melee,
    Ranged,
    Siege,
    Goblin,
}

impl AgentClass {
    pub fn is_combatant(self) -> bool {
        matches!(self, AgentClass::Melee | AgentClass::Ranged | AgentClass::Siege)
    }
}

/// Per-agent attitude gating auto-attack and chasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stance {
    #[default]
    Aggressive,
    Defensive,
    StandGround,
    NoAttack,
}

impl Stance {
    /// Whether the agent may open fire on its own initiative.
    pub fn allows_attack(self) -> bool {
        !matches!(self, Stance::NoAttack)
    }

    /// Whether the agent may leave its post to chase a target.
    pub fn allows_chase(self) -> bool {
        matches!(self, Stance::Aggressive)
    }
}

/// A snapshot of an agent as the world sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub team: TeamId,
    pub pos: TilePos,
    pub alive: bool,
    pub class: AgentClass,
    /// Vision radius in tiles (Chebyshev).
    pub vision: i32,
    /// Attack reach in tiles; class and equipment dependent, host-supplied.
    pub attack_range: i32,
    /// Resource currently carried, if any.
    pub carried: Option<(ResourceKind, u32)>,
}

// ============================================================================
// WORLD VIEW
// ============================================================================

/// Read-only capability set the controller consumes from the host world.
///
/// Implementations must keep every query total: invalid positions behave as
/// blocked/empty, unknown ids as absent. The controller observes a
/// consistent snapshot for the duration of a tick; the host applies the
/// returned actions afterwards.
pub trait WorldView {
    fn dims(&self) -> GridDims;
    fn current_step(&self) -> u64;

    // --- grid queries ---
    fn tile(&self, pos: TilePos) -> TerrainKind;
    fn is_valid(&self, pos: TilePos) -> bool {
        self.dims().contains(pos)
    }
    /// No foreground thing and no agent at the position.
    fn is_empty(&self, pos: TilePos) -> bool;
    fn thing_at(&self, pos: TilePos) -> Option<ThingRef>;
    /// Background layer (e.g. a sapling under a standing agent).
    fn background_thing_at(&self, _pos: TilePos) -> Option<ThingRef> {
        None
    }
    fn has_door(&self, pos: TilePos) -> bool;
    fn is_tile_frozen(&self, _pos: TilePos) -> bool {
        false
    }
    /// Terrain-level passability for ground agents.
    fn terrain_allows(&self, pos: TilePos) -> bool;
    fn is_ramp(&self, _pos: TilePos) -> bool {
        false
    }
    /// Elevation transition check; ramps are required for vertical moves.
    fn can_traverse_elevation(&self, _from: TilePos, _to: TilePos) -> bool {
        true
    }
    fn is_water_blocked_for_agent(&self, agent: AgentId, pos: TilePos) -> bool;
    fn can_agent_pass_door(&self, agent: AgentId, pos: TilePos) -> bool;
    /// Whether a new structure may be placed here.
    fn can_place(&self, pos: TilePos) -> bool;

    // --- entity index ---
    fn nearest_of_kind(&self, origin: TilePos, kind: ThingKind, max_dist: i32) -> Option<ThingRef>;
    fn nearest_friendly_of_kind(
        &self,
        origin: TilePos,
        team: TeamId,
        kind: ThingKind,
        max_dist: i32,
    ) -> Option<ThingRef>;
    fn collect_in_range(
        &self,
        origin: TilePos,
        kind: ThingKind,
        radius: i32,
        out: &mut Vec<ThingRef>,
    );
    /// Count of team-owned things of a kind (per-kind enumeration).
    fn count_of_kind(&self, team: TeamId, kind: ThingKind) -> u32;

    // --- agent registry ---
    fn agent(&self, id: AgentId) -> Option<AgentInfo>;
    fn agent_count(&self) -> u32;
    fn collect_agents_in_range(&self, origin: TilePos, radius: i32, out: &mut Vec<AgentInfo>);
    /// Nearest living agent not on `team`.
    fn nearest_foreign_agent(
        &self,
        origin: TilePos,
        team: TeamId,
        max_dist: i32,
    ) -> Option<AgentInfo>;

    // --- stockpiles ---
    fn stockpile_count(&self, team: TeamId, resource: ResourceKind) -> u32;
    fn can_spend(&self, team: TeamId, costs: &[(ResourceKind, u32)]) -> bool {
        costs
            .iter()
            .all(|&(resource, count)| self.stockpile_count(team, resource) >= count)
    }
    fn can_afford_build(&self, agent: AgentId, building: BuildingKind) -> bool;
    fn population(&self, team: TeamId) -> u32;
    fn population_cap(&self, team: TeamId) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harvest_mapping_inverse() {
        for resource in [
            ResourceKind::Wood,
            ResourceKind::Stone,
            ResourceKind::Gold,
            ResourceKind::Food,
        ] {
            let kind = ThingKind::for_resource(resource).unwrap();
            assert_eq!(kind.harvest_resource(), Some(resource));
        }
        assert!(ThingKind::for_resource(ResourceKind::Hearts).is_none());
    }

    #[test]
    fn test_build_choice_roundtrip() {
        for choice in 0..BuildingKind::COUNT as u8 {
            let kind = BuildingKind::from_choice(choice).unwrap();
            assert_eq!(kind.build_choice(), choice);
        }
        assert!(BuildingKind::from_choice(12).is_none());
    }

    #[test]
    fn test_stance_gates() {
        assert!(Stance::Aggressive.allows_chase());
        assert!(!Stance::Defensive.allows_chase());
        assert!(Stance::Defensive.allows_attack());
        assert!(!Stance::NoAttack.allows_attack());
    }

    #[test]
    fn test_structure_classification() {
        assert!(ThingKind::House.is_structure());
        assert!(ThingKind::Spawner.is_structure());
        assert!(!ThingKind::Tree.is_structure());
        assert!(ThingKind::Tumor.is_corruption());
    }
}
