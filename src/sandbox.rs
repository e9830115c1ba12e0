//! A deterministic in-memory world for tests, benches and the demo.
//!
//! The real host owns terrain, entities and stockpiles; this sandbox stands
//! in for it with just enough behavior to exercise the controller: a flat
//! terrain grid, a thing layer, an agent registry with hit points and
//! carried loads, and a tiny action applier that interprets the returned
//! action bytes.

use std::collections::HashMap;

use crate::actions::{Action, Direction, Verb};
use crate::grid::{GridDims, TilePos};
use crate::pathfind::lantern_push_destination;
use crate::world::{
    AgentClass, AgentId, AgentInfo, BuildingKind, ResourceKind, TeamId, TerrainKind, ThingKind,
    ThingRef, WorldView,
};

const DEFAULT_AGENT_HP: i32 = 10;
const ATTACK_DAMAGE: i32 = 2;
const HARVEST_TAKE: u32 = 2;
const DEFAULT_RESOURCE_AMOUNT: u32 = 20;

struct SandboxAgent {
    info: AgentInfo,
    hp: i32,
}

/// In-memory [`WorldView`] implementation plus a minimal action stepper.
pub struct SandboxWorld {
    dims: GridDims,
    step: u64,
    terrain: Vec<TerrainKind>,
    things: HashMap<TilePos, ThingRef>,
    frozen: HashMap<TilePos, bool>,
    heights: HashMap<TilePos, i32>,
    ramps: HashMap<TilePos, bool>,
    agents: Vec<SandboxAgent>,
    stockpiles: HashMap<(TeamId, ResourceKind), u32>,
    population: HashMap<TeamId, (u32, u32)>,
    next_thing_id: u32,
}

impl SandboxWorld {
    /// An open grass field of the given size.
    pub fn open(width: i32, height: i32, border: i32) -> Self {
        let dims = GridDims::new(width, height, border);
        Self {
            dims,
            step: 0,
            terrain: vec![TerrainKind::Grass; dims.cell_count()],
            things: HashMap::new(),
            frozen: HashMap::new(),
            heights: HashMap::new(),
            ramps: HashMap::new(),
            agents: Vec::new(),
            stockpiles: HashMap::new(),
            population: HashMap::new(),
            next_thing_id: 1,
        }
    }

    // --- world editing -----------------------------------------------------

    pub fn set_step(&mut self, step: u64) {
        self.step = step;
    }

    pub fn step_forward(&mut self) {
        self.step += 1;
    }

    pub fn set_terrain(&mut self, pos: TilePos, terrain: TerrainKind) {
        if self.dims.contains(pos) {
            let idx = self.dims.index(pos);
            self.terrain[idx] = terrain;
        }
    }

    pub fn set_frozen(&mut self, pos: TilePos, frozen: bool) {
        self.frozen.insert(pos, frozen);
    }

    pub fn set_height(&mut self, pos: TilePos, height: i32) {
        self.heights.insert(pos, height);
    }

    pub fn set_ramp(&mut self, pos: TilePos) {
        self.ramps.insert(pos, true);
    }

    pub fn add_thing(&mut self, kind: ThingKind, pos: TilePos) -> u32 {
        self.add_owned_thing(kind, pos, None)
    }

    pub fn add_team_thing(&mut self, kind: ThingKind, pos: TilePos, team: TeamId) -> u32 {
        self.add_owned_thing(kind, pos, Some(team))
    }

    fn add_owned_thing(&mut self, kind: ThingKind, pos: TilePos, team: Option<TeamId>) -> u32 {
        let id = self.next_thing_id;
        self.next_thing_id += 1;
        let amount = if kind.harvest_resource().is_some() {
            DEFAULT_RESOURCE_AMOUNT
        } else {
            1
        };
        self.things.insert(
            pos,
            ThingRef {
                id,
                kind,
                pos,
                team,
                amount,
            },
        );
        id
    }

    pub fn add_wall(&mut self, pos: TilePos) {
        self.add_thing(ThingKind::Wall, pos);
    }

    pub fn remove_thing_at(&mut self, pos: TilePos) {
        self.things.remove(&pos);
    }

    pub fn set_stockpile(&mut self, team: TeamId, resource: ResourceKind, amount: u32) {
        self.stockpiles.insert((team, resource), amount);
    }

    pub fn add_stockpile(&mut self, team: TeamId, resource: ResourceKind, amount: u32) {
        *self.stockpiles.entry((team, resource)).or_insert(0) += amount;
    }

    pub fn set_population(&mut self, team: TeamId, population: u32, cap: u32) {
        self.population.insert(team, (population, cap));
    }

    // --- agents ------------------------------------------------------------

    pub fn spawn_agent(&mut self, team: u8, class: AgentClass, pos: TilePos) -> AgentId {
        let (vision, attack_range) = match class {
            AgentClass::Scout => (10, 1),
            AgentClass::Ranged => (7, 4),
            AgentClass::Siege => (7, 5),
            AgentClass::Melee => (6, 1),
            _ => (6, 1),
        };
        self.spawn_agent_with(team, class, pos, vision, attack_range)
    }

    pub fn spawn_agent_with(
        &mut self,
        team: u8,
        class: AgentClass,
        pos: TilePos,
        vision: i32,
        attack_range: i32,
    ) -> AgentId {
        let id = AgentId(self.agents.len() as u32);
        self.agents.push(SandboxAgent {
            info: AgentInfo {
                id,
                team: TeamId(team),
                pos,
                alive: true,
                class,
                vision,
                attack_range,
                carried: None,
            },
            hp: DEFAULT_AGENT_HP,
        });
        id
    }

    pub fn teleport_agent(&mut self, id: AgentId, pos: TilePos) {
        if let Some(agent) = self.agents.get_mut(id.0 as usize) {
            agent.info.pos = pos;
        }
    }

    pub fn kill_agent(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.get_mut(id.0 as usize) {
            agent.info.alive = false;
            agent.hp = 0;
        }
    }

    pub fn set_carried(&mut self, id: AgentId, carried: Option<(ResourceKind, u32)>) {
        if let Some(agent) = self.agents.get_mut(id.0 as usize) {
            agent.info.carried = carried;
        }
    }

    /// Move an agent one tile if the destination is open, pushing lanterns
    /// by the same rules the controller plans with.
    pub fn move_agent(&mut self, id: AgentId, dir: Direction) -> bool {
        let Some(from) = self.agents.get(id.0 as usize).map(|a| a.info.pos) else {
            return false;
        };
        let to = dir.step_from(from);
        if !self.dims.in_playable(to) || !self.terrain_allows(to) {
            return false;
        }
        if let Some(thing) = self.things.get(&to).copied() {
            if thing.kind != ThingKind::Lantern {
                return false;
            }
            let Some(dest) = lantern_push_destination(self, from, to) else {
                return false;
            };
            let mut lantern = self.things.remove(&to).expect("lantern present");
            lantern.pos = dest;
            self.things.insert(dest, lantern);
        } else if !self.is_empty(to) {
            return false;
        }
        if let Some(agent) = self.agents.get_mut(id.0 as usize) {
            agent.info.pos = to;
        }
        true
    }

    // --- action stepper ----------------------------------------------------

    /// Apply one decided action. Only the slice of host behavior the demo
    /// and tests need: movement, harvest/deposit/altar use, placement.
    pub fn apply(&mut self, id: AgentId, action: Action) {
        let (verb, arg) = action.decode();
        match verb {
            Verb::Noop => {}
            Verb::Move => {
                self.move_agent(id, Direction::from_index(arg as usize));
            }
            Verb::Attack => self.apply_attack(id, Direction::from_index(arg as usize)),
            Verb::Use => self.apply_use(id, Direction::from_index(arg as usize)),
            Verb::PlaceLantern => {
                self.apply_place(id, Direction::from_index(arg as usize), ThingKind::Lantern)
            }
            Verb::Plant => {
                self.apply_place(id, Direction::from_index(arg as usize), ThingKind::Sapling)
            }
            Verb::Build => self.apply_build(id, arg),
        }
    }

    fn apply_attack(&mut self, id: AgentId, dir: Direction) {
        let Some(attacker) = self.agents.get(id.0 as usize) else {
            return;
        };
        let target = dir.step_from(attacker.info.pos);
        if let Some(victim) = self
            .agents
            .iter_mut()
            .find(|a| a.info.alive && a.info.pos == target)
        {
            victim.hp -= ATTACK_DAMAGE;
            if victim.hp <= 0 {
                victim.info.alive = false;
            }
            return;
        }
        if let Some(thing) = self.things.get_mut(&target) {
            thing.amount = thing.amount.saturating_sub(ATTACK_DAMAGE as u32);
            if thing.amount == 0 {
                self.things.remove(&target);
            }
        }
    }

    fn apply_use(&mut self, id: AgentId, dir: Direction) {
        let Some(agent) = self.agents.get(id.0 as usize) else {
            return;
        };
        let team = agent.info.team;
        let carried = agent.info.carried;
        let target = dir.step_from(agent.info.pos);
        let Some(thing) = self.things.get(&target).copied() else {
            return;
        };

        if let Some(resource) = thing.kind.harvest_resource() {
            let take = HARVEST_TAKE.min(thing.amount);
            if let Some(entry) = self.things.get_mut(&target) {
                entry.amount -= take;
                if entry.amount == 0 {
                    self.things.remove(&target);
                }
            }
            let held = match carried {
                Some((r, n)) if r == resource => n,
                _ => 0,
            };
            if let Some(a) = self.agents.get_mut(id.0 as usize) {
                a.info.carried = Some((resource, held + take));
            }
            return;
        }

        match thing.kind {
            ThingKind::Stockpile if thing.team == Some(team) => {
                if let Some((resource, amount)) = carried {
                    self.add_stockpile(team, resource, amount);
                    if let Some(a) = self.agents.get_mut(id.0 as usize) {
                        a.info.carried = None;
                    }
                }
            }
            ThingKind::Altar if thing.team == Some(team) => {
                if let Some((resource, amount)) = carried {
                    if matches!(resource, ResourceKind::Gold | ResourceKind::Bars) {
                        self.add_stockpile(team, ResourceKind::Hearts, amount / 5);
                        if let Some(a) = self.agents.get_mut(id.0 as usize) {
                            a.info.carried = None;
                        }
                    }
                }
            }
            ThingKind::Relic => {
                self.things.remove(&target);
                self.add_stockpile(team, ResourceKind::Relics, 1);
            }
            _ => {}
        }
    }

    fn apply_place(&mut self, id: AgentId, dir: Direction, kind: ThingKind) {
        let Some(agent) = self.agents.get(id.0 as usize) else {
            return;
        };
        let spot = dir.step_from(agent.info.pos);
        if self.can_place(spot) {
            self.add_thing(kind, spot);
        }
    }

    fn apply_build(&mut self, id: AgentId, choice: u8) {
        let Some(kind) = BuildingKind::from_choice(choice) else {
            return;
        };
        let Some(agent) = self.agents.get(id.0 as usize) else {
            return;
        };
        let team = agent.info.team;
        if !self.can_afford_build(id, kind) {
            return;
        }
        let pos = agent.info.pos;
        let Some(spot) = pos.neighbors().into_iter().find(|&p| self.can_place(p)) else {
            return;
        };
        for &(resource, count) in build_cost(kind) {
            let entry = self.stockpiles.entry((team, resource)).or_insert(0);
            *entry = entry.saturating_sub(count);
        }
        self.add_team_thing(kind.thing_kind(), spot, team);
    }
}

fn build_cost(kind: BuildingKind) -> &'static [(ResourceKind, u32)] {
    match kind {
        BuildingKind::House => &[(ResourceKind::Wood, 20)],
        BuildingKind::Altar => &[(ResourceKind::Stone, 15), (ResourceKind::Gold, 5)],
        BuildingKind::Temple => &[(ResourceKind::Stone, 30), (ResourceKind::Gold, 10)],
        BuildingKind::Barracks => &[(ResourceKind::Wood, 25), (ResourceKind::Stone, 10)],
        BuildingKind::Tower => &[(ResourceKind::Stone, 20)],
        BuildingKind::Stockpile => &[(ResourceKind::Wood, 10)],
        BuildingKind::Wall => &[(ResourceKind::Stone, 2)],
    }
}

impl WorldView for SandboxWorld {
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn current_step(&self) -> u64 {
        self.step
    }

    fn tile(&self, pos: TilePos) -> TerrainKind {
        if self.dims.contains(pos) {
            self.terrain[self.dims.index(pos)]
        } else {
            TerrainKind::Water
        }
    }

    fn is_empty(&self, pos: TilePos) -> bool {
        if !self.dims.contains(pos) {
            return false;
        }
        if self.things.contains_key(&pos) {
            return false;
        }
        !self
            .agents
            .iter()
            .any(|a| a.info.alive && a.info.pos == pos)
    }

    fn thing_at(&self, pos: TilePos) -> Option<ThingRef> {
        self.things.get(&pos).copied()
    }

    fn has_door(&self, pos: TilePos) -> bool {
        self.things
            .get(&pos)
            .is_some_and(|t| t.kind == ThingKind::Door)
    }

    fn is_tile_frozen(&self, pos: TilePos) -> bool {
        self.frozen.get(&pos).copied().unwrap_or(false)
    }

    fn terrain_allows(&self, pos: TilePos) -> bool {
        self.tile(pos).walkable()
    }

    fn is_ramp(&self, pos: TilePos) -> bool {
        self.ramps.get(&pos).copied().unwrap_or(false)
    }

    fn can_traverse_elevation(&self, from: TilePos, to: TilePos) -> bool {
        let h_from = self.heights.get(&from).copied().unwrap_or(0);
        let h_to = self.heights.get(&to).copied().unwrap_or(0);
        h_from == h_to || self.is_ramp(from) || self.is_ramp(to)
    }

    fn is_water_blocked_for_agent(&self, _agent: AgentId, pos: TilePos) -> bool {
        self.tile(pos) == TerrainKind::Water
    }

    fn can_agent_pass_door(&self, agent: AgentId, pos: TilePos) -> bool {
        let door_team = self.things.get(&pos).and_then(|t| t.team);
        let agent_team = self.agents.get(agent.0 as usize).map(|a| a.info.team);
        match (door_team, agent_team) {
            (Some(door), Some(team)) => door == team,
            _ => true,
        }
    }

    fn can_place(&self, pos: TilePos) -> bool {
        self.dims.in_playable(pos)
            && self.terrain_allows(pos)
            && !self.is_tile_frozen(pos)
            && self.is_empty(pos)
    }

    fn nearest_of_kind(&self, origin: TilePos, kind: ThingKind, max_dist: i32) -> Option<ThingRef> {
        self.things
            .values()
            .filter(|t| t.kind == kind && t.pos.chebyshev(origin) <= max_dist)
            .min_by_key(|t| (t.pos.chebyshev(origin), t.pos.x, t.pos.y))
            .copied()
    }

    fn nearest_friendly_of_kind(
        &self,
        origin: TilePos,
        team: TeamId,
        kind: ThingKind,
        max_dist: i32,
    ) -> Option<ThingRef> {
        self.things
            .values()
            .filter(|t| t.kind == kind && t.team == Some(team) && t.pos.chebyshev(origin) <= max_dist)
            .min_by_key(|t| (t.pos.chebyshev(origin), t.pos.x, t.pos.y))
            .copied()
    }

    fn collect_in_range(
        &self,
        origin: TilePos,
        kind: ThingKind,
        radius: i32,
        out: &mut Vec<ThingRef>,
    ) {
        out.clear();
        out.extend(
            self.things
                .values()
                .filter(|t| t.kind == kind && t.pos.chebyshev(origin) <= radius)
                .copied(),
        );
    }

    fn count_of_kind(&self, team: TeamId, kind: ThingKind) -> u32 {
        self.things
            .values()
            .filter(|t| t.kind == kind && t.team == Some(team))
            .count() as u32
    }

    fn agent(&self, id: AgentId) -> Option<AgentInfo> {
        self.agents.get(id.0 as usize).map(|a| a.info)
    }

    fn agent_count(&self) -> u32 {
        self.agents.len() as u32
    }

    fn collect_agents_in_range(&self, origin: TilePos, radius: i32, out: &mut Vec<AgentInfo>) {
        out.clear();
        out.extend(
            self.agents
                .iter()
                .filter(|a| a.info.alive && a.info.pos.chebyshev(origin) <= radius)
                .map(|a| a.info),
        );
    }

    fn nearest_foreign_agent(
        &self,
        origin: TilePos,
        team: TeamId,
        max_dist: i32,
    ) -> Option<AgentInfo> {
        self.agents
            .iter()
            .filter(|a| {
                a.info.alive && a.info.team != team && a.info.pos.chebyshev(origin) <= max_dist
            })
            .min_by_key(|a| a.info.pos.chebyshev(origin))
            .map(|a| a.info)
    }

    fn stockpile_count(&self, team: TeamId, resource: ResourceKind) -> u32 {
        self.stockpiles.get(&(team, resource)).copied().unwrap_or(0)
    }

    fn can_afford_build(&self, agent: AgentId, building: BuildingKind) -> bool {
        let Some(team) = self.agents.get(agent.0 as usize).map(|a| a.info.team) else {
            return false;
        };
        self.can_spend(team, build_cost(building))
    }

    fn population(&self, team: TeamId) -> u32 {
        self.population.get(&team).map(|&(pop, _)| pop).unwrap_or_else(|| {
            self.agents
                .iter()
                .filter(|a| a.info.alive && a.info.team == team)
                .count() as u32
        })
    }

    fn population_cap(&self, team: TeamId) -> u32 {
        self.population.get(&team).map(|&(_, cap)| cap).unwrap_or(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_and_blocking() {
        let mut world = SandboxWorld::open(16, 16, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        assert!(world.move_agent(id, Direction::East));
        assert_eq!(world.agent(id).unwrap().pos, TilePos::new(6, 5));

        world.add_wall(TilePos::new(7, 5));
        assert!(!world.move_agent(id, Direction::East));
        assert_eq!(world.agent(id).unwrap().pos, TilePos::new(6, 5));
    }

    #[test]
    fn test_move_pushes_lantern() {
        let mut world = SandboxWorld::open(16, 16, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        world.add_thing(ThingKind::Lantern, TilePos::new(6, 5));
        assert!(world.move_agent(id, Direction::East));
        assert_eq!(world.agent(id).unwrap().pos, TilePos::new(6, 5));
        // Lantern landed two ahead.
        assert_eq!(
            world.thing_at(TilePos::new(8, 5)).map(|t| t.kind),
            Some(ThingKind::Lantern)
        );
    }

    #[test]
    fn test_harvest_deposit_cycle() {
        let mut world = SandboxWorld::open(16, 16, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        world.add_thing(ThingKind::Tree, TilePos::new(6, 5));
        world.add_team_thing(ThingKind::Stockpile, TilePos::new(4, 5), TeamId(0));

        world.apply(id, Action::use_toward(Direction::East));
        assert_eq!(
            world.agent(id).unwrap().carried,
            Some((ResourceKind::Wood, HARVEST_TAKE))
        );

        world.apply(id, Action::use_toward(Direction::West));
        assert_eq!(world.agent(id).unwrap().carried, None);
        assert_eq!(world.stockpile_count(TeamId(0), ResourceKind::Wood), HARVEST_TAKE);
    }

    #[test]
    fn test_build_charges_stockpile() {
        let mut world = SandboxWorld::open(16, 16, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        world.set_stockpile(TeamId(0), ResourceKind::Wood, 25);
        world.apply(id, Action::encode(Verb::Build, BuildingKind::House.build_choice()));
        assert_eq!(world.count_of_kind(TeamId(0), ThingKind::House), 1);
        assert_eq!(world.stockpile_count(TeamId(0), ResourceKind::Wood), 5);
    }
}
