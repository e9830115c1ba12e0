//! Public API for the controller.
//!
//! The host simulation owns the world and the clock. Each tick it calls
//! [`Controller::update_controller`] once, then [`Controller::decide_action`]
//! for every living agent in id order, and applies the returned action
//! bytes itself. Everything the host can configure — patrols, stances,
//! difficulty, command queues — goes through the mutators here.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::actions::Action;
use crate::components::{
    AgentBundle, BehaviorSlot, BlockedMove, BuildPlan, Command, EscapeState, LastAction, Orders,
    PlannedPath, RoleSlot, SenseCache, SpiralCursor, Trail,
};
use crate::config::{ControllerConfig, DifficultyConfig};
use crate::grid::TilePos;
use crate::options::DecisionCtx;
use crate::pathfind::PathCache;
use crate::roles::{Role, RoleCatalog};
use crate::snapshot::{AgentSnapshot, ControllerSnapshot, TeamSnapshot};
use crate::systems::decide::decide_for_agent;
use crate::systems::update::{build_maintenance_schedule, HybridRoleQueue, WorldFacts};
use crate::team::{TeamRegistry, TeamState};
use crate::world::{AgentId, Stance, TeamId, WorldView};

#[cfg(feature = "profile")]
use crate::profiler::{Stage, TickProfiler};

type AgentComponents = (
    &'static mut RoleSlot,
    &'static mut BehaviorSlot,
    &'static mut Trail,
    &'static mut EscapeState,
    &'static mut BlockedMove,
    &'static mut LastAction,
    &'static mut SpiralCursor,
    &'static mut SenseCache,
    &'static mut BuildPlan,
    &'static mut PlannedPath,
    &'static mut Orders,
);

/// The scripted decision-maker for every non-player agent.
///
/// Holds a private ECS store with one entity per tracked agent, the shared
/// team registry as a resource, the reusable pathfinding cache, and the
/// seeded RNG that makes runs reproducible.
pub struct Controller {
    store: World,
    agents: HashMap<AgentId, Entity>,
    catalog: RoleCatalog,
    config: ControllerConfig,
    nav: PathCache,
    rng: Pcg32,
    maintenance: Schedule,
    last_step: Option<u64>,
    #[cfg(feature = "profile")]
    profiler: TickProfiler,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let mut store = World::new();
        store.insert_resource(TeamRegistry::new(&config));
        store.insert_resource(HybridRoleQueue::default());
        store.insert_resource(WorldFacts::default());

        Self {
            store,
            agents: HashMap::new(),
            catalog: RoleCatalog::default(),
            nav: PathCache::new(config.dims),
            rng: Pcg32::seed_from_u64(config.rng_seed),
            maintenance: build_maintenance_schedule(),
            last_step: None,
            config,
            #[cfg(feature = "profile")]
            profiler: TickProfiler::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Number of agents the controller has seen so far.
    pub fn tracked_agents(&self) -> usize {
        self.agents.len()
    }

    // ========================================================================
    // PER-TICK ENTRY POINTS
    // ========================================================================

    /// Once-per-tick bookkeeping; call before any `decide_action`.
    pub fn update_controller(&mut self, world: &dyn WorldView) {
        #[cfg(feature = "profile")]
        let started = std::time::Instant::now();

        let step = world.current_step();
        if self.last_step.is_some_and(|last| step < last) {
            log::info!("world step went backwards ({:?} -> {}), episode reset", self.last_step, step);
            self.reset_episode();
        }
        self.last_step = Some(step);

        let facts = WorldFacts::gather(
            world,
            self.config.team_count as usize,
            self.agents.keys().copied(),
        );
        self.store.insert_resource(facts);
        self.maintenance.run(&mut self.store);

        self.apply_hybrid_roles();

        #[cfg(feature = "profile")]
        {
            self.profiler.record(Stage::Maintenance, started.elapsed());
            self.profiler.tick();
        }
    }

    /// Decide one agent's action for this tick.
    ///
    /// Total on any input: unknown ids, dead agents, and out-of-range teams
    /// all come back as no action.
    pub fn decide_action(&mut self, world: &dyn WorldView, agent: AgentId) -> Action {
        #[cfg(feature = "profile")]
        let started = std::time::Instant::now();

        let Some(info) = world.agent(agent) else {
            return Action::NONE;
        };
        if !info.alive {
            return Action::NONE;
        }
        let entity = self.ensure_entity(agent);

        let decided = {
            let Controller {
                store,
                catalog,
                config,
                nav,
                rng,
                ..
            } = self;

            let mut decided = Action::NONE;
            store.resource_scope(|store, mut teams: Mut<TeamRegistry>| {
                let Some(team) = teams.get_mut(info.team) else {
                    return;
                };
                let mut query = store.query::<AgentComponents>();
                let Ok((
                    mut role,
                    mut slot,
                    mut trail,
                    mut escape,
                    mut blocked,
                    mut last_action,
                    mut spiral,
                    mut sense,
                    mut build,
                    mut path,
                    mut orders,
                )) = query.get_mut(store, entity)
                else {
                    return;
                };

                let mut ctx = DecisionCtx {
                    world,
                    config: &*config,
                    id: agent,
                    info,
                    role: &mut role,
                    slot: &mut slot,
                    trail: &mut trail,
                    escape: &mut escape,
                    blocked: &mut blocked,
                    last_action: &mut last_action,
                    spiral: &mut spiral,
                    sense: &mut sense,
                    build: &mut build,
                    path: &mut path,
                    orders: &mut orders,
                    team,
                    nav,
                    rng,
                };
                let action = decide_for_agent(&mut ctx, catalog);
                ctx.last_action.set(action);
                decided = action;
            });
            decided
        };

        #[cfg(feature = "profile")]
        self.profiler.record(Stage::Decide, started.elapsed());

        decided
    }

    // ========================================================================
    // CONFIGURATION MUTATORS
    // ========================================================================

    /// Replace a team's difficulty knobs.
    pub fn set_difficulty(&mut self, team: TeamId, difficulty: DifficultyConfig) {
        if let Some(state) = self.store.resource_mut::<TeamRegistry>().get_mut(team) {
            state.difficulty = difficulty;
            state.delay_chance = difficulty.decision_delay_chance;
        }
    }

    pub fn set_patrol(&mut self, agent: AgentId, waypoints: Vec<TilePos>) {
        self.with_orders(agent, |orders| {
            orders.patrol = waypoints;
            orders.patrol_leg = 0;
            orders.stopped = false;
        });
    }

    pub fn set_attack_move_target(&mut self, agent: AgentId, target: Option<TilePos>) {
        self.with_orders(agent, |orders| {
            orders.attack_move = target;
            orders.stopped = false;
        });
    }

    pub fn set_rally_point(&mut self, agent: AgentId, target: Option<TilePos>) {
        self.with_orders(agent, |orders| {
            orders.rally = target;
            orders.stopped = false;
        });
    }

    pub fn set_hold_position(&mut self, agent: AgentId, hold: bool) {
        self.with_orders(agent, |orders| orders.hold = hold);
    }

    pub fn set_follow_target(&mut self, agent: AgentId, target: Option<AgentId>) {
        self.with_orders(agent, |orders| {
            orders.follow = target;
            orders.stopped = false;
        });
    }

    pub fn set_guard_target(&mut self, agent: AgentId, target: Option<TilePos>) {
        self.with_orders(agent, |orders| {
            orders.guard = target;
            orders.stopped = false;
        });
    }

    pub fn set_settler_target(&mut self, agent: AgentId, target: Option<TilePos>) {
        self.with_orders(agent, |orders| {
            orders.settler = target;
            orders.stopped = false;
        });
    }

    /// Drop every standing order and stand down until re-ordered.
    pub fn stop_agent(&mut self, agent: AgentId) {
        self.with_orders(agent, |orders| {
            orders.patrol.clear();
            orders.patrol_leg = 0;
            orders.attack_move = None;
            orders.rally = None;
            orders.follow = None;
            orders.guard = None;
            orders.settler = None;
            orders.commands.clear();
            orders.stopped = true;
        });
    }

    pub fn push_command(&mut self, agent: AgentId, command: Command) {
        self.with_orders(agent, |orders| {
            orders.push_command(command);
            orders.stopped = false;
        });
    }

    /// Drop and return the front of an agent's command queue.
    pub fn pop_command(&mut self, agent: AgentId) -> Option<Command> {
        let entity = self.ensure_entity(agent);
        self.store
            .get_mut::<Orders>(entity)
            .and_then(|mut orders| orders.pop_command())
    }

    pub fn clear_commands(&mut self, agent: AgentId) {
        self.with_orders(agent, |orders| orders.commands.clear());
    }

    pub fn set_stance(&mut self, agent: AgentId, stance: Stance) {
        self.with_orders(agent, |orders| orders.stance = stance);
    }

    pub fn stance(&self, agent: AgentId) -> Stance {
        self.agents
            .get(&agent)
            .and_then(|&entity| self.store.get::<Orders>(entity))
            .map(|orders| orders.stance)
            .unwrap_or_default()
    }

    /// Queue a hybrid role for an agent; applied at the next
    /// `update_controller`.
    pub fn queue_hybrid_role(&mut self, agent: AgentId, role: Role) {
        self.store
            .resource_mut::<HybridRoleQueue>()
            .pending
            .push((agent, role));
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Shared state of one team, if the id is in range.
    pub fn team(&self, team: TeamId) -> Option<&TeamState> {
        self.store.get_resource::<TeamRegistry>()?.get(team)
    }

    /// The active option index and its tick count for an agent.
    pub fn active_option(&self, agent: AgentId) -> Option<(usize, u32)> {
        let slot = self
            .agents
            .get(&agent)
            .and_then(|&entity| self.store.get::<BehaviorSlot>(entity))?;
        slot.active.map(|index| (index, slot.ticks))
    }

    /// The action most recently returned for an agent.
    pub fn last_action(&self, agent: AgentId) -> Option<Action> {
        self.agents
            .get(&agent)
            .and_then(|&entity| self.store.get::<LastAction>(entity))
            .map(|last| last.as_action())
    }

    /// Whether the agent is currently in escape mode.
    pub fn is_escaping(&self, agent: AgentId) -> bool {
        self.agents
            .get(&agent)
            .and_then(|&entity| self.store.get::<EscapeState>(entity))
            .map(|escape| escape.active)
            .unwrap_or(false)
    }

    pub fn role_catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Capture a serializable view of the controller's state.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let mut agents: Vec<AgentSnapshot> = self
            .agents
            .iter()
            .map(|(&id, &entity)| {
                let role = self.store.get::<RoleSlot>(entity);
                let slot = self.store.get::<BehaviorSlot>(entity);
                let escape = self.store.get::<EscapeState>(entity);
                let orders = self.store.get::<Orders>(entity);
                AgentSnapshot {
                    id: id.0,
                    role_kind: role.and_then(|r| r.id.map(|_| r.kind)),
                    role_id: role.and_then(|r| r.id),
                    active_option: slot.and_then(|s| s.active),
                    option_ticks: slot.map(|s| s.ticks).unwrap_or(0),
                    escaping: escape.map(|e| e.active).unwrap_or(false),
                    stance: orders.map(|o| o.stance).unwrap_or_default(),
                    stopped: orders.map(|o| o.stopped).unwrap_or(false),
                }
            })
            .collect();
        agents.sort_by_key(|a| a.id);

        let teams = self
            .store
            .get_resource::<TeamRegistry>()
            .map(|registry| {
                registry
                    .iter()
                    .map(|team| TeamSnapshot {
                        threat_count: team.threats.count(),
                        reservation_count: team.reservations.len(),
                        revealed_tiles: team.fog.revealed_count(),
                        delay_chance: team.delay_chance,
                    })
                    .collect()
            })
            .unwrap_or_default();

        ControllerSnapshot {
            step: self.last_step,
            agents,
            teams,
        }
    }

    /// Stage timings collected so far (`profile` builds only).
    #[cfg(feature = "profile")]
    pub fn profiler(&self) -> &TickProfiler {
        &self.profiler
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn ensure_entity(&mut self, agent: AgentId) -> Entity {
        if let Some(&entity) = self.agents.get(&agent) {
            return entity;
        }
        let entity = self.store.spawn(AgentBundle::default()).id();
        self.agents.insert(agent, entity);
        entity
    }

    fn with_orders(&mut self, agent: AgentId, edit: impl FnOnce(&mut Orders)) {
        let entity = self.ensure_entity(agent);
        if let Some(mut orders) = self.store.get_mut::<Orders>(entity) {
            edit(&mut orders);
        }
    }

    fn apply_hybrid_roles(&mut self) {
        let pending =
            std::mem::take(&mut self.store.resource_mut::<HybridRoleQueue>().pending);
        for (agent, role) in pending {
            let kind = role.kind;
            let role_id = self.catalog.push(role);
            let entity = self.ensure_entity(agent);
            if let Some(mut slot) = self.store.get_mut::<RoleSlot>(entity) {
                slot.assign(kind, role_id);
            }
            if let Some(mut behavior) = self.store.get_mut::<BehaviorSlot>(entity) {
                behavior.clear();
            }
            log::debug!("agent {:?}: hybrid role {} applied", agent, role_id);
        }
    }

    /// The world clock ran backwards: a new episode started. Team state is
    /// wiped and every agent re-initializes lazily; standing orders are the
    /// host's to keep or clear.
    fn reset_episode(&mut self) {
        self.store.resource_mut::<TeamRegistry>().reset_all();
        let mut query = self.store.query::<AgentComponents>();
        for (
            mut role,
            mut slot,
            mut trail,
            mut escape,
            mut blocked,
            mut last_action,
            mut spiral,
            mut sense,
            mut build,
            mut path,
            _orders,
        ) in query.iter_mut(&mut self.store)
        {
            *role = RoleSlot::default();
            *slot = BehaviorSlot::default();
            trail.clear();
            escape.clear();
            blocked.clear();
            *last_action = LastAction::default();
            *spiral = SpiralCursor::default();
            sense.clear();
            path.clear();
            path.blocked_target = None;
            build.clear();
        }
        self.last_step = None;
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Verb;
    use crate::sandbox::SandboxWorld;
    use crate::team::MAX_THREAT_ENTRIES;
    use crate::world::{AgentClass, ResourceKind, ThingKind};

    fn seeded_world(agents_per_team: u32, teams: u8) -> (SandboxWorld, Vec<AgentId>) {
        let mut world = SandboxWorld::open(96, 96, 2);
        let mut ids = Vec::new();
        for team in 0..teams {
            for i in 0..agents_per_team {
                let x = 10 + (team as i32) * 20 + (i as i32 % 6) * 2;
                let y = 10 + (i as i32 / 6) * 2;
                ids.push(world.spawn_agent(team, AgentClass::Worker, TilePos::new(x, y)));
            }
        }
        // Scatter resources so gatherers have work.
        for i in 0..20 {
            world.add_thing(ThingKind::Tree, TilePos::new(20 + (i * 3) % 50, 30 + (i * 7) % 40));
            world.add_thing(
                ThingKind::BerryBush,
                TilePos::new(25 + (i * 5) % 40, 35 + (i * 11) % 30),
            );
        }
        (world, ids)
    }

    #[test]
    fn test_new_controller() {
        let controller = Controller::new();
        assert_eq!(controller.tracked_agents(), 0);
        assert_eq!(controller.role_catalog().len(), 4);
    }

    #[test]
    fn test_unknown_agent_is_noop() {
        let mut controller = Controller::new();
        let world = SandboxWorld::open(32, 32, 2);
        let action = controller.decide_action(&world, AgentId(42));
        assert!(action.is_none());
        assert_eq!(controller.tracked_agents(), 0);
    }

    #[test]
    fn test_dead_agent_is_noop() {
        let mut controller = Controller::new();
        let mut world = SandboxWorld::open(32, 32, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        world.kill_agent(id);
        assert!(controller.decide_action(&world, id).is_none());
    }

    #[test]
    fn test_last_action_matches_returned_action() {
        let mut controller = Controller::new();
        let (mut world, ids) = seeded_world(6, 1);
        controller.update_controller(&world);
        for &id in &ids {
            let action = controller.decide_action(&world, id);
            let stored = controller.last_action(id).unwrap();
            assert_eq!(stored, action);
            world.apply(id, action);
        }
    }

    #[test]
    fn test_decision_delay_full_chance_noops() {
        let mut controller = Controller::new();
        let (world, ids) = seeded_world(4, 1);
        controller.set_difficulty(
            TeamId(0),
            DifficultyConfig {
                decision_delay_chance: 1.0,
                delay_chance_min: 1.0,
                delay_chance_max: 1.0,
                threat_updates: false,
                adaptive: false,
            },
        );
        controller.update_controller(&world);
        for &id in &ids {
            assert!(controller.decide_action(&world, id).is_none());
        }
    }

    #[test]
    fn test_oscillation_enters_escape_and_breaks_out() {
        let mut controller = Controller::new();
        let mut world = SandboxWorld::open(32, 32, 2);
        let anchor = TilePos::new(16, 16);
        let id = world.spawn_agent(0, AgentClass::Worker, anchor);
        // Two waypoints inside each other's arrival radius: a pure shuffle.
        controller.set_patrol(id, vec![anchor, TilePos::new(16, 17)]);

        let mut escaped = false;
        let mut max_displacement = 0;
        for _ in 0..40 {
            controller.update_controller(&world);
            let action = controller.decide_action(&world, id);
            world.apply(id, action);
            world.step_forward();
            escaped |= controller.is_escaping(id);
            let pos = world.agent(id).unwrap().pos;
            max_displacement = max_displacement.max(pos.chebyshev(anchor));
        }
        assert!(escaped, "shuffling agent never entered escape mode");
        assert!(
            max_displacement >= 3,
            "escape moved the agent only {} tiles",
            max_displacement
        );
    }

    #[test]
    fn test_flee_preempts_explore() {
        let mut controller = Controller::new();
        let mut world = SandboxWorld::open(48, 48, 2);
        // Slot 0 of a team of six is a gatherer.
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(20, 20));

        controller.update_controller(&world);
        let first = controller.decide_action(&world, id);
        assert_eq!(first.verb(), Verb::Move);
        let (active, _) = controller.active_option(id).expect("an option is active");
        // No trees, no danger: the gatherer is exploring (last option).
        let explore_index = controller.role_catalog().get(0).unwrap().options.len() - 1;
        assert_eq!(active, explore_index);

        // An armed enemy appears next tick: flee (index 0) must preempt.
        world.spawn_agent_with(1, AgentClass::Melee, TilePos::new(23, 20), 6, 1);
        world.step_forward();
        controller.update_controller(&world);
        let second = controller.decide_action(&world, id);
        assert_eq!(second.verb(), Verb::Move);
        let (active, ticks) = controller.active_option(id).expect("flee stays active");
        assert_eq!(active, 0);
        assert_eq!(ticks, 1);
    }

    #[test]
    fn test_gatherers_reserve_distinct_trees() {
        let mut controller = Controller::new();
        let mut world = SandboxWorld::open(32, 32, 2);
        let a = world.spawn_agent(0, AgentClass::Worker, TilePos::new(10, 10));
        let b = world.spawn_agent(0, AgentClass::Worker, TilePos::new(11, 10));
        world.add_thing(ThingKind::Tree, TilePos::new(14, 10));
        world.add_thing(ThingKind::Tree, TilePos::new(10, 14));

        controller.update_controller(&world);
        let act_a = controller.decide_action(&world, a);
        let act_b = controller.decide_action(&world, b);
        assert_eq!(act_a.verb(), Verb::Move);
        assert_eq!(act_b.verb(), Verb::Move);
        // Both trees end up reserved, one per gatherer.
        let team = controller.team(TeamId(0)).unwrap();
        assert_eq!(team.reservations.len(), 2);
    }

    #[test]
    fn test_episode_reset_reinitializes() {
        let mut controller = Controller::new();
        let (mut world, ids) = seeded_world(6, 1);
        world.set_step(10);
        controller.update_controller(&world);
        for &id in &ids {
            controller.decide_action(&world, id);
        }
        assert!(controller.active_option(ids[0]).is_some() || controller.last_action(ids[0]).is_some());

        // The clock runs backwards: new episode.
        world.set_step(0);
        controller.update_controller(&world);
        assert!(controller.active_option(ids[0]).is_none());
        assert_eq!(controller.last_action(ids[0]), Some(Action::NONE));
        assert!(controller.team(TeamId(0)).unwrap().reservations.is_empty());
        assert_eq!(controller.team(TeamId(0)).unwrap().threats.count(), 0);
    }

    #[test]
    fn test_hybrid_role_applies_on_update() {
        let mut controller = Controller::new();
        let mut world = SandboxWorld::open(32, 32, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));

        controller.update_controller(&world);
        controller.decide_action(&world, id);

        let hybrid = Role {
            name: "warden".to_string(),
            kind: crate::roles::RoleKind::Fighter,
            options: vec![crate::options::OptionDef::new(
                "explore",
                crate::behaviors::Behavior::Explore,
                true,
            )],
        };
        controller.queue_hybrid_role(id, hybrid);
        world.step_forward();
        controller.update_controller(&world);
        assert_eq!(controller.role_catalog().len(), 5);

        // The agent now runs its hybrid list.
        let action = controller.decide_action(&world, id);
        assert_eq!(action.verb(), Verb::Move);
        assert_eq!(controller.active_option(id), Some((0, 1)));
    }

    #[test]
    fn test_stop_and_stance_mutators() {
        let mut controller = Controller::new();
        let mut world = SandboxWorld::open(32, 32, 2);
        let id = world.spawn_agent(0, AgentClass::Melee, TilePos::new(10, 10));

        controller.set_stance(id, Stance::NoAttack);
        assert_eq!(controller.stance(id), Stance::NoAttack);

        controller.set_patrol(id, vec![TilePos::new(5, 5), TilePos::new(15, 15)]);
        controller.stop_agent(id);
        controller.update_controller(&world);
        let action = controller.decide_action(&world, id);
        assert!(action.is_none(), "stopped agents stand still");
    }

    #[test]
    fn test_stress_two_hundred_agents() {
        use std::time::Instant;

        let mut controller = Controller::with_config(ControllerConfig {
            dims: crate::grid::GridDims::new(96, 96, 2),
            team_count: 4,
            ..Default::default()
        });
        let (mut world, ids) = seeded_world(50, 4);
        assert_eq!(ids.len(), 200);

        let start = Instant::now();
        let ticks = 50;
        for _ in 0..ticks {
            controller.update_controller(&world);
            for &id in &ids {
                let action = controller.decide_action(&world, id);
                world.apply(id, action);
            }
            world.step_forward();
        }
        let elapsed = start.elapsed();
        println!(
            "200 agents, {} ticks in {:?} ({:.2} ms/tick)",
            ticks,
            elapsed,
            elapsed.as_millis() as f64 / ticks as f64
        );
        #[cfg(feature = "profile")]
        println!("{}", controller.profiler().summary());

        // Shared-state invariants hold after sustained play.
        for team in 0..4 {
            let state = controller.team(TeamId(team)).unwrap();
            assert!(state.threats.count() <= MAX_THREAT_ENTRIES);
        }
        // Gatherers actually gathered something somewhere.
        let harvested: u32 = (0..4)
            .map(|t| world.stockpile_count(TeamId(t), ResourceKind::Wood))
            .sum();
        let carried = ids
            .iter()
            .filter(|&&id| world.agent(id).unwrap().carried.is_some())
            .count();
        assert!(
            harvested > 0 || carried > 0,
            "no team made any economic progress"
        );
        assert!(elapsed.as_secs() < 30, "controller too slow: {:?}", elapsed);
    }
}
