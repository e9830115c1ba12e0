//! Gatherer behaviors: fleeing, hauling, harvesting, replanting.

use crate::actions::{Action, Direction, Verb};
use crate::grid::TilePos;
use crate::options::DecisionCtx;
use crate::pathfind::move_towards;
use crate::search::find_thing;
use crate::systems::movement::move_to;
use crate::world::{AgentClass, AgentInfo, ResourceKind, ThingKind};

/// Load size at which a gatherer turns around to deposit.
pub const CARRY_FULL: u32 = 10;

/// Chebyshev distance at which an armed foreigner triggers fleeing.
const FLEE_TRIGGER: i32 = 8;

/// Distance at which fleeing stops (hysteresis over the trigger).
const FLEE_EXIT: i32 = 12;

/// No tree within this radius counts as local wood scarcity.
const PLANT_SCARCITY_RADIUS: i32 = 12;

/// How far away a deposit target is still worth walking to.
const DEPOSIT_SEARCH_RADIUS: i32 = 64;

/// Radius scanned for an alternative source when the nearest is reserved.
const HARVEST_FALLBACK_RADIUS: i32 = 20;

fn nearest_menace(ctx: &DecisionCtx, radius: i32) -> Option<AgentInfo> {
    ctx.world
        .nearest_foreign_agent(ctx.pos(), ctx.info.team, radius)
        .filter(|a| a.class.is_combatant() || a.class == AgentClass::Goblin)
}

/// Direction from `from` toward an adjacent-ish `to`, for Use/Attack args.
pub fn facing(from: TilePos, to: TilePos) -> Option<Direction> {
    Direction::from_delta(to.x - from.x, to.y - from.y)
}

// ============================================================================
// FLEE
// ============================================================================

pub fn flee_can_start(ctx: &mut DecisionCtx) -> bool {
    nearest_menace(ctx, FLEE_TRIGGER).is_some()
}

pub fn flee_act(ctx: &mut DecisionCtx) -> Action {
    let Some(menace) = nearest_menace(ctx, FLEE_EXIT) else {
        return Action::NONE;
    };
    let pos = ctx.pos();
    // Project the escape target a few tiles past our own position.
    let away = TilePos::new(
        pos.x + (pos.x - menace.pos.x).signum() * 4,
        pos.y + (pos.y - menace.pos.y).signum() * 4,
    );
    match move_towards(ctx.world, ctx.id, pos, away, ctx.blocked.avoid()) {
        Some(dir) => Action::step(dir),
        None => Action::NONE,
    }
}

pub fn flee_should_terminate(ctx: &mut DecisionCtx) -> bool {
    nearest_menace(ctx, FLEE_EXIT).is_none()
}

// ============================================================================
// DEPOSIT
// ============================================================================

pub fn deposit_can_start(ctx: &mut DecisionCtx) -> bool {
    ctx.info.carried.is_some_and(|(_, amount)| amount >= CARRY_FULL)
}

pub fn deposit_act(ctx: &mut DecisionCtx) -> Action {
    if ctx.info.carried.is_none() {
        return Action::NONE;
    }
    let pos = ctx.pos();
    let Some(store) = ctx.world.nearest_friendly_of_kind(
        pos,
        ctx.info.team,
        ThingKind::Stockpile,
        DEPOSIT_SEARCH_RADIUS,
    ) else {
        return Action::NONE;
    };
    if pos.chebyshev(store.pos) <= 1 {
        match facing(pos, store.pos) {
            Some(dir) => Action::use_toward(dir),
            None => Action::NONE,
        }
    } else {
        move_to(ctx, store.pos)
    }
}

pub fn deposit_should_terminate(ctx: &mut DecisionCtx) -> bool {
    ctx.info.carried.is_none()
}

// ============================================================================
// HARVEST
// ============================================================================

pub fn harvest_can_start(ctx: &mut DecisionCtx, resource: ResourceKind) -> bool {
    match ctx.info.carried {
        Some((carried, amount)) if carried != resource || amount >= CARRY_FULL => return false,
        _ => {}
    }
    let Some(kind) = ThingKind::for_resource(resource) else {
        return false;
    };
    find_thing(ctx.world, ctx.spiral, ctx.sense, kind).is_some()
}

pub fn harvest_act(ctx: &mut DecisionCtx, resource: ResourceKind) -> Action {
    let Some(kind) = ThingKind::for_resource(resource) else {
        return Action::NONE;
    };
    let Some(mut target) = find_thing(ctx.world, ctx.spiral, ctx.sense, kind) else {
        return Action::NONE;
    };

    let step = ctx.step();
    if ctx.team.reservations.is_reserved_by_other(ctx.id, target, step) {
        // Someone beat us to this tile; try the next nearest source.
        ctx.sense.invalidate(kind);
        log::trace!("agent {:?}: {:?} at {:?} already reserved", ctx.id, kind, target);
        let Some(fallback) = next_unreserved(ctx, kind, step) else {
            return Action::NONE;
        };
        ctx.sense.put(kind, fallback, step);
        target = fallback;
    }
    if !ctx.team.reservations.reserve(ctx.id, target, step) {
        ctx.sense.invalidate(kind);
        return Action::NONE;
    }

    let pos = ctx.pos();
    if pos.chebyshev(target) <= 1 {
        match facing(pos, target) {
            Some(dir) => Action::use_toward(dir),
            None => Action::NONE,
        }
    } else {
        move_to(ctx, target)
    }
}

/// The closest harvestable source of `kind` nobody else has dibs on.
fn next_unreserved(ctx: &DecisionCtx, kind: ThingKind, step: u64) -> Option<TilePos> {
    let pos = ctx.pos();
    let mut candidates = Vec::new();
    ctx.world.collect_in_range(pos, kind, HARVEST_FALLBACK_RADIUS, &mut candidates);
    candidates.sort_by_key(|t| (t.pos.chebyshev(pos), t.pos.x, t.pos.y));
    candidates
        .iter()
        .find(|t| {
            t.has_harvestable_resource()
                && !ctx.team.reservations.is_reserved_by_other(ctx.id, t.pos, step)
        })
        .map(|t| t.pos)
}

pub fn harvest_should_terminate(ctx: &mut DecisionCtx, resource: ResourceKind) -> bool {
    ctx.info
        .carried
        .is_some_and(|(carried, amount)| carried == resource && amount >= CARRY_FULL)
}

// ============================================================================
// PLANT
// ============================================================================

pub fn plant_can_start(ctx: &mut DecisionCtx) -> bool {
    // Replanting spends a sapling's worth of stockpiled wood.
    if !ctx.world.can_spend(ctx.info.team, &[(ResourceKind::Wood, 1)]) {
        return false;
    }
    if ctx
        .world
        .nearest_of_kind(ctx.pos(), ThingKind::Tree, PLANT_SCARCITY_RADIUS)
        .is_some()
    {
        return false;
    }
    plant_spot(ctx).is_some()
}

pub fn plant_act(ctx: &mut DecisionCtx) -> Action {
    match plant_spot(ctx) {
        Some(dir) => Action::encode(Verb::Plant, dir.index() as u8),
        None => Action::NONE,
    }
}

fn plant_spot(ctx: &DecisionCtx) -> Option<Direction> {
    let pos = ctx.pos();
    crate::actions::ALL_DIRECTIONS.into_iter().find(|dir| {
        let spot = dir.step_from(pos);
        ctx.world.dims().in_playable(spot) && ctx.world.can_place(spot)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::harness::CtxHarness;
    use crate::sandbox::SandboxWorld;

    #[test]
    fn test_harvest_reserves_and_walks() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        let tree = TilePos::new(9, 5);
        world.add_thing(ThingKind::Tree, tree);

        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        assert!(harvest_can_start(&mut ctx, ResourceKind::Wood));
        let action = harvest_act(&mut ctx, ResourceKind::Wood);
        assert_eq!(action.verb(), Verb::Move);
        assert!(!ctx.team.reservations.is_empty());
    }

    #[test]
    fn test_harvest_adjacent_uses() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        world.add_thing(ThingKind::Tree, TilePos::new(6, 5));

        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        let action = harvest_act(&mut ctx, ResourceKind::Wood);
        assert_eq!(action.verb(), Verb::Use);
        assert_eq!(action.arg() as usize, Direction::East.index());
    }

    #[test]
    fn test_harvest_yields_on_foreign_reservation() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        let tree = TilePos::new(7, 5);
        world.add_thing(ThingKind::Tree, tree);

        let mut harness = CtxHarness::new(&world, id);
        harness
            .team
            .reservations
            .reserve(crate::world::AgentId(99), tree, 0);
        let mut ctx = harness.ctx(&world);
        let action = harvest_act(&mut ctx, ResourceKind::Wood);
        assert!(action.is_none());
        // The memo was dropped so the next lookup can find another tree.
        assert!(ctx.sense.get(ThingKind::Tree).is_none());
    }

    #[test]
    fn test_flee_runs_away_from_menace() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(10, 10));
        world.spawn_agent_with(1, AgentClass::Melee, TilePos::new(13, 10), 5, 1);

        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        assert!(flee_can_start(&mut ctx));
        let action = flee_act(&mut ctx);
        assert_eq!(action.verb(), Verb::Move);
        let dir = Direction::from_index(action.arg() as usize);
        // Any step that does not close distance is acceptable; West is ideal.
        assert!(dir.step_from(TilePos::new(10, 10)).x <= 10);
    }

    #[test]
    fn test_deposit_gate() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(5, 5));
        let mut harness = CtxHarness::new(&world, id);
        {
            let mut ctx = harness.ctx(&world);
            assert!(!deposit_can_start(&mut ctx));
        }
        world.set_carried(id, Some((ResourceKind::Wood, CARRY_FULL)));
        let mut ctx = harness.ctx(&world);
        assert!(deposit_can_start(&mut ctx));
    }
}
