//! The per-agent decision pipeline.
//!
//! Stages run in a fixed order; the first stage producing a non-zero action
//! wins the tick. Everything here assumes the caller has already handled
//! dead/unspawned agents and detached the agent's components into the
//! context.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::actions::{Action, Direction, Verb, CARDINALS};
use crate::behaviors::{build, fight};
use crate::grid::TilePos;
use crate::options::{run_options, DecisionCtx};
use crate::pathfind::{can_enter_for_move, move_towards};
use crate::roles::{RoleCatalog, RoleKind};
use crate::systems::movement::{move_to, spiral_step};
use crate::systems::threat;
use crate::world::{AgentClass, ResourceKind, ThingKind};

/// Arrival threshold for patrol waypoints, rally points and attack-moves.
const ARRIVE_RADIUS: i32 = 2;

/// Chebyshev distance a follower keeps to its target.
const FOLLOW_RADIUS: i32 = 2;

/// How far a guard strays from its post before walking back.
const GUARD_RADIUS: i32 = 4;

/// Settlers abort within this distance of the destination.
const SETTLER_ARRIVE_RADIUS: i32 = 3;

/// Radius counting co-travelers of a settler group.
const SETTLER_GROUP_RADIUS: i32 = 6;

/// Goblins shy away from any non-kin agent this close.
const GOBLIN_AVOID_RADIUS: i32 = 8;

/// How far a goblin will smell out a relic.
const GOBLIN_RELIC_SEARCH: i32 = 40;

/// Trail windows for the stuck check.
const STUCK_WINDOW_BUILDER: usize = 6;
const STUCK_WINDOW_DEFAULT: usize = 10;
const STUCK_UNIQUE_MAX: usize = 3;

/// Decide one agent's action for this tick.
pub fn decide_for_agent(ctx: &mut DecisionCtx, catalog: &RoleCatalog) -> Action {
    // Lazy initialization: first decision picks a slot-based default role
    // and anchors the spiral. Standing orders are preserved.
    if !ctx.role.is_initialized() {
        let slot = ctx.id.0 % ctx.config.team_size.max(1);
        let role_id = catalog.default_for_slot(slot, ctx.config.team_size);
        if let Some(role) = catalog.get(role_id) {
            ctx.role.assign(role.kind, role_id);
        }
        ctx.slot.clear();
        ctx.spiral.reset(ctx.pos());
    }

    // Difficulty reaction lag.
    if ctx.team.delay_chance > 0.0 && ctx.rng.gen::<f32>() < ctx.team.delay_chance {
        return Action::NONE;
    }

    // Staggered shared-vision scan.
    if ctx.team.difficulty.threat_updates && threat::should_scan(ctx.id, ctx.step()) {
        threat::update_threat_map_from_vision(ctx);
    }

    // Unit auto-modes.
    if ctx.info.class == AgentClass::Scout && !ctx.orders.scout_mode {
        ctx.orders.scout_mode = true;
    }

    // Goblins play by their own rules.
    if ctx.info.class == AgentClass::Goblin {
        return goblin_decision(ctx);
    }

    // Stuck bookkeeping and the escape substate.
    if let Some(action) = stuck_and_escape(ctx) {
        return action;
    }

    // Anything in reach gets attacked regardless of the current option.
    if let Some(action) = fight::auto_attack(ctx) {
        return action;
    }

    if ctx.orders.stopped || ctx.orders.hold {
        return Action::NONE;
    }

    if let Some(action) = standing_orders(ctx) {
        return action;
    }

    if let Some(action) = settler_migration(ctx) {
        return action;
    }

    if ctx.role.kind == RoleKind::Gatherer {
        if let Some(action) = gatherer_globals(ctx) {
            return action;
        }
    }

    let Some(role_id) = ctx.role.id else {
        return Action::NONE;
    };
    let Some(role) = catalog.get(role_id) else {
        return Action::NONE;
    };
    run_options(&role.options, ctx)
}

// ============================================================================
// STUCK & ESCAPE
// ============================================================================

fn stuck_and_escape(ctx: &mut DecisionCtx) -> Option<Action> {
    let pos = ctx.pos();

    // A MOVE that left us on the same tile bounced off something.
    if ctx.last_action.verb == Verb::Move && ctx.trail.last() == Some(pos) {
        ctx.blocked
            .mark(Direction::from_index(ctx.last_action.arg as usize));
    }
    ctx.blocked.tick();

    let tried_to_move = ctx.last_action.verb == Verb::Move;
    ctx.trail.record(pos);

    if ctx.escape.active {
        return Some(escape_step(ctx));
    }

    let window = if ctx.role.kind == RoleKind::Builder {
        STUCK_WINDOW_BUILDER
    } else {
        STUCK_WINDOW_DEFAULT
    };
    if tried_to_move
        && ctx.trail.len() >= window
        && ctx.trail.unique_in_last(window) <= STUCK_UNIQUE_MAX
    {
        enter_escape(ctx);
        return Some(escape_step(ctx));
    }
    None
}

fn enter_escape(ctx: &mut DecisionCtx) {
    // Everything the agent believed about the area is suspect now.
    ctx.sense.clear();
    ctx.path.clear();
    ctx.path.blocked_target = None;
    ctx.blocked.clear();

    let pos = ctx.pos();
    let mut cardinals = CARDINALS;
    cardinals.shuffle(ctx.rng);
    let direction = cardinals
        .iter()
        .copied()
        .find(|dir| ctx.world.is_empty(dir.step_from(pos)))
        .unwrap_or(cardinals[0]);
    log::debug!("agent {:?}: stuck at {:?}, escaping {:?}", ctx.id, pos, direction);
    ctx.escape.begin(direction);
}

/// One escape tick: preferred direction, its perpendiculars, then the
/// opposite. Runs the full escape budget, quitting early only when every
/// candidate is walled off.
fn escape_step(ctx: &mut DecisionCtx) -> Action {
    let Some(dir) = ctx.escape.direction else {
        ctx.escape.clear();
        return Action::NONE;
    };
    ctx.escape.steps_remaining = ctx.escape.steps_remaining.saturating_sub(1);
    if ctx.escape.steps_remaining == 0 {
        ctx.escape.clear();
    }

    let pos = ctx.pos();
    let [perp_a, perp_b] = dir.perpendiculars();
    for candidate in [dir, perp_a, perp_b, dir.opposite()] {
        if can_enter_for_move(ctx.world, ctx.id, pos, candidate.step_from(pos)) {
            return Action::step(candidate);
        }
    }
    ctx.escape.clear();
    Action::NONE
}

// ============================================================================
// GOBLINS
// ============================================================================

/// Hard-coded override for the goblin class: hoard relics, avoid everyone.
fn goblin_decision(ctx: &mut DecisionCtx) -> Action {
    let relics = ctx
        .world
        .stockpile_count(ctx.info.team, ResourceKind::Relics);
    if relics >= ctx.config.goblin_relic_cap {
        return Action::NONE;
    }

    let pos = ctx.pos();
    if let Some(menace) =
        ctx.world
            .nearest_foreign_agent(pos, ctx.info.team, GOBLIN_AVOID_RADIUS)
    {
        let away = TilePos::new(
            pos.x + (pos.x - menace.pos.x).signum() * 4,
            pos.y + (pos.y - menace.pos.y).signum() * 4,
        );
        if let Some(dir) = move_towards(ctx.world, ctx.id, pos, away, ctx.blocked.avoid()) {
            return Action::step(dir);
        }
    }

    if let Some(relic) = ctx
        .world
        .nearest_of_kind(pos, ThingKind::Relic, GOBLIN_RELIC_SEARCH)
    {
        if pos.chebyshev(relic.pos) <= 1 {
            if let Some(dir) = Direction::from_delta(relic.pos.x - pos.x, relic.pos.y - pos.y) {
                return Action::use_toward(dir);
            }
        }
        let action = move_to(ctx, relic.pos);
        if !action.is_none() {
            return action;
        }
    }
    spiral_step(ctx)
}

// ============================================================================
// STANDING ORDERS
// ============================================================================

/// Patrol, rally, attack-move, follow and guard, in that order.
fn standing_orders(ctx: &mut DecisionCtx) -> Option<Action> {
    if !ctx.orders.patrol.is_empty() {
        let action = patrol_step(ctx);
        if !action.is_none() {
            return Some(action);
        }
    }

    if let Some(rally) = ctx.orders.rally {
        if ctx.pos().chebyshev(rally) <= ARRIVE_RADIUS {
            ctx.orders.rally = None;
        } else {
            let action = move_to(ctx, rally);
            if !action.is_none() {
                return Some(action);
            }
        }
    }

    if let Some(target) = ctx.orders.attack_move {
        if ctx.pos().chebyshev(target) <= ARRIVE_RADIUS {
            ctx.orders.attack_move = None;
        } else {
            let pos = ctx.pos();
            let goal = ctx
                .world
                .nearest_foreign_agent(pos, ctx.info.team, fight::ENGAGE_RADIUS)
                .map(|enemy| enemy.pos)
                .unwrap_or(target);
            let action = move_to(ctx, goal);
            if !action.is_none() {
                return Some(action);
            }
        }
    }

    if let Some(leader) = ctx.orders.follow {
        match ctx.world.agent(leader).filter(|info| info.alive) {
            Some(info) if ctx.pos().chebyshev(info.pos) > FOLLOW_RADIUS => {
                let action = move_to(ctx, info.pos);
                if !action.is_none() {
                    return Some(action);
                }
            }
            Some(_) => {}
            None => ctx.orders.follow = None,
        }
    }

    if let Some(post) = ctx.orders.guard {
        if ctx.pos().chebyshev(post) > GUARD_RADIUS {
            let action = move_to(ctx, post);
            if !action.is_none() {
                return Some(action);
            }
        }
    }
    None
}

fn patrol_step(ctx: &mut DecisionCtx) -> Action {
    let count = ctx.orders.patrol.len();
    let mut leg = ctx.orders.patrol_leg % count;
    let mut target = ctx.orders.patrol[leg];
    if ctx.pos().chebyshev(target) <= ARRIVE_RADIUS {
        leg = (leg + 1) % count;
        ctx.orders.patrol_leg = leg;
        target = ctx.orders.patrol[leg];
    }

    if ctx.orders.stance.allows_chase() {
        if let Some(enemy) =
            ctx.world
                .nearest_foreign_agent(ctx.pos(), ctx.info.team, fight::ENGAGE_RADIUS)
        {
            return move_to(ctx, enemy.pos);
        }
    }
    move_to(ctx, target)
}

// ============================================================================
// SETTLERS
// ============================================================================

fn settler_migration(ctx: &mut DecisionCtx) -> Option<Action> {
    let target = ctx.orders.settler?;
    let pos = ctx.pos();
    if pos.chebyshev(target) <= SETTLER_ARRIVE_RADIUS {
        ctx.orders.settler = None;
        return None;
    }

    let mut group = Vec::new();
    ctx.world
        .collect_agents_in_range(pos, SETTLER_GROUP_RADIUS, &mut group);
    let travelers = group
        .iter()
        .filter(|a| a.alive && a.team == ctx.info.team)
        .count() as u32;
    if travelers < ctx.config.settler_group_min {
        log::debug!("agent {:?}: settler group too small, aborting", ctx.id);
        ctx.orders.settler = None;
        return None;
    }

    let action = move_to(ctx, target);
    (!action.is_none()).then_some(action)
}

// ============================================================================
// GATHERER PRIORITY GLOBALS
// ============================================================================

/// Gatherer-only overrides: run valuables to the altar, keep housing ahead
/// of population.
fn gatherer_globals(ctx: &mut DecisionCtx) -> Option<Action> {
    if let Some((resource, amount)) = ctx.info.carried {
        if amount > 0 && matches!(resource, ResourceKind::Gold | ResourceKind::Bars) {
            let pos = ctx.pos();
            if let Some(altar) =
                ctx.world
                    .nearest_friendly_of_kind(pos, ctx.info.team, ThingKind::Altar, 64)
            {
                if pos.chebyshev(altar.pos) <= 1 {
                    if let Some(dir) =
                        Direction::from_delta(altar.pos.x - pos.x, altar.pos.y - pos.y)
                    {
                        return Some(Action::use_toward(dir));
                    }
                }
                let action = move_to(ctx, altar.pos);
                if !action.is_none() {
                    return Some(action);
                }
            }
        }
    }

    build::ensure_housing(ctx)
}
