//! High-level movement: dispatch between the planned A* path, the greedy
//! chooser, and spiral re-exploration.

use crate::actions::{Action, Direction};
use crate::grid::TilePos;
use crate::options::DecisionCtx;
use crate::pathfind::{can_enter_for_move, find_path, move_towards};
use crate::roles::RoleKind;

/// Chebyshev distance at which `move_to` plans with A* instead of stepping
/// greedily.
pub const ASTAR_DISTANCE_THRESHOLD: i32 = 6;

/// Trail window and distinct-tile bound that count as oscillation.
const OSCILLATION_WINDOW: usize = 6;
const OSCILLATION_UNIQUE_MAX: usize = 2;

/// Whether the agent's recent trail is a two-tile shuffle.
pub fn is_oscillating(trail: &crate::components::Trail) -> bool {
    trail.len() >= OSCILLATION_WINDOW
        && trail.unique_in_last(OSCILLATION_WINDOW) <= OSCILLATION_UNIQUE_MAX
}

/// One step of spiral re-exploration from the agent's cursor.
pub fn spiral_step(ctx: &mut DecisionCtx) -> Action {
    let pos = ctx.pos();
    let cursor = ctx.spiral.advance(ctx.world.dims());
    match move_towards(ctx.world, ctx.id, pos, cursor, ctx.blocked.avoid()) {
        Some(dir) => Action::step(dir),
        None => Action::NONE,
    }
}

/// Move one step toward `target`, planning as needed.
///
/// A target flagged unreachable is not retried this tick — the agent
/// spiral-explores instead. Long hops and oscillating agents go through
/// A*; short hops step greedily. Unreachable targets come back as no
/// action with the blocked flag set, which option code must treat as
/// "did not act".
pub fn move_to(ctx: &mut DecisionCtx, target: TilePos) -> Action {
    match ctx.path.blocked_target {
        Some(blocked) if blocked == target => return spiral_step(ctx),
        Some(_) => ctx.path.blocked_target = None,
        None => {}
    }

    let stuck = is_oscillating(ctx.trail);
    if stuck {
        ctx.path.clear();
    }

    if stuck || ctx.pos().chebyshev(target) >= ASTAR_DISTANCE_THRESHOLD {
        follow_planned_path(ctx, target)
    } else {
        greedy_step(ctx, target)
    }
}

fn follow_planned_path(ctx: &mut DecisionCtx, target: TilePos) -> Action {
    let pos = ctx.pos();

    // Replan on target change or drift off the cached route.
    let on_route = ctx.path.has_route_to(target)
        && ctx
            .path
            .next_step()
            .is_some_and(|next| pos.chebyshev(next) == 1);
    if !on_route && !replan(ctx, target) {
        return mark_blocked(ctx, target);
    }

    let Some(next) = ctx.path.next_step() else {
        // Route exhausted right at the goal; close the gap greedily.
        return greedy_step(ctx, target);
    };
    if let Some(action) = try_step_onto(ctx, pos, next) {
        return action;
    }

    // The cached step went stale under us; one synchronous recovery plan.
    if replan(ctx, target) {
        if let Some(next) = ctx.path.next_step() {
            if let Some(action) = try_step_onto(ctx, pos, next) {
                return action;
            }
        }
    }
    mark_blocked(ctx, target)
}

fn try_step_onto(ctx: &mut DecisionCtx, pos: TilePos, next: TilePos) -> Option<Action> {
    let dir = Direction::from_delta(next.x - pos.x, next.y - pos.y)?;
    if can_enter_for_move(ctx.world, ctx.id, pos, next) {
        ctx.path.advance();
        Some(Action::step(dir))
    } else {
        None
    }
}

fn replan(ctx: &mut DecisionCtx, target: TilePos) -> bool {
    let pos = ctx.pos();
    let found = find_path(ctx.nav, ctx.world, ctx.id, pos, target, &mut ctx.path.steps);
    ctx.path.cursor = 0;
    ctx.path.target = found.then_some(target);
    found
}

fn mark_blocked(ctx: &mut DecisionCtx, target: TilePos) -> Action {
    log::debug!("agent {:?}: target {:?} unreachable", ctx.id, target);
    ctx.path.clear();
    ctx.path.blocked_target = Some(target);
    spiral_step(ctx)
}

fn greedy_step(ctx: &mut DecisionCtx, target: TilePos) -> Action {
    let pos = ctx.pos();
    let Some(dir) = move_towards(ctx.world, ctx.id, pos, target, ctx.blocked.avoid()) else {
        return Action::NONE;
    };

    // Builders ping-pong between a build site and its stand tile; stepping
    // straight back onto the previous tile gets rerouted.
    if ctx.role.kind == RoleKind::Builder && Some(dir.step_from(pos)) == ctx.trail.previous() {
        if let Some(alt) = move_towards(ctx.world, ctx.id, pos, target, Some(dir)) {
            return Action::step(alt);
        }
    }
    Action::step(dir)
}
