//! Builder behaviors: claiming, siting, and constructing buildings, plus
//! lantern placement.

use rand::Rng;

use crate::actions::{Action, Verb, ALL_DIRECTIONS};
use crate::grid::TilePos;
use crate::options::DecisionCtx;
use crate::pathfind::is_passable;
use crate::systems::movement::move_to;
use crate::world::{BuildingKind, ResourceKind, ThingKind};

/// Ticks a builder stays committed to a chosen plan.
const BUILD_LOCK_STEPS: u32 = 30;

/// House placement ring around the base anchor.
const HOUSE_MIN_DIST: i32 = 5;
const HOUSE_MAX_DIST: i32 = 15;

/// Candidate positions sampled per siting attempt.
const SITE_SAMPLES: usize = 12;

/// Houses within this range of a candidate count toward a cluster.
const HOUSE_CLUSTER_RADIUS: i32 = 3;

/// Minimum spacing of lanterns a builder places proactively.
const LANTERN_COVER_RADIUS: i32 = 6;

// ============================================================================
// ENSURE BUILDINGS
// ============================================================================

/// The next building the team is missing, in fixed priority order.
fn needed_building(ctx: &mut DecisionCtx) -> Option<BuildingKind> {
    let world = ctx.world;
    let team = ctx.info.team;
    let buildings = &mut ctx.team.buildings;

    let mut candidates: [Option<BuildingKind>; 4] = [None; 4];
    if world.population(team) + 1 >= world.population_cap(team) {
        candidates[0] = Some(BuildingKind::House);
    }
    if buildings.count(world, team, BuildingKind::Stockpile) == 0 {
        candidates[1] = Some(BuildingKind::Stockpile);
    }
    if buildings.count(world, team, BuildingKind::Altar) == 0 {
        candidates[2] = Some(BuildingKind::Altar);
    }
    if !ctx.team.threats.is_empty()
        && ctx.team.buildings.count(world, team, BuildingKind::Tower) == 0
    {
        candidates[3] = Some(BuildingKind::Tower);
    }

    candidates.into_iter().flatten().find(|&kind| {
        world.can_afford_build(ctx.id, kind)
            && !ctx.team.buildings.is_claimed(world, team, kind)
    })
}

pub fn ensure_can_start(ctx: &mut DecisionCtx) -> bool {
    ctx.build.is_locked() || needed_building(ctx).is_some()
}

pub fn ensure_should_terminate(ctx: &mut DecisionCtx) -> bool {
    !ctx.build.is_locked()
}

pub fn ensure_act(ctx: &mut DecisionCtx) -> Action {
    if !ctx.build.is_locked() {
        let Some(kind) = needed_building(ctx) else {
            return Action::NONE;
        };
        if !start_build_plan(ctx, kind) {
            return Action::NONE;
        }
    }
    continue_build_plan(ctx)
}

/// Claim `kind` for this step and commit a sited plan. First-wins: a prior
/// claim by another builder makes this fail.
pub fn start_build_plan(ctx: &mut DecisionCtx, kind: BuildingKind) -> bool {
    if !ctx.team.buildings.try_claim(ctx.world, ctx.info.team, kind) {
        log::trace!("agent {:?}: {:?} already claimed this step", ctx.id, kind);
        return false;
    }
    let Some((target, stand)) = choose_site(ctx, kind) else {
        return false;
    };
    ctx.build.commit(kind, target, stand, BUILD_LOCK_STEPS);
    true
}

/// Walk to the stand tile and place the committed building.
pub fn continue_build_plan(ctx: &mut DecisionCtx) -> Action {
    let (Some(kind), Some(target), Some(stand)) =
        (ctx.build.choice, ctx.build.target, ctx.build.stand)
    else {
        ctx.build.clear();
        return Action::NONE;
    };

    // The site can be taken or flooded while we walk; give up quietly.
    if !ctx.world.can_place(target) {
        ctx.build.clear();
        return Action::NONE;
    }

    ctx.build.lock_steps = ctx.build.lock_steps.saturating_sub(1);
    if ctx.build.lock_steps == 0 {
        ctx.build.clear();
        return Action::NONE;
    }

    let pos = ctx.pos();
    if pos == stand || pos.chebyshev(target) <= 1 {
        ctx.build.clear();
        return Action::encode(Verb::Build, kind.build_choice());
    }
    move_to(ctx, stand)
}

/// Initiate a build of `kind` only if the team owns none yet. Exactly one
/// caller per team per step succeeds; the rest observe the claim and skip.
pub fn try_build_if_missing(ctx: &mut DecisionCtx, kind: BuildingKind) -> Option<Action> {
    let team = ctx.info.team;
    if ctx.team.buildings.count(ctx.world, team, kind) > 0 {
        return None;
    }
    if ctx.team.buildings.is_claimed(ctx.world, team, kind) {
        return None;
    }
    if !ctx.world.can_afford_build(ctx.id, kind) {
        return None;
    }
    if !start_build_plan(ctx, kind) {
        return None;
    }
    let action = continue_build_plan(ctx);
    (!action.is_none()).then_some(action)
}

/// Build a house when the next spawn would hit the population cap.
pub fn ensure_housing(ctx: &mut DecisionCtx) -> Option<Action> {
    let team = ctx.info.team;
    if ctx.world.population(team) + 1 < ctx.world.population_cap(team) {
        return None;
    }
    if ctx.build.is_locked() && ctx.build.choice == Some(BuildingKind::House) {
        let action = continue_build_plan(ctx);
        return (!action.is_none()).then_some(action);
    }
    if ctx
        .team
        .buildings
        .is_claimed(ctx.world, team, BuildingKind::House)
    {
        return None;
    }
    if !ctx.world.can_afford_build(ctx.id, BuildingKind::House) {
        return None;
    }
    if !start_build_plan(ctx, BuildingKind::House) {
        return None;
    }
    let action = continue_build_plan(ctx);
    (!action.is_none()).then_some(action)
}

// ============================================================================
// SITING
// ============================================================================

/// Pick a target tile and an adjacent stand tile for `kind`.
fn choose_site(ctx: &mut DecisionCtx, kind: BuildingKind) -> Option<(TilePos, TilePos)> {
    let (min_dist, max_dist) = match kind {
        BuildingKind::House => (HOUSE_MIN_DIST, HOUSE_MAX_DIST),
        _ => (2, 10),
    };
    let base = ctx.spiral.base;
    let dims = ctx.world.dims();

    for _ in 0..SITE_SAMPLES {
        let dx = ctx.rng.gen_range(-max_dist..=max_dist);
        let dy = ctx.rng.gen_range(-max_dist..=max_dist);
        let candidate = dims.clamp_playable(TilePos::new(base.x + dx, base.y + dy));
        let dist = candidate.chebyshev(base);
        if dist < min_dist || dist > max_dist {
            continue;
        }
        if !ctx.world.can_place(candidate) {
            continue;
        }
        if kind == BuildingKind::House && house_crowds_neighbors(ctx, candidate) {
            continue;
        }
        if let Some(stand) = stand_tile(ctx, candidate) {
            return Some((candidate, stand));
        }
    }
    None
}

/// Houses must not form straight rows or packed blocks; both read badly
/// and wall gatherers in.
fn house_crowds_neighbors(ctx: &DecisionCtx, candidate: TilePos) -> bool {
    let mut nearby = Vec::new();
    ctx.world.collect_in_range(
        candidate,
        ThingKind::House,
        HOUSE_CLUSTER_RADIUS + 1,
        &mut nearby,
    );

    let cluster = nearby
        .iter()
        .filter(|h| h.pos.chebyshev(candidate) <= HOUSE_CLUSTER_RADIUS)
        .count();
    if cluster >= 2 {
        return true;
    }
    let in_row = nearby.iter().filter(|h| h.pos.y == candidate.y).count();
    let in_col = nearby.iter().filter(|h| h.pos.x == candidate.x).count();
    in_row >= 2 || in_col >= 2
}

fn stand_tile(ctx: &DecisionCtx, target: TilePos) -> Option<TilePos> {
    target
        .neighbors()
        .into_iter()
        .find(|&spot| ctx.world.dims().in_playable(spot) && is_passable(ctx.world, ctx.id, spot))
}

// ============================================================================
// LANTERNS
// ============================================================================

pub fn lantern_can_start(ctx: &mut DecisionCtx) -> bool {
    if !ctx
        .world
        .can_spend(ctx.info.team, &[(ResourceKind::Wood, 1)])
    {
        return false;
    }
    if ctx
        .world
        .nearest_of_kind(ctx.pos(), ThingKind::Lantern, LANTERN_COVER_RADIUS)
        .is_some()
    {
        return false;
    }
    lantern_spot(ctx).is_some()
}

pub fn lantern_act(ctx: &mut DecisionCtx) -> Action {
    match lantern_spot(ctx) {
        Some(dir) => Action::encode(Verb::PlaceLantern, dir as u8),
        None => Action::NONE,
    }
}

fn lantern_spot(ctx: &DecisionCtx) -> Option<usize> {
    let pos = ctx.pos();
    ALL_DIRECTIONS
        .into_iter()
        .find(|dir| {
            let spot = dir.step_from(pos);
            ctx.world.dims().in_playable(spot)
                && ctx.world.is_empty(spot)
                && ctx.world.terrain_allows(spot)
        })
        .map(|dir| dir.index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::harness::CtxHarness;
    use crate::sandbox::SandboxWorld;
    use crate::world::{AgentClass, AgentId, TeamId};

    fn rich_world() -> SandboxWorld {
        let mut world = SandboxWorld::open(40, 40, 2);
        for resource in [ResourceKind::Wood, ResourceKind::Stone, ResourceKind::Gold] {
            world.set_stockpile(TeamId(0), resource, 100);
        }
        world
    }

    #[test]
    fn test_build_claim_dedups_two_builders() {
        let mut world = rich_world();
        world.set_population(TeamId(0), 5, 20);
        let a = world.spawn_agent(0, AgentClass::Worker, TilePos::new(10, 10));
        let b = world.spawn_agent(0, AgentClass::Worker, TilePos::new(12, 10));

        let mut harness_a = CtxHarness::new(&world, a);
        harness_a.spiral.reset(TilePos::new(10, 10));
        let first = {
            let mut ctx = harness_a.ctx(&world);
            try_build_if_missing(&mut ctx, BuildingKind::House)
        };
        assert!(first.is_some(), "first builder initiates the build");

        // Second builder, same tick: shares team state, observes the claim.
        let mut harness_b = CtxHarness::share_team(&world, b, harness_a.take_team());
        harness_b.spiral.reset(TilePos::new(12, 10));
        let second = {
            let mut ctx = harness_b.ctx(&world);
            try_build_if_missing(&mut ctx, BuildingKind::House)
        };
        assert!(second.is_none(), "second builder skips the claimed kind");

        // Next step the claim is gone.
        world.set_step(1);
        let mut ctx = harness_b.ctx(&world);
        assert!(!ctx
            .team
            .buildings
            .is_claimed(ctx.world, TeamId(0), BuildingKind::House));
    }

    #[test]
    fn test_house_siting_respects_ring() {
        let mut world = rich_world();
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(20, 20));
        let mut harness = CtxHarness::new(&world, id);
        harness.spiral.reset(TilePos::new(20, 20));
        let mut ctx = harness.ctx(&world);
        let site = choose_site(&mut ctx, BuildingKind::House);
        let (target, stand) = site.expect("open map has valid house sites");
        let dist = target.chebyshev(TilePos::new(20, 20));
        assert!((HOUSE_MIN_DIST..=HOUSE_MAX_DIST).contains(&dist));
        assert!(stand.chebyshev(target) <= 1);
    }

    #[test]
    fn test_build_plan_walks_then_places() {
        let mut world = rich_world();
        world.set_population(TeamId(0), 19, 20);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(20, 20));
        let mut harness = CtxHarness::new(&world, id);
        harness.spiral.reset(TilePos::new(20, 20));

        let mut guard = 0;
        loop {
            let mut ctx = harness.ctx(&world);
            let action = ensure_act(&mut ctx);
            assert!(!action.is_none(), "plan should always produce an action");
            if action.verb() == Verb::Build {
                assert_eq!(
                    BuildingKind::from_choice(action.arg()),
                    Some(BuildingKind::House)
                );
                break;
            }
            assert_eq!(action.verb(), Verb::Move);
            world.apply(id, action);
            guard += 1;
            assert!(guard < 60, "builder never reached the site");
        }
    }

    #[test]
    fn test_missing_build_requires_funds() {
        let mut world = SandboxWorld::open(40, 40, 2);
        world.set_population(TeamId(0), 19, 20);
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(20, 20));
        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        // Empty stockpile: nothing to build with.
        assert!(try_build_if_missing(&mut ctx, BuildingKind::House).is_none());
        assert!(ctx.team.reservations.is_empty());
    }

    #[test]
    fn test_reservation_independent_of_claims() {
        // Claims and reservations are separate registries.
        let mut world = rich_world();
        let id = world.spawn_agent(0, AgentClass::Worker, TilePos::new(10, 10));
        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        assert!(ctx
            .team
            .buildings
            .try_claim(ctx.world, TeamId(0), BuildingKind::Altar));
        assert!(ctx.team.reservations.reserve(AgentId(5), TilePos::new(3, 3), 0));
    }
}
