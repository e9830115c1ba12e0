//! Combat behaviors: threat hunting and the global auto-attack check.

use crate::actions::Action;
use crate::grid::TilePos;
use crate::options::DecisionCtx;
use crate::systems::movement::move_to;
use crate::world::{AgentClass, ThingKind};

use super::gather::facing;

/// Radius within which en-route agents engage enemies (attack-move, patrol).
pub const ENGAGE_RADIUS: i32 = 8;

const STRUCTURE_KINDS: [ThingKind; 7] = [
    ThingKind::Spawner,
    ThingKind::Tower,
    ThingKind::Barracks,
    ThingKind::House,
    ThingKind::Stockpile,
    ThingKind::Wall,
    ThingKind::Temple,
];

const CORRUPTION_KINDS: [ThingKind; 2] = [ThingKind::Tumor, ThingKind::Spawner];

// ============================================================================
// HUNT THREATS
// ============================================================================

pub fn hunt_can_start(ctx: &mut DecisionCtx) -> bool {
    ctx.orders.stance.allows_attack() && !ctx.team.threats.is_empty()
}

pub fn hunt_should_terminate(ctx: &mut DecisionCtx) -> bool {
    ctx.team.threats.is_empty()
}

pub fn hunt_act(ctx: &mut DecisionCtx) -> Action {
    let pos = ctx.pos();
    let Some(entry) = ctx.team.threats.nearest(pos).copied() else {
        return Action::NONE;
    };
    if pos.chebyshev(entry.pos) <= ctx.info.attack_range.max(1) {
        return match facing(pos, entry.pos) {
            Some(dir) => Action::attack(dir),
            None => Action::NONE,
        };
    }
    if !ctx.orders.stance.allows_chase() {
        return Action::NONE;
    }
    move_to(ctx, entry.pos)
}

// ============================================================================
// AUTO-ATTACK
// ============================================================================

/// If anything attackable is in range, the best target by class priority.
///
/// Siege prefers structures; everyone else kills corruption first, then
/// enemy agents, then structures.
pub fn auto_attack(ctx: &mut DecisionCtx) -> Option<Action> {
    if !ctx.orders.stance.allows_attack() {
        return None;
    }
    let range = ctx.info.attack_range.max(1);
    let target = match ctx.info.class {
        AgentClass::Siege => {
            nearest_enemy_structure(ctx, range).or_else(|| nearest_enemy_agent(ctx, range))
        }
        _ => nearest_corruption(ctx, range)
            .or_else(|| nearest_enemy_agent(ctx, range))
            .or_else(|| nearest_enemy_structure(ctx, range)),
    }?;
    facing(ctx.pos(), target).map(Action::attack)
}

fn nearest_enemy_agent(ctx: &DecisionCtx, range: i32) -> Option<TilePos> {
    let pos = ctx.pos();
    let mut found = Vec::new();
    ctx.world.collect_agents_in_range(pos, range, &mut found);
    found
        .iter()
        .filter(|a| a.alive && a.team != ctx.info.team && a.id != ctx.id)
        .min_by_key(|a| a.pos.chebyshev(pos))
        .map(|a| a.pos)
}

fn nearest_enemy_structure(ctx: &DecisionCtx, range: i32) -> Option<TilePos> {
    let pos = ctx.pos();
    let mut found = Vec::new();
    let mut best: Option<(TilePos, i32)> = None;
    for kind in STRUCTURE_KINDS {
        found.clear();
        ctx.world.collect_in_range(pos, kind, range, &mut found);
        for thing in &found {
            let hostile = match thing.team {
                Some(team) => team != ctx.info.team,
                None => thing.kind.is_corruption(),
            };
            if !hostile {
                continue;
            }
            let dist = thing.pos.chebyshev(pos);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((thing.pos, dist));
            }
        }
    }
    best.map(|(pos, _)| pos)
}

fn nearest_corruption(ctx: &DecisionCtx, range: i32) -> Option<TilePos> {
    let pos = ctx.pos();
    let mut found = Vec::new();
    let mut best: Option<(TilePos, i32)> = None;
    for kind in CORRUPTION_KINDS {
        found.clear();
        ctx.world.collect_in_range(pos, kind, range, &mut found);
        for thing in &found {
            let dist = thing.pos.chebyshev(pos);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((thing.pos, dist));
            }
        }
    }
    best.map(|(pos, _)| pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Verb;
    use crate::options::harness::CtxHarness;
    use crate::sandbox::SandboxWorld;
    use crate::team::ThreatEntry;
    use crate::world::Stance;

    #[test]
    fn test_auto_attack_prefers_corruption() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent_with(0, AgentClass::Melee, TilePos::new(10, 10), 6, 3);
        world.spawn_agent_with(1, AgentClass::Melee, TilePos::new(11, 10), 6, 3);
        world.add_thing(ThingKind::Tumor, TilePos::new(10, 12));

        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        let action = auto_attack(&mut ctx).expect("targets in range");
        assert_eq!(action.verb(), Verb::Attack);
        // South toward the tumor, not east toward the enemy.
        assert_eq!(action.arg() as usize, crate::actions::Direction::South.index());
    }

    #[test]
    fn test_siege_prefers_structures() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent_with(0, AgentClass::Siege, TilePos::new(10, 10), 8, 5);
        world.spawn_agent_with(1, AgentClass::Melee, TilePos::new(11, 10), 6, 3);
        world.add_team_thing(ThingKind::Tower, TilePos::new(10, 14), crate::world::TeamId(1));

        let mut harness = CtxHarness::new(&world, id);
        let mut ctx = harness.ctx(&world);
        let action = auto_attack(&mut ctx).expect("targets in range");
        assert_eq!(action.arg() as usize, crate::actions::Direction::South.index());
    }

    #[test]
    fn test_no_attack_stance_blocks() {
        let mut world = SandboxWorld::open(24, 24, 2);
        let id = world.spawn_agent_with(0, AgentClass::Melee, TilePos::new(10, 10), 6, 3);
        world.spawn_agent_with(1, AgentClass::Melee, TilePos::new(11, 10), 6, 3);

        let mut harness = CtxHarness::new(&world, id);
        harness.orders.stance = Stance::NoAttack;
        let mut ctx = harness.ctx(&world);
        assert!(auto_attack(&mut ctx).is_none());
    }

    #[test]
    fn test_hunt_chases_then_strikes() {
        let mut world = SandboxWorld::open(32, 32, 2);
        let id = world.spawn_agent_with(0, AgentClass::Melee, TilePos::new(10, 10), 6, 1);
        let mut harness = CtxHarness::new(&world, id);
        harness.team.threats.report(ThreatEntry {
            pos: TilePos::new(14, 10),
            strength: 2,
            last_seen_step: 0,
            source_id: 50,
            is_structure: false,
        });

        let mut ctx = harness.ctx(&world);
        assert!(hunt_can_start(&mut ctx));
        let action = hunt_act(&mut ctx);
        assert_eq!(action.verb(), Verb::Move);

        // Standing next to the threat entry, the hunt swings.
        world.teleport_agent(id, TilePos::new(13, 10));
        let mut ctx = harness.ctx(&world);
        let action = hunt_act(&mut ctx);
        assert_eq!(action.verb(), Verb::Attack);
    }

    #[test]
    fn test_stand_ground_does_not_chase() {
        let mut world = SandboxWorld::open(32, 32, 2);
        let id = world.spawn_agent_with(0, AgentClass::Melee, TilePos::new(10, 10), 6, 1);
        let mut harness = CtxHarness::new(&world, id);
        harness.orders.stance = Stance::StandGround;
        harness.team.threats.report(ThreatEntry {
            pos: TilePos::new(20, 10),
            strength: 2,
            last_seen_step: 0,
            source_id: 51,
            is_structure: false,
        });
        let mut ctx = harness.ctx(&world);
        assert!(hunt_act(&mut ctx).is_none());
    }
}
