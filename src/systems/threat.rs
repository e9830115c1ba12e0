//! Shared threat-map maintenance from agent vision.
//!
//! Scanning every agent every tick is wasteful; agents take turns on a
//! fixed stride, and decay runs at most once per team per stride bucket.

use crate::options::DecisionCtx;
use crate::team::ThreatEntry;
use crate::world::{AgentClass, AgentId, ThingKind};

/// Only one agent in this many scans the world per tick.
pub const THREAT_MAP_STAGGER_INTERVAL: u64 = 4;

/// Whether this agent takes its scan turn this step.
pub fn should_scan(agent: AgentId, step: u64) -> bool {
    (u64::from(agent.0) + step) % THREAT_MAP_STAGGER_INTERVAL == 0
}

/// Strength tier 1..=5 for an enemy agent class.
fn agent_tier(class: AgentClass) -> u8 {
    match class {
        AgentClass::Worker | AgentClass::Scout => 1,
        AgentClass::Goblin => 2,
        AgentClass::Melee => 3,
        AgentClass::Ranged => 4,
        AgentClass::Siege => 5,
    }
}

/// Scan everything within vision, report enemies into the team threat map,
/// and reveal the fog square. Decay piggybacks on the same stride.
pub fn update_threat_map_from_vision(ctx: &mut DecisionCtx) {
    let pos = ctx.pos();
    let step = ctx.step();
    let vision = ctx.info.vision.max(1);

    ctx.team.fog.reveal(pos, vision);

    let mut seen = Vec::new();
    ctx.world.collect_agents_in_range(pos, vision, &mut seen);
    for other in &seen {
        if !other.alive || other.team == ctx.info.team {
            continue;
        }
        ctx.team.threats.report(ThreatEntry {
            pos: other.pos,
            strength: agent_tier(other.class),
            last_seen_step: step,
            source_id: other.id.0,
            is_structure: false,
        });
    }

    let mut things = Vec::new();
    for (kind, strength) in [
        (ThingKind::Spawner, 3u8),
        (ThingKind::Tower, 4u8),
        (ThingKind::Tumor, 1u8),
    ] {
        things.clear();
        ctx.world.collect_in_range(pos, kind, vision, &mut things);
        for thing in &things {
            let hostile = match thing.team {
                Some(team) => team != ctx.info.team,
                None => thing.kind.is_corruption(),
            };
            if !hostile {
                continue;
            }
            ctx.team.threats.report(ThreatEntry {
                pos: thing.pos,
                strength,
                last_seen_step: step,
                source_id: thing.id,
                is_structure: thing.kind.is_structure(),
            });
        }
    }

    ctx.team
        .threats
        .decay_staggered(step, THREAT_MAP_STAGGER_INTERVAL);
}
