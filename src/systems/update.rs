//! Once-per-tick maintenance, run before any decisions.
//!
//! The controller copies what it needs from the host world into the
//! [`WorldFacts`] resource, then runs a small schedule over the team
//! registry: reservation sweeps, the economy tick, and adaptive
//! difficulty. Hybrid-role requests queue in [`HybridRoleQueue`] and are
//! applied by the controller between schedules.

use std::collections::HashSet;

use bevy_ecs::prelude::*;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::roles::Role;
use crate::team::{TeamRegistry, TeamState};
use crate::world::{AgentId, ResourceKind, TeamId, WorldView};

/// Per-step income above which an adaptive team gets more reaction lag,
/// and below which it gets less.
const ADAPTIVE_RATE_HIGH: f32 = 2.0;
const ADAPTIVE_RATE_LOW: f32 = 0.5;
const ADAPTIVE_NUDGE: f32 = 0.01;

/// The slice of world state the maintenance systems need, captured once
/// per tick so the schedule never touches the host world directly.
#[derive(Resource, Default)]
pub struct WorldFacts {
    pub step: u64,
    /// Per-team stockpile counts, indexed by team then resource.
    pub stockpiles: Vec<[u32; ResourceKind::COUNT]>,
    /// Tracked agents the world still reports alive.
    pub alive: HashSet<AgentId>,
}

impl WorldFacts {
    pub fn gather(
        world: &dyn WorldView,
        team_count: usize,
        tracked: impl Iterator<Item = AgentId>,
    ) -> Self {
        let step = world.current_step();
        let stockpiles = (0..team_count)
            .map(|t| {
                let team = TeamId(t as u8);
                let mut row = [0u32; ResourceKind::COUNT];
                for (i, slot) in row.iter_mut().enumerate() {
                    let resource = RESOURCES[i];
                    *slot = world.stockpile_count(team, resource);
                }
                row
            })
            .collect();
        let alive = tracked
            .filter(|&id| world.agent(id).is_some_and(|info| info.alive))
            .collect();
        Self {
            step,
            stockpiles,
            alive,
        }
    }
}

const RESOURCES: [ResourceKind; ResourceKind::COUNT] = [
    ResourceKind::Wood,
    ResourceKind::Stone,
    ResourceKind::Gold,
    ResourceKind::Food,
    ResourceKind::Bars,
    ResourceKind::Hearts,
    ResourceKind::Relics,
];

/// Hybrid-role requests from the host (e.g. temple fusion), applied to
/// agents at the next `update_controller`.
#[derive(Resource, Default)]
pub struct HybridRoleQueue {
    pub pending: Vec<(AgentId, Role)>,
}

/// Drop expired reservations and those held by dead agents.
pub fn sweep_reservations_system(facts: Res<WorldFacts>, mut teams: ResMut<TeamRegistry>) {
    let step = facts.step;
    let sweep = |team: &mut TeamState| {
        team.reservations
            .sweep(step, |agent| facts.alive.contains(&agent));
    };

    #[cfg(feature = "parallel")]
    {
        teams.par_iter_mut().for_each(sweep);
    }
    #[cfg(not(feature = "parallel"))]
    {
        teams.iter_mut().for_each(sweep);
    }
}

/// Fold stockpiles into the per-team economy snapshot and nudge adaptive
/// difficulty toward the configured band.
pub fn economy_system(facts: Res<WorldFacts>, mut teams: ResMut<TeamRegistry>) {
    for (index, team) in teams.iter_mut().enumerate() {
        let Some(row) = facts.stockpiles.get(index) else {
            continue;
        };
        team.economy.tick(*row, facts.step);

        if team.difficulty.adaptive {
            let income: f32 = [
                ResourceKind::Wood,
                ResourceKind::Stone,
                ResourceKind::Gold,
                ResourceKind::Food,
            ]
            .into_iter()
            .map(|r| team.economy.rate(r))
            .sum();

            let nudged = if income > ADAPTIVE_RATE_HIGH {
                team.delay_chance + ADAPTIVE_NUDGE
            } else if income < ADAPTIVE_RATE_LOW {
                team.delay_chance - ADAPTIVE_NUDGE
            } else {
                team.delay_chance
            };
            team.delay_chance = team.difficulty.clamp_delay(nudged);
        }
    }
}

/// Build the maintenance schedule run at the top of every tick.
pub fn build_maintenance_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((sweep_reservations_system, economy_system).chain());
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, DifficultyConfig};
    use crate::grid::TilePos;
    use crate::team::RESERVATION_LIFETIME;

    fn registry() -> TeamRegistry {
        TeamRegistry::new(&ControllerConfig {
            team_count: 2,
            ..Default::default()
        })
    }

    fn facts_with_step(step: u64) -> WorldFacts {
        WorldFacts {
            step,
            stockpiles: vec![[0; ResourceKind::COUNT]; 2],
            alive: HashSet::new(),
        }
    }

    #[test]
    fn test_sweep_drops_dead_and_expired() {
        let mut world = World::new();
        let mut teams = registry();
        teams
            .get_mut(TeamId(0))
            .unwrap()
            .reservations
            .reserve(AgentId(1), TilePos::new(3, 3), 0);
        teams
            .get_mut(TeamId(1))
            .unwrap()
            .reservations
            .reserve(AgentId(2), TilePos::new(4, 4), 0);

        let mut facts = facts_with_step(1);
        facts.alive.insert(AgentId(1));
        // Agent 2 is dead; agent 1 lives and is not yet expired.
        world.insert_resource(facts);
        world.insert_resource(teams);

        let mut schedule = Schedule::default();
        schedule.add_systems(sweep_reservations_system);
        schedule.run(&mut world);

        let teams = world.resource::<TeamRegistry>();
        assert_eq!(teams.get(TeamId(0)).unwrap().reservations.len(), 1);
        assert!(teams.get(TeamId(1)).unwrap().reservations.is_empty());

        // Expiry sweeps the survivor too.
        world.resource_mut::<WorldFacts>().step = RESERVATION_LIFETIME + 1;
        world
            .resource_mut::<WorldFacts>()
            .alive
            .insert(AgentId(1));
        let mut schedule = Schedule::default();
        schedule.add_systems(sweep_reservations_system);
        schedule.run(&mut world);
        assert!(world
            .resource::<TeamRegistry>()
            .get(TeamId(0))
            .unwrap()
            .reservations
            .is_empty());
    }

    #[test]
    fn test_adaptive_difficulty_eases_when_starving() {
        let mut world = World::new();
        let mut teams = TeamRegistry::new(&ControllerConfig {
            team_count: 1,
            difficulty: DifficultyConfig {
                decision_delay_chance: 0.2,
                delay_chance_min: 0.0,
                delay_chance_max: 0.3,
                threat_updates: true,
                adaptive: true,
            },
            ..Default::default()
        });
        assert_eq!(teams.get(TeamId(0)).unwrap().delay_chance, 0.2);
        // Zero income across several ticks reads as starving.
        world.insert_resource(WorldFacts {
            step: 0,
            stockpiles: vec![[0; ResourceKind::COUNT]],
            alive: HashSet::new(),
        });
        world.insert_resource(teams);

        let mut schedule = Schedule::default();
        schedule.add_systems(economy_system);
        for step in 0..5 {
            world.resource_mut::<WorldFacts>().step = step;
            schedule.run(&mut world);
        }
        let teams = world.resource::<TeamRegistry>();
        assert!(teams.get(TeamId(0)).unwrap().delay_chance < 0.2);
    }

    #[test]
    fn test_economy_rates_flow_into_registry() {
        let mut world = World::new();
        world.insert_resource(registry());
        world.insert_resource(facts_with_step(0));

        let mut schedule = Schedule::default();
        schedule.add_systems(economy_system);
        for step in 1..=10 {
            {
                let mut facts = world.resource_mut::<WorldFacts>();
                facts.step = step;
                facts.stockpiles[0][ResourceKind::Wood.index()] += 2;
            }
            schedule.run(&mut world);
        }
        let teams = world.resource::<TeamRegistry>();
        assert!(teams.get(TeamId(0)).unwrap().economy.rate(ResourceKind::Wood) > 0.0);
    }
}
