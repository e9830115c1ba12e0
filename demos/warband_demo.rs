//! Basic demonstration of the controller driving a sandbox world.
//!
//! Run with: cargo run --example warband_demo

use warband_ai::sandbox::SandboxWorld;
use warband_ai::{
    AgentClass, Controller, ControllerConfig, GridDims, ResourceKind, TeamId, ThingKind, TilePos,
    WorldView,
};

fn setup_logging() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .ok();
}

fn main() {
    setup_logging();
    println!("=== Warband AI - Controller Demo ===\n");

    let mut world = SandboxWorld::open(64, 64, 2);
    let mut ids = Vec::new();

    // Two villages facing each other across a shared forest.
    for team in 0..2u8 {
        let base_x = 12 + i32::from(team) * 34;
        for i in 0..6i32 {
            ids.push(world.spawn_agent(
                team,
                AgentClass::Worker,
                TilePos::new(base_x + i % 3, 12 + i / 3),
            ));
        }
        world.add_team_thing(ThingKind::Stockpile, TilePos::new(base_x + 5, 15), TeamId(team));
    }
    for i in 0..18i32 {
        world.add_thing(ThingKind::Tree, TilePos::new(24 + (i * 5) % 18, 10 + (i * 7) % 30));
        if i % 3 == 0 {
            world.add_thing(ThingKind::BerryBush, TilePos::new(22 + (i * 3) % 20, 30 + i % 8));
        }
    }

    let mut controller = Controller::with_config(ControllerConfig {
        dims: GridDims::new(64, 64, 2),
        team_count: 2,
        ..Default::default()
    });

    println!("Running 200 ticks with {} agents...\n", ids.len());
    for tick in 0..200u32 {
        controller.update_controller(&world);
        for &id in &ids {
            let action = controller.decide_action(&world, id);
            world.apply(id, action);
        }
        world.step_forward();

        if (tick + 1) % 40 == 0 {
            println!("--- Tick {} ---", tick + 1);
            print_status(&world, &controller, &ids);
        }
    }

    println!("\n=== Final Controller State (JSON) ===\n");
    match controller.snapshot().to_json_pretty() {
        Ok(json) => println!("{}", json),
        Err(err) => println!("snapshot failed: {}", err),
    }

    // cargo run --example warband_demo --features profile
    #[cfg(feature = "profile")]
    println!("\n{}", controller.profiler().summary());
}

fn print_status(world: &SandboxWorld, controller: &Controller, ids: &[warband_ai::AgentId]) {
    for team in 0..2u8 {
        let wood = world.stockpile_count(TeamId(team), ResourceKind::Wood);
        let food = world.stockpile_count(TeamId(team), ResourceKind::Food);
        let carrying = ids
            .iter()
            .filter(|&&id| {
                world
                    .agent(id)
                    .is_some_and(|a| a.team == TeamId(team) && a.carried.is_some())
            })
            .count();
        let threats = controller
            .team(TeamId(team))
            .map(|t| t.threats.count())
            .unwrap_or(0);
        println!(
            "  Team {}: wood={} food={} carrying={} threats={}",
            team, wood, food, carrying, threats
        );
    }
}
