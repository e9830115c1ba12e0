//! Behavior implementations for the option framework.
//!
//! [`Behavior`] is a closed tagged enum: one variant per behavior in the
//! catalog, with the option contracts (`can_start`, `should_terminate`,
//! `act`) dispatching on the tag. All three may read the world and mutate
//! the agent's state; `act` returns the action byte, where zero means "no
//! useful action this tick" and hands control back to the executor.

pub mod build;
pub mod fight;
pub mod gather;
pub mod scripted;

use crate::actions::Action;
use crate::options::DecisionCtx;
use crate::systems::movement;
use crate::world::ResourceKind;

/// The closed set of behaviors options can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Back away from nearby armed foreigners.
    FleeDanger,
    /// Carry a full load to the team stockpile.
    DepositCarry,
    /// Harvest one resource kind, with per-tile reservations.
    Harvest(ResourceKind),
    /// Replant trees when wood runs out locally.
    PlantSapling,
    /// Claim and construct whatever building the team is missing.
    EnsureBuildings,
    /// Light dark ground near the base.
    PlaceLantern,
    /// Chase entries from the shared threat map.
    HuntThreats,
    /// Execute queued host commands.
    RunCommandQueue,
    /// Walk the outward spiral.
    Explore,
}

impl Behavior {
    /// Whether this behavior could begin this tick.
    pub fn can_start(self, ctx: &mut DecisionCtx) -> bool {
        match self {
            Behavior::FleeDanger => gather::flee_can_start(ctx),
            Behavior::DepositCarry => gather::deposit_can_start(ctx),
            Behavior::Harvest(resource) => gather::harvest_can_start(ctx, resource),
            Behavior::PlantSapling => gather::plant_can_start(ctx),
            Behavior::EnsureBuildings => build::ensure_can_start(ctx),
            Behavior::PlaceLantern => build::lantern_can_start(ctx),
            Behavior::HuntThreats => fight::hunt_can_start(ctx),
            Behavior::RunCommandQueue => scripted::commands_can_start(ctx),
            Behavior::Explore => true,
        }
    }

    /// Whether a running behavior is finished after acting.
    pub fn should_terminate(self, ctx: &mut DecisionCtx) -> bool {
        match self {
            Behavior::FleeDanger => gather::flee_should_terminate(ctx),
            Behavior::DepositCarry => gather::deposit_should_terminate(ctx),
            Behavior::Harvest(resource) => gather::harvest_should_terminate(ctx, resource),
            Behavior::PlantSapling => true,
            Behavior::EnsureBuildings => build::ensure_should_terminate(ctx),
            Behavior::PlaceLantern => true,
            Behavior::HuntThreats => fight::hunt_should_terminate(ctx),
            Behavior::RunCommandQueue => scripted::commands_should_terminate(ctx),
            Behavior::Explore => false,
        }
    }

    /// Produce this tick's action, or zero to yield.
    pub fn act(self, ctx: &mut DecisionCtx) -> Action {
        match self {
            Behavior::FleeDanger => gather::flee_act(ctx),
            Behavior::DepositCarry => gather::deposit_act(ctx),
            Behavior::Harvest(resource) => gather::harvest_act(ctx, resource),
            Behavior::PlantSapling => gather::plant_act(ctx),
            Behavior::EnsureBuildings => build::ensure_act(ctx),
            Behavior::PlaceLantern => build::lantern_act(ctx),
            Behavior::HuntThreats => fight::hunt_act(ctx),
            Behavior::RunCommandQueue => scripted::commands_act(ctx),
            Behavior::Explore => movement::spiral_step(ctx),
        }
    }
}
