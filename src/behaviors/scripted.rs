//! Scripted agents: drain the host command queue.

use crate::actions::Action;
use crate::components::Command;
use crate::options::DecisionCtx;
use crate::systems::movement::move_to;

use super::fight::ENGAGE_RADIUS;

/// Arrival threshold for queued movement commands.
const ARRIVE_RADIUS: i32 = 1;

pub fn commands_can_start(ctx: &mut DecisionCtx) -> bool {
    !ctx.orders.commands.is_empty()
}

pub fn commands_should_terminate(ctx: &mut DecisionCtx) -> bool {
    ctx.orders.commands.is_empty()
}

/// Work the front of the queue; completed commands pop and the next one
/// starts in the same tick.
pub fn commands_act(ctx: &mut DecisionCtx) -> Action {
    loop {
        let Some(command) = ctx.orders.commands.front().copied() else {
            return Action::NONE;
        };
        let pos = ctx.pos();
        match command {
            Command::Move(target) => {
                if pos.chebyshev(target) <= ARRIVE_RADIUS {
                    ctx.orders.pop_command();
                    continue;
                }
                return move_to(ctx, target);
            }
            Command::AttackMove(target) => {
                if pos.chebyshev(target) <= ARRIVE_RADIUS {
                    ctx.orders.pop_command();
                    continue;
                }
                // Divert toward enemies on the way; in-range strikes are
                // the auto-attack stage's job.
                if let Some(enemy) =
                    ctx.world
                        .nearest_foreign_agent(pos, ctx.info.team, ENGAGE_RADIUS)
                {
                    return move_to(ctx, enemy.pos);
                }
                return move_to(ctx, target);
            }
        }
    }
}
