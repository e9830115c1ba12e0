//! The option framework: prioritized, interruptible behaviors and the
//! executor that schedules them.
//!
//! An option is a named behavior with three contracts — `can_start`,
//! `should_terminate`, and `act` — plus an interruptible bit. Behaviors are
//! a closed tagged enum, so the catalog is static data and a tick never
//! allocates to dispatch one.

use rand_pcg::Pcg32;

use crate::actions::Action;
use crate::behaviors::Behavior;
use crate::components::{
    BehaviorSlot, BlockedMove, BuildPlan, EscapeState, LastAction, Orders, PlannedPath, RoleSlot,
    SenseCache, SpiralCursor, Trail,
};
use crate::config::ControllerConfig;
use crate::pathfind::PathCache;
use crate::team::TeamState;
use crate::world::{AgentId, AgentInfo, WorldView};

/// One entry in a role's option list.
#[derive(Debug, Clone, Copy)]
pub struct OptionDef {
    pub name: &'static str,
    pub behavior: Behavior,
    /// Whether a higher-priority startable option may preempt this one
    /// while it is active.
    pub interruptible: bool,
}

impl OptionDef {
    pub const fn new(name: &'static str, behavior: Behavior, interruptible: bool) -> Self {
        Self {
            name,
            behavior,
            interruptible,
        }
    }
}

/// Everything one agent's decision may read and write this tick.
///
/// The world reference is the read-only host snapshot; the component
/// references are the agent's own state, detached from the store for the
/// duration of the call; `team` is the agent's shared team state.
pub struct DecisionCtx<'a> {
    pub world: &'a dyn WorldView,
    pub config: &'a ControllerConfig,
    pub id: AgentId,
    pub info: AgentInfo,
    pub role: &'a mut RoleSlot,
    pub slot: &'a mut BehaviorSlot,
    pub trail: &'a mut Trail,
    pub escape: &'a mut EscapeState,
    pub blocked: &'a mut BlockedMove,
    pub last_action: &'a mut LastAction,
    pub spiral: &'a mut SpiralCursor,
    pub sense: &'a mut SenseCache,
    pub build: &'a mut BuildPlan,
    pub path: &'a mut PlannedPath,
    pub orders: &'a mut Orders,
    pub team: &'a mut TeamState,
    pub nav: &'a mut PathCache,
    pub rng: &'a mut Pcg32,
}

impl DecisionCtx<'_> {
    /// The agent's current tile.
    #[inline]
    pub fn pos(&self) -> crate::grid::TilePos {
        self.info.pos
    }

    /// The world step this tick.
    #[inline]
    pub fn step(&self) -> u64 {
        self.world.current_step()
    }
}

/// Run an ordered option list for one tick and return the chosen action.
///
/// Scheduling rules:
/// 1. An interruptible active option is preempted by the first
///    strictly-higher-priority option whose `can_start` holds.
/// 2. The (possibly new) active option acts. A non-zero action is returned,
///    clearing the slot first if the option also wants to terminate.
/// 3. An active option that returns no action loses the slot, and the list
///    is rescanned from the top in the same tick — not from the next entry.
/// 4. With no active option, the scan activates and runs the first option
///    that both starts and acts. Nothing acting means no action.
pub fn run_options(opts: &[OptionDef], ctx: &mut DecisionCtx) -> Action {
    if ctx.slot.active.is_some_and(|active| active >= opts.len()) {
        // Role list changed under us; the stale slot is meaningless.
        ctx.slot.clear();
    }

    if let Some(current) = ctx.slot.active {
        let mut active = current;
        if opts[active].interruptible {
            for (i, opt) in opts.iter().enumerate().take(active) {
                if opt.behavior.can_start(ctx) {
                    log::trace!(
                        "agent {:?}: {} preempts {}",
                        ctx.id,
                        opt.name,
                        opts[active].name
                    );
                    ctx.slot.start(i);
                    active = i;
                    break;
                }
            }
        }

        ctx.slot.ticks += 1;
        let action = opts[active].behavior.act(ctx);
        if !action.is_none() {
            if opts[active].behavior.should_terminate(ctx) {
                ctx.slot.clear();
            }
            return action;
        }
        ctx.slot.clear();
    }

    for (i, opt) in opts.iter().enumerate() {
        if !opt.behavior.can_start(ctx) {
            continue;
        }
        ctx.slot.start(i);
        ctx.slot.ticks = 1;
        let action = opt.behavior.act(ctx);
        if !action.is_none() {
            if opt.behavior.should_terminate(ctx) {
                ctx.slot.clear();
            }
            return action;
        }
        ctx.slot.clear();
    }

    Action::NONE
}

#[cfg(test)]
pub(crate) mod harness {
    //! Owned agent state for driving the pipeline in unit tests without a
    //! full controller.

    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::DecisionCtx;
    use crate::components::{
        BehaviorSlot, BlockedMove, BuildPlan, EscapeState, LastAction, Orders, PlannedPath,
        RoleSlot, SenseCache, SpiralCursor, Trail,
    };
    use crate::config::ControllerConfig;
    use crate::pathfind::PathCache;
    use crate::sandbox::SandboxWorld;
    use crate::team::TeamState;
    use crate::world::{AgentId, WorldView};

    pub(crate) struct CtxHarness {
        pub id: AgentId,
        pub config: ControllerConfig,
        pub role: RoleSlot,
        pub slot: BehaviorSlot,
        pub trail: Trail,
        pub escape: EscapeState,
        pub blocked: BlockedMove,
        pub last_action: LastAction,
        pub spiral: SpiralCursor,
        pub sense: SenseCache,
        pub build: BuildPlan,
        pub path: PlannedPath,
        pub orders: Orders,
        pub team: TeamState,
        pub nav: PathCache,
        pub rng: Pcg32,
    }

    impl CtxHarness {
        pub fn new(world: &SandboxWorld, id: AgentId) -> Self {
            let config = ControllerConfig {
                dims: world.dims(),
                ..Default::default()
            };
            let mut harness = Self {
                id,
                role: RoleSlot::default(),
                slot: BehaviorSlot::default(),
                trail: Trail::default(),
                escape: EscapeState::default(),
                blocked: BlockedMove::default(),
                last_action: LastAction::default(),
                spiral: SpiralCursor::default(),
                sense: SenseCache::default(),
                build: BuildPlan::default(),
                path: PlannedPath::default(),
                orders: Orders::default(),
                team: TeamState::new(config.dims, config.difficulty),
                nav: PathCache::new(config.dims),
                rng: Pcg32::seed_from_u64(config.rng_seed),
                config,
            };
            if let Some(info) = world.agent(id) {
                harness.spiral.reset(info.pos);
            }
            harness
        }

        /// Build a harness whose team state is handed over from another
        /// harness, for same-team same-tick scenarios.
        pub fn share_team(world: &SandboxWorld, id: AgentId, team: TeamState) -> Self {
            let mut harness = Self::new(world, id);
            harness.team = team;
            harness
        }

        pub fn take_team(self) -> TeamState {
            self.team
        }

        /// Assemble a decision context over the harness state. The agent
        /// info snapshot is refreshed from the world on every call.
        pub fn ctx<'a>(&'a mut self, world: &'a dyn WorldView) -> DecisionCtx<'a> {
            let info = world
                .agent(self.id)
                .expect("harness agent must exist in the sandbox");
            DecisionCtx {
                world,
                config: &self.config,
                id: self.id,
                info,
                role: &mut self.role,
                slot: &mut self.slot,
                trail: &mut self.trail,
                escape: &mut self.escape,
                blocked: &mut self.blocked,
                last_action: &mut self.last_action,
                spiral: &mut self.spiral,
                sense: &mut self.sense,
                build: &mut self.build,
                path: &mut self.path,
                orders: &mut self.orders,
                team: &mut self.team,
                nav: &mut self.nav,
                rng: &mut self.rng,
            }
        }
    }
}
