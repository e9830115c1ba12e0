//! ECS components holding per-agent decision state.
//!
//! Components are pure data containers attached to one entity per controlled
//! agent inside the controller's private store. All decision logic lives in
//! the pipeline and behavior modules that read and write them.

use std::collections::VecDeque;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::actions::{Action, Direction, Verb};
use crate::grid::TilePos;
use crate::roles::RoleKind;
use crate::world::{AgentId, BuildingKind, Stance, ThingKind};

/// Length of the recent-position ring.
pub const RECENT_POSITIONS: usize = 12;

/// Ticks a blocked direction stays on cooldown.
pub const BLOCKED_MOVE_COOLDOWN: u8 = 5;

/// Ticks an escape episode lasts at most.
pub const ESCAPE_STEPS: u8 = 10;

/// Maximum queued host commands per agent.
pub const MAX_QUEUED_COMMANDS: usize = 8;

// ============================================================================
// ROLE & ACTIVE OPTION
// ============================================================================

/// The agent's assigned role: semantic kind plus index into the catalog.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleSlot {
    pub kind: RoleKind,
    /// Catalog index; `None` until lazy initialization picks a role.
    pub id: Option<usize>,
}

impl Default for RoleSlot {
    fn default() -> Self {
        Self {
            kind: RoleKind::Gatherer,
            id: None,
        }
    }
}

impl RoleSlot {
    pub fn is_initialized(&self) -> bool {
        self.id.is_some()
    }

    /// Assign a role. Any active option belongs to the old list and is
    /// reset by the caller.
    pub fn assign(&mut self, kind: RoleKind, id: usize) {
        self.kind = kind;
        self.id = Some(id);
    }
}

/// The currently running option of the agent's role list, if any.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BehaviorSlot {
    /// Index into the role's option list.
    pub active: Option<usize>,
    /// Ticks the option has been active.
    pub ticks: u32,
}

impl BehaviorSlot {
    pub fn start(&mut self, option: usize) {
        self.active = Some(option);
        self.ticks = 0;
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.ticks = 0;
    }
}

// ============================================================================
// MOVEMENT HISTORY
// ============================================================================

/// Ring buffer of recently visited tiles. Fixed size, no allocation.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Trail {
    ring: [TilePos; RECENT_POSITIONS],
    head: usize,
    len: usize,
}

impl Default for Trail {
    fn default() -> Self {
        Self {
            ring: [TilePos::default(); RECENT_POSITIONS],
            head: 0,
            len: 0,
        }
    }
}

impl Trail {
    pub fn record(&mut self, pos: TilePos) {
        self.ring[self.head] = pos;
        self.head = (self.head + 1) % RECENT_POSITIONS;
        self.len = (self.len + 1).min(RECENT_POSITIONS);
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The most recently recorded position.
    pub fn last(&self) -> Option<TilePos> {
        self.nth_back(0)
    }

    /// The position recorded before the last one.
    pub fn previous(&self) -> Option<TilePos> {
        self.nth_back(1)
    }

    fn nth_back(&self, n: usize) -> Option<TilePos> {
        if n >= self.len {
            return None;
        }
        let idx = (self.head + RECENT_POSITIONS - 1 - n) % RECENT_POSITIONS;
        Some(self.ring[idx])
    }

    /// Number of distinct tiles among the last `window` recorded positions.
    pub fn unique_in_last(&self, window: usize) -> usize {
        let span = window.min(self.len);
        let mut seen = [TilePos::default(); RECENT_POSITIONS];
        let mut count = 0;
        for n in 0..span {
            let pos = match self.nth_back(n) {
                Some(p) => p,
                None => break,
            };
            if !seen[..count].contains(&pos) {
                seen[count] = pos;
                count += 1;
            }
        }
        count
    }
}

/// Escape-mode substate entered when the trail shows the agent is stuck.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EscapeState {
    pub active: bool,
    pub steps_remaining: u8,
    pub direction: Option<Direction>,
}

impl EscapeState {
    pub fn begin(&mut self, direction: Direction) {
        self.active = true;
        self.steps_remaining = ESCAPE_STEPS;
        self.direction = Some(direction);
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.steps_remaining = 0;
        self.direction = None;
    }
}

/// Cooldown marker for a direction that bounced off something.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BlockedMove {
    pub direction: Option<Direction>,
    pub cooldown: u8,
}

impl BlockedMove {
    pub fn mark(&mut self, direction: Direction) {
        self.direction = Some(direction);
        self.cooldown = BLOCKED_MOVE_COOLDOWN;
    }

    /// Direction to avoid while the cooldown runs.
    pub fn avoid(&self) -> Option<Direction> {
        if self.cooldown > 0 {
            self.direction
        } else {
            None
        }
    }

    pub fn tick(&mut self) {
        if self.cooldown > 0 {
            self.cooldown -= 1;
        }
    }

    pub fn clear(&mut self) {
        self.direction = None;
        self.cooldown = 0;
    }
}

/// The action handed to the host last tick, kept for blocked-move detection.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LastAction {
    pub verb: Verb,
    pub arg: u8,
}

impl Default for LastAction {
    fn default() -> Self {
        Self {
            verb: Verb::Noop,
            arg: 0,
        }
    }
}

impl LastAction {
    pub fn set(&mut self, action: Action) {
        let (verb, arg) = action.decode();
        self.verb = verb;
        self.arg = arg;
    }

    pub fn as_action(&self) -> Action {
        Action::encode(self.verb, self.arg)
    }
}

// ============================================================================
// SEARCH STATE
// ============================================================================

/// Cursor for the outward square-spiral exploration walk.
///
/// `arcs_completed % 4` selects the leg direction, and the leg length grows
/// by one tile every two turns, producing a non-repeating Ulam-style spiral
/// around `base`. After many arcs the cursor rebases onto itself so
/// long-lived agents keep exploring locally.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpiralCursor {
    /// Anchor the spiral winds around.
    pub base: TilePos,
    /// Current cursor position, also the center of cached-thing searches.
    pub last_search: TilePos,
    pub arcs_completed: u32,
    pub steps_in_arc: u32,
    pub clockwise: bool,
}

impl Default for SpiralCursor {
    fn default() -> Self {
        Self {
            base: TilePos::default(),
            last_search: TilePos::default(),
            arcs_completed: 0,
            steps_in_arc: 0,
            clockwise: true,
        }
    }
}

impl SpiralCursor {
    pub fn reset(&mut self, base: TilePos) {
        self.base = base;
        self.last_search = base;
        self.arcs_completed = 0;
        self.steps_in_arc = 0;
    }
}

/// Per-kind memo of the last place a thing was seen, with the step it was
/// cached at for age-based invalidation.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct SenseCache {
    entries: [Option<(TilePos, u64)>; ThingKind::COUNT],
}

impl Default for SenseCache {
    fn default() -> Self {
        Self {
            entries: [None; ThingKind::COUNT],
        }
    }
}

impl SenseCache {
    pub fn get(&self, kind: ThingKind) -> Option<(TilePos, u64)> {
        self.entries[kind.index()]
    }

    pub fn put(&mut self, kind: ThingKind, pos: TilePos, step: u64) {
        self.entries[kind.index()] = Some((pos, step));
    }

    pub fn invalidate(&mut self, kind: ThingKind) {
        self.entries[kind.index()] = None;
    }

    pub fn clear(&mut self) {
        self.entries = [None; ThingKind::COUNT];
    }
}

// ============================================================================
// BUILD & PATH STATE
// ============================================================================

/// A builder's committed construction, if any.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BuildPlan {
    pub choice: Option<BuildingKind>,
    /// Tile the building goes on.
    pub target: Option<TilePos>,
    /// Tile the builder stands on while placing.
    pub stand: Option<TilePos>,
    /// Remaining ticks the builder stays locked to this plan.
    pub lock_steps: u32,
}

impl BuildPlan {
    pub fn is_locked(&self) -> bool {
        self.lock_steps > 0 && self.choice.is_some()
    }

    pub fn commit(&mut self, choice: BuildingKind, target: TilePos, stand: TilePos, lock: u32) {
        self.choice = Some(choice);
        self.target = Some(target);
        self.stand = Some(stand);
        self.lock_steps = lock;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The agent's owned path buffer plus follow cursor.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannedPath {
    /// Waypoints from the tile after the start up to the goal.
    pub steps: Vec<TilePos>,
    pub cursor: usize,
    /// Target the path was planned for.
    pub target: Option<TilePos>,
    /// Target that A* recently failed on; retried via spiral instead.
    pub blocked_target: Option<TilePos>,
}

impl PlannedPath {
    pub fn clear(&mut self) {
        self.steps.clear();
        self.cursor = 0;
        self.target = None;
    }

    pub fn has_route_to(&self, target: TilePos) -> bool {
        self.target == Some(target) && self.cursor < self.steps.len()
    }

    /// The next waypoint to step onto.
    pub fn next_step(&self) -> Option<TilePos> {
        self.steps.get(self.cursor).copied()
    }

    pub fn advance(&mut self) {
        if self.cursor < self.steps.len() {
            self.cursor += 1;
        }
    }

    pub fn is_blocked_for(&self, target: TilePos) -> bool {
        self.blocked_target == Some(target)
    }
}

// ============================================================================
// HOST ORDERS
// ============================================================================

/// A queued host command for scripted agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Move(TilePos),
    AttackMove(TilePos),
}

/// Host-issued standing orders. These override role behaviors in the
/// pipeline and survive role reassignment.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Orders {
    /// Patrol waypoints; empty means no patrol.
    pub patrol: Vec<TilePos>,
    /// Index of the waypoint currently headed for.
    pub patrol_leg: usize,
    pub attack_move: Option<TilePos>,
    /// Rally point; clears itself on arrival.
    pub rally: Option<TilePos>,
    pub hold: bool,
    pub follow: Option<AgentId>,
    pub guard: Option<TilePos>,
    pub stopped: bool,
    pub stance: Stance,
    pub scout_mode: bool,
    /// Settler migration target.
    pub settler: Option<TilePos>,
    pub commands: VecDeque<Command>,
}

impl Orders {
    pub fn push_command(&mut self, command: Command) {
        if self.commands.len() < MAX_QUEUED_COMMANDS {
            self.commands.push_back(command);
        }
    }

    pub fn pop_command(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Whether any pipeline-level override is pending.
    pub fn has_override(&self) -> bool {
        !self.patrol.is_empty()
            || self.attack_move.is_some()
            || self.rally.is_some()
            || self.settler.is_some()
    }
}

// ============================================================================
// BUNDLE
// ============================================================================

/// Everything a freshly tracked agent starts with.
#[derive(Bundle, Default)]
pub struct AgentBundle {
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
}
