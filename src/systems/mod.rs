//! The controller's per-tick logic.
//!
//! Two entry points drive everything:
//!
//! 1. `update::run_maintenance` — once per world tick, before any
//!    decisions: episode-reset detection, reservation/claim sweeps, the
//!    economy tick with adaptive difficulty, and hybrid-role application.
//!
//! 2. `decide::decide_action` — once per agent per tick, in agent-id
//!    order. The stages run strictly in sequence and the first one that
//!    produces a non-zero action wins:
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | inactivity / lazy init | world agent registry | `RoleSlot` |
//! | difficulty delay | team delay chance, RNG | - |
//! | staggered threat scan | world agents in vision | team `ThreatMap`, `FogMap` |
//! | unit auto-modes | agent class | `Orders` |
//! | goblin override | world relics/agents | `SpiralCursor` |
//! | stuck / escape | `Trail`, `LastAction` | `EscapeState`, caches |
//! | global auto-attack | world things/agents in range | - |
//! | patrol / rally / attack-move | `Orders` | `Orders`, `PlannedPath` |
//! | settler migration | `Orders`, nearby friendlies | `Orders` |
//! | gatherer priority globals | stockpiles, population | `BuildPlan`, claims |
//! | role options | role catalog | `BehaviorSlot`, everything above |
//!
//! Later agents in a tick observe earlier agents' claims and reservations;
//! the world snapshot itself stays fixed until the host steps it.

pub mod decide;
pub mod movement;
pub mod threat;
pub mod update;

pub use decide::decide_for_agent;
pub use movement::{is_oscillating, move_to, spiral_step, ASTAR_DISTANCE_THRESHOLD};
pub use threat::{update_threat_map_from_vision, THREAT_MAP_STAGGER_INTERVAL};
pub use update::{HybridRoleQueue, WorldFacts};
