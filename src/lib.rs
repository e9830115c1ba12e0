//! Warband AI - Scripted Agent Controller
//!
//! A deterministic per-tick decision core for a tile-based RTS: the host
//! world asks, for every living agent, "what do you do now?" and gets a
//! single encoded action back within a bounded budget. Uses `bevy_ecs` for
//! the per-agent state store.

pub mod actions;
pub mod api;
pub mod behaviors;
pub mod components;
pub mod config;
pub mod grid;
pub mod options;
pub mod pathfind;
pub mod profiler;
pub mod roles;
pub mod sandbox;
pub mod search;
pub mod snapshot;
pub mod systems;
pub mod team;
pub mod visibility;
pub mod world;

pub use actions::{Action, Direction, Verb, ARG_COUNT};
pub use api::Controller;
pub use behaviors::Behavior;
pub use components::*;
pub use config::{ControllerConfig, DifficultyConfig};
pub use grid::{GridDims, TilePos};
pub use options::{run_options, DecisionCtx, OptionDef};
pub use pathfind::{can_enter_for_move, find_path, is_passable, move_towards, PathCache};
pub use profiler::TickProfiler;
pub use roles::{Role, RoleCatalog, RoleKind};
pub use sandbox::SandboxWorld;
pub use snapshot::ControllerSnapshot;
pub use systems::*;
pub use team::{TeamRegistry, TeamState, ThreatEntry, ThreatMap};
pub use visibility::FogMap;
pub use world::*;
