//! Grid navigation: passability, greedy stepping, and bounded A*.
//!
//! A* runs against preallocated per-tile arrays tagged with a generation
//! counter, so invalidating the whole cache between calls is a single
//! integer increment regardless of map size. The search itself is strictly
//! bounded: at most [`MAX_PATH_EXPANSIONS`] node expansions per call, after
//! which the caller degrades to greedy movement or spiral search.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::actions::{Direction, ALL_DIRECTIONS};
use crate::grid::{GridDims, TilePos};
use crate::world::{AgentId, ThingKind, WorldView};

/// Hard cap on A* node expansions per call.
pub const MAX_PATH_EXPANSIONS: usize = 250;

/// Longest path the cache will hand back.
pub const MAX_PATH_LENGTH: usize = 60;

/// Maximum goal tiles considered per search (target or its open neighbors).
pub const MAX_PATH_GOALS: usize = 8;

/// Minimum Chebyshev spacing between lanterns after a push.
pub const LANTERN_SPACING: i32 = 3;

// ============================================================================
// PASSABILITY
// ============================================================================

/// Static passability used by A* goal selection.
///
/// The tile must be on the grid, water- and door-permissible for the agent,
/// and either empty or holding only a lantern (lanterns are pushable, so
/// exploration treats them as open).
pub fn is_passable(world: &dyn WorldView, agent: AgentId, pos: TilePos) -> bool {
    if !world.is_valid(pos) || !world.terrain_allows(pos) {
        return false;
    }
    if world.is_water_blocked_for_agent(agent, pos) {
        return false;
    }
    if world.has_door(pos) && !world.can_agent_pass_door(agent, pos) {
        return false;
    }
    match world.thing_at(pos) {
        None => world.is_empty(pos),
        Some(thing) => thing.kind == ThingKind::Lantern,
    }
}

/// Directional enter check used by actual movement.
///
/// On top of [`is_passable`]: the target must lie inside the playable
/// border, the elevation transition from `from` must be traversable, and a
/// lantern on the target is only enterable if it has a legal push
/// destination.
pub fn can_enter_for_move(
    world: &dyn WorldView,
    agent: AgentId,
    from: TilePos,
    to: TilePos,
) -> bool {
    let dims = world.dims();
    if !dims.in_playable(to) {
        return false;
    }
    if !world.terrain_allows(to) || world.is_water_blocked_for_agent(agent, to) {
        return false;
    }
    if world.has_door(to) && !world.can_agent_pass_door(agent, to) {
        return false;
    }
    if !world.can_traverse_elevation(from, to) {
        return false;
    }
    match world.thing_at(to) {
        None => world.is_empty(to),
        Some(thing) if thing.kind == ThingKind::Lantern => {
            lantern_push_destination(world, from, to).is_some()
        }
        Some(_) => false,
    }
}

/// Where a lantern at `to` would land if pushed by a move from `from`.
///
/// Preference order: two tiles ahead of the push, one tile ahead, then any
/// tile adjacent to the lantern. A destination must be empty, walkable,
/// unfrozen, and at least [`LANTERN_SPACING`] Chebyshev from every other
/// lantern.
pub fn lantern_push_destination(
    world: &dyn WorldView,
    from: TilePos,
    to: TilePos,
) -> Option<TilePos> {
    let dx = (to.x - from.x).signum();
    let dy = (to.y - from.y).signum();

    let two_ahead = TilePos::new(to.x + 2 * dx, to.y + 2 * dy);
    let one_ahead = TilePos::new(to.x + dx, to.y + dy);

    if lantern_can_land(world, to, two_ahead) {
        return Some(two_ahead);
    }
    if lantern_can_land(world, to, one_ahead) {
        return Some(one_ahead);
    }
    to.neighbors()
        .into_iter()
        .find(|&spot| spot != from && lantern_can_land(world, to, spot))
}

fn lantern_can_land(world: &dyn WorldView, lantern: TilePos, spot: TilePos) -> bool {
    if !world.dims().in_playable(spot) {
        return false;
    }
    if !world.is_empty(spot) || !world.terrain_allows(spot) || world.is_tile_frozen(spot) {
        return false;
    }
    let mut nearby = Vec::new();
    world.collect_in_range(spot, ThingKind::Lantern, LANTERN_SPACING - 1, &mut nearby);
    nearby.iter().all(|other| other.pos == lantern)
}

// ============================================================================
// GREEDY STEP
// ============================================================================

/// Pick one step from `from` toward `to`, avoiding `avoid` unless it is the
/// only way out. Returns `None` when all 8 directions are blocked.
pub fn move_towards(
    world: &dyn WorldView,
    agent: AgentId,
    from: TilePos,
    to: TilePos,
    avoid: Option<Direction>,
) -> Option<Direction> {
    let dims = world.dims();
    let goal = dims.clamp_playable(to);

    // Clamp folded the target onto us: back away from the border instead.
    if goal == from {
        return retreat_from_border(world, agent, from, avoid, dims);
    }

    // Direct line first.
    if let Some(direct) = Direction::from_delta(goal.x - from.x, goal.y - from.y) {
        if Some(direct) != avoid && can_enter_for_move(world, agent, from, direct.step_from(from)) {
            return Some(direct);
        }
    }

    // Otherwise the enterable neighbor closest to the goal.
    let mut best: Option<(Direction, i32)> = None;
    for dir in ALL_DIRECTIONS {
        if Some(dir) == avoid {
            continue;
        }
        let next = dir.step_from(from);
        if !can_enter_for_move(world, agent, from, next) {
            continue;
        }
        let dist = next.chebyshev(goal);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((dir, dist));
        }
    }
    if let Some((dir, _)) = best {
        return Some(dir);
    }

    // The avoided direction is a last resort, never a preference.
    if let Some(dir) = avoid {
        if can_enter_for_move(world, agent, from, dir.step_from(from)) {
            return Some(dir);
        }
    }
    None
}

fn retreat_from_border(
    world: &dyn WorldView,
    agent: AgentId,
    from: TilePos,
    avoid: Option<Direction>,
    dims: GridDims,
) -> Option<Direction> {
    let mut best: Option<(Direction, i32)> = None;
    let mut avoided_fallback: Option<Direction> = None;
    for dir in ALL_DIRECTIONS {
        let next = dir.step_from(from);
        if !can_enter_for_move(world, agent, from, next) {
            continue;
        }
        if Some(dir) == avoid {
            avoided_fallback = Some(dir);
            continue;
        }
        let clearance = dims.border_clearance(next);
        if best.map_or(true, |(_, c)| clearance > c) {
            best = Some((dir, clearance));
        }
    }
    best.map(|(dir, _)| dir).or(avoided_fallback)
}

// ============================================================================
// A* CACHE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    g: u32,
    pos: TilePos,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior; deeper nodes win f-ties.
        other
            .f
            .cmp(&self.f)
            .then(self.g.cmp(&other.g))
            .then(other.pos.x.cmp(&self.pos.x))
            .then(other.pos.y.cmp(&self.pos.y))
    }
}

/// Preallocated A* working memory, one per controller (or per thread).
///
/// Every per-tile array is paired with a generation tag; a cell whose tag
/// differs from the current generation is logically unset. Bumping the
/// generation therefore invalidates the whole cache in O(1).
pub struct PathCache {
    dims: GridDims,
    generation: u32,
    came_from_gen: Vec<u32>,
    came_from: Vec<u8>,
    g_gen: Vec<u32>,
    g_score: Vec<u32>,
    closed_gen: Vec<u32>,
    open: BinaryHeap<OpenEntry>,
    goals: Vec<TilePos>,
}

impl PathCache {
    pub fn new(dims: GridDims) -> Self {
        let cells = dims.cell_count();
        Self {
            dims,
            generation: 0,
            came_from_gen: vec![0; cells],
            came_from: vec![0; cells],
            g_gen: vec![0; cells],
            g_score: vec![0; cells],
            closed_gen: vec![0; cells],
            open: BinaryHeap::new(),
            goals: Vec::with_capacity(MAX_PATH_GOALS),
        }
    }

    /// Current cache generation (diagnostics and tests).
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn begin_search(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Wrapped: stale tags could alias generation 0, so scrub once.
            self.came_from_gen.fill(0);
            self.g_gen.fill(0);
            self.closed_gen.fill(0);
            self.generation = 1;
        }
        self.open.clear();
        self.goals.clear();
    }

    #[inline]
    fn idx(&self, pos: TilePos) -> usize {
        self.dims.index(pos)
    }

    fn g_at(&self, pos: TilePos) -> Option<u32> {
        let i = self.idx(pos);
        (self.g_gen[i] == self.generation).then(|| self.g_score[i])
    }

    fn set_g(&mut self, pos: TilePos, g: u32) {
        let i = self.idx(pos);
        self.g_gen[i] = self.generation;
        self.g_score[i] = g;
    }

    fn is_closed(&self, pos: TilePos) -> bool {
        self.closed_gen[self.idx(pos)] == self.generation
    }

    fn close(&mut self, pos: TilePos) {
        let i = self.idx(pos);
        self.closed_gen[i] = self.generation;
    }

    fn set_came_from(&mut self, pos: TilePos, dir: Direction) {
        let i = self.idx(pos);
        self.came_from_gen[i] = self.generation;
        self.came_from[i] = dir.index() as u8;
    }

    fn came_from_at(&self, pos: TilePos) -> Option<Direction> {
        let i = self.idx(pos);
        (self.came_from_gen[i] == self.generation)
            .then(|| Direction::from_index(self.came_from[i] as usize))
    }

    fn heuristic(&self, pos: TilePos) -> u32 {
        self.goals
            .iter()
            .map(|&g| pos.chebyshev(g) as u32)
            .min()
            .unwrap_or(0)
    }
}

// ============================================================================
// A* SEARCH
// ============================================================================

/// Bounded A* from `from` toward `target`.
///
/// Goals are `target` itself if passable, otherwise its passable
/// 8-neighbors. On success the waypoints (excluding `from`, ending on a
/// goal) are written into `out` and `true` is returned. Exhaustion and
/// unreachable targets leave `out` empty and return `false`.
pub fn find_path(
    cache: &mut PathCache,
    world: &dyn WorldView,
    agent: AgentId,
    from: TilePos,
    target: TilePos,
    out: &mut Vec<TilePos>,
) -> bool {
    out.clear();
    if !world.is_valid(from) {
        return false;
    }

    cache.begin_search();

    if is_passable(world, agent, target) {
        cache.goals.push(target);
    } else {
        for neighbor in target.neighbors() {
            if cache.goals.len() >= MAX_PATH_GOALS {
                break;
            }
            if is_passable(world, agent, neighbor) {
                cache.goals.push(neighbor);
            }
        }
    }
    if cache.goals.is_empty() {
        return false;
    }
    if cache.goals.contains(&from) {
        return true;
    }

    cache.set_g(from, 0);
    let h0 = cache.heuristic(from);
    cache.open.push(OpenEntry {
        f: h0,
        g: 0,
        pos: from,
    });

    let mut expansions = 0usize;
    while let Some(entry) = cache.open.pop() {
        // Stale duplicates are skipped on pop instead of being re-keyed.
        if cache.is_closed(entry.pos) {
            continue;
        }
        cache.close(entry.pos);

        if cache.goals.contains(&entry.pos) {
            reconstruct(cache, from, entry.pos, out);
            return true;
        }

        expansions += 1;
        if expansions > MAX_PATH_EXPANSIONS {
            log::debug!(
                "find_path: expansion cap hit searching {:?} -> {:?}",
                from,
                target
            );
            return false;
        }

        for dir in ALL_DIRECTIONS {
            let next = dir.step_from(entry.pos);
            if !world.is_valid(next) || cache.is_closed(next) {
                continue;
            }
            if !can_enter_for_move(world, agent, entry.pos, next) {
                continue;
            }
            let tentative = entry.g + 1;
            if cache.g_at(next).is_some_and(|g| g <= tentative) {
                continue;
            }
            cache.set_g(next, tentative);
            cache.set_came_from(next, dir);
            cache.open.push(OpenEntry {
                f: tentative + cache.heuristic(next),
                g: tentative,
                pos: next,
            });
        }
    }

    false
}

fn reconstruct(cache: &PathCache, from: TilePos, goal: TilePos, out: &mut Vec<TilePos>) {
    let mut cursor = goal;
    while cursor != from {
        out.push(cursor);
        let Some(dir) = cache.came_from_at(cursor) else {
            break;
        };
        let (dx, dy) = dir.vector();
        cursor = TilePos::new(cursor.x - dx, cursor.y - dy);
    }
    out.reverse();
    out.truncate(MAX_PATH_LENGTH);
}
