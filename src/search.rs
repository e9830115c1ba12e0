//! Spatial search helpers: spiral exploration and cached nearest-thing
//! lookups.
//!
//! Agents explore with a square spiral wound around their base anchor and
//! remember where they last saw each kind of thing. A memoized position is
//! trusted only while it is fresh, close to the search cursor, and still
//! backed by a live harvestable entity; otherwise the world's spatial index
//! is asked again, fanning out from the cursor, then the base, then a
//! freshly advanced spiral position.

use crate::actions::Direction;
use crate::components::{SenseCache, SpiralCursor};
use crate::grid::{GridDims, TilePos};
use crate::world::{ThingKind, WorldView};

/// Steps the spiral advances when a lookup misses everywhere.
pub const SPIRAL_ADVANCE_STEPS: u32 = 5;

/// Arcs after which the spiral rebases onto its current position.
pub const SPIRAL_REBASE_ARCS: u32 = 100;

/// Steps a cached thing position stays trusted.
pub const CACHE_MAX_AGE: u64 = 50;

/// Manhattan radius around the search cursor a cached position may drift.
pub const CACHE_CURSOR_RANGE: i32 = 24;

/// Radius handed to the world's nearest-of-kind index per probe.
const NEARBY_SEARCH_RADIUS: i32 = 20;

// Leg direction cycles. Arc length grows every two turns either way.
const CLOCKWISE_LEGS: [Direction; 4] = [
    Direction::East,
    Direction::South,
    Direction::West,
    Direction::North,
];
const COUNTERCLOCKWISE_LEGS: [Direction; 4] = [
    Direction::East,
    Direction::North,
    Direction::West,
    Direction::South,
];

impl SpiralCursor {
    /// Direction of the leg currently being walked.
    fn leg_direction(&self) -> Direction {
        let cycle = if self.clockwise {
            CLOCKWISE_LEGS
        } else {
            COUNTERCLOCKWISE_LEGS
        };
        cycle[(self.arcs_completed % 4) as usize]
    }

    /// Tiles in the current leg before the next turn.
    fn leg_length(&self) -> u32 {
        self.arcs_completed / 2 + 1
    }

    /// Advance the cursor one tile along the spiral, clamped to the
    /// playable region. Rebases after [`SPIRAL_REBASE_ARCS`] arcs so a
    /// long-running agent keeps exploring locally instead of walking home.
    pub fn advance(&mut self, dims: GridDims) -> TilePos {
        let next = self.leg_direction().step_from(self.last_search);
        self.last_search = dims.clamp_playable(next);

        self.steps_in_arc += 1;
        if self.steps_in_arc >= self.leg_length() {
            self.steps_in_arc = 0;
            self.arcs_completed += 1;
            if self.arcs_completed >= SPIRAL_REBASE_ARCS {
                self.base = self.last_search;
                self.arcs_completed = 0;
            }
        }
        self.last_search
    }

    /// Advance several tiles at once; returns the final cursor position.
    pub fn advance_by(&mut self, dims: GridDims, steps: u32) -> TilePos {
        let mut pos = self.last_search;
        for _ in 0..steps {
            pos = self.advance(dims);
        }
        pos
    }
}

/// Whether the memoized entry for `kind` still points at something worth
/// walking to.
fn cache_entry_is_live(
    world: &dyn WorldView,
    kind: ThingKind,
    pos: TilePos,
    cached_step: u64,
    cursor: TilePos,
) -> bool {
    if world.current_step().saturating_sub(cached_step) >= CACHE_MAX_AGE {
        return false;
    }
    if pos.manhattan(cursor) > CACHE_CURSOR_RANGE {
        return false;
    }
    match world.thing_at(pos) {
        Some(thing) if thing.kind == kind => {
            if kind.harvest_resource().is_some() {
                thing.has_harvestable_resource()
            } else {
                true
            }
        }
        _ => false,
    }
}

/// Find the closest known thing of `kind`, consulting the agent's memo
/// before the world's spatial index.
///
/// Lookup order on a miss: around the spiral cursor, around the base
/// anchor, then advance the spiral [`SPIRAL_ADVANCE_STEPS`] tiles and probe
/// once more. Found positions refresh the memo.
pub fn find_thing(
    world: &dyn WorldView,
    spiral: &mut SpiralCursor,
    sense: &mut SenseCache,
    kind: ThingKind,
) -> Option<TilePos> {
    if let Some((pos, step)) = sense.get(kind) {
        if cache_entry_is_live(world, kind, pos, step, spiral.last_search) {
            return Some(pos);
        }
        sense.invalidate(kind);
    }

    let step = world.current_step();
    let probes = [spiral.last_search, spiral.base];
    for origin in probes {
        if let Some(thing) = world.nearest_of_kind(origin, kind, NEARBY_SEARCH_RADIUS) {
            sense.put(kind, thing.pos, step);
            return Some(thing.pos);
        }
    }

    let fresh = spiral.advance_by(world.dims(), SPIRAL_ADVANCE_STEPS);
    if let Some(thing) = world.nearest_of_kind(fresh, kind, NEARBY_SEARCH_RADIUS) {
        sense.put(kind, thing.pos, step);
        return Some(thing.pos);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxWorld;

    #[test]
    fn test_spiral_does_not_repeat_early() {
        let dims = GridDims::new(64, 64, 2);
        let mut cursor = SpiralCursor::default();
        cursor.reset(TilePos::new(32, 32));

        let mut seen = std::collections::HashSet::new();
        seen.insert(cursor.last_search);
        for _ in 0..80 {
            let pos = cursor.advance(dims);
            assert!(seen.insert(pos), "spiral revisited {:?}", pos);
        }
    }

    #[test]
    fn test_spiral_clamped_to_playable() {
        let dims = GridDims::new(12, 12, 2);
        let mut cursor = SpiralCursor::default();
        cursor.reset(TilePos::new(3, 3));
        for _ in 0..200 {
            let pos = cursor.advance(dims);
            assert!(dims.in_playable(pos));
        }
    }

    #[test]
    fn test_spiral_rebases_after_many_arcs() {
        let dims = GridDims::new(256, 256, 2);
        let mut cursor = SpiralCursor::default();
        cursor.reset(TilePos::new(128, 128));
        let mut steps = 0u32;
        loop {
            let arcs_before = cursor.arcs_completed;
            cursor.advance(dims);
            // Rebase wraps the arc counter back to zero.
            if cursor.arcs_completed < arcs_before {
                break;
            }
            steps += 1;
            assert!(steps < 10_000, "spiral never rebased");
        }
        assert_eq!(cursor.arcs_completed, 0);
        assert_eq!(cursor.base, cursor.last_search);
    }

    #[test]
    fn test_find_thing_memoizes() {
        let mut world = SandboxWorld::open(32, 32, 2);
        let tree = TilePos::new(10, 10);
        world.add_thing(ThingKind::Tree, tree);

        let mut spiral = SpiralCursor::default();
        spiral.reset(TilePos::new(8, 8));
        let mut sense = SenseCache::default();

        assert_eq!(find_thing(&world, &mut spiral, &mut sense, ThingKind::Tree), Some(tree));
        assert!(sense.get(ThingKind::Tree).is_some());

        // Second lookup is served by the memo.
        assert_eq!(find_thing(&world, &mut spiral, &mut sense, ThingKind::Tree), Some(tree));
    }

    #[test]
    fn test_find_thing_invalidates_dead_entry() {
        let mut world = SandboxWorld::open(32, 32, 2);
        let tree = TilePos::new(10, 10);
        world.add_thing(ThingKind::Tree, tree);

        let mut spiral = SpiralCursor::default();
        spiral.reset(TilePos::new(8, 8));
        let mut sense = SenseCache::default();
        find_thing(&world, &mut spiral, &mut sense, ThingKind::Tree);

        world.remove_thing_at(tree);
        assert_eq!(find_thing(&world, &mut spiral, &mut sense, ThingKind::Tree), None);
        assert!(sense.get(ThingKind::Tree).is_none());
    }

    #[test]
    fn test_find_thing_age_expiry() {
        let mut world = SandboxWorld::open(32, 32, 2);
        let near = TilePos::new(10, 10);
        world.add_thing(ThingKind::Tree, near);

        let mut spiral = SpiralCursor::default();
        spiral.reset(TilePos::new(8, 8));
        let mut sense = SenseCache::default();
        find_thing(&world, &mut spiral, &mut sense, ThingKind::Tree);
        assert_eq!(sense.get(ThingKind::Tree).map(|(_, s)| s), Some(0));

        // Old entries are refetched, stamping the current step.
        world.set_step(CACHE_MAX_AGE + 5);
        assert_eq!(find_thing(&world, &mut spiral, &mut sense, ThingKind::Tree), Some(near));
        assert_eq!(
            sense.get(ThingKind::Tree).map(|(_, s)| s),
            Some(CACHE_MAX_AGE + 5)
        );
    }
}
