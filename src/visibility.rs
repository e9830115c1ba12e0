//! Per-team fog-of-war reveal grids.

use crate::grid::{GridDims, TilePos};

/// Boolean reveal grid for one team.
#[derive(Debug, Clone)]
pub struct FogMap {
    dims: GridDims,
    revealed: Vec<bool>,
    revealed_count: usize,
}

impl FogMap {
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            revealed: vec![false; dims.cell_count()],
            revealed_count: 0,
        }
    }

    /// Whether the tile has ever been revealed. Off-map tiles are never
    /// revealed.
    pub fn is_revealed(&self, pos: TilePos) -> bool {
        self.dims.contains(pos) && self.revealed[self.dims.index(pos)]
    }

    /// Reveal the Chebyshev square of `radius` around `center`.
    ///
    /// When the four corners and the center are already lit the whole square
    /// must be too (reveals only ever grow), so the write is skipped. That
    /// makes stationary agents nearly free.
    pub fn reveal(&mut self, center: TilePos, radius: i32) {
        let radius = radius.max(0);
        let corners = [
            TilePos::new(center.x - radius, center.y - radius),
            TilePos::new(center.x + radius, center.y - radius),
            TilePos::new(center.x - radius, center.y + radius),
            TilePos::new(center.x + radius, center.y + radius),
        ];
        let all_lit = self.is_revealed(center)
            && corners
                .iter()
                .all(|&c| !self.dims.contains(c) || self.is_revealed(c));
        if all_lit {
            return;
        }

        for y in (center.y - radius)..=(center.y + radius) {
            for x in (center.x - radius)..=(center.x + radius) {
                let pos = TilePos::new(x, y);
                if !self.dims.contains(pos) {
                    continue;
                }
                let idx = self.dims.index(pos);
                if !self.revealed[idx] {
                    self.revealed[idx] = true;
                    self.revealed_count += 1;
                }
            }
        }
    }

    /// Tiles revealed so far.
    pub fn revealed_count(&self) -> usize {
        self.revealed_count
    }

    pub fn clear(&mut self) {
        self.revealed.fill(false);
        self.revealed_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_square() {
        let dims = GridDims::new(32, 32, 2);
        let mut fog = FogMap::new(dims);
        let center = TilePos::new(10, 10);
        fog.reveal(center, 3);

        for y in 7..=13 {
            for x in 7..=13 {
                assert!(fog.is_revealed(TilePos::new(x, y)));
            }
        }
        assert!(!fog.is_revealed(TilePos::new(14, 10)));
        assert_eq!(fog.revealed_count(), 49);
    }

    #[test]
    fn test_reveal_clips_at_edges() {
        let dims = GridDims::new(8, 8, 1);
        let mut fog = FogMap::new(dims);
        fog.reveal(TilePos::new(0, 0), 2);
        assert!(fog.is_revealed(TilePos::new(0, 0)));
        assert!(fog.is_revealed(TilePos::new(2, 2)));
        assert!(!fog.is_revealed(TilePos::new(-1, 0)));
        assert_eq!(fog.revealed_count(), 9);
    }

    #[test]
    fn test_stationary_reveal_is_idempotent() {
        let dims = GridDims::new(32, 32, 2);
        let mut fog = FogMap::new(dims);
        fog.reveal(TilePos::new(10, 10), 4);
        let count = fog.revealed_count();
        // Same square again: corner check short-circuits, nothing changes.
        fog.reveal(TilePos::new(10, 10), 4);
        assert_eq!(fog.revealed_count(), count);
    }

    #[test]
    fn test_clear() {
        let dims = GridDims::new(16, 16, 2);
        let mut fog = FogMap::new(dims);
        fog.reveal(TilePos::new(5, 5), 2);
        fog.clear();
        assert_eq!(fog.revealed_count(), 0);
        assert!(!fog.is_revealed(TilePos::new(5, 5)));
    }
}
