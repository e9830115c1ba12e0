//! Tile coordinates and grid geometry.
//!
//! The world is a fixed `width x height` grid with a border margin; agents
//! only ever stand inside the playable sub-rectangle. Chebyshev distance is
//! the metric everywhere (diagonal steps cost the same as cardinal ones).

use serde::{Deserialize, Serialize};

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: `max(|dx|, |dy|)`.
    #[inline]
    pub fn chebyshev(self, other: TilePos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Manhattan distance: `|dx| + |dy|`.
    #[inline]
    pub fn manhattan(self, other: TilePos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The 8 neighboring tiles, in direction-index order.
    pub fn neighbors(self) -> [TilePos; 8] {
        let mut out = [self; 8];
        for (i, (dx, dy)) in crate::actions::DIRECTION_VECTORS.iter().enumerate() {
            out[i] = TilePos::new(self.x + dx, self.y + dy);
        }
        out
    }
}

/// Grid extents and border margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    /// Grid width in tiles.
    pub width: i32,
    /// Grid height in tiles.
    pub height: i32,
    /// Border margin; tiles within the margin are out of play.
    pub border: i32,
}

impl Default for GridDims {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            border: 2,
        }
    }
}

impl GridDims {
    pub fn new(width: i32, height: i32, border: i32) -> Self {
        Self { width, height, border }
    }

    /// Whether the position is anywhere on the grid.
    #[inline]
    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Whether the position is inside the playable sub-rectangle
    /// `[border, width-border) x [border, height-border)`.
    #[inline]
    pub fn in_playable(&self, pos: TilePos) -> bool {
        pos.x >= self.border
            && pos.y >= self.border
            && pos.x < self.width - self.border
            && pos.y < self.height - self.border
    }

    /// Clamp a position into the playable sub-rectangle.
    #[inline]
    pub fn clamp_playable(&self, pos: TilePos) -> TilePos {
        TilePos::new(
            pos.x.clamp(self.border, self.width - self.border - 1),
            pos.y.clamp(self.border, self.height - self.border - 1),
        )
    }

    /// Minimum distance from `pos` to the playable border.
    pub fn border_clearance(&self, pos: TilePos) -> i32 {
        let left = pos.x - self.border;
        let right = self.width - self.border - 1 - pos.x;
        let top = pos.y - self.border;
        let bottom = self.height - self.border - 1 - pos.y;
        left.min(right).min(top).min(bottom)
    }

    /// Total cell count, for sizing flat per-tile arrays.
    #[inline]
    pub fn cell_count(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    /// Flat row-major index for a position. Caller checks `contains` first.
    #[inline]
    pub fn index(&self, pos: TilePos) -> usize {
        (pos.y as usize) * (self.width as usize) + pos.x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chebyshev() {
        let a = TilePos::new(2, 2);
        assert_eq!(a.chebyshev(TilePos::new(5, 5)), 3);
        assert_eq!(a.chebyshev(TilePos::new(2, 9)), 7);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(TilePos::new(0, 0).manhattan(TilePos::new(3, 4)), 7);
        assert_eq!(TilePos::new(5, 5).manhattan(TilePos::new(2, 1)), 7);
    }

    #[test]
    fn test_playable_region() {
        let dims = GridDims::new(10, 10, 2);
        assert!(dims.in_playable(TilePos::new(2, 2)));
        assert!(dims.in_playable(TilePos::new(7, 7)));
        assert!(!dims.in_playable(TilePos::new(1, 5)));
        assert!(!dims.in_playable(TilePos::new(8, 5)));
        assert_eq!(dims.clamp_playable(TilePos::new(0, 20)), TilePos::new(2, 7));
    }

    #[test]
    fn test_border_clearance() {
        let dims = GridDims::new(10, 10, 2);
        assert_eq!(dims.border_clearance(TilePos::new(2, 2)), 0);
        assert_eq!(dims.border_clearance(TilePos::new(4, 5)), 2);
    }

    #[test]
    fn test_neighbors_order_matches_directions() {
        let n = TilePos::new(5, 5).neighbors();
        assert_eq!(n[0], TilePos::new(5, 4)); // N
        assert_eq!(n[7], TilePos::new(6, 6)); // SE
    }
}
