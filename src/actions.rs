//! Action encoding and the eight-way direction scheme.
//!
//! Every decision the controller makes is returned to the host as a single
//! byte: `verb * ARG_COUNT + arg`. The arg is a direction index for movement
//! verbs and a build-choice index for `Build`. Byte `0` doubles as the
//! "no action this tick" sentinel.

use serde::{Deserialize, Serialize};

use crate::grid::TilePos;

/// Number of argument slots per verb in the action byte layout.
///
/// Large enough for the 8 direction indices and the build-choice table.
pub const ARG_COUNT: u8 = 16;

// ============================================================================
// VERBS
// ============================================================================

/// Action verb. Discriminants are part of the wire format shared with the
/// host stepper and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Verb {
    Noop = 0,
    Move = 1,
    Attack = 2,
    Use = 3,
    PlaceLantern = 6,
    Plant = 7,
    Build = 8,
}

impl Verb {
    /// Decode a verb discriminant. Unknown values fall back to `Noop`.
    pub fn from_index(index: u8) -> Verb {
        match index {
            1 => Verb::Move,
            2 => Verb::Attack,
            3 => Verb::Use,
            6 => Verb::PlaceLantern,
            7 => Verb::Plant,
            8 => Verb::Build,
            _ => Verb::Noop,
        }
    }
}

// ============================================================================
// DIRECTIONS
// ============================================================================

/// One of the 8 grid directions. The index order (N, S, W, E, NW, NE, SW,
/// SE) is shared with agent orientation in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    South = 1,
    West = 2,
    East = 3,
    NorthWest = 4,
    NorthEast = 5,
    SouthWest = 6,
    SouthEast = 7,
}

/// Unit vectors for each direction index, y growing southwards.
pub const DIRECTION_VECTORS: [(i32, i32); 8] = [
    (0, -1), // N
    (0, 1),  // S
    (-1, 0), // W
    (1, 0),  // E
    (-1, -1), // NW
    (1, -1), // NE
    (-1, 1), // SW
    (1, 1),  // SE
];

/// All directions in index order.
pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::North,
    Direction::South,
    Direction::West,
    Direction::East,
    Direction::NorthWest,
    Direction::NorthEast,
    Direction::SouthWest,
    Direction::SouthEast,
];

/// The four cardinals, used by escape mode.
pub const CARDINALS: [Direction; 4] = [
    Direction::North,
    Direction::South,
    Direction::West,
    Direction::East,
];

impl Direction {
    /// Direction index 0..7.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lookup by index. Out-of-range indices wrap.
    #[inline]
    pub fn from_index(index: usize) -> Direction {
        ALL_DIRECTIONS[index % 8]
    }

    /// The unit vector for this direction.
    #[inline]
    pub fn vector(self) -> (i32, i32) {
        DIRECTION_VECTORS[self.index()]
    }

    /// Direction whose vector is the componentwise sign of `(dx, dy)`.
    /// Returns `None` for the zero vector.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        let key = (dx.signum(), dy.signum());
        DIRECTION_VECTORS
            .iter()
            .position(|&v| v == key)
            .map(Direction::from_index)
    }

    /// The opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
            Direction::NorthWest => Direction::SouthEast,
            Direction::NorthEast => Direction::SouthWest,
            Direction::SouthWest => Direction::NorthEast,
            Direction::SouthEast => Direction::NorthWest,
        }
    }

    /// The two perpendicular cardinals for a cardinal direction. For a
    /// diagonal, the two cardinals it is composed of.
    pub fn perpendiculars(self) -> [Direction; 2] {
        match self {
            Direction::North | Direction::South => [Direction::West, Direction::East],
            Direction::West | Direction::East => [Direction::North, Direction::South],
            Direction::NorthWest => [Direction::North, Direction::West],
            Direction::NorthEast => [Direction::North, Direction::East],
            Direction::SouthWest => [Direction::South, Direction::West],
            Direction::SouthEast => [Direction::South, Direction::East],
        }
    }

    /// The tile one step in this direction.
    #[inline]
    pub fn step_from(self, pos: TilePos) -> TilePos {
        let (dx, dy) = self.vector();
        TilePos::new(pos.x + dx, pos.y + dy)
    }
}

/// Orientation index -> unit vector, matching the direction table.
#[inline]
pub fn orientation_to_vec(orientation: usize) -> (i32, i32) {
    DIRECTION_VECTORS[orientation % 8]
}

/// Unit vector -> orientation index. Total: the zero vector maps to 0.
pub fn vec_to_orientation(dx: i32, dy: i32) -> usize {
    Direction::from_delta(dx, dy).map(Direction::index).unwrap_or(0)
}

// ============================================================================
// ACTION BYTES
// ============================================================================

/// A single encoded action: `verb * ARG_COUNT + arg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Action(pub u8);

impl Action {
    /// The do-nothing sentinel (`Noop` with arg 0).
    pub const NONE: Action = Action(0);

    /// Encode a verb/arg pair. The arg is masked into range.
    #[inline]
    pub fn encode(verb: Verb, arg: u8) -> Action {
        Action((verb as u8) * ARG_COUNT + (arg % ARG_COUNT))
    }

    /// Decode back into the verb/arg pair.
    #[inline]
    pub fn decode(self) -> (Verb, u8) {
        (Verb::from_index(self.0 / ARG_COUNT), self.0 % ARG_COUNT)
    }

    /// A movement step in the given direction.
    #[inline]
    pub fn step(direction: Direction) -> Action {
        Action::encode(Verb::Move, direction.index() as u8)
    }

    /// An attack toward the given direction.
    #[inline]
    pub fn attack(direction: Direction) -> Action {
        Action::encode(Verb::Attack, direction.index() as u8)
    }

    /// Use/harvest toward the given direction.
    #[inline]
    pub fn use_toward(direction: Direction) -> Action {
        Action::encode(Verb::Use, direction.index() as u8)
    }

    /// Whether this is the no-action sentinel.
    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The verb half of the byte.
    #[inline]
    pub fn verb(self) -> Verb {
        self.decode().0
    }

    /// The arg half of the byte.
    #[inline]
    pub fn arg(self) -> u8 {
        self.decode().1
    }
}
