/*!
 * Directions, Movements and Quadrants
 *
 * The intersection is split into four quadrants:
 *
 * ```text
 *        N
 *    +----+----+
 *    | NW | NE |
 *  W +----+----+ E
 *    | SW | SE |
 *    +----+----+
 *        S
 * ```
 *
 * Traffic keeps to the right, so a vehicle enters through the quadrant on
 * its right-hand side (from North through NW, from East through NE, from
 * South through SE, from West through SW) and turns right after one
 * quadrant, goes straight through two, or turns left through three.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compass direction a vehicle arrives from or leaves towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Dense index, clockwise from North
    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    #[inline]
    pub const fn from_index(index: usize) -> Option<Direction> {
        match index {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    /// Quadrant a vehicle from this direction enters through
    #[inline]
    const fn entry_quadrant(self) -> Quadrant {
        match self {
            Direction::North => Quadrant::NorthWest,
            Direction::East => Quadrant::NorthEast,
            Direction::South => Quadrant::SouthEast,
            Direction::West => Quadrant::SouthWest,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "N",
            Direction::East => "E",
            Direction::South => "S",
            Direction::West => "W",
        };
        f.write_str(name)
    }
}

/// One quarter of the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

impl Quadrant {
    #[inline(always)]
    const fn bit(self) -> u8 {
        match self {
            Quadrant::NorthWest => 0b0001,
            Quadrant::NorthEast => 0b0010,
            Quadrant::SouthEast => 0b0100,
            Quadrant::SouthWest => 0b1000,
        }
    }

    /// Next quadrant along a vehicle's path (vehicles sweep counter-clockwise
    /// on the map: NW → SW → SE → NE → NW)
    #[inline]
    const fn next(self) -> Quadrant {
        match self {
            Quadrant::NorthWest => Quadrant::SouthWest,
            Quadrant::SouthWest => Quadrant::SouthEast,
            Quadrant::SouthEast => Quadrant::NorthEast,
            Quadrant::NorthEast => Quadrant::NorthWest,
        }
    }
}

/// Set of quadrants, one bit per quadrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Footprint(u8);

impl Footprint {
    #[inline(always)]
    pub const fn contains(self, quadrant: Quadrant) -> bool {
        self.0 & quadrant.bit() != 0
    }

    #[inline(always)]
    pub const fn overlaps(self, other: Footprint) -> bool {
        self.0 & other.0 != 0
    }

    #[inline(always)]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Kind of turn a movement makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Turn {
    Right,
    Straight,
    Left,
}

impl Turn {
    /// Quadrants crossed by a movement making this turn
    #[inline(always)]
    pub const fn quadrants(self) -> u32 {
        match self {
            Turn::Right => 1,
            Turn::Straight => 2,
            Turn::Left => 3,
        }
    }
}

/// An origin → destination pair with `origin != destination`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Movement {
    origin: Direction,
    destination: Direction,
}

impl Movement {
    /// Number of distinct movements
    pub const COUNT: usize = 12;

    /// Movement from `origin` to `destination`; `None` for a U-turn
    #[inline]
    pub const fn new(origin: Direction, destination: Direction) -> Option<Movement> {
        if origin.index() == destination.index() {
            None
        } else {
            Some(Movement {
                origin,
                destination,
            })
        }
    }

    #[inline(always)]
    pub const fn origin(self) -> Direction {
        self.origin
    }

    #[inline(always)]
    pub const fn destination(self) -> Direction {
        self.destination
    }

    /// Dense index in `0..Movement::COUNT`
    ///
    /// Movements are grouped by origin; within a group they are ordered by
    /// clockwise distance to the destination.
    #[inline(always)]
    pub const fn index(self) -> usize {
        let origin = self.origin.index();
        let step = (self.destination.index() + 4 - origin) % 4;
        origin * 3 + (step - 1)
    }

    /// Inverse of [`Movement::index`]
    pub const fn from_index(index: usize) -> Option<Movement> {
        if index >= Self::COUNT {
            return None;
        }
        let origin = index / 3;
        let destination = (origin + index % 3 + 1) % 4;
        match (Direction::from_index(origin), Direction::from_index(destination)) {
            (Some(origin), Some(destination)) => Movement::new(origin, destination),
            _ => None,
        }
    }

    /// All twelve movements in index order
    pub fn all() -> impl Iterator<Item = Movement> {
        (0..Self::COUNT).filter_map(Movement::from_index)
    }

    /// Turn classification
    ///
    /// Clockwise one step (e.g. North → East on the map) is a left turn for
    /// a vehicle driving in from that side, two steps is straight, three is
    /// a right turn.
    #[inline]
    pub const fn turn(self) -> Turn {
        match (self.destination.index() + 4 - self.origin.index()) % 4 {
            1 => Turn::Left,
            2 => Turn::Straight,
            _ => Turn::Right,
        }
    }

    /// Quadrants this movement occupies while in the intersection
    pub const fn footprint(self) -> Footprint {
        let mut quadrant = self.origin.entry_quadrant();
        let mut bits = quadrant.bit();
        let mut remaining = self.turn().quadrants() - 1;
        while remaining > 0 {
            quadrant = quadrant.next();
            bits |= quadrant.bit();
            remaining -= 1;
        }
        Footprint(bits)
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}2{}", self.origin, self.destination)
    }
}
