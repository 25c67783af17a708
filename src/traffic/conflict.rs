/*!
 * Conflict Table
 *
 * For every movement, the set of other movements that must be absent
 * before it may enter. Two distinct movements conflict when their
 * quadrant footprints overlap; a movement never conflicts with itself,
 * so any number of vehicles making the same movement may be inside
 * together.
 *
 * The table is computed at compile time. Sizes by turn: right 5,
 * straight 8, left 10.
 */

use super::direction::Movement;

/// Bit set over movement indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MovementSet(u16);

impl MovementSet {
    pub const EMPTY: MovementSet = MovementSet(0);

    #[inline(always)]
    pub const fn contains(self, movement: Movement) -> bool {
        self.0 & (1 << movement.index()) != 0
    }

    #[inline(always)]
    #[must_use]
    pub const fn with(self, movement: Movement) -> MovementSet {
        MovementSet(self.0 | (1 << movement.index()))
    }

    #[inline(always)]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Movement> {
        Movement::all().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Movement> for MovementSet {
    fn from_iter<I: IntoIterator<Item = Movement>>(iter: I) -> Self {
        iter.into_iter().fold(MovementSet::EMPTY, MovementSet::with)
    }
}

/// Static conflict relation over the twelve movements
#[derive(Debug, Clone, Copy)]
pub struct ConflictTable {
    sets: [MovementSet; Movement::COUNT],
}

/// The conflict table for the four-way intersection
pub static CONFLICTS: ConflictTable = ConflictTable::from_footprints();

impl ConflictTable {
    const fn from_footprints() -> Self {
        let mut sets = [MovementSet::EMPTY; Movement::COUNT];
        let mut i = 0;
        while i < Movement::COUNT {
            let mut j = 0;
            while j < Movement::COUNT {
                if let (Some(a), Some(b)) = (Movement::from_index(i), Movement::from_index(j)) {
                    if i != j && a.footprint().overlaps(b.footprint()) {
                        sets[i] = sets[i].with(b);
                    }
                }
                j += 1;
            }
            i += 1;
        }
        Self { sets }
    }

    /// Movements that must be absent before `movement` may enter
    #[inline(always)]
    pub const fn conflicts_of(&self, movement: Movement) -> MovementSet {
        self.sets[movement.index()]
    }

    #[inline(always)]
    pub const fn conflict(&self, a: Movement, b: Movement) -> bool {
        self.sets[a.index()].contains(b)
    }
}
