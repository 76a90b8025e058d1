// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid coordinates and cell contents.

use core::cmp::Ordering;

/// Tile id that means "no tile"; writing it erases the cell.
pub const INVALID_CELL: i32 = -1;

bitflags::bitflags! {
    /// Per-cell orientation flags.
    ///
    /// The bit positions are the ones used by the packed tile-data format, where the flags
    /// share a word with the tile id.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CellFlags: u32 {
        /// Mirror the tile horizontally.
        const FLIP_H = 1 << 29;
        /// Mirror the tile vertically.
        const FLIP_V = 1 << 30;
        /// Swap the tile's axes before flipping.
        const TRANSPOSE = 1 << 31;
    }
}

/// An integer grid coordinate, used both for cells and for quadrants.
///
/// Coordinates order y-major, x-minor: row by row, left to right.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl CellPos {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The quadrant this cell falls in, rounding toward negative infinity.
    pub const fn to_quadrant(self, quadrant_size: i32) -> Self {
        Self {
            x: self.x.div_euclid(quadrant_size),
            y: self.y.div_euclid(quadrant_size),
        }
    }
}

impl Ord for CellPos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for CellPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The contents of one occupied cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileCell {
    /// Tile-set entry drawn in this cell.
    pub id: i32,
    /// Orientation.
    pub flags: CellFlags,
    /// Sub-tile picked from an autotile or atlas entry.
    pub autotile_coord: (i16, i16),
}

impl TileCell {
    pub(crate) fn flip_h(&self) -> bool {
        self.flags.contains(CellFlags::FLIP_H)
    }

    pub(crate) fn flip_v(&self) -> bool {
        self.flags.contains(CellFlags::FLIP_V)
    }

    pub(crate) fn transpose(&self) -> bool {
        self.flags.contains(CellFlags::TRANSPOSE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;
    use alloc::vec::Vec;

    #[test]
    fn quadrants_round_toward_negative_infinity() {
        assert_eq!(CellPos::new(0, 15).to_quadrant(16), CellPos::new(0, 0));
        assert_eq!(CellPos::new(16, 31).to_quadrant(16), CellPos::new(1, 1));
        assert_eq!(CellPos::new(-1, -16).to_quadrant(16), CellPos::new(-1, -1));
        assert_eq!(CellPos::new(-17, 3).to_quadrant(16), CellPos::new(-2, 0));
        assert_eq!(CellPos::new(-5, 7).to_quadrant(1), CellPos::new(-5, 7));
    }

    #[test]
    fn coordinates_sort_row_by_row() {
        let set: BTreeSet<CellPos> = [
            CellPos::new(5, 1),
            CellPos::new(-3, 2),
            CellPos::new(0, 1),
            CellPos::new(9, -1),
        ]
        .into_iter()
        .collect();
        let order: Vec<_> = set.into_iter().collect();
        assert_eq!(
            order,
            [
                CellPos::new(9, -1),
                CellPos::new(0, 1),
                CellPos::new(5, 1),
                CellPos::new(-3, 2),
            ]
        );
    }
}
