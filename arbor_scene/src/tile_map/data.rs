// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The packed tile-data format.
//!
//! Each cell is a record of 32-bit words:
//!
//! | word | bits | contents |
//! |---|---|---|
//! | 0 | 0..16 | x, as a 16-bit two's complement value |
//! | 0 | 16..32 | y, likewise |
//! | 1 | 0..29 | tile id |
//! | 1 | 29, 30, 31 | [`CellFlags`]: flip h, flip v, transpose |
//! | 2 | 0..16, 16..32 | autotile coordinate x and y |
//!
//! The legacy layout stops after word 1; its cells decode with autotile coordinate `(0, 0)`.

use alloc::vec::Vec;

use super::cell::{CellFlags, CellPos, TileCell};

const ID_MASK: u32 = (1 << 29) - 1;

/// Errors raised by the packed tile-data codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TileDataError {
    /// The array does not split into whole records.
    #[error("tile data has {len} words, which is not a multiple of the {stride}-word record")]
    TruncatedRecord {
        /// Word count of the array.
        len: usize,
        /// Words per record.
        stride: usize,
    },
    /// A cell coordinate does not fit in 16 bits.
    #[error("cell ({x}, {y}) does not fit in 16-bit coordinates")]
    CoordinateOutOfRange {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// A tile id does not fit in the 29-bit id field.
    #[error("tile id {id} does not fit in the 29-bit id field")]
    TileIdOutOfRange {
        /// The offending id.
        id: i32,
    },
}

/// Record layout of a packed array.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileDataFormat {
    /// Two words per cell, without autotile coordinates.
    Legacy,
    /// Three words per cell.
    #[default]
    Current,
}

impl TileDataFormat {
    /// Words per record.
    pub const fn stride(self) -> usize {
        match self {
            Self::Legacy => 2,
            Self::Current => 3,
        }
    }
}

/// Pack `cells` in the [current](TileDataFormat::Current) layout.
#[allow(
    clippy::cast_sign_loss,
    reason = "Coordinates are stored as 16-bit two's complement."
)]
pub fn encode<'a>(
    cells: impl IntoIterator<Item = (CellPos, &'a TileCell)>,
) -> Result<Vec<u32>, TileDataError> {
    let mut words = Vec::new();
    for (pos, cell) in cells {
        let (Ok(x), Ok(y)) = (i16::try_from(pos.x), i16::try_from(pos.y)) else {
            return Err(TileDataError::CoordinateOutOfRange { x: pos.x, y: pos.y });
        };
        let id = u32::try_from(cell.id)
            .ok()
            .filter(|id| *id <= ID_MASK)
            .ok_or(TileDataError::TileIdOutOfRange { id: cell.id })?;
        let (ax, ay) = cell.autotile_coord;
        words.push(u32::from(x as u16) | (u32::from(y as u16) << 16));
        words.push(id | cell.flags.bits());
        words.push(u32::from(ax as u16) | (u32::from(ay as u16) << 16));
    }
    Ok(words)
}

/// Unpack `words` laid out as `format`, validating the whole array first.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "Each half-word is a 16-bit two's complement value; ids are masked to 29 bits."
)]
pub fn decode(
    words: &[u32],
    format: TileDataFormat,
) -> Result<Vec<(CellPos, TileCell)>, TileDataError> {
    let stride = format.stride();
    if words.len() % stride != 0 {
        return Err(TileDataError::TruncatedRecord {
            len: words.len(),
            stride,
        });
    }
    let split = |word: u32| (word as u16 as i16, (word >> 16) as u16 as i16);
    Ok(words
        .chunks_exact(stride)
        .map(|record| {
            let (x, y) = split(record[0]);
            let cell = TileCell {
                id: (record[1] & ID_MASK) as i32,
                flags: CellFlags::from_bits_truncate(record[1]),
                autotile_coord: record.get(2).map_or((0, 0), |w| split(*w)),
            };
            (CellPos::new(x.into(), y.into()), cell)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn the_documented_example_round_trips() {
        let cell = TileCell {
            id: 17,
            flags: CellFlags::FLIP_H,
            autotile_coord: (1, 2),
        };
        let words = encode([(CellPos::new(3, -2), &cell)]).unwrap();
        assert_eq!(words, vec![0xfffe_0003, (1 << 29) | 17, 0x0002_0001]);
        let decoded = decode(&words, TileDataFormat::Current).unwrap();
        assert_eq!(decoded, vec![(CellPos::new(3, -2), cell)]);
    }

    #[test]
    fn all_flags_pack_into_the_id_word() {
        let cell = TileCell {
            id: 5,
            flags: CellFlags::all(),
            autotile_coord: (-1, 0),
        };
        let words = encode([(CellPos::new(-1, 0), &cell)]).unwrap();
        assert_eq!(words[1], 0xe000_0005);
        assert_eq!(decode(&words, TileDataFormat::Current).unwrap()[0].1, cell);
    }

    #[test]
    fn legacy_records_have_no_autotile_word() {
        let words = [0x0001_0002, (1 << 30) | 9, 0x0000_ffff, 4];
        let decoded = decode(&words, TileDataFormat::Legacy).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0, CellPos::new(2, 1));
        assert_eq!(decoded[0].1.flags, CellFlags::FLIP_V);
        assert_eq!(decoded[0].1.autotile_coord, (0, 0));
        assert_eq!(decoded[1].0, CellPos::new(-1, 0));
        assert_eq!(decoded[1].1.id, 4);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(
            decode(&[1, 2, 3, 4], TileDataFormat::Current),
            Err(TileDataError::TruncatedRecord { len: 4, stride: 3 })
        );
        let cell = TileCell {
            id: 1,
            flags: CellFlags::empty(),
            autotile_coord: (0, 0),
        };
        assert_eq!(
            encode([(CellPos::new(40_000, 0), &cell)]),
            Err(TileDataError::CoordinateOutOfRange { x: 40_000, y: 0 })
        );
        let huge = TileCell {
            id: 1 << 29,
            ..cell
        };
        assert_eq!(
            encode([(CellPos::new(0, 0), &huge)]),
            Err(TileDataError::TileIdOutOfRange { id: 1 << 29 })
        );
    }
}
