// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile-map geometry: the cell basis, staggered rows and columns, and the per-cell
//! flip/transpose correction.

use kurbo::{Affine, Point, Size, Vec2};

use super::cell::{CellPos, TileCell};

/// The shape of the cell grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileMapMode {
    /// Axis-aligned rectangles of the cell size.
    #[default]
    Square,
    /// Diamonds: the cell axes point half a cell right and half a cell left, both downward.
    Isometric,
    /// The cell axes are the basis of a user-provided transform.
    Custom,
}

/// Staggering of every other row or column by half a cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum HalfOffset {
    /// Odd rows shift half a cell along the x axis.
    X,
    /// Odd columns shift half a cell along the y axis.
    Y,
    /// No staggering.
    #[default]
    Disabled,
    /// Odd rows shift half a cell against the x axis.
    NegativeX,
    /// Odd columns shift half a cell against the y axis.
    NegativeY,
}

/// Which point of a cell its quadrant anchor sits on.
///
/// This is the point batches and bodies are placed at, which is what y-sorting compares.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileOrigin {
    /// Top-left corner.
    #[default]
    TopLeft,
    /// Center.
    Center,
    /// Bottom-left corner.
    BottomLeft,
}

/// Every geometry parameter of a tile map.
///
/// Changing any of these tears down and rebuilds every quadrant.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMapConfig {
    /// Grid shape.
    pub mode: TileMapMode,
    /// Cell size in pixels. Both components must be at least 1.
    pub cell_size: Size,
    /// Cell basis used in [`TileMapMode::Custom`].
    pub custom_transform: Affine,
    /// Cells per quadrant side. Must be at least 1.
    pub quadrant_size: i32,
    /// Row or column staggering.
    pub half_offset: HalfOffset,
    /// Quadrant anchor point.
    pub tile_origin: TileOrigin,
    /// One cell per quadrant, with the map's children sorted by y.
    pub y_sort: bool,
    /// Center textures in their cell instead of anchoring them at the top-left.
    pub centered_textures: bool,
    /// Clamp texture sampling to each tile's region.
    pub clip_uv: bool,
    /// Register quadrant shapes on the parent collision object instead of own bodies.
    pub collision_use_parent: bool,
    /// Make per-quadrant bodies kinematic instead of static.
    pub collision_use_kinematic: bool,
    /// Also offset drawn textures and tile shapes by the [tile origin](Self::tile_origin).
    ///
    /// Without it the origin only moves quadrant anchors. Ignored with
    /// [`centered_textures`](Self::centered_textures).
    pub compatibility_mode: bool,
}

impl Default for TileMapConfig {
    fn default() -> Self {
        Self {
            mode: TileMapMode::Square,
            cell_size: Size::new(64.0, 64.0),
            custom_transform: Affine::new([64.0, 0.0, 0.0, 64.0, 0.0, 0.0]),
            quadrant_size: 16,
            half_offset: HalfOffset::Disabled,
            tile_origin: TileOrigin::TopLeft,
            y_sort: false,
            centered_textures: false,
            clip_uv: false,
            collision_use_parent: false,
            collision_use_kinematic: false,
            compatibility_mode: false,
        }
    }
}

impl TileMapConfig {
    /// Quadrant side actually used: y-sorting puts every cell in its own quadrant.
    pub fn effective_quadrant_size(&self) -> i32 {
        if self.y_sort { 1 } else { self.quadrant_size }
    }

    /// The linear map from cell coordinates to pixels.
    pub fn cell_transform(&self) -> Affine {
        let Size { width, height } = self.cell_size;
        match self.mode {
            TileMapMode::Square => Affine::new([width, 0.0, 0.0, height, 0.0, 0.0]),
            TileMapMode::Isometric => Affine::new([
                width * 0.5,
                height * 0.5,
                -width * 0.5,
                height * 0.5,
                0.0,
                0.0,
            ]),
            TileMapMode::Custom => self.custom_transform,
        }
    }

    /// Shift that keeps cells with non-negative coordinates at non-negative x and y.
    pub fn cell_draw_offset(&self) -> Vec2 {
        match self.mode {
            TileMapMode::Square => Vec2::ZERO,
            TileMapMode::Isometric => Vec2::new(-self.cell_size.width * 0.5, 0.0),
            TileMapMode::Custom => {
                let [a, b, c, d, _, _] = self.custom_transform.as_coeffs();
                Vec2::new(a.min(c).min(0.0), b.min(d).min(0.0))
            }
        }
    }

    /// Top-left corner of `cell` in map space, including the half offset unless
    /// `ignore_half_offset`.
    pub fn map_to_world(&self, cell: CellPos, ignore_half_offset: bool) -> Point {
        let xform = self.cell_transform();
        let mut ret = xform * Point::new(f64::from(cell.x), f64::from(cell.y));
        if ignore_half_offset {
            return ret;
        }
        let [a, b, c, d, _, _] = xform.as_coeffs();
        let (x_axis, y_axis) = (Vec2::new(a, b), Vec2::new(c, d));
        match self.half_offset {
            HalfOffset::X if cell.y & 1 != 0 => ret += x_axis * 0.5,
            HalfOffset::NegativeX if cell.y & 1 != 0 => ret += x_axis * -0.5,
            HalfOffset::Y if cell.x & 1 != 0 => ret += y_axis * 0.5,
            HalfOffset::NegativeY if cell.x & 1 != 0 => ret += y_axis * -0.5,
            _ => {}
        }
        ret
    }

    /// The cell containing `point` (in map space).
    ///
    /// A small bias pulls points sitting exactly on a border into the lower-right cell.
    /// Staggered variants undo the half offset before flooring.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Cell coordinates are floored grid positions well within i32."
    )]
    pub fn world_to_map(&self, point: Point) -> CellPos {
        let mut ret = self.cell_transform().inverse() * point;
        ret += Vec2::new(0.00005, 0.00005);
        let floored = ret.floor();
        let (row_odd, col_odd) = ((floored.y as i32) & 1 != 0, (floored.x as i32) & 1 != 0);
        match self.half_offset {
            HalfOffset::X if row_odd => ret.x -= 0.5,
            HalfOffset::NegativeX if row_odd => ret.x += 0.5,
            HalfOffset::Y if col_odd => ret.y -= 0.5,
            HalfOffset::NegativeY if col_odd => ret.y += 0.5,
            _ => {}
        }
        let cell = ret.floor();
        CellPos::new(cell.x as i32, cell.y as i32)
    }

    /// Anchor of quadrant `quadrant` in map space.
    pub(crate) fn quadrant_origin(&self, quadrant: CellPos) -> Point {
        let size = self.effective_quadrant_size();
        let corner = CellPos::new(quadrant.x * size, quadrant.y * size);
        let mut pos = self.map_to_world(corner, true) + self.cell_draw_offset();
        match self.tile_origin {
            TileOrigin::TopLeft => {}
            TileOrigin::Center => {
                pos += Vec2::new(self.cell_size.width * 0.5, self.cell_size.height * 0.5);
            }
            TileOrigin::BottomLeft => pos.y += self.cell_size.height,
        }
        pos
    }

    /// Whether tile origins shift textures and shapes inside their cells.
    fn places_by_origin(&self) -> bool {
        self.compatibility_mode && !self.centered_textures
    }

    /// Shift of a drawn texture rect for the tile origin, in compatibility mode.
    ///
    /// The shift follows the cell's flips, so a mirrored rect still covers the same cell.
    pub(crate) fn origin_rect_shift(&self, cell: &TileCell) -> Vec2 {
        if !self.places_by_origin() {
            return Vec2::ZERO;
        }
        let Size { width, height } = self.cell_size;
        let signed = |len: f64, flipped: bool| if flipped { -len } else { len };
        match self.tile_origin {
            TileOrigin::TopLeft => Vec2::ZERO,
            TileOrigin::Center => Vec2::new(
                signed(width * 0.5, cell.flip_h()),
                signed(height * 0.5, cell.flip_v()),
            ),
            TileOrigin::BottomLeft if cell.transpose() => {
                Vec2::new(signed(width, cell.flip_h()), 0.0)
            }
            TileOrigin::BottomLeft => Vec2::new(0.0, signed(height, cell.flip_v())),
        }
    }

    /// Apply a cell's transpose and flips to `xform`, a placement inside a tile of size
    /// `size` whose own offset is `offset`.
    pub(crate) fn fix_cell_transform(
        &self,
        xform: Affine,
        cell: &TileCell,
        offset: Vec2,
        size: Size,
    ) -> Affine {
        let [mut a, mut b, mut c, mut d, e, f] = xform.as_coeffs();
        let mut offset = offset;
        let mut size = size;
        if self.places_by_origin() {
            match self.tile_origin {
                TileOrigin::TopLeft => {}
                TileOrigin::Center => {
                    offset += Vec2::new(self.cell_size.width * 0.5, self.cell_size.height * 0.5);
                }
                TileOrigin::BottomLeft => offset.y += self.cell_size.height,
            }
            // Non-square tiles keep their footprint in the cell under flips.
            let (w, h) = (size.width, size.height);
            let (fh, fv, tr) = (cell.flip_h(), cell.flip_v(), cell.transpose());
            if h > w && ((fh && (fv || tr)) || (fv && !tr)) {
                offset.y += h - w;
            } else if h < w && ((fv && (fh || tr)) || (fh && !tr)) {
                offset.x += w - h;
            }
        }
        if cell.transpose() {
            core::mem::swap(&mut a, &mut b);
            core::mem::swap(&mut c, &mut d);
            offset = Vec2::new(offset.y, offset.x);
            size = Size::new(size.height, size.width);
        }
        if cell.flip_h() {
            a = -a;
            c = -c;
            offset.x = size.width - offset.x;
        }
        if cell.flip_v() {
            b = -b;
            d = -d;
            offset.y = size.height - offset.y;
        }
        if self.centered_textures {
            offset += Vec2::new(
                (self.cell_size.width - size.width) * 0.5,
                (self.cell_size.height - size.height) * 0.5,
            );
        }
        Affine::new([a, b, c, d, e + offset.x, f + offset.y])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_map::CellFlags;

    fn config(mode: TileMapMode, half_offset: HalfOffset) -> TileMapConfig {
        TileMapConfig {
            mode,
            half_offset,
            cell_size: Size::new(32.0, 16.0),
            ..TileMapConfig::default()
        }
    }

    #[test]
    fn square_cells_scale_by_the_cell_size() {
        let c = config(TileMapMode::Square, HalfOffset::Disabled);
        assert_eq!(c.map_to_world(CellPos::new(3, -2), false), Point::new(96.0, -32.0));
        assert_eq!(c.world_to_map(Point::new(96.0, -32.0)), CellPos::new(3, -2));
        assert_eq!(c.world_to_map(Point::new(95.9, -32.1)), CellPos::new(2, -3));
    }

    #[test]
    fn isometric_cells_form_diamonds() {
        let c = config(TileMapMode::Isometric, HalfOffset::Disabled);
        assert_eq!(c.map_to_world(CellPos::new(1, 0), false), Point::new(16.0, 8.0));
        assert_eq!(c.map_to_world(CellPos::new(0, 1), false), Point::new(-16.0, 8.0));
        assert_eq!(c.world_to_map(Point::new(0.0, 16.0)), CellPos::new(1, 1));
        assert_eq!(c.cell_draw_offset(), Vec2::new(-16.0, 0.0));
    }

    #[test]
    fn odd_rows_stagger_with_half_offset_x() {
        let c = config(TileMapMode::Square, HalfOffset::X);
        assert_eq!(c.map_to_world(CellPos::new(0, 1), false), Point::new(16.0, 16.0));
        assert_eq!(c.map_to_world(CellPos::new(0, -1), false), Point::new(16.0, -16.0));
        assert_eq!(c.map_to_world(CellPos::new(0, 1), true), Point::new(0.0, 16.0));
        assert_eq!(c.world_to_map(Point::new(17.0, 17.0)), CellPos::new(0, 1));
        assert_eq!(c.world_to_map(Point::new(15.0, 17.0)), CellPos::new(-1, 1));
    }

    #[test]
    fn negative_offsets_shift_the_other_way() {
        let c = config(TileMapMode::Square, HalfOffset::NegativeY);
        assert_eq!(c.map_to_world(CellPos::new(1, 0), false), Point::new(32.0, -8.0));
        assert_eq!(c.world_to_map(Point::new(33.0, -7.0)), CellPos::new(1, 0));
    }

    #[test]
    fn custom_draw_offset_is_the_minimum_of_the_axes() {
        let c = TileMapConfig {
            mode: TileMapMode::Custom,
            custom_transform: Affine::new([10.0, -4.0, -6.0, 12.0, 0.0, 0.0]),
            ..TileMapConfig::default()
        };
        assert_eq!(c.cell_draw_offset(), Vec2::new(-6.0, -4.0));
    }

    #[test]
    fn quadrant_origin_follows_the_tile_origin() {
        let mut c = config(TileMapMode::Square, HalfOffset::Disabled);
        c.quadrant_size = 4;
        assert_eq!(c.quadrant_origin(CellPos::new(1, -1)), Point::new(128.0, -64.0));
        c.tile_origin = TileOrigin::Center;
        assert_eq!(c.quadrant_origin(CellPos::new(1, -1)), Point::new(144.0, -56.0));
        c.tile_origin = TileOrigin::BottomLeft;
        c.y_sort = true;
        assert_eq!(c.quadrant_origin(CellPos::new(1, -1)), Point::new(32.0, 0.0));
    }

    #[test]
    fn compatibility_mode_places_tiles_by_their_origin() {
        let mut c = config(TileMapMode::Square, HalfOffset::Disabled);
        c.tile_origin = TileOrigin::BottomLeft;
        let plain = TileCell {
            id: 0,
            flags: CellFlags::empty(),
            autotile_coord: (0, 0),
        };
        let flipped = TileCell {
            flags: CellFlags::FLIP_V,
            ..plain
        };
        assert_eq!(c.origin_rect_shift(&plain), Vec2::ZERO);

        c.compatibility_mode = true;
        assert_eq!(c.origin_rect_shift(&plain), Vec2::new(0.0, 16.0));
        assert_eq!(c.origin_rect_shift(&flipped), Vec2::new(0.0, -16.0));
        let xform = c.fix_cell_transform(
            Affine::IDENTITY,
            &plain,
            Vec2::new(4.0, 6.0),
            Size::new(32.0, 16.0),
        );
        assert_eq!(xform.as_coeffs(), [1.0, 0.0, 0.0, 1.0, 4.0, 22.0]);

        c.tile_origin = TileOrigin::Center;
        let both = TileCell {
            flags: CellFlags::FLIP_H | CellFlags::FLIP_V,
            ..plain
        };
        assert_eq!(c.origin_rect_shift(&both), Vec2::new(-16.0, -8.0));
        c.centered_textures = true;
        assert_eq!(c.origin_rect_shift(&both), Vec2::ZERO);
    }

    #[test]
    fn flips_mirror_the_offset_inside_the_tile() {
        let c = config(TileMapMode::Square, HalfOffset::Disabled);
        let cell = TileCell {
            id: 0,
            flags: CellFlags::FLIP_H,
            autotile_coord: (0, 0),
        };
        let xform = c.fix_cell_transform(
            Affine::translate((32.0, 0.0)),
            &cell,
            Vec2::new(4.0, 6.0),
            Size::new(32.0, 16.0),
        );
        assert_eq!(xform.as_coeffs(), [-1.0, 0.0, 0.0, 1.0, 60.0, 6.0]);

        let transposed = TileCell {
            flags: CellFlags::TRANSPOSE,
            ..cell
        };
        let xform = c.fix_cell_transform(
            Affine::IDENTITY,
            &transposed,
            Vec2::new(4.0, 6.0),
            Size::new(32.0, 16.0),
        );
        assert_eq!(xform.as_coeffs(), [0.0, 1.0, 1.0, 0.0, 6.0, 4.0]);
    }
}
