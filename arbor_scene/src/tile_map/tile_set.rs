// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tile set: the palette a tile map's cells index into.

use alloc::sync::Arc;
use alloc::vec::Vec;

use arbor_server::{Color, MaterialId, Shape, Texture};
use hashbrown::HashMap;
use kurbo::{Affine, Rect, Size, Vec2};

/// How a tile-set entry maps cells to texture regions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileMode {
    /// The whole region (or texture) is one tile.
    #[default]
    Single,
    /// The region is a grid of sub-tiles picked by the cell's autotile coordinate.
    Autotile,
    /// Like [`Autotile`](TileMode::Autotile), without neighbour matching.
    Atlas,
}

/// A collision shape attached to a tile.
#[derive(Clone, Debug)]
pub struct TileShape {
    /// Geometry.
    pub shape: Arc<Shape>,
    /// Placement relative to the tile's top-left corner.
    pub transform: Affine,
    /// For autotiles, the sub-tile this shape belongs to.
    pub autotile_coord: (i16, i16),
    /// Whether the shape only collides from one side.
    pub one_way: bool,
    /// Thickness of the one-way side.
    pub one_way_margin: f64,
}

impl TileShape {
    /// A two-way shape at `transform`.
    pub fn new(shape: Arc<Shape>, transform: Affine) -> Self {
        Self {
            shape,
            transform,
            autotile_coord: (0, 0),
            one_way: false,
            one_way_margin: 1.0,
        }
    }
}

/// One entry of a [`TileSet`].
#[derive(Clone, Debug)]
pub struct TileData {
    /// Texture sampled by the tile. Tiles without one draw nothing and add no shapes.
    pub texture: Option<Texture>,
    /// Offset applied to the drawn rectangle.
    pub texture_offset: Vec2,
    /// Source region in texture pixels; [`Rect::ZERO`] means the whole texture.
    pub region: Rect,
    /// Multiplied with the map's self-modulate.
    pub modulate: Color,
    /// Material of the batch the tile is drawn into.
    pub material: Option<MaterialId>,
    /// Z-index of the batch the tile is drawn into.
    pub z_index: i32,
    /// Region interpretation.
    pub mode: TileMode,
    /// Sub-tile size for autotiles and atlases.
    pub autotile_size: Size,
    /// Gap between sub-tiles.
    pub autotile_spacing: f64,
    /// Extra z-index per sub-tile.
    pub autotile_z_index: HashMap<(i16, i16), i32>,
    /// Collision shapes.
    pub shapes: Vec<TileShape>,
}

impl Default for TileData {
    fn default() -> Self {
        Self {
            texture: None,
            texture_offset: Vec2::ZERO,
            region: Rect::ZERO,
            modulate: Color::WHITE,
            material: None,
            z_index: 0,
            mode: TileMode::Single,
            autotile_size: Size::new(64.0, 64.0),
            autotile_spacing: 0.0,
            autotile_z_index: HashMap::new(),
            shapes: Vec::new(),
        }
    }
}

impl TileData {
    /// A single tile drawing the whole of `texture`.
    pub fn with_texture(texture: Texture) -> Self {
        Self {
            texture: Some(texture),
            ..Self::default()
        }
    }

    /// Z-index of the batch a cell showing `autotile_coord` of this tile is drawn into.
    pub fn z_index_for(&self, autotile_coord: (i16, i16)) -> i32 {
        match self.mode {
            TileMode::Single => self.z_index,
            TileMode::Autotile | TileMode::Atlas => {
                self.z_index + self.autotile_z_index.get(&autotile_coord).copied().unwrap_or(0)
            }
        }
    }

    /// Source region for a cell showing `autotile_coord`; [`Rect::ZERO`] for the whole
    /// texture.
    pub fn region_for(&self, autotile_coord: (i16, i16)) -> Rect {
        match self.mode {
            TileMode::Single => self.region,
            TileMode::Autotile | TileMode::Atlas => {
                let size = self.autotile_size;
                let step = Vec2::new(
                    (size.width + self.autotile_spacing) * f64::from(autotile_coord.0),
                    (size.height + self.autotile_spacing) * f64::from(autotile_coord.1),
                );
                Rect::from_origin_size(self.region.origin() + step, size)
            }
        }
    }

    /// Whether `shape` applies to a cell showing `autotile_coord`.
    pub fn shape_applies(&self, shape: &TileShape, autotile_coord: (i16, i16)) -> bool {
        self.mode == TileMode::Single || shape.autotile_coord == autotile_coord
    }
}

/// A palette of tiles indexed by id.
///
/// A tile map holds its tile set behind an [`Arc`]; build the set first, then attach it.
/// Cells may reference ids that do not exist; they are skipped when drawing.
#[derive(Clone, Debug, Default)]
pub struct TileSet {
    tiles: HashMap<i32, TileData>,
}

impl TileSet {
    /// An empty tile set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `id`.
    pub fn insert(&mut self, id: i32, tile: TileData) {
        self.tiles.insert(id, tile);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with_tile(mut self, id: i32, tile: TileData) -> Self {
        self.insert(id, tile);
        self
    }

    /// Remove the entry for `id`.
    pub fn remove(&mut self, id: i32) -> Option<TileData> {
        self.tiles.remove(&id)
    }

    /// Whether `id` names an entry.
    pub fn has_tile(&self, id: i32) -> bool {
        self.tiles.contains_key(&id)
    }

    /// The entry for `id`.
    pub fn tile(&self, id: i32) -> Option<&TileData> {
        self.tiles.get(&id)
    }

    /// Every id, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.tiles.keys().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_server::TextureId;

    fn atlas() -> TileData {
        let mut tile = TileData::with_texture(Texture {
            id: TextureId::from_raw(1),
            size: Size::new(256.0, 256.0),
        });
        tile.mode = TileMode::Atlas;
        tile.region = Rect::new(8.0, 8.0, 200.0, 200.0);
        tile.autotile_size = Size::new(32.0, 16.0);
        tile.autotile_spacing = 2.0;
        tile.z_index = 3;
        tile.autotile_z_index.insert((1, 0), 2);
        tile
    }

    #[test]
    fn atlas_regions_step_by_size_plus_spacing() {
        let tile = atlas();
        assert_eq!(tile.region_for((0, 0)), Rect::new(8.0, 8.0, 40.0, 24.0));
        assert_eq!(tile.region_for((2, 1)), Rect::new(76.0, 26.0, 108.0, 42.0));
    }

    #[test]
    fn sub_tile_z_adds_to_the_tile_z() {
        let tile = atlas();
        assert_eq!(tile.z_index_for((0, 0)), 3);
        assert_eq!(tile.z_index_for((1, 0)), 5);
    }

    #[test]
    fn single_tiles_ignore_the_autotile_coordinate() {
        let mut tile = atlas();
        tile.mode = TileMode::Single;
        assert_eq!(tile.region_for((3, 3)), tile.region);
        let shape = TileShape {
            autotile_coord: (4, 4),
            ..TileShape::new(Arc::new(Shape::Circle { radius: 1.0 }), Affine::IDENTITY)
        };
        assert!(tile.shape_applies(&shape, (0, 0)));
        tile.mode = TileMode::Autotile;
        assert!(!tile.shape_applies(&shape, (0, 0)));
        assert!(tile.shape_applies(&shape, (4, 4)));
    }
}
