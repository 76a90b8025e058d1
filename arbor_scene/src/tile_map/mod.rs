// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile maps: a sparse grid of tiles bucketed into quadrants.
//!
//! Every quadrant owns the draw batches for its cells and one physics body holding their
//! collision shapes (or, with [`collision_use_parent`](TileMapConfig::collision_use_parent),
//! a shape owner on the parent collision object). Cell writes only mark their quadrant
//! dirty; dirty quadrants are rebuilt together by a deferred
//! [`update_dirty_quadrants`](SceneTree::update_dirty_quadrants). Geometry changes tear every
//! quadrant down and rebuild them immediately.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use arbor_scene::SceneTree;
//! use arbor_scene::tile_map::{CellFlags, CellPos, TileData, TileSet};
//! use arbor_server::{Texture, TextureId};
//! use kurbo::Size;
//!
//! let grass = Texture { id: TextureId::from_raw(1), size: Size::new(64.0, 64.0) };
//! let tiles = TileSet::new().with_tile(0, TileData::with_texture(grass));
//!
//! let mut tree = SceneTree::new();
//! let map = tree.create_tile_map();
//! tree.set_tile_set(map, Some(Arc::new(tiles)));
//! tree.add_child(tree.root(), map);
//!
//! tree.set_cell(map, CellPos::new(0, 0), 0, CellFlags::empty(), (0, 0));
//! tree.set_cell(map, CellPos::new(1, 0), 0, CellFlags::FLIP_H, (0, 0));
//! tree.process_frame();
//!
//! assert_eq!(tree.tile_map_quadrants(map), [CellPos::new(0, 0)]);
//! assert_eq!(tree.tile_map_stats(map).quadrants_rebuilt, 1);
//! ```

mod cell;
mod coords;
mod data;
mod quadrant;
mod tile_set;

pub use cell::{CellFlags, CellPos, INVALID_CELL, TileCell};
pub use coords::{HalfOffset, TileMapConfig, TileMapMode, TileOrigin};
pub use data::{TileDataError, TileDataFormat, decode, encode};
pub use tile_set::{TileData, TileMode, TileSet, TileShape};

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::Cell;

use arbor_server::{BodyId, BodyParam, CanvasItemId, PhysicsServer, RenderServer};
use kurbo::{Affine, Point, Rect, Size};

use crate::collision::ShapeOwnerId;
use crate::tree::SceneTree;
use crate::types::{NodeId, NodeKind, Notification, Signal};
use quadrant::{MapEnv, Quadrant};

/// Physics settings applied to every per-quadrant body.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TileCollision {
    /// Layers the bodies are in.
    pub layer: u32,
    /// Layers the bodies scan.
    pub mask: u32,
    /// Surface friction.
    pub friction: f64,
    /// Restitution.
    pub bounce: f64,
}

impl Default for TileCollision {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: 1,
            friction: 1.0,
            bounce: 0.0,
        }
    }
}

/// Quadrant bookkeeping counters of one tile map.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileMapStats {
    /// Quadrants created, including re-creations after geometry changes.
    pub quadrants_created: u64,
    /// Quadrants erased.
    pub quadrants_erased: u64,
    /// Quadrant rebuilds performed by reconciliation.
    pub quadrants_rebuilt: u64,
}

/// Tile-map state of a [`NodeKind::TileMap`] node.
#[derive(Debug, Default)]
pub(crate) struct TileMap {
    tile_set: Option<Arc<TileSet>>,
    config: TileMapConfig,
    collision: TileCollision,
    cells: BTreeMap<CellPos, TileCell>,
    quadrants: BTreeMap<CellPos, Quadrant>,
    /// Quadrants awaiting a rebuild, oldest first.
    dirty: VecDeque<CellPos>,
    pending_update: bool,
    /// Collision object the quadrants register owners on, while delegating in the tree.
    collision_parent: Option<NodeId>,
    /// Cached used rect; `None` when stale.
    used_rect: Cell<Option<Rect>>,
    rect_cache: Rect,
    rect_dirty: bool,
    order_dirty: bool,
    stats: TileMapStats,
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    /// Create a detached, empty tile map without a tile set.
    pub fn create_tile_map(&mut self) -> NodeId {
        let id = self.alloc_canvas_item(NodeKind::TileMap);
        self.tile_maps.insert(id, TileMap::default());
        self.set_notify_transform(id, true);
        id
    }

    fn tile_map(&self, id: NodeId) -> &TileMap {
        self.tile_maps.get(&id).expect("node is not a tile map")
    }

    fn tile_map_mut(&mut self, id: NodeId) -> &mut TileMap {
        self.tile_maps.get_mut(&id).expect("node is not a tile map")
    }

    /// Run `f` on the map with the servers and the collision parent's owners borrowed.
    fn with_map<T>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut TileMap, &mut MapEnv<'_>) -> T,
    ) -> T {
        let in_tree = self.is_inside_tree(id);
        let global = if in_tree {
            self.global_transform(id)
        } else {
            Affine::IDENTITY
        };
        let local = self.local_transform(id);
        let space = self.world_2d(id).map(|w| w.space);
        let item = self.item(id);
        let (handle, light_mask) = (item.handle, item.light_mask);
        let self_modulate = item.self_modulate;
        let use_parent_material = item.use_parent_material || item.material.is_some();
        let Self {
            tile_maps,
            collision_objects,
            render,
            physics,
            queue,
            ..
        } = self;
        let map = tile_maps.get_mut(&id).expect("node is not a tile map");
        let owners = match map.collision_parent {
            Some(parent) => collision_objects.get_mut(&parent).map(|o| &mut o.owners),
            None => None,
        };
        let mut env = MapEnv {
            render,
            physics,
            owners,
            queue,
            node: id,
            handle,
            in_tree,
            global,
            local,
            space,
            light_mask,
            self_modulate,
            use_parent_material,
        };
        f(map, &mut env)
    }

    fn recreate_quadrants(&mut self, id: NodeId) {
        if self.with_map(id, |map, env| map.recreate_quadrants(env)) {
            self.item_rect_changed(id);
        }
    }

    fn collision_parent_candidate(&self, id: NodeId) -> Option<NodeId> {
        self.parent_of(id).filter(|p| self.is_collision_object(*p))
    }

    pub(crate) fn tile_map_notification(&mut self, id: NodeId, what: Notification) {
        let use_parent = self.tile_map(id).config.collision_use_parent;
        match what {
            Notification::EnterTree => {
                if use_parent {
                    self.with_map(id, |map, env| map.clear_quadrants(env));
                    let parent = self.collision_parent_candidate(id);
                    self.tile_map_mut(id).collision_parent = parent;
                }
                self.tile_map_mut(id).pending_update = true;
                let rect_changed = self.with_map(id, |map, env| {
                    let recreated = map.recreate_quadrants(env);
                    let updated = map.update_dirty_quadrants(env);
                    map.update_quadrant_transforms(env);
                    let space = env.space;
                    map.update_quadrant_space(env, space);
                    recreated || updated
                });
                if rect_changed {
                    self.item_rect_changed(id);
                }
            }
            Notification::ExitTree => {
                self.with_map(id, |map, env| {
                    map.update_quadrant_space(env, None);
                    if use_parent {
                        map.clear_quadrants(env);
                    }
                });
                self.tile_map_mut(id).collision_parent = None;
                if use_parent {
                    // Rebucket the cells without owners; they draw again on the next entry.
                    self.with_map(id, |map, env| {
                        env.in_tree = false;
                        map.recreate_quadrants(env);
                    });
                }
            }
            Notification::TransformChanged => {
                self.with_map(id, |map, env| map.update_quadrant_transforms(env));
            }
            Notification::LocalTransformChanged if use_parent => self.recreate_quadrants(id),
            _ => {}
        }
    }

    /// Free every quadrant and drop the map's state.
    pub(crate) fn release_tile_map(&mut self, id: NodeId) {
        if !self.tile_maps.contains_key(&id) {
            return;
        }
        self.with_map(id, |map, env| map.clear_quadrants(env));
        self.tile_maps.remove(&id);
    }

    fn batches(&self, id: NodeId) -> Vec<CanvasItemId> {
        self.tile_map(id)
            .quadrants
            .values()
            .flat_map(|q| q.batches.iter().copied())
            .collect()
    }

    pub(crate) fn tile_map_material_changed(&mut self, id: NodeId) {
        let item = self.item(id);
        let use_parent_material = item.use_parent_material || item.material.is_some();
        for batch in self.batches(id) {
            self.render
                .canvas_item_set_use_parent_material(batch, use_parent_material);
        }
    }

    pub(crate) fn tile_map_light_mask_changed(&mut self, id: NodeId) {
        let mask = self.item(id).light_mask;
        for batch in self.batches(id) {
            self.render.canvas_item_set_light_mask(batch, mask);
        }
    }

    /// Rebuild every dirty quadrant now. Does nothing outside the tree or without a tile
    /// set.
    pub fn update_dirty_quadrants(&mut self, id: NodeId) {
        if self.with_map(id, |map, env| map.update_dirty_quadrants(env)) {
            self.item_rect_changed(id);
        }
    }

    /// Attach a tile set, or detach it and erase every cell.
    pub fn set_tile_set(&mut self, id: NodeId, tile_set: Option<Arc<TileSet>>) {
        let unchanged = match (&self.tile_map(id).tile_set, &tile_set) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        self.with_map(id, |map, env| map.clear_quadrants(env));
        let map = self.tile_map_mut(id);
        map.tile_set = tile_set;
        if map.tile_set.is_none() {
            map.cells.clear();
            map.used_rect.set(None);
        }
        self.recreate_quadrants(id);
        self.emit(id, Signal::SettingsChanged);
    }

    /// The attached tile set.
    pub fn tile_set(&self, id: NodeId) -> Option<&Arc<TileSet>> {
        self.tile_map(id).tile_set.as_ref()
    }

    /// The map's geometry parameters.
    pub fn tile_map_config(&self, id: NodeId) -> &TileMapConfig {
        &self.tile_map(id).config
    }

    /// Replace every geometry parameter at once, with a single rebuild.
    ///
    /// # Panics
    ///
    /// If a cell size component or the quadrant size is below 1.
    pub fn set_tile_map_config(&mut self, id: NodeId, config: TileMapConfig) {
        self.reconfigure(id, |c| *c = config);
    }

    fn reconfigure(&mut self, id: NodeId, edit: impl FnOnce(&mut TileMapConfig)) {
        let old = self.tile_map(id).config.clone();
        let mut config = old.clone();
        edit(&mut config);
        if config == old {
            return;
        }
        assert!(
            config.cell_size.width >= 1.0 && config.cell_size.height >= 1.0,
            "tile map cell size must be at least 1x1"
        );
        assert!(
            config.quadrant_size >= 1,
            "tile map quadrant size must be at least 1"
        );
        self.with_map(id, |map, env| map.clear_quadrants(env));
        let (y_sort, use_parent) = (config.y_sort, config.collision_use_parent);
        self.tile_map_mut(id).config = config;
        if y_sort != old.y_sort {
            let handle = self.item(id).handle;
            self.render.canvas_item_set_sort_children_by_y(handle, y_sort);
        }
        if use_parent != old.collision_use_parent {
            self.set_notify_local_transform(id, use_parent);
        }
        let parent = if use_parent && self.is_inside_tree(id) {
            self.collision_parent_candidate(id)
        } else {
            None
        };
        self.tile_map_mut(id).collision_parent = parent;
        self.recreate_quadrants(id);
        self.emit(id, Signal::SettingsChanged);
    }

    /// Set the grid shape.
    pub fn set_tile_map_mode(&mut self, id: NodeId, mode: TileMapMode) {
        self.reconfigure(id, |c| c.mode = mode);
    }

    /// Set the cell size.
    ///
    /// # Panics
    ///
    /// If either component is below 1.
    pub fn set_cell_size(&mut self, id: NodeId, size: Size) {
        self.reconfigure(id, |c| c.cell_size = size);
    }

    /// Set the cell basis used by [`TileMapMode::Custom`].
    pub fn set_custom_transform(&mut self, id: NodeId, transform: Affine) {
        self.reconfigure(id, |c| c.custom_transform = transform);
    }

    /// Set the number of cells per quadrant side.
    ///
    /// # Panics
    ///
    /// If `size` is below 1.
    pub fn set_quadrant_size(&mut self, id: NodeId, size: i32) {
        self.reconfigure(id, |c| c.quadrant_size = size);
    }

    /// Set the row or column staggering.
    pub fn set_half_offset(&mut self, id: NodeId, half_offset: HalfOffset) {
        self.reconfigure(id, |c| c.half_offset = half_offset);
    }

    /// Set the quadrant anchor point.
    pub fn set_tile_origin(&mut self, id: NodeId, origin: TileOrigin) {
        self.reconfigure(id, |c| c.tile_origin = origin);
    }

    /// Put every cell in its own quadrant and sort the map's children by y.
    pub fn set_y_sort(&mut self, id: NodeId, enabled: bool) {
        self.reconfigure(id, |c| c.y_sort = enabled);
    }

    /// Center textures in their cells.
    pub fn set_centered_textures(&mut self, id: NodeId, enabled: bool) {
        self.reconfigure(id, |c| c.centered_textures = enabled);
    }

    /// Clamp texture sampling to tile regions.
    pub fn set_clip_uv(&mut self, id: NodeId, enabled: bool) {
        self.reconfigure(id, |c| c.clip_uv = enabled);
    }

    /// Register shapes on the parent collision object instead of per-quadrant bodies.
    pub fn set_collision_use_parent(&mut self, id: NodeId, enabled: bool) {
        self.reconfigure(id, |c| c.collision_use_parent = enabled);
    }

    /// Offset drawn textures and tile shapes by the tile origin.
    pub fn set_compatibility_mode(&mut self, id: NodeId, enabled: bool) {
        self.reconfigure(id, |c| c.compatibility_mode = enabled);
    }

    /// Make per-quadrant bodies kinematic.
    pub fn set_collision_use_kinematic(&mut self, id: NodeId, enabled: bool) {
        self.reconfigure(id, |c| c.collision_use_kinematic = enabled);
    }

    /// Physics settings of the per-quadrant bodies.
    pub fn tile_collision(&self, id: NodeId) -> TileCollision {
        self.tile_map(id).collision
    }

    /// Change the physics settings, updating existing bodies in place.
    pub fn set_tile_collision(&mut self, id: NodeId, collision: TileCollision) {
        self.tile_map_mut(id).collision = collision;
        let bodies: Vec<BodyId> = self
            .tile_map(id)
            .quadrants
            .values()
            .filter_map(|q| q.body)
            .collect();
        for body in bodies {
            self.physics.body_set_collision_layer(body, collision.layer);
            self.physics.body_set_collision_mask(body, collision.mask);
            self.physics
                .body_set_param(body, BodyParam::Friction, collision.friction);
            self.physics
                .body_set_param(body, BodyParam::Bounce, collision.bounce);
        }
    }

    /// Write a cell. [`INVALID_CELL`] erases it; rewriting identical contents does nothing.
    pub fn set_cell(
        &mut self,
        id: NodeId,
        pos: CellPos,
        tile: i32,
        flags: CellFlags,
        autotile_coord: (i16, i16),
    ) {
        let cell = (tile != INVALID_CELL).then_some(TileCell {
            id: tile,
            flags,
            autotile_coord,
        });
        self.with_map(id, |map, env| map.set_cell(env, pos, cell));
    }

    /// Erase a cell.
    pub fn erase_cell(&mut self, id: NodeId, pos: CellPos) {
        self.set_cell(id, pos, INVALID_CELL, CellFlags::empty(), (0, 0));
    }

    /// The tile id at `pos`, or [`INVALID_CELL`].
    pub fn cell(&self, id: NodeId, pos: CellPos) -> i32 {
        self.tile_cell(id, pos).map_or(INVALID_CELL, |c| c.id)
    }

    /// The orientation flags at `pos`; empty for unoccupied cells.
    pub fn cell_flags(&self, id: NodeId, pos: CellPos) -> CellFlags {
        self.tile_cell(id, pos).map_or(CellFlags::empty(), |c| c.flags)
    }

    /// The autotile coordinate at `pos`; `(0, 0)` for unoccupied cells.
    pub fn cell_autotile_coord(&self, id: NodeId, pos: CellPos) -> (i16, i16) {
        self.tile_cell(id, pos).map_or((0, 0), |c| c.autotile_coord)
    }

    /// The full contents of the cell at `pos`.
    pub fn tile_cell(&self, id: NodeId, pos: CellPos) -> Option<TileCell> {
        self.tile_map(id).cells.get(&pos).copied()
    }

    /// Every occupied coordinate, row by row.
    pub fn used_cells(&self, id: NodeId) -> Vec<CellPos> {
        self.tile_map(id).cells.keys().copied().collect()
    }

    /// Every coordinate holding `tile`, row by row.
    pub fn used_cells_by_id(&self, id: NodeId, tile: i32) -> Vec<CellPos> {
        self.tile_map(id)
            .cells
            .iter()
            .filter(|(_, c)| c.id == tile)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Bounds of the occupied cells, in cells; [`Rect::ZERO`] when the map is empty.
    pub fn used_rect(&self, id: NodeId) -> Rect {
        let map = self.tile_map(id);
        if let Some(rect) = map.used_rect.get() {
            return rect;
        }
        let mut cells = map.cells.keys();
        let rect = cells.next().map_or(Rect::ZERO, |first| {
            let first = Point::new(f64::from(first.x), f64::from(first.y));
            let r = cells.fold(Rect::from_points(first, first), |r, p| {
                r.union_pt(Point::new(f64::from(p.x), f64::from(p.y)))
            });
            Rect::new(r.x0, r.y0, r.x1 + 1.0, r.y1 + 1.0)
        });
        map.used_rect.set(Some(rect));
        rect
    }

    /// Pixel bounds of every quadrant, as of the last reconciliation.
    pub fn item_rect(&self, id: NodeId) -> Rect {
        self.tile_map(id).rect_cache
    }

    /// Erase every cell.
    pub fn clear_cells(&mut self, id: NodeId) {
        self.with_map(id, |map, env| map.clear_quadrants(env));
        let map = self.tile_map_mut(id);
        map.cells.clear();
        map.used_rect.set(None);
    }

    /// Erase every cell whose tile id is missing from the tile set.
    pub fn fix_invalid_tiles(&mut self, id: NodeId) {
        let map = self.tile_map(id);
        let Some(tile_set) = map.tile_set.as_ref() else {
            return;
        };
        let invalid: Vec<CellPos> = map
            .cells
            .iter()
            .filter(|(_, c)| !tile_set.has_tile(c.id))
            .map(|(p, _)| *p)
            .collect();
        for pos in invalid {
            self.erase_cell(id, pos);
        }
    }

    /// Replace every cell with the contents of a packed array.
    ///
    /// The array is validated before anything changes; on error the map is untouched.
    pub fn set_tile_data(
        &mut self,
        id: NodeId,
        words: &[u32],
        format: TileDataFormat,
    ) -> Result<(), TileDataError> {
        let cells = decode(words, format)?;
        self.clear_cells(id);
        log::debug!("tile map {id:?}: loading {} cells", cells.len());
        for (pos, cell) in cells {
            self.set_cell(id, pos, cell.id, cell.flags, cell.autotile_coord);
        }
        Ok(())
    }

    /// Pack every cell, row by row.
    pub fn tile_data(&self, id: NodeId) -> Result<Vec<u32>, TileDataError> {
        encode(self.tile_map(id).cells.iter().map(|(p, c)| (*p, c)))
    }

    /// Top-left corner of `pos` in the map's local space.
    pub fn map_to_world(&self, id: NodeId, pos: CellPos) -> Point {
        self.tile_map(id).config.map_to_world(pos, false)
    }

    /// The cell containing `point`, given in the map's local space.
    pub fn world_to_map(&self, id: NodeId, point: Point) -> CellPos {
        self.tile_map(id).config.world_to_map(point)
    }

    /// Quadrant bookkeeping counters.
    pub fn tile_map_stats(&self, id: NodeId) -> TileMapStats {
        self.tile_map(id).stats
    }

    /// Coordinates of every quadrant, row by row.
    pub fn tile_map_quadrants(&self, id: NodeId) -> Vec<CellPos> {
        self.tile_map(id).quadrants.keys().copied().collect()
    }

    /// Number of quadrants awaiting a rebuild.
    pub fn dirty_quadrant_count(&self, id: NodeId) -> usize {
        self.tile_map(id).dirty.len()
    }

    /// The body of quadrant `key`, unless the map delegates to its parent.
    pub fn quadrant_body(&self, id: NodeId, key: CellPos) -> Option<BodyId> {
        self.tile_map(id).quadrants.get(&key).and_then(|q| q.body)
    }

    /// The shape owner quadrant `key` registered on the collision parent.
    pub fn quadrant_shape_owner(&self, id: NodeId, key: CellPos) -> Option<ShapeOwnerId> {
        self.tile_map(id).quadrants.get(&key).and_then(|q| q.owner)
    }

    /// Draw batches of quadrant `key`, in creation order.
    pub fn quadrant_batches(&self, id: NodeId, key: CellPos) -> &[CanvasItemId] {
        self.tile_map(id)
            .quadrants
            .get(&key)
            .map_or(&[], |q| q.batches.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_server::{
        CanvasParent, Color, DrawCommand, MaterialId, PhysicsObject, Shape, Texture, TextureId,
    };
    use kurbo::Vec2;

    fn texture(raw: u64) -> Texture {
        Texture {
            id: TextureId::from_raw(raw),
            size: Size::new(32.0, 32.0),
        }
    }

    fn tile_set() -> Arc<TileSet> {
        let mut solid = TileData::with_texture(texture(1));
        solid.shapes.push(TileShape::new(
            Arc::new(Shape::Rectangle {
                extents: Vec2::new(16.0, 16.0),
            }),
            Affine::translate((16.0, 16.0)),
        ));
        let mut raised = TileData::with_texture(texture(2));
        raised.z_index = 1;
        let mut shiny = TileData::with_texture(texture(3));
        shiny.material = Some(MaterialId::from_raw(9));
        Arc::new(
            TileSet::new()
                .with_tile(0, solid)
                .with_tile(1, raised)
                .with_tile(2, shiny),
        )
    }

    fn map_in_tree(tree: &mut SceneTree) -> NodeId {
        let map = tree.create_tile_map();
        tree.set_tile_set(map, Some(tile_set()));
        tree.set_cell_size(map, Size::new(32.0, 32.0));
        tree.set_quadrant_size(map, 4);
        tree.add_child(tree.root(), map);
        tree.process_frame();
        map
    }

    fn put(tree: &mut SceneTree, map: NodeId, x: i32, y: i32, tile: i32) {
        tree.set_cell(map, CellPos::new(x, y), tile, CellFlags::empty(), (0, 0));
    }

    #[test]
    fn quadrants_come_and_go_with_their_cells() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 8, 4, 0);
        assert_eq!(tree.tile_map_quadrants(map), [CellPos::new(2, 1)]);
        put(&mut tree, map, 11, 7, 0);
        put(&mut tree, map, -1, 0, 0);
        assert_eq!(
            tree.tile_map_quadrants(map),
            [CellPos::new(-1, 0), CellPos::new(2, 1)]
        );
        tree.process_frame();
        let body = tree.quadrant_body(map, CellPos::new(2, 1)).unwrap();
        assert!(tree.physics().body(body).is_some());

        tree.erase_cell(map, CellPos::new(8, 4));
        assert_eq!(tree.tile_map_quadrants(map).len(), 2);
        tree.erase_cell(map, CellPos::new(11, 7));
        tree.erase_cell(map, CellPos::new(-1, 0));
        assert!(tree.tile_map_quadrants(map).is_empty());
        assert!(tree.physics().body(body).is_none());
        assert_eq!(tree.used_rect(map), Rect::ZERO);
        tree.erase_cell(map, CellPos::new(-1, 0));
        assert_eq!(tree.tile_map_stats(map).quadrants_erased, 2);
    }

    #[test]
    fn redundant_writes_do_not_dirty_the_quadrant() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 1, 1, 0);
        tree.process_frame();
        let before = tree.tile_map_stats(map);
        put(&mut tree, map, 1, 1, 0);
        assert_eq!(tree.dirty_quadrant_count(map), 0);
        assert_eq!(tree.pending_deferred_calls(), 0);
        tree.process_frame();
        assert_eq!(tree.tile_map_stats(map), before);

        tree.set_cell(map, CellPos::new(1, 1), 0, CellFlags::FLIP_V, (0, 0));
        assert_eq!(tree.dirty_quadrant_count(map), 1);
        tree.process_frame();
        assert_eq!(tree.tile_map_stats(map).quadrants_rebuilt, before.quadrants_rebuilt + 1);
    }

    #[test]
    fn writes_in_one_frame_share_one_deferred_rebuild() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 0, 0, 0);
        put(&mut tree, map, 1, 0, 0);
        put(&mut tree, map, 9, 9, 0);
        assert_eq!(tree.pending_deferred_calls(), 1);
        assert_eq!(tree.dirty_quadrant_count(map), 2);
        tree.flush_deferred();
        assert_eq!(tree.dirty_quadrant_count(map), 0);
        assert_eq!(tree.tile_map_stats(map).quadrants_rebuilt, 2);
        let batches = tree.quadrant_batches(map, CellPos::new(0, 0));
        assert_eq!(batches.len(), 1);
        let record = tree.render().canvas_item(batches[0]).unwrap();
        assert_eq!(record.commands.len(), 2);
        assert_eq!(record.parent, CanvasParent::Item(tree.canvas_item(map)));
        assert_eq!(record.draw_index, i32::MIN);
    }

    #[test]
    fn batches_split_on_z_and_material_runs() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        // insertion order: 0, 0, 1, 1, 2, 0
        for (x, tile) in [(0, 0), (1, 0), (2, 1), (3, 1)] {
            put(&mut tree, map, x, 0, tile);
        }
        put(&mut tree, map, 0, 1, 2);
        put(&mut tree, map, 1, 1, 0);
        tree.process_frame();
        let batches = tree.quadrant_batches(map, CellPos::new(0, 0)).to_vec();
        assert_eq!(batches.len(), 4);
        let render = tree.render();
        let counts: Vec<usize> = batches
            .iter()
            .map(|b| render.canvas_item(*b).unwrap().commands.len())
            .collect();
        assert_eq!(counts, [2, 2, 1, 1]);
        assert_eq!(render.canvas_item(batches[1]).unwrap().z_index, 1);
        assert_eq!(
            render.canvas_item(batches[2]).unwrap().material,
            Some(MaterialId::from_raw(9))
        );
        let indices: Vec<i32> = batches
            .iter()
            .map(|b| render.canvas_item(*b).unwrap().draw_index)
            .collect();
        assert_eq!(indices, [i32::MIN, i32::MIN + 1, i32::MIN + 2, i32::MIN + 3]);
    }

    #[test]
    fn flipped_tiles_draw_mirrored_rects() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        tree.set_self_modulate(map, Color::new(0.5, 0.5, 0.5, 1.0));
        tree.set_cell(map, CellPos::new(1, 2), 1, CellFlags::FLIP_H, (0, 0));
        tree.process_frame();
        let batch = tree.quadrant_batches(map, CellPos::new(0, 0))[0];
        let record = tree.render().canvas_item(batch).unwrap();
        let DrawCommand::TextureRect { rect, modulate, .. } = &record.commands[0] else {
            panic!("expected a texture rect, got {:?}", record.commands[0]);
        };
        assert_eq!((rect.x0, rect.y0), (32.0, 64.0));
        assert!((rect.width() + 32.00001).abs() < 1e-9);
        assert_eq!(*modulate, Color::new(0.5, 0.5, 0.5, 1.0));
    }

    #[test]
    fn tile_origin_moves_textures_only_in_compatibility_mode() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        tree.set_tile_origin(map, TileOrigin::BottomLeft);
        put(&mut tree, map, 1, 2, 1);
        tree.process_frame();
        let first_rect = |tree: &SceneTree| {
            let batch = tree.quadrant_batches(map, CellPos::new(0, 0))[0];
            let record = tree.render().canvas_item(batch).unwrap();
            assert_eq!(record.transform, Affine::translate((0.0, 32.0)));
            match &record.commands[0] {
                DrawCommand::TextureRect { rect, .. } => *rect,
                other => panic!("expected a texture rect, got {other:?}"),
            }
        };
        assert_eq!(first_rect(&tree).origin(), Point::new(32.0, 32.0));

        tree.set_compatibility_mode(map, true);
        assert_eq!(first_rect(&tree).origin(), Point::new(32.0, 64.0));
    }

    #[test]
    fn quadrant_bodies_carry_shapes_and_follow_the_map() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        tree.set_tile_collision(
            map,
            TileCollision {
                layer: 4,
                ..TileCollision::default()
            },
        );
        put(&mut tree, map, 5, 1, 0);
        put(&mut tree, map, 6, 1, 1);
        tree.process_frame();
        let body = tree.quadrant_body(map, CellPos::new(1, 0)).unwrap();
        let record = tree.physics().body(body).unwrap();
        assert_eq!(record.shapes.len(), 1);
        assert_eq!(record.shapes[0].metadata, Some((5, 1)));
        assert_eq!(
            record.shapes[0].transform,
            Affine::translate((32.0 + 16.0, 32.0 + 16.0))
        );
        assert_eq!(record.collision_layer, 4);
        assert_eq!(record.instance, Some(map.to_instance()));
        assert_eq!(record.space, Some(tree.world(tree.root()).space));
        assert_eq!(record.transform, Affine::translate((128.0, 0.0)));

        tree.set_position(map, Point::new(10.0, 20.0));
        tree.process_frame();
        let record = tree.physics().body(body).unwrap();
        assert_eq!(record.transform, Affine::translate((138.0, 20.0)));

        tree.set_tile_collision(map, TileCollision::default());
        assert_eq!(tree.physics().body(body).unwrap().collision_layer, 1);
    }

    #[test]
    fn delegating_maps_register_owners_on_the_parent() {
        let mut tree = SceneTree::new();
        let parent = tree.create_static_body_2d();
        tree.add_child(tree.root(), parent);
        let map = tree.create_tile_map();
        tree.set_tile_set(map, Some(tile_set()));
        tree.set_tile_map_config(
            map,
            TileMapConfig {
                cell_size: Size::new(32.0, 32.0),
                quadrant_size: 4,
                collision_use_parent: true,
                ..TileMapConfig::default()
            },
        );
        tree.set_position(map, Point::new(100.0, 0.0));
        tree.add_child(parent, map);
        put(&mut tree, map, 4, 0, 0);
        tree.process_frame();

        assert_eq!(tree.quadrant_body(map, CellPos::new(1, 0)), None);
        let owner = tree.quadrant_shape_owner(map, CellPos::new(1, 0)).unwrap();
        let owners = tree.shape_owners(parent);
        assert_eq!(owners.owner_node(owner), map);
        assert_eq!(owners.total_subshapes(), 1);
        let PhysicsObject::Body(body) = tree.collision_object_rid(parent) else {
            panic!("static bodies are bodies");
        };
        let shape = &tree.physics().body(body).unwrap().shapes[0];
        assert_eq!(shape.transform, Affine::translate((100.0 + 128.0 + 16.0, 16.0)));
        assert_eq!(shape.metadata, Some((4, 0)));

        tree.remove_child(parent, map);
        assert_eq!(tree.shape_owners(parent).total_subshapes(), 0);
        assert_eq!(tree.tile_map_quadrants(map), [CellPos::new(1, 0)]);
        assert_eq!(tree.quadrant_shape_owner(map, CellPos::new(1, 0)), None);
        assert!(tree.quadrant_batches(map, CellPos::new(1, 0)).is_empty());
    }

    #[test]
    fn delegating_maps_stay_editable_after_leaving_the_tree() {
        let mut tree = SceneTree::new();
        let parent = tree.create_static_body_2d();
        tree.add_child(tree.root(), parent);
        let map = tree.create_tile_map();
        tree.set_tile_set(map, Some(tile_set()));
        tree.set_collision_use_parent(map, true);
        tree.add_child(parent, map);
        put(&mut tree, map, 0, 0, 0);
        put(&mut tree, map, 1, 0, 0);
        tree.process_frame();
        tree.remove_child(parent, map);

        tree.erase_cell(map, CellPos::new(0, 0));
        tree.set_cell(map, CellPos::new(1, 0), 0, CellFlags::FLIP_H, (0, 0));
        put(&mut tree, map, 40, 40, 0);
        assert_eq!(tree.used_cells(map), [CellPos::new(1, 0), CellPos::new(40, 40)]);
        assert_eq!(tree.shape_owners(parent).total_subshapes(), 0);

        tree.add_child(parent, map);
        tree.process_frame();
        assert_eq!(tree.tile_map_quadrants(map).len(), 2);
        assert_eq!(tree.shape_owners(parent).total_subshapes(), 2);
        let owner = tree.quadrant_shape_owner(map, CellPos::new(0, 0)).unwrap();
        assert_eq!(tree.shape_owners(parent).owner_node(owner), map);
    }

    #[test]
    fn geometry_changes_rebuild_everything_once() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 0, 0, 0);
        put(&mut tree, map, 7, 0, 0);
        tree.process_frame();
        tree.take_signals();
        let before = tree.tile_map_stats(map);

        tree.set_quadrant_size(map, 4);
        assert_eq!(tree.tile_map_stats(map), before);

        tree.set_quadrant_size(map, 8);
        let after = tree.tile_map_stats(map);
        assert_eq!(after.quadrants_erased, before.quadrants_erased + 2);
        assert_eq!(after.quadrants_created, before.quadrants_created + 1);
        assert_eq!(tree.tile_map_quadrants(map), [CellPos::new(0, 0)]);
        assert_eq!(tree.dirty_quadrant_count(map), 0);
        let signals = tree.take_signals();
        assert!(signals.iter().any(|s| s.signal == Signal::SettingsChanged));
        assert!(signals.iter().any(|s| s.signal == Signal::ItemRectChanged));
        assert_eq!(tree.item_rect(map), Rect::new(0.0, 0.0, 256.0, 256.0));
    }

    #[test]
    fn y_sort_uses_one_cell_quadrants() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 0, 0, 0);
        put(&mut tree, map, 1, 0, 0);
        tree.set_y_sort(map, true);
        assert_eq!(tree.tile_map_quadrants(map).len(), 2);
        let handle = tree.canvas_item(map);
        assert!(tree.render().canvas_item(handle).unwrap().sort_children_by_y);
    }

    #[test]
    fn tile_data_round_trips_through_the_map() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        tree.set_cell(map, CellPos::new(3, -2), 17, CellFlags::FLIP_H, (1, 2));
        tree.set_cell(map, CellPos::new(-7, 5), 0, CellFlags::TRANSPOSE, (0, 0));
        let words = tree.tile_data(map).unwrap();
        assert_eq!(words.len(), 6);

        let other = tree.create_tile_map();
        tree.set_cell(other, CellPos::new(100, 100), 1, CellFlags::empty(), (0, 0));
        let loaded = tree.set_tile_data(other, &words, TileDataFormat::Current);
        assert_eq!(loaded, Ok(()));
        assert_eq!(tree.used_cells(other), tree.used_cells(map));
        let cell = tree.tile_cell(other, CellPos::new(3, -2)).unwrap();
        assert_eq!(cell.id, 17);
        assert_eq!(cell.flags, CellFlags::FLIP_H);
        assert_eq!(cell.autotile_coord, (1, 2));

        let truncated = tree.set_tile_data(other, &words[..4], TileDataFormat::Current);
        assert!(truncated.is_err());
        assert_eq!(tree.used_cells(other).len(), 2);
    }

    #[test]
    fn missing_tiles_are_skipped_and_fixable() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 0, 0, 0);
        put(&mut tree, map, 1, 0, 42);
        tree.process_frame();
        let batch = tree.quadrant_batches(map, CellPos::new(0, 0))[0];
        assert_eq!(tree.render().canvas_item(batch).unwrap().commands.len(), 1);
        assert_eq!(tree.used_rect(map), Rect::new(0.0, 0.0, 2.0, 1.0));

        tree.fix_invalid_tiles(map);
        assert_eq!(tree.cell(map, CellPos::new(1, 0)), INVALID_CELL);
        assert_eq!(tree.used_cells_by_id(map, 0), [CellPos::new(0, 0)]);
        assert_eq!(tree.used_rect(map), Rect::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn square_coordinates_round_trip() {
        let mut tree = SceneTree::new();
        let map = tree.create_tile_map();
        tree.set_cell_size(map, Size::new(24.0, 40.0));
        for (x, y) in [(0, 0), (5, 5), (-3, 7), (-11, -4)] {
            let pos = CellPos::new(x, y);
            assert_eq!(tree.world_to_map(map, tree.map_to_world(map, pos)), pos);
        }
    }

    #[test]
    fn freeing_the_map_releases_its_handles() {
        let mut tree = SceneTree::new();
        let map = map_in_tree(&mut tree);
        put(&mut tree, map, 0, 0, 0);
        tree.process_frame();
        let bodies = tree.physics().body_count();
        let items = tree.render().canvas_item_count();
        tree.free(map);
        assert_eq!(tree.physics().body_count(), bodies - 1);
        assert_eq!(tree.render().canvas_item_count(), items - 2);
    }
}
