// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quadrant lifecycle and dirty-quadrant reconciliation.

use alloc::vec::Vec;

use arbor_server::{
    BodyId, BodyMode, BodyParam, CanvasItemId, CanvasParent, Color, MaterialId, PhysicsObject,
    PhysicsServer, RenderServer, SpaceId,
};
use kurbo::{Affine, Point, Rect, Vec2};
use smallvec::SmallVec;

use super::TileMap;
use super::cell::{CellPos, TileCell};
use crate::collision::{ShapeOwnerId, ShapeOwnerRegistry};
use crate::draw::DrawContext;
use crate::queue::{DeferredCall, DeferredQueue};
use crate::types::NodeId;

/// Pads drawn rectangles so neighbouring tiles leave no hairline gaps.
const FP_ADJUST: f64 = 0.00001;

/// A bucket of cells sharing draw batches and a physics body.
#[derive(Clone, Debug)]
pub(crate) struct Quadrant {
    /// Anchor in map space.
    pub(crate) pos: Point,
    /// Member cells, in insertion order.
    pub(crate) cells: Vec<CellPos>,
    pub(crate) batches: SmallVec<[CanvasItemId; 1]>,
    pub(crate) body: Option<BodyId>,
    /// Owner on the collision parent, when delegating.
    pub(crate) owner: Option<ShapeOwnerId>,
    /// Queued in the map's dirty worklist.
    pub(crate) dirty: bool,
}

/// Everything outside the map that quadrant work touches, borrowed for one operation.
pub(super) struct MapEnv<'a> {
    pub(super) render: &'a mut dyn RenderServer,
    pub(super) physics: &'a mut dyn PhysicsServer,
    /// Shape owners of the collision parent, when delegating.
    pub(super) owners: Option<&'a mut ShapeOwnerRegistry>,
    pub(super) queue: &'a mut DeferredQueue,
    pub(super) node: NodeId,
    pub(super) handle: CanvasItemId,
    pub(super) in_tree: bool,
    pub(super) global: Affine,
    pub(super) local: Affine,
    pub(super) space: Option<SpaceId>,
    pub(super) light_mask: u32,
    pub(super) self_modulate: Color,
    /// Whether batches defer to the map's material.
    pub(super) use_parent_material: bool,
}

impl TileMap {
    pub(super) fn create_quadrant(&mut self, env: &mut MapEnv<'_>, key: CellPos) {
        let pos = self.config.quadrant_origin(key);
        let mut xform = Affine::translate(pos.to_vec2());
        let mut body = None;
        let mut owner = None;
        if !self.config.collision_use_parent {
            let b = env.physics.body_create();
            let mode = if self.config.collision_use_kinematic {
                BodyMode::Kinematic
            } else {
                BodyMode::Static
            };
            env.physics.body_set_mode(b, mode);
            env.physics.body_attach_object_instance(b, env.node.to_instance());
            env.physics.body_set_collision_layer(b, self.collision.layer);
            env.physics.body_set_collision_mask(b, self.collision.mask);
            env.physics.body_set_param(b, BodyParam::Friction, self.collision.friction);
            env.physics.body_set_param(b, BodyParam::Bounce, self.collision.bounce);
            if env.in_tree {
                xform = env.global * xform;
                env.physics.body_set_space(b, env.space);
            }
            env.physics.body_set_state_transform(b, xform);
            body = Some(b);
        } else if let Some(owners) = env.owners.as_deref_mut() {
            let o = owners.create_owner(env.node);
            owners.set_transform(env.physics, o, env.local * xform);
            owner = Some(o);
        }
        self.quadrants.insert(
            key,
            Quadrant {
                pos,
                cells: Vec::new(),
                batches: SmallVec::new(),
                body,
                owner,
                dirty: false,
            },
        );
        self.rect_dirty = true;
        self.order_dirty = true;
        self.stats.quadrants_created += 1;
        log::trace!("tile map {:?}: created quadrant {key:?}", env.node);
    }

    pub(super) fn erase_quadrant(&mut self, env: &mut MapEnv<'_>, key: CellPos) {
        let Some(q) = self.quadrants.remove(&key) else {
            return;
        };
        if let Some(body) = q.body {
            env.physics.body_free(body);
        } else if let (Some(owner), Some(owners)) = (q.owner, env.owners.as_deref_mut()) {
            owners.remove_owner(env.physics, owner);
        }
        for batch in q.batches {
            env.render.canvas_item_free(batch);
        }
        if q.dirty {
            self.dirty.retain(|k| *k != key);
        }
        self.rect_dirty = true;
        self.stats.quadrants_erased += 1;
        log::trace!("tile map {:?}: erased quadrant {key:?}", env.node);
    }

    pub(super) fn clear_quadrants(&mut self, env: &mut MapEnv<'_>) {
        let keys: Vec<CellPos> = self.quadrants.keys().copied().collect();
        for key in keys {
            self.erase_quadrant(env, key);
        }
    }

    /// Queue `key` for reconciliation. With `deferred`, the first quadrant queued while the
    /// map is in the tree schedules a deferred rebuild.
    pub(super) fn make_quadrant_dirty(
        &mut self,
        env: &mut MapEnv<'_>,
        key: CellPos,
        deferred: bool,
    ) {
        let q = self.quadrants.get_mut(&key).expect("quadrant exists");
        if !q.dirty {
            q.dirty = true;
            self.dirty.push_back(key);
        }
        if self.pending_update {
            return;
        }
        self.pending_update = true;
        if env.in_tree && deferred {
            env.queue.push(DeferredCall::UpdateDirtyQuadrants(env.node));
        }
    }

    /// Tear every quadrant down and rebuild them from the cells.
    pub(super) fn recreate_quadrants(&mut self, env: &mut MapEnv<'_>) -> bool {
        self.clear_quadrants(env);
        let size = self.config.effective_quadrant_size();
        let cells: Vec<CellPos> = self.cells.keys().copied().collect();
        for pos in cells {
            let key = pos.to_quadrant(size);
            if !self.quadrants.contains_key(&key) {
                self.create_quadrant(env, key);
            }
            if let Some(q) = self.quadrants.get_mut(&key) {
                q.cells.push(pos);
            }
            self.make_quadrant_dirty(env, key, false);
        }
        self.update_dirty_quadrants(env)
    }

    pub(super) fn set_cell(&mut self, env: &mut MapEnv<'_>, pos: CellPos, cell: Option<TileCell>) {
        let existing = self.cells.get(&pos).copied();
        let key = pos.to_quadrant(self.config.effective_quadrant_size());
        let Some(cell) = cell else {
            if existing.is_none() {
                return;
            }
            self.cells.remove(&pos);
            let q = self.quadrants.get_mut(&key).expect("occupied cell has a quadrant");
            q.cells.retain(|c| *c != pos);
            if q.cells.is_empty() {
                self.erase_quadrant(env, key);
            } else {
                self.make_quadrant_dirty(env, key, true);
            }
            self.used_rect.set(None);
            return;
        };
        match existing {
            Some(old) if old == cell => return,
            Some(_) => {}
            None => {
                if !self.quadrants.contains_key(&key) {
                    self.create_quadrant(env, key);
                }
                if let Some(q) = self.quadrants.get_mut(&key) {
                    q.cells.push(pos);
                }
            }
        }
        self.cells.insert(pos, cell);
        self.make_quadrant_dirty(env, key, true);
        self.used_rect.set(None);
    }

    /// Rebuild the batches and shapes of every dirty quadrant.
    ///
    /// Returns whether the item rect was recomputed.
    pub(super) fn update_dirty_quadrants(&mut self, env: &mut MapEnv<'_>) -> bool {
        if !self.pending_update {
            return false;
        }
        let Some(tile_set) = self.tile_set.clone().filter(|_| env.in_tree) else {
            self.pending_update = false;
            return false;
        };
        let draw_offset = self.config.cell_draw_offset();
        let cell_size = self.config.cell_size;
        let mut rebuilt = 0_usize;

        while let Some(&key) = self.dirty.front() {
            let q = self.quadrants.get_mut(&key).expect("dirty quadrant exists");
            for batch in q.batches.drain(..) {
                env.render.canvas_item_free(batch);
            }
            if let Some(body) = q.body {
                env.physics.body_clear_shapes(body);
            } else if let (Some(owner), Some(owners)) = (q.owner, env.owners.as_deref_mut()) {
                owners.clear_shapes(env.physics, owner);
            }

            let mut prev: Option<(CanvasItemId, Option<MaterialId>, i32)> = None;
            let mut shape_idx = 0_usize;
            for &pos in &q.cells {
                let cell = self.cells[&pos];
                let Some(tile) = tile_set.tile(cell.id) else {
                    continue;
                };
                let Some(texture) = tile.texture else {
                    continue;
                };
                let offset = self.config.map_to_world(pos, false) - q.pos + draw_offset;
                let z = tile.z_index_for(cell.autotile_coord);

                let batch = match prev {
                    Some((batch, material, prev_z)) if material == tile.material && prev_z == z => {
                        batch
                    }
                    _ => {
                        let batch = env.render.canvas_item_create();
                        if tile.material.is_some() {
                            env.render.canvas_item_set_material(batch, tile.material);
                        }
                        env.render
                            .canvas_item_set_parent(batch, CanvasParent::Item(env.handle));
                        env.render
                            .canvas_item_set_use_parent_material(batch, env.use_parent_material);
                        env.render
                            .canvas_item_set_transform(batch, Affine::translate(q.pos.to_vec2()));
                        env.render.canvas_item_set_light_mask(batch, env.light_mask);
                        env.render.canvas_item_set_z_index(batch, z);
                        q.batches.push(batch);
                        prev = Some((batch, tile.material, z));
                        batch
                    }
                };

                let region = tile.region_for(cell.autotile_coord);
                let size = if region == Rect::ZERO {
                    texture.size
                } else {
                    region.size()
                };
                let origin = offset.to_point().floor();
                let mut rect_pos = origin.to_vec2();
                let mut rect_size = Vec2::new(size.width + FP_ADJUST, size.height + FP_ADJUST);
                let mut tile_ofs = tile.texture_offset;
                let centered = self.config.centered_textures;
                if cell.transpose() {
                    tile_ofs = Vec2::new(tile_ofs.y, tile_ofs.x);
                    if centered {
                        rect_pos.x += cell_size.width * 0.5 - rect_size.y * 0.5;
                        rect_pos.y += cell_size.height * 0.5 - rect_size.x * 0.5;
                    }
                } else if centered {
                    rect_pos += Vec2::new(
                        (cell_size.width - rect_size.x) * 0.5,
                        (cell_size.height - rect_size.y) * 0.5,
                    );
                }
                if cell.flip_h() {
                    rect_size.x = -rect_size.x;
                    tile_ofs.x = -tile_ofs.x;
                }
                if cell.flip_v() {
                    rect_size.y = -rect_size.y;
                    tile_ofs.y = -tile_ofs.y;
                }
                rect_pos += tile_ofs + self.config.origin_rect_shift(&cell);
                let rect = Rect::new(
                    rect_pos.x,
                    rect_pos.y,
                    rect_pos.x + rect_size.x,
                    rect_pos.y + rect_size.y,
                );
                let modulate = tile.modulate * env.self_modulate;

                let mut ctx = DrawContext::new(&mut *env.render, batch);
                if region == Rect::ZERO {
                    ctx.draw_texture_rect(texture, rect, modulate, cell.transpose());
                } else {
                    ctx.draw_texture_rect_region(
                        texture,
                        rect,
                        region,
                        modulate,
                        cell.transpose(),
                        self.config.clip_uv,
                    );
                }

                for shape in &tile.shapes {
                    if !tile.shape_applies(shape, cell.autotile_coord) {
                        continue;
                    }
                    let [a, b, c, d, e, f] = shape.transform.as_coeffs();
                    let xform = self.config.fix_cell_transform(
                        Affine::translate(origin.to_vec2()),
                        &cell,
                        Vec2::new(e, f),
                        size,
                    ) * Affine::new([a, b, c, d, 0.0, 0.0]);
                    let metadata = (pos.x, pos.y);
                    if let Some(body) = q.body {
                        env.physics.body_add_shape(body, shape.shape.clone(), xform, false);
                        env.physics.body_set_shape_metadata(body, shape_idx, metadata);
                        env.physics.body_set_shape_as_one_way_collision(
                            body,
                            shape_idx,
                            shape.one_way,
                            shape.one_way_margin,
                        );
                    } else if let (Some(owner), Some(owners)) =
                        (q.owner, env.owners.as_deref_mut())
                    {
                        owners.add_shape(env.physics, owner, shape.shape.clone());
                        let index = owners.shape_index(owner, owners.shape_count(owner) - 1);
                        let rid = owners.rid();
                        let owner_xform = owners.transform(owner);
                        rid.set_shape_transform(env.physics, index, owner_xform * xform);
                        if let PhysicsObject::Body(body) = rid {
                            env.physics.body_set_shape_metadata(body, index, metadata);
                        }
                        rid.set_shape_one_way_collision(
                            env.physics,
                            index,
                            shape.one_way,
                            shape.one_way_margin,
                        );
                    }
                    shape_idx += 1;
                }
            }

            q.dirty = false;
            self.dirty.pop_front();
            self.order_dirty = true;
            self.stats.quadrants_rebuilt += 1;
            rebuilt += 1;
        }
        self.pending_update = false;

        if self.order_dirty {
            let mut index = i32::MIN;
            for q in self.quadrants.values() {
                for &batch in &q.batches {
                    env.render.canvas_item_set_draw_index(batch, index);
                    index += 1;
                }
            }
            self.order_dirty = false;
        }
        log::debug!("tile map {:?}: rebuilt {rebuilt} quadrants", env.node);
        self.recompute_rect_cache()
    }

    fn recompute_rect_cache(&mut self) -> bool {
        if !self.rect_dirty {
            return false;
        }
        let size = self.config.effective_quadrant_size();
        let mut total: Option<Rect> = None;
        for key in self.quadrants.keys() {
            let (x, y) = (key.x * size, key.y * size);
            let corner = |cx, cy| self.config.map_to_world(CellPos::new(cx, cy), false);
            let r = Rect::from_points(corner(x, y), corner(x + size, y))
                .union_pt(corner(x + size, y + size))
                .union_pt(corner(x, y + size));
            total = Some(total.map_or(r, |t| t.union(r)));
        }
        self.rect_cache = total.unwrap_or(Rect::ZERO);
        self.rect_dirty = false;
        true
    }

    /// Move own bodies to follow the map's global transform.
    pub(super) fn update_quadrant_transforms(&self, env: &mut MapEnv<'_>) {
        if !env.in_tree {
            return;
        }
        for q in self.quadrants.values() {
            if let Some(body) = q.body {
                let xform = env.global * Affine::translate(q.pos.to_vec2());
                env.physics.body_set_state_transform(body, xform);
            }
        }
    }

    pub(super) fn update_quadrant_space(&self, env: &mut MapEnv<'_>, space: Option<SpaceId>) {
        for body in self.quadrants.values().filter_map(|q| q.body) {
            env.physics.body_set_space(body, space);
        }
    }
}
