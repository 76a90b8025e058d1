// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CollisionObject2D: a Node2D bound to a physics body or area.

use alloc::sync::Arc;

use arbor_server::{BodyMode, PhysicsObject, PhysicsServer, RenderServer, Shape};
use kurbo::Affine;

use super::owners::{ShapeOwnerId, ShapeOwnerRegistry};
use crate::tree::SceneTree;
use crate::types::{NodeId, NodeKind, Notification};

/// Which physics object backs a collision object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollisionObjectKind {
    /// An area: detects overlaps, never collides.
    Area,
    /// A body simulated in the given mode.
    Body(BodyMode),
}

#[derive(Clone, Debug)]
pub(crate) struct CollisionObject2D {
    pub(crate) owners: ShapeOwnerRegistry,
    rid: PhysicsObject,
    pickable: bool,
    only_update_transform_changes: bool,
    last_transform: Affine,
    collision_layer: u32,
    collision_mask: u32,
}

impl CollisionObject2D {
    pub(crate) fn rid(&self) -> PhysicsObject {
        self.rid
    }
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    /// Create a detached collision object backed by a new body or area.
    ///
    /// Areas start pickable, bodies do not.
    pub fn create_collision_object(&mut self, kind: CollisionObjectKind) -> NodeId {
        let id = self.alloc_canvas_item(NodeKind::CollisionObject2D);
        let rid = match kind {
            CollisionObjectKind::Area => PhysicsObject::Area(self.physics.area_create()),
            CollisionObjectKind::Body(mode) => {
                let body = self.physics.body_create();
                self.physics.body_set_mode(body, mode);
                PhysicsObject::Body(body)
            }
        };
        rid.attach_object_instance(&mut self.physics, id.to_instance());
        self.collision_objects.insert(
            id,
            CollisionObject2D {
                owners: ShapeOwnerRegistry::new(rid),
                rid,
                pickable: kind == CollisionObjectKind::Area,
                only_update_transform_changes: false,
                last_transform: Affine::IDENTITY,
                collision_layer: 1,
                collision_mask: 1,
            },
        );
        self.set_notify_transform(id, true);
        id
    }

    /// Create a detached collision object backed by an area.
    pub fn create_area_2d(&mut self) -> NodeId {
        self.create_collision_object(CollisionObjectKind::Area)
    }

    /// Create a detached collision object backed by a static body.
    pub fn create_static_body_2d(&mut self) -> NodeId {
        self.create_collision_object(CollisionObjectKind::Body(BodyMode::Static))
    }

    fn collision_object(&self, id: NodeId) -> &CollisionObject2D {
        self.collision_objects
            .get(&id)
            .expect("node is not a collision object")
    }

    fn collision_object_mut(&mut self, id: NodeId) -> &mut CollisionObject2D {
        self.collision_objects
            .get_mut(&id)
            .expect("node is not a collision object")
    }

    pub(crate) fn collision_object_notification(&mut self, id: NodeId, what: Notification) {
        match what {
            Notification::EnterTree => {
                let global = self.global_transform(id);
                let space = self.world_2d(id).map(|w| w.space);
                let object = self.collision_object_mut(id);
                object.last_transform = global;
                let rid = object.rid;
                rid.set_transform(&mut self.physics, global);
                rid.set_space(&mut self.physics, space);
                self.update_pickable(id);
            }
            Notification::TransformChanged => {
                let global = self.global_transform(id);
                let object = self.collision_object_mut(id);
                if object.only_update_transform_changes && object.last_transform == global {
                    return;
                }
                object.last_transform = global;
                let rid = object.rid;
                rid.set_transform(&mut self.physics, global);
            }
            Notification::ExitTree => {
                let rid = self.collision_object(id).rid;
                rid.set_space(&mut self.physics, None);
            }
            Notification::VisibilityChanged | Notification::ExitCanvas => {
                self.update_pickable(id);
            }
            _ => {}
        }
    }

    fn update_pickable(&mut self, id: NodeId) {
        if !self.is_inside_tree(id) {
            return;
        }
        let pickable = self.collision_object(id).pickable && self.is_visible_in_tree(id);
        let rid = self.collision_object(id).rid;
        rid.set_pickable(&mut self.physics, pickable);
    }

    /// The physics object backing a collision object.
    pub fn collision_object_rid(&self, id: NodeId) -> PhysicsObject {
        self.collision_object(id).rid
    }

    /// The global transform last pushed to the physics object.
    pub fn last_transform(&self, id: NodeId) -> Affine {
        self.collision_object(id).last_transform
    }

    /// Whether the object may receive pointer picks while visible.
    pub fn set_pickable(&mut self, id: NodeId, pickable: bool) {
        self.collision_object_mut(id).pickable = pickable;
        self.update_pickable(id);
    }

    /// Whether the object may receive pointer picks while visible.
    pub fn is_pickable(&self, id: NodeId) -> bool {
        self.collision_object(id).pickable
    }

    /// Skip transform pushes when the global transform did not actually change.
    pub fn set_only_update_transform_changes(&mut self, id: NodeId, enabled: bool) {
        self.collision_object_mut(id).only_update_transform_changes = enabled;
    }

    /// Whether unchanged transforms are skipped.
    pub fn is_only_update_transform_changes_enabled(&self, id: NodeId) -> bool {
        self.collision_object(id).only_update_transform_changes
    }

    /// Set the physics layers the object is in.
    pub fn set_collision_layer(&mut self, id: NodeId, layer: u32) {
        let object = self.collision_object_mut(id);
        object.collision_layer = layer;
        let rid = object.rid;
        rid.set_collision_layer(&mut self.physics, layer);
    }

    /// The physics layers the object is in.
    pub fn collision_layer(&self, id: NodeId) -> u32 {
        self.collision_object(id).collision_layer
    }

    /// Set the physics layers the object scans.
    pub fn set_collision_mask(&mut self, id: NodeId, mask: u32) {
        let object = self.collision_object_mut(id);
        object.collision_mask = mask;
        let rid = object.rid;
        rid.set_collision_mask(&mut self.physics, mask);
    }

    /// The physics layers the object scans.
    pub fn collision_mask(&self, id: NodeId) -> u32 {
        self.collision_object(id).collision_mask
    }

    /// The shape owners registered on a collision object.
    pub fn shape_owners(&self, id: NodeId) -> &ShapeOwnerRegistry {
        &self.collision_object(id).owners
    }

    /// Register a new, empty shape owner for `owner_node`.
    pub fn create_shape_owner(&mut self, id: NodeId, owner_node: NodeId) -> ShapeOwnerId {
        self.collision_object_mut(id).owners.create_owner(owner_node)
    }

    /// Remove a shape owner and all of its shapes.
    pub fn remove_shape_owner(&mut self, id: NodeId, owner: ShapeOwnerId) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object.owners.remove_owner(&mut self.physics, owner);
    }

    /// Add a shape to an owner at the next global subshape index.
    pub fn shape_owner_add_shape(&mut self, id: NodeId, owner: ShapeOwnerId, shape: Arc<Shape>) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object.owners.add_shape(&mut self.physics, owner, shape);
    }

    /// Remove an owner's `local`-th shape.
    pub fn shape_owner_remove_shape(&mut self, id: NodeId, owner: ShapeOwnerId, local: usize) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object.owners.remove_shape(&mut self.physics, owner, local);
    }

    /// Remove every shape of an owner.
    pub fn shape_owner_clear_shapes(&mut self, id: NodeId, owner: ShapeOwnerId) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object.owners.clear_shapes(&mut self.physics, owner);
    }

    /// Set an owner's transform relative to the collision object.
    pub fn shape_owner_set_transform(&mut self, id: NodeId, owner: ShapeOwnerId, transform: Affine) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object.owners.set_transform(&mut self.physics, owner, transform);
    }

    /// Enable or disable an owner's shapes.
    pub fn shape_owner_set_disabled(&mut self, id: NodeId, owner: ShapeOwnerId, disabled: bool) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object.owners.set_disabled(&mut self.physics, owner, disabled);
    }

    /// Set one-way collision for an owner's shapes.
    pub fn shape_owner_set_one_way_collision(
        &mut self,
        id: NodeId,
        owner: ShapeOwnerId,
        enabled: bool,
    ) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object
            .owners
            .set_one_way_collision(&mut self.physics, owner, enabled);
    }

    /// Set the one-way margin for an owner's shapes.
    pub fn shape_owner_set_one_way_collision_margin(
        &mut self,
        id: NodeId,
        owner: ShapeOwnerId,
        margin: f64,
    ) {
        let object = self
            .collision_objects
            .get_mut(&id)
            .expect("node is not a collision object");
        object
            .owners
            .set_one_way_collision_margin(&mut self.physics, owner, margin);
    }
}

#[cfg(test)]
mod tests {
    use crate::{CollisionObjectKind, SceneTree};
    use arbor_server::{BodyMode, PhysicsObject};
    use kurbo::{Affine, Point};

    #[test]
    fn entering_the_tree_pushes_transform_and_space() {
        let mut tree = SceneTree::new();
        let body = tree.create_collision_object(CollisionObjectKind::Body(BodyMode::Kinematic));
        tree.set_position(body, Point::new(3.0, 4.0));
        tree.add_child(tree.root(), body);
        let PhysicsObject::Body(rid) = tree.collision_object_rid(body) else {
            panic!("expected a body");
        };
        let record = tree.physics().body(rid).unwrap();
        assert_eq!(record.mode, Some(BodyMode::Kinematic));
        assert_eq!(record.space, Some(tree.world(tree.root()).space));
        assert_eq!(record.transform, Affine::translate((3.0, 4.0)));
        assert_eq!(record.instance, Some(body.to_instance()));
        assert!(!record.pickable, "bodies are not pickable by default");

        tree.remove_child(tree.root(), body);
        assert_eq!(tree.physics().body(rid).unwrap().space, None);
    }

    #[test]
    fn entering_bodies_ignore_transforms_cached_while_detached() {
        let mut tree = SceneTree::new();
        let parent = tree.create_node_2d();
        let body = tree.create_static_body_2d();
        tree.add_child(parent, body);
        assert_eq!(tree.global_position(body), Point::ZERO);
        tree.set_position(parent, Point::new(50.0, 0.0));
        tree.add_child(tree.root(), parent);
        let PhysicsObject::Body(rid) = tree.collision_object_rid(body) else {
            panic!("expected a body");
        };
        let record = tree.physics().body(rid).unwrap();
        assert_eq!(record.transform, Affine::translate((50.0, 0.0)));
        assert_eq!(tree.last_transform(body), Affine::translate((50.0, 0.0)));
    }

    #[test]
    fn transform_changes_follow_the_parent() {
        let mut tree = SceneTree::new();
        let parent = tree.create_node_2d();
        let area = tree.create_area_2d();
        tree.add_child(tree.root(), parent);
        tree.add_child(parent, area);
        tree.process_frame();
        tree.set_position(parent, Point::new(7.0, 0.0));
        tree.process_frame();
        let PhysicsObject::Area(rid) = tree.collision_object_rid(area) else {
            panic!("expected an area");
        };
        let record = tree.physics().area(rid).unwrap();
        assert_eq!(record.transform, Affine::translate((7.0, 0.0)));
        assert_eq!(tree.last_transform(area), Affine::translate((7.0, 0.0)));
        assert!(record.pickable, "visible areas are pickable");
    }

    #[test]
    fn unchanged_transforms_are_skipped_when_asked() {
        let mut tree = SceneTree::new();
        let area = tree.create_area_2d();
        tree.add_child(tree.root(), area);
        tree.set_only_update_transform_changes(area, true);
        tree.process_frame();
        let PhysicsObject::Area(rid) = tree.collision_object_rid(area) else {
            panic!("expected an area");
        };
        let pushes = tree.physics().area(rid).unwrap().transform_pushes;
        tree.set_position(area, Point::ORIGIN);
        tree.process_frame();
        assert_eq!(tree.physics().area(rid).unwrap().transform_pushes, pushes);
    }

    #[test]
    fn hiding_drops_pickability() {
        let mut tree = SceneTree::new();
        let area = tree.create_area_2d();
        tree.add_child(tree.root(), area);
        tree.hide(area);
        let PhysicsObject::Area(rid) = tree.collision_object_rid(area) else {
            panic!("expected an area");
        };
        assert!(!tree.physics().area(rid).unwrap().pickable);
        tree.show(area);
        assert!(tree.physics().area(rid).unwrap().pickable);
    }

    #[test]
    fn freeing_releases_the_physics_object() {
        let mut tree = SceneTree::new();
        let body = tree.create_static_body_2d();
        tree.add_child(tree.root(), body);
        let rid = tree.collision_object_rid(body);
        tree.free(body);
        assert!(tree.physics().object(rid).is_none());
    }
}
