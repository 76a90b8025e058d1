// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use kurbo::Affine;

use crate::{
    AreaId, BodyId, BodyMode, BodyParam, ObjectInstance, PhysicsObject, PhysicsServer, Shape,
    SpaceId,
};

/// Recorded state of one shape slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeRecord {
    /// The shape.
    pub shape: Arc<Shape>,
    /// Local transform.
    pub transform: Affine,
    /// Whether the shape is disabled.
    pub disabled: bool,
    /// Whether one-way collision is enabled.
    pub one_way: bool,
    /// One-way collision margin.
    pub one_way_margin: f64,
    /// Grid coordinate metadata, if any.
    pub metadata: Option<(i32, i32)>,
}

/// Recorded state of a body or area.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsObjectRecord {
    /// Body mode; `None` for areas.
    pub mode: Option<BodyMode>,
    /// Current space.
    pub space: Option<SpaceId>,
    /// Last transform pushed.
    pub transform: Affine,
    /// Number of transform pushes received.
    pub transform_pushes: usize,
    /// Shapes in index order.
    pub shapes: Vec<ShapeRecord>,
    /// Attached object instance.
    pub instance: Option<ObjectInstance>,
    /// Whether the object receives picks.
    pub pickable: bool,
    /// Collision layer.
    pub collision_layer: u32,
    /// Collision mask.
    pub collision_mask: u32,
    /// Friction parameter.
    pub friction: f64,
    /// Bounce parameter.
    pub bounce: f64,
}

impl PhysicsObjectRecord {
    fn new(mode: Option<BodyMode>) -> Self {
        Self {
            mode,
            space: None,
            transform: Affine::IDENTITY,
            transform_pushes: 0,
            shapes: Vec::new(),
            instance: None,
            pickable: false,
            collision_layer: 1,
            collision_mask: 1,
            friction: 1.0,
            bounce: 0.0,
        }
    }

    fn shape_mut(&mut self, index: usize) -> &mut ShapeRecord {
        self.shapes.get_mut(index).expect("shape index out of range")
    }
}

/// A [`PhysicsServer`] that records every call.
#[derive(Debug, Default)]
pub struct HeadlessPhysicsServer {
    next_id: u64,
    spaces: HashSet<SpaceId>,
    objects: HashMap<PhysicsObject, PhysicsObjectRecord>,
}

impl HeadlessPhysicsServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a live body or area.
    pub fn object(&self, object: PhysicsObject) -> Option<&PhysicsObjectRecord> {
        self.objects.get(&object)
    }

    /// State of a live body.
    pub fn body(&self, body: BodyId) -> Option<&PhysicsObjectRecord> {
        self.object(PhysicsObject::Body(body))
    }

    /// State of a live area.
    pub fn area(&self, area: AreaId) -> Option<&PhysicsObjectRecord> {
        self.object(PhysicsObject::Area(area))
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.objects
            .keys()
            .filter(|o| matches!(o, PhysicsObject::Body(_)))
            .count()
    }

    /// Live bodies, in creation order.
    pub fn bodies(&self) -> Vec<BodyId> {
        let mut bodies: Vec<_> = self
            .objects
            .keys()
            .filter_map(|o| match o {
                PhysicsObject::Body(b) => Some(*b),
                PhysicsObject::Area(_) => None,
            })
            .collect();
        bodies.sort();
        bodies
    }

    /// Whether `space` was created by this server.
    pub fn has_space(&self, space: SpaceId) -> bool {
        self.spaces.contains(&space)
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record_mut(&mut self, object: PhysicsObject) -> &mut PhysicsObjectRecord {
        self.objects
            .get_mut(&object)
            .expect("unknown physics object")
    }

    fn add_shape(&mut self, object: PhysicsObject, shape: Arc<Shape>, transform: Affine, disabled: bool) {
        self.record_mut(object).shapes.push(ShapeRecord {
            shape,
            transform,
            disabled,
            one_way: false,
            one_way_margin: 1.0,
            metadata: None,
        });
    }

    fn remove_shape(&mut self, object: PhysicsObject, index: usize) {
        let record = self.record_mut(object);
        assert!(index < record.shapes.len(), "shape index out of range");
        record.shapes.remove(index);
    }

    fn set_space(&mut self, object: PhysicsObject, space: Option<SpaceId>) {
        if let Some(space) = space {
            assert!(self.spaces.contains(&space), "unknown SpaceId");
        }
        self.record_mut(object).space = space;
    }

    fn set_transform(&mut self, object: PhysicsObject, transform: Affine) {
        let record = self.record_mut(object);
        record.transform = transform;
        record.transform_pushes += 1;
    }
}

impl PhysicsServer for HeadlessPhysicsServer {
    fn space_create(&mut self) -> SpaceId {
        let space = SpaceId::from_raw(self.next());
        self.spaces.insert(space);
        space
    }

    fn space_free(&mut self, space: SpaceId) {
        assert!(self.spaces.remove(&space), "unknown SpaceId");
    }

    fn body_create(&mut self) -> BodyId {
        let body = BodyId::from_raw(self.next());
        self.objects.insert(
            PhysicsObject::Body(body),
            PhysicsObjectRecord::new(Some(BodyMode::Rigid)),
        );
        body
    }

    fn body_set_mode(&mut self, body: BodyId, mode: BodyMode) {
        self.record_mut(PhysicsObject::Body(body)).mode = Some(mode);
    }

    fn body_set_space(&mut self, body: BodyId, space: Option<SpaceId>) {
        self.set_space(PhysicsObject::Body(body), space);
    }

    fn body_set_state_transform(&mut self, body: BodyId, transform: Affine) {
        self.set_transform(PhysicsObject::Body(body), transform);
    }

    fn body_add_shape(&mut self, body: BodyId, shape: Arc<Shape>, transform: Affine, disabled: bool) {
        self.add_shape(PhysicsObject::Body(body), shape, transform, disabled);
    }

    fn body_remove_shape(&mut self, body: BodyId, index: usize) {
        self.remove_shape(PhysicsObject::Body(body), index);
    }

    fn body_clear_shapes(&mut self, body: BodyId) {
        self.record_mut(PhysicsObject::Body(body)).shapes.clear();
    }

    fn body_set_shape_transform(&mut self, body: BodyId, index: usize, transform: Affine) {
        self.record_mut(PhysicsObject::Body(body))
            .shape_mut(index)
            .transform = transform;
    }

    fn body_set_shape_disabled(&mut self, body: BodyId, index: usize, disabled: bool) {
        self.record_mut(PhysicsObject::Body(body))
            .shape_mut(index)
            .disabled = disabled;
    }

    fn body_set_shape_as_one_way_collision(
        &mut self,
        body: BodyId,
        index: usize,
        enabled: bool,
        margin: f64,
    ) {
        let shape = self.record_mut(PhysicsObject::Body(body)).shape_mut(index);
        shape.one_way = enabled;
        shape.one_way_margin = margin;
    }

    fn body_set_shape_metadata(&mut self, body: BodyId, index: usize, metadata: (i32, i32)) {
        self.record_mut(PhysicsObject::Body(body))
            .shape_mut(index)
            .metadata = Some(metadata);
    }

    fn body_attach_object_instance(&mut self, body: BodyId, instance: ObjectInstance) {
        self.record_mut(PhysicsObject::Body(body)).instance = Some(instance);
    }

    fn body_set_collision_layer(&mut self, body: BodyId, layer: u32) {
        self.record_mut(PhysicsObject::Body(body)).collision_layer = layer;
    }

    fn body_set_collision_mask(&mut self, body: BodyId, mask: u32) {
        self.record_mut(PhysicsObject::Body(body)).collision_mask = mask;
    }

    fn body_set_param(&mut self, body: BodyId, param: BodyParam, value: f64) {
        let record = self.record_mut(PhysicsObject::Body(body));
        match param {
            BodyParam::Friction => record.friction = value,
            BodyParam::Bounce => record.bounce = value,
        }
    }

    fn body_set_pickable(&mut self, body: BodyId, pickable: bool) {
        self.record_mut(PhysicsObject::Body(body)).pickable = pickable;
    }

    fn body_free(&mut self, body: BodyId) {
        self.objects
            .remove(&PhysicsObject::Body(body))
            .expect("unknown physics object");
    }

    fn area_create(&mut self) -> AreaId {
        let area = AreaId::from_raw(self.next());
        self.objects
            .insert(PhysicsObject::Area(area), PhysicsObjectRecord::new(None));
        area
    }

    fn area_set_space(&mut self, area: AreaId, space: Option<SpaceId>) {
        self.set_space(PhysicsObject::Area(area), space);
    }

    fn area_set_transform(&mut self, area: AreaId, transform: Affine) {
        self.set_transform(PhysicsObject::Area(area), transform);
    }

    fn area_add_shape(&mut self, area: AreaId, shape: Arc<Shape>, transform: Affine, disabled: bool) {
        self.add_shape(PhysicsObject::Area(area), shape, transform, disabled);
    }

    fn area_remove_shape(&mut self, area: AreaId, index: usize) {
        self.remove_shape(PhysicsObject::Area(area), index);
    }

    fn area_clear_shapes(&mut self, area: AreaId) {
        self.record_mut(PhysicsObject::Area(area)).shapes.clear();
    }

    fn area_set_shape_transform(&mut self, area: AreaId, index: usize, transform: Affine) {
        self.record_mut(PhysicsObject::Area(area))
            .shape_mut(index)
            .transform = transform;
    }

    fn area_set_shape_disabled(&mut self, area: AreaId, index: usize, disabled: bool) {
        self.record_mut(PhysicsObject::Area(area))
            .shape_mut(index)
            .disabled = disabled;
    }

    fn area_attach_object_instance(&mut self, area: AreaId, instance: ObjectInstance) {
        self.record_mut(PhysicsObject::Area(area)).instance = Some(instance);
    }

    fn area_set_collision_layer(&mut self, area: AreaId, layer: u32) {
        self.record_mut(PhysicsObject::Area(area)).collision_layer = layer;
    }

    fn area_set_collision_mask(&mut self, area: AreaId, mask: u32) {
        self.record_mut(PhysicsObject::Area(area)).collision_mask = mask;
    }

    fn area_set_pickable(&mut self, area: AreaId, pickable: bool) {
        self.record_mut(PhysicsObject::Area(area)).pickable = pickable;
    }

    fn area_free(&mut self, area: AreaId) {
        self.objects
            .remove(&PhysicsObject::Area(area))
            .expect("unknown physics object");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;

    fn circle(radius: f64) -> Arc<Shape> {
        Arc::new(Shape::Circle { radius })
    }

    #[test]
    fn removing_a_shape_shifts_later_indices() {
        let mut ps = HeadlessPhysicsServer::new();
        let body = ps.body_create();
        for r in [1.0, 2.0, 3.0] {
            ps.body_add_shape(body, circle(r), Affine::IDENTITY, false);
        }
        ps.body_remove_shape(body, 0);
        let shapes = &ps.body(body).unwrap().shapes;
        assert_eq!(shapes.len(), 2);
        assert_eq!(*shapes[0].shape, Shape::Circle { radius: 2.0 });
        assert_eq!(*shapes[1].shape, Shape::Circle { radius: 3.0 });
    }

    #[test]
    fn dispatch_through_physics_object() {
        let mut ps = HeadlessPhysicsServer::new();
        let space = ps.space_create();
        let area = PhysicsObject::Area(ps.area_create());
        area.set_space(&mut ps, Some(space));
        area.set_transform(&mut ps, Affine::translate(Vec2::new(4.0, 5.0)));
        area.add_shape(&mut ps, circle(1.0), Affine::IDENTITY, false);
        area.set_shape_one_way_collision(&mut ps, 0, true, 3.0);
        let record = ps.object(area).unwrap();
        assert_eq!(record.space, Some(space));
        assert_eq!(record.transform_pushes, 1);
        assert!(!record.shapes[0].one_way, "areas ignore one-way collision");
    }

    #[test]
    fn bodies_are_listed_in_creation_order() {
        let mut ps = HeadlessPhysicsServer::new();
        let a = ps.body_create();
        let _area = ps.area_create();
        let b = ps.body_create();
        assert_eq!(ps.bodies(), [a, b]);
        ps.body_free(a);
        assert_eq!(ps.body_count(), 1);
    }
}
