// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Physics server contract.

use alloc::sync::Arc;
use kurbo::Affine;

use crate::{AreaId, BodyId, ObjectInstance, Shape, SpaceId};

/// How a body participates in the simulation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Never moves on its own.
    #[default]
    Static,
    /// Moved by user code; pushes other bodies.
    Kinematic,
    /// Fully simulated.
    Rigid,
    /// Simulated without rotation.
    Character,
}

/// Scalar body parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BodyParam {
    /// Surface friction.
    Friction,
    /// Restitution.
    Bounce,
}

/// The physics backend consumed by the scene graph.
///
/// Shapes on a body or area are addressed by position: index `i` is the `i`-th shape added
/// that has not been removed since. Removing a shape shifts every later shape down by one.
pub trait PhysicsServer {
    /// Create a simulation space.
    fn space_create(&mut self) -> SpaceId;
    /// Release a simulation space.
    fn space_free(&mut self, space: SpaceId);

    /// Create a body outside of any space.
    fn body_create(&mut self) -> BodyId;
    /// Set the simulation mode.
    fn body_set_mode(&mut self, body: BodyId, mode: BodyMode);
    /// Move the body into a space, or out of every space.
    fn body_set_space(&mut self, body: BodyId, space: Option<SpaceId>);
    /// Set the body's transform state.
    fn body_set_state_transform(&mut self, body: BodyId, transform: Affine);
    /// Append a shape.
    fn body_add_shape(&mut self, body: BodyId, shape: Arc<Shape>, transform: Affine, disabled: bool);
    /// Remove the shape at `index`.
    fn body_remove_shape(&mut self, body: BodyId, index: usize);
    /// Remove every shape.
    fn body_clear_shapes(&mut self, body: BodyId);
    /// Set the local transform of the shape at `index`.
    fn body_set_shape_transform(&mut self, body: BodyId, index: usize, transform: Affine);
    /// Enable or disable the shape at `index`.
    fn body_set_shape_disabled(&mut self, body: BodyId, index: usize, disabled: bool);
    /// Configure one-way collision for the shape at `index`.
    fn body_set_shape_as_one_way_collision(
        &mut self,
        body: BodyId,
        index: usize,
        enabled: bool,
        margin: f64,
    );
    /// Attach a grid coordinate to the shape at `index`.
    fn body_set_shape_metadata(&mut self, body: BodyId, index: usize, metadata: (i32, i32));
    /// Attach the owning object.
    fn body_attach_object_instance(&mut self, body: BodyId, instance: ObjectInstance);
    /// Set the layers the body is in.
    fn body_set_collision_layer(&mut self, body: BodyId, layer: u32);
    /// Set the layers the body scans.
    fn body_set_collision_mask(&mut self, body: BodyId, mask: u32);
    /// Set a scalar parameter.
    fn body_set_param(&mut self, body: BodyId, param: BodyParam, value: f64);
    /// Whether the body receives pointer picks.
    fn body_set_pickable(&mut self, body: BodyId, pickable: bool);
    /// Release the body.
    fn body_free(&mut self, body: BodyId);

    /// Create an area outside of any space.
    fn area_create(&mut self) -> AreaId;
    /// Move the area into a space, or out of every space.
    fn area_set_space(&mut self, area: AreaId, space: Option<SpaceId>);
    /// Set the area's transform.
    fn area_set_transform(&mut self, area: AreaId, transform: Affine);
    /// Append a shape.
    fn area_add_shape(&mut self, area: AreaId, shape: Arc<Shape>, transform: Affine, disabled: bool);
    /// Remove the shape at `index`.
    fn area_remove_shape(&mut self, area: AreaId, index: usize);
    /// Remove every shape.
    fn area_clear_shapes(&mut self, area: AreaId);
    /// Set the local transform of the shape at `index`.
    fn area_set_shape_transform(&mut self, area: AreaId, index: usize, transform: Affine);
    /// Enable or disable the shape at `index`.
    fn area_set_shape_disabled(&mut self, area: AreaId, index: usize, disabled: bool);
    /// Attach the owning object.
    fn area_attach_object_instance(&mut self, area: AreaId, instance: ObjectInstance);
    /// Set the layers the area is in.
    fn area_set_collision_layer(&mut self, area: AreaId, layer: u32);
    /// Set the layers the area scans.
    fn area_set_collision_mask(&mut self, area: AreaId, mask: u32);
    /// Whether the area receives pointer picks.
    fn area_set_pickable(&mut self, area: AreaId, pickable: bool);
    /// Release the area.
    fn area_free(&mut self, area: AreaId);
}

/// A body or an area, dispatching each call to the matching half of [`PhysicsServer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PhysicsObject {
    /// A physics body.
    Body(BodyId),
    /// A physics area.
    Area(AreaId),
}

impl PhysicsObject {
    /// Whether this is an area.
    pub fn is_area(self) -> bool {
        matches!(self, Self::Area(_))
    }

    /// Append a shape.
    pub fn add_shape(
        self,
        server: &mut dyn PhysicsServer,
        shape: Arc<Shape>,
        transform: Affine,
        disabled: bool,
    ) {
        match self {
            Self::Body(b) => server.body_add_shape(b, shape, transform, disabled),
            Self::Area(a) => server.area_add_shape(a, shape, transform, disabled),
        }
    }

    /// Remove the shape at `index`.
    pub fn remove_shape(self, server: &mut dyn PhysicsServer, index: usize) {
        match self {
            Self::Body(b) => server.body_remove_shape(b, index),
            Self::Area(a) => server.area_remove_shape(a, index),
        }
    }

    /// Set the local transform of the shape at `index`.
    pub fn set_shape_transform(self, server: &mut dyn PhysicsServer, index: usize, transform: Affine) {
        match self {
            Self::Body(b) => server.body_set_shape_transform(b, index, transform),
            Self::Area(a) => server.area_set_shape_transform(a, index, transform),
        }
    }

    /// Enable or disable the shape at `index`.
    pub fn set_shape_disabled(self, server: &mut dyn PhysicsServer, index: usize, disabled: bool) {
        match self {
            Self::Body(b) => server.body_set_shape_disabled(b, index, disabled),
            Self::Area(a) => server.area_set_shape_disabled(a, index, disabled),
        }
    }

    /// Configure one-way collision for the shape at `index`.
    ///
    /// Areas have no one-way collision; the call is ignored for them.
    pub fn set_shape_one_way_collision(
        self,
        server: &mut dyn PhysicsServer,
        index: usize,
        enabled: bool,
        margin: f64,
    ) {
        if let Self::Body(b) = self {
            server.body_set_shape_as_one_way_collision(b, index, enabled, margin);
        }
    }

    /// Set the object's transform.
    pub fn set_transform(self, server: &mut dyn PhysicsServer, transform: Affine) {
        match self {
            Self::Body(b) => server.body_set_state_transform(b, transform),
            Self::Area(a) => server.area_set_transform(a, transform),
        }
    }

    /// Move into a space, or out of every space.
    pub fn set_space(self, server: &mut dyn PhysicsServer, space: Option<SpaceId>) {
        match self {
            Self::Body(b) => server.body_set_space(b, space),
            Self::Area(a) => server.area_set_space(a, space),
        }
    }

    /// Attach the owning object.
    pub fn attach_object_instance(self, server: &mut dyn PhysicsServer, instance: ObjectInstance) {
        match self {
            Self::Body(b) => server.body_attach_object_instance(b, instance),
            Self::Area(a) => server.area_attach_object_instance(a, instance),
        }
    }

    /// Whether the object receives pointer picks.
    pub fn set_pickable(self, server: &mut dyn PhysicsServer, pickable: bool) {
        match self {
            Self::Body(b) => server.body_set_pickable(b, pickable),
            Self::Area(a) => server.area_set_pickable(a, pickable),
        }
    }

    /// Set the layers the object is in.
    pub fn set_collision_layer(self, server: &mut dyn PhysicsServer, layer: u32) {
        match self {
            Self::Body(b) => server.body_set_collision_layer(b, layer),
            Self::Area(a) => server.area_set_collision_layer(a, layer),
        }
    }

    /// Set the layers the object scans.
    pub fn set_collision_mask(self, server: &mut dyn PhysicsServer, mask: u32) {
        match self {
            Self::Body(b) => server.body_set_collision_mask(b, mask),
            Self::Area(a) => server.area_set_collision_mask(a, mask),
        }
    }

    /// Release the object.
    pub fn free(self, server: &mut dyn PhysicsServer) {
        match self {
            Self::Body(b) => server.body_free(b),
            Self::Area(a) => server.area_free(a),
        }
    }
}
