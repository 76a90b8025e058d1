// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node2D: position, rotation, scale and skew over a canvas item's local transform.

use arbor_server::{PhysicsServer, RenderServer};
use kurbo::{Affine, Point, Vec2};

use crate::transform::{self, clamp_scale, compose};
use crate::tree::SceneTree;
use crate::types::{NodeId, NodeKind};

/// Lowest z index a canvas item may have.
pub const Z_MIN: i32 = -4096;
/// Highest z index a canvas item may have.
pub const Z_MAX: i32 = 4096;

/// Decomposed local transform.
///
/// When `xform_dirty` is set the matrix was written directly and the decomposed fields are
/// stale; they are recovered from the matrix before the next field write.
#[derive(Clone, Debug)]
pub(crate) struct Node2D {
    position: Point,
    rotation: f64,
    scale: Vec2,
    skew: f64,
    pub(crate) transform: Affine,
    xform_dirty: bool,
    z_index: i32,
    z_relative: bool,
}

impl Default for Node2D {
    fn default() -> Self {
        Self {
            position: Point::ORIGIN,
            rotation: 0.0,
            scale: Vec2::new(1.0, 1.0),
            skew: 0.0,
            transform: Affine::IDENTITY,
            xform_dirty: false,
            z_index: 0,
            z_relative: true,
        }
    }
}

impl Node2D {
    fn sync(&mut self) {
        if self.xform_dirty {
            self.position = transform::origin(self.transform);
            self.rotation = transform::rotation(self.transform);
            self.scale = transform::scale(self.transform);
            self.skew = transform::skew(self.transform);
            self.xform_dirty = false;
        }
    }

    fn position(&self) -> Point {
        if self.xform_dirty {
            transform::origin(self.transform)
        } else {
            self.position
        }
    }

    fn rotation(&self) -> f64 {
        if self.xform_dirty {
            transform::rotation(self.transform)
        } else {
            self.rotation
        }
    }

    fn scale(&self) -> Vec2 {
        if self.xform_dirty {
            transform::scale(self.transform)
        } else {
            self.scale
        }
    }

    fn skew(&self) -> f64 {
        if self.xform_dirty {
            transform::skew(self.transform)
        } else {
            self.skew
        }
    }
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    /// Create a detached Node2D.
    pub fn create_node_2d(&mut self) -> NodeId {
        self.alloc_canvas_item(NodeKind::Node2D)
    }

    fn n2d(&self, id: NodeId) -> &Node2D {
        self.node(id)
            .node_2d
            .as_ref()
            .expect("node is not a Node2D")
    }

    fn n2d_mut(&mut self, id: NodeId) -> &mut Node2D {
        self.node_mut(id)
            .node_2d
            .as_mut()
            .expect("node is not a Node2D")
    }

    /// Write one or more decomposed fields, then recompose and push the matrix.
    fn edit_decomposed(&mut self, id: NodeId, edit: impl FnOnce(&mut Node2D)) {
        let n = self.n2d_mut(id);
        n.sync();
        edit(n);
        n.transform = compose(n.position, n.rotation, n.scale, n.skew);
        self.push_local_transform(id);
    }

    fn push_local_transform(&mut self, id: NodeId) {
        let transform = self.n2d(id).transform;
        let handle = self.item(id).handle;
        self.render.canvas_item_set_transform(handle, transform);
        self.notify_transform(id);
    }

    /// Local position.
    pub fn position(&self, id: NodeId) -> Point {
        self.n2d(id).position()
    }

    /// Set the local position.
    pub fn set_position(&mut self, id: NodeId, position: Point) {
        self.edit_decomposed(id, |n| n.position = position);
    }

    /// Local rotation in radians.
    pub fn rotation(&self, id: NodeId) -> f64 {
        self.n2d(id).rotation()
    }

    /// Set the local rotation in radians.
    pub fn set_rotation(&mut self, id: NodeId, radians: f64) {
        self.edit_decomposed(id, |n| n.rotation = radians);
    }

    /// Local rotation in degrees.
    pub fn rotation_degrees(&self, id: NodeId) -> f64 {
        self.rotation(id).to_degrees()
    }

    /// Set the local rotation in degrees.
    pub fn set_rotation_degrees(&mut self, id: NodeId, degrees: f64) {
        self.set_rotation(id, degrees.to_radians());
    }

    /// Local scale.
    pub fn scale(&self, id: NodeId) -> Vec2 {
        self.n2d(id).scale()
    }

    /// Set the local scale. Zero components are replaced by a tiny epsilon.
    pub fn set_scale(&mut self, id: NodeId, scale: Vec2) {
        let scale = clamp_scale(scale);
        self.edit_decomposed(id, |n| n.scale = scale);
    }

    /// Local skew in radians.
    pub fn skew(&self, id: NodeId) -> f64 {
        self.n2d(id).skew()
    }

    /// Set the local skew in radians.
    pub fn set_skew(&mut self, id: NodeId, radians: f64) {
        self.edit_decomposed(id, |n| n.skew = radians);
    }

    /// The local transform matrix.
    pub fn transform(&self, id: NodeId) -> Affine {
        self.n2d(id).transform
    }

    /// Replace the local transform matrix.
    pub fn set_transform(&mut self, id: NodeId, transform: Affine) {
        let n = self.n2d_mut(id);
        n.transform = transform;
        n.xform_dirty = true;
        self.push_local_transform(id);
    }

    /// Offset the local position.
    pub fn translate(&mut self, id: NodeId, offset: Vec2) {
        let position = self.position(id);
        self.set_position(id, position + offset);
    }

    /// Add to the local rotation.
    pub fn rotate(&mut self, id: NodeId, radians: f64) {
        let rotation = self.rotation(id);
        self.set_rotation(id, rotation + radians);
    }

    /// Multiply the local scale component-wise.
    pub fn apply_scale(&mut self, id: NodeId, ratio: Vec2) {
        let scale = self.scale(id);
        self.set_scale(id, Vec2::new(scale.x * ratio.x, scale.y * ratio.y));
    }

    /// Move along the local x axis. Unscaled moves use the normalized axis.
    pub fn move_local_x(&mut self, id: NodeId, delta: f64, scaled: bool) {
        self.move_along(id, transform::x_axis(self.transform(id)), delta, scaled);
    }

    /// Move along the local y axis. Unscaled moves use the normalized axis.
    pub fn move_local_y(&mut self, id: NodeId, delta: f64, scaled: bool) {
        self.move_along(id, transform::y_axis(self.transform(id)), delta, scaled);
    }

    fn move_along(&mut self, id: NodeId, axis: Vec2, delta: f64, scaled: bool) {
        let axis = if scaled { axis } else { axis.normalize() };
        let origin = transform::origin(self.transform(id));
        self.set_position(id, origin + axis * delta);
    }

    /// Position in canvas space.
    pub fn global_position(&self, id: NodeId) -> Point {
        transform::origin(self.global_transform(id))
    }

    /// Move the node so that its canvas-space position is `position`.
    pub fn set_global_position(&mut self, id: NodeId, position: Point) {
        let local = match self.parent_item(id) {
            Some(parent) => self.global_transform(parent).inverse() * position,
            None => position,
        };
        self.set_position(id, local);
    }

    /// Rotation in canvas space.
    pub fn global_rotation(&self, id: NodeId) -> f64 {
        transform::rotation(self.global_transform(id))
    }

    /// Rotate the node so that its canvas-space rotation is `radians`.
    pub fn set_global_rotation(&mut self, id: NodeId, radians: f64) {
        let parent_rotation = self
            .parent_item(id)
            .map_or(0.0, |p| transform::rotation(self.global_transform(p)));
        self.set_rotation(id, radians - parent_rotation);
    }

    /// Scale in canvas space.
    pub fn global_scale(&self, id: NodeId) -> Vec2 {
        transform::scale(self.global_transform(id))
    }

    /// Scale the node so that its canvas-space scale is `scale`.
    pub fn set_global_scale(&mut self, id: NodeId, scale: Vec2) {
        let local = match self.parent_item(id) {
            Some(parent) => {
                let parent_scale = transform::scale(self.global_transform(parent));
                Vec2::new(scale.x / parent_scale.x, scale.y / parent_scale.y)
            }
            None => scale,
        };
        self.set_scale(id, local);
    }

    /// Replace the local transform so that the canvas-space transform is `transform`.
    pub fn set_global_transform(&mut self, id: NodeId, transform: Affine) {
        let local = match self.parent_item(id) {
            Some(parent) => self.global_transform(parent).inverse() * transform,
            None => transform,
        };
        self.set_transform(id, local);
    }

    /// Convert a canvas-space point into the node's local space.
    pub fn to_local(&self, id: NodeId, point: Point) -> Point {
        self.global_transform(id).inverse() * point
    }

    /// Convert a local point into canvas space.
    pub fn to_global(&self, id: NodeId, point: Point) -> Point {
        self.global_transform(id) * point
    }

    /// Angle between the node's x axis and the direction to a canvas-space point.
    pub fn angle_to_point(&self, id: NodeId, point: Point) -> f64 {
        let local = self.to_local(id, point);
        let scale = self.scale(id);
        Vec2::new(local.x * scale.x, local.y * scale.y).atan2()
    }

    /// Rotate the node so that its x axis points at a canvas-space point.
    pub fn look_at(&mut self, id: NodeId, point: Point) {
        let angle = self.angle_to_point(id, point);
        self.rotate(id, angle);
    }

    /// The transform from this node's space into `ancestor`'s space.
    ///
    /// # Panics
    ///
    /// Panics if the chain up to `ancestor` passes through a node without a 2D transform.
    pub fn relative_transform_to_parent(&self, id: NodeId, ancestor: NodeId) -> Affine {
        let mut result = Affine::IDENTITY;
        let mut current = id;
        while current != ancestor {
            result = self.transform(current) * result;
            let parent = self
                .parent_of(current)
                .filter(|p| self.kind(*p).is_node_2d() || *p == ancestor)
                .expect("ancestor chain is not made of 2D nodes");
            current = parent;
        }
        result
    }

    /// Draw order within the parent, clamped to `Z_MIN..=Z_MAX`.
    pub fn set_z_index(&mut self, id: NodeId, z: i32) {
        let z = z.clamp(Z_MIN, Z_MAX);
        self.n2d_mut(id).z_index = z;
        let handle = self.item(id).handle;
        self.render.canvas_item_set_z_index(handle, z);
    }

    /// Draw order within the parent.
    pub fn z_index(&self, id: NodeId) -> i32 {
        self.n2d(id).z_index
    }

    /// Whether the z index adds to the parent's.
    pub fn set_z_as_relative(&mut self, id: NodeId, relative: bool) {
        self.n2d_mut(id).z_relative = relative;
        let handle = self.item(id).handle;
        self.render
            .canvas_item_set_z_as_relative_to_parent(handle, relative);
    }

    /// Whether the z index adds to the parent's.
    pub fn is_z_relative(&self, id: NodeId) -> bool {
        self.n2d(id).z_relative
    }
}

#[cfg(test)]
mod tests {
    use crate::SceneTree;
    use core::f64::consts::FRAC_PI_2;
    use kurbo::{Affine, Point, Vec2};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn approx_pt(a: Point, b: Point) -> bool {
        approx(a.x, b.x) && approx(a.y, b.y)
    }

    #[test]
    fn fields_are_recovered_after_a_matrix_write() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.set_transform(
            n,
            Affine::translate((3.0, 4.0)) * Affine::rotate(0.25) * Affine::scale(2.0),
        );
        assert!(approx_pt(tree.position(n), Point::new(3.0, 4.0)));
        assert!(approx(tree.rotation(n), 0.25));
        assert!(approx(tree.scale(n).x, 2.0) && approx(tree.scale(n).y, 2.0));

        tree.set_rotation(n, 0.0);
        assert!(approx_pt(tree.position(n), Point::new(3.0, 4.0)), "position kept");
        assert!(approx(tree.scale(n).x, 2.0), "scale kept");
        let record = tree.render().canvas_item(tree.canvas_item(n)).unwrap();
        assert_eq!(record.transform, tree.transform(n), "matrix pushed on write");
    }

    #[test]
    fn zero_scale_is_clamped() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.set_scale(n, Vec2::new(0.0, 1.0));
        assert!(tree.scale(n).x > 0.0);
        assert!(tree.transform(n).determinant() != 0.0);
    }

    #[test]
    fn global_setters_go_through_the_parent() {
        let mut tree = SceneTree::new();
        let parent = tree.create_node_2d();
        let child = tree.create_node_2d();
        tree.add_child(tree.root(), parent);
        tree.add_child(parent, child);
        tree.set_position(parent, Point::new(10.0, 10.0));
        tree.set_rotation(parent, FRAC_PI_2);
        tree.set_scale(parent, Vec2::new(2.0, 2.0));

        tree.set_global_position(child, Point::new(10.0, 14.0));
        assert!(approx_pt(tree.position(child), Point::new(2.0, 0.0)));
        assert!(approx_pt(tree.global_position(child), Point::new(10.0, 14.0)));

        tree.set_global_rotation(child, 0.0);
        assert!(approx(tree.global_rotation(child), 0.0));
        tree.set_global_scale(child, Vec2::new(1.0, 1.0));
        assert!(approx(tree.global_scale(child).x, 1.0));
    }

    #[test]
    fn look_at_points_the_x_axis() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.add_child(tree.root(), n);
        tree.set_position(n, Point::new(1.0, 1.0));
        tree.look_at(n, Point::new(1.0, 5.0));
        assert!(approx(tree.rotation(n), FRAC_PI_2));
        tree.move_local_x(n, 2.0, false);
        assert!(approx_pt(tree.position(n), Point::new(1.0, 3.0)));
    }

    #[test]
    fn relative_transform_multiplies_up_to_the_ancestor() {
        let mut tree = SceneTree::new();
        let a = tree.create_node_2d();
        let b = tree.create_node_2d();
        let c = tree.create_node_2d();
        tree.add_child(a, b);
        tree.add_child(b, c);
        tree.set_position(b, Point::new(1.0, 0.0));
        tree.set_position(c, Point::new(0.0, 2.0));
        let rel = tree.relative_transform_to_parent(c, a);
        assert_eq!(rel * Point::ORIGIN, Point::new(1.0, 2.0));
        assert_eq!(tree.relative_transform_to_parent(c, c), Affine::IDENTITY);
    }

    #[test]
    fn z_index_is_clamped() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.set_z_index(n, 10_000);
        assert_eq!(tree.z_index(n), super::Z_MAX);
        let record = tree.render().canvas_item(tree.canvas_item(n)).unwrap();
        assert_eq!(record.z_index, super::Z_MAX);
    }
}
