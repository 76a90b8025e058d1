// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CollisionShape2D and CollisionPolygon2D: nodes that register shapes on their parent
//! collision object.

use alloc::sync::Arc;
use alloc::vec::Vec;

use arbor_server::{Color, PhysicsServer, RenderServer, Shape};
use kurbo::Point;

use super::owners::ShapeOwnerId;
use super::polygon::decompose_in_convex;
use crate::draw::{outline, DrawContext};
use crate::tree::SceneTree;
use crate::types::{NodeId, NodeKind, Notification};

/// Default color for debug collision drawing.
pub const DEBUG_COLLISIONS_COLOR: Color = Color::new(0.0, 0.6, 0.7, 0.42);

const DEBUG_OUTLINE_COLOR: Color = Color::new(0.9, 0.2, 0.0, 0.8);

/// How a collision polygon is turned into physics shapes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Convex pieces covering the polygon's interior.
    #[default]
    Solids,
    /// The closed outline as line segments.
    Segments,
}

#[derive(Clone, Debug)]
enum ShapeSource {
    Single(Option<Arc<Shape>>),
    Polygon {
        points: Vec<Point>,
        build_mode: BuildMode,
    },
}

/// State of a CollisionShape2D or CollisionPolygon2D node.
#[derive(Clone, Debug)]
pub(crate) struct CollisionShapeNode {
    parent: Option<NodeId>,
    owner: Option<ShapeOwnerId>,
    disabled: bool,
    one_way: bool,
    one_way_margin: f64,
    source: ShapeSource,
}

impl CollisionShapeNode {
    fn new(source: ShapeSource) -> Self {
        Self {
            parent: None,
            owner: None,
            disabled: false,
            one_way: false,
            one_way_margin: 1.0,
            source,
        }
    }

    fn linked(&self) -> Option<(NodeId, ShapeOwnerId)> {
        self.parent.zip(self.owner)
    }

    /// The physics shapes this node contributes.
    fn build(&self) -> Vec<Arc<Shape>> {
        match &self.source {
            ShapeSource::Single(shape) => shape.iter().cloned().collect(),
            ShapeSource::Polygon { points, .. } if points.is_empty() => Vec::new(),
            ShapeSource::Polygon {
                points,
                build_mode: BuildMode::Solids,
            } => {
                if points.len() < 3 {
                    log::warn!(
                        "collision polygon with {} points cannot be built as solids",
                        points.len()
                    );
                    return Vec::new();
                }
                decompose_in_convex(points)
                    .into_iter()
                    .map(|points| Arc::new(Shape::ConvexPolygon { points }))
                    .collect()
            }
            ShapeSource::Polygon {
                points,
                build_mode: BuildMode::Segments,
            } => {
                let segments = outline(points)
                    .into_iter()
                    .flat_map(|(a, b)| [a, b])
                    .collect();
                alloc::vec![Arc::new(Shape::ConcavePolygon { segments })]
            }
        }
    }
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    /// Create a detached CollisionShape2D.
    pub fn create_collision_shape_2d(&mut self, shape: Option<Arc<Shape>>) -> NodeId {
        let id = self.alloc_canvas_item(NodeKind::CollisionShape2D);
        self.shape_nodes
            .insert(id, CollisionShapeNode::new(ShapeSource::Single(shape)));
        self.set_notify_local_transform(id, true);
        id
    }

    /// Create a detached CollisionPolygon2D.
    pub fn create_collision_polygon_2d(&mut self, points: Vec<Point>, build_mode: BuildMode) -> NodeId {
        let id = self.alloc_canvas_item(NodeKind::CollisionPolygon2D);
        self.shape_nodes.insert(
            id,
            CollisionShapeNode::new(ShapeSource::Polygon { points, build_mode }),
        );
        self.set_notify_local_transform(id, true);
        id
    }

    fn shape_node(&self, id: NodeId) -> &CollisionShapeNode {
        self.shape_nodes
            .get(&id)
            .expect("node is not a collision shape or polygon")
    }

    fn shape_node_mut(&mut self, id: NodeId) -> &mut CollisionShapeNode {
        self.shape_nodes
            .get_mut(&id)
            .expect("node is not a collision shape or polygon")
    }

    pub(crate) fn collision_shape_notification(&mut self, id: NodeId, what: Notification) {
        match what {
            Notification::Parented => {
                let Some(parent) = self.parent_of(id).filter(|p| self.is_collision_object(*p))
                else {
                    return;
                };
                let owner = self.create_shape_owner(parent, id);
                let node = self.shape_node_mut(id);
                node.parent = Some(parent);
                node.owner = Some(owner);
                self.rebuild_owner_shapes(id);
                self.update_in_shape_owner(id, false);
            }
            Notification::EnterTree => self.update_in_shape_owner(id, false),
            Notification::LocalTransformChanged => self.update_in_shape_owner(id, true),
            Notification::Unparented => {
                let node = self.shape_node_mut(id);
                let linked = node.linked();
                node.parent = None;
                node.owner = None;
                if let Some((parent, owner)) = linked {
                    self.remove_shape_owner(parent, owner);
                }
            }
            Notification::Draw => self.draw_collision_debug(id),
            _ => {}
        }
    }

    fn rebuild_owner_shapes(&mut self, id: NodeId) {
        let node = self.shape_node(id);
        let Some((parent, owner)) = node.linked() else {
            return;
        };
        let shapes = node.build();
        self.shape_owner_clear_shapes(parent, owner);
        for shape in shapes {
            self.shape_owner_add_shape(parent, owner, shape);
        }
    }

    fn update_in_shape_owner(&mut self, id: NodeId, transform_only: bool) {
        let node = self.shape_node(id);
        let Some((parent, owner)) = node.linked() else {
            return;
        };
        let (disabled, one_way, margin) = (node.disabled, node.one_way, node.one_way_margin);
        let transform = self.transform(id);
        self.shape_owner_set_transform(parent, owner, transform);
        if transform_only {
            return;
        }
        self.shape_owner_set_disabled(parent, owner, disabled);
        self.shape_owner_set_one_way_collision(parent, owner, one_way);
        self.shape_owner_set_one_way_collision_margin(parent, owner, margin);
    }

    fn draw_collision_debug(&mut self, id: NodeId) {
        if !self.debug_collisions {
            return;
        }
        let node = self.shape_node(id);
        let color = if node.disabled {
            DEBUG_COLLISIONS_COLOR.grayscale()
        } else {
            DEBUG_COLLISIONS_COLOR
        };
        let source = node.source.clone();
        let handle = self.item(id).handle;
        let mut ctx = DrawContext::new(&mut self.render, handle);
        match source {
            ShapeSource::Single(Some(shape)) => ctx.draw_shape(&shape, color),
            ShapeSource::Single(None) => {}
            ShapeSource::Polygon { points, .. } => {
                for (a, b) in outline(&points) {
                    ctx.draw_line(a, b, DEBUG_OUTLINE_COLOR, 3.0);
                }
                if points.len() >= 3 {
                    ctx.draw_polygon(&points, color);
                }
            }
        }
    }

    /// Replace the shape of a CollisionShape2D.
    pub fn set_shape(&mut self, id: NodeId, shape: Option<Arc<Shape>>) {
        let node = self.shape_node_mut(id);
        assert!(
            matches!(node.source, ShapeSource::Single(_)),
            "node is not a CollisionShape2D"
        );
        node.source = ShapeSource::Single(shape);
        self.rebuild_owner_shapes(id);
        self.update(id);
    }

    /// The shape of a CollisionShape2D.
    pub fn shape(&self, id: NodeId) -> Option<&Arc<Shape>> {
        match &self.shape_node(id).source {
            ShapeSource::Single(shape) => shape.as_ref(),
            ShapeSource::Polygon { .. } => None,
        }
    }

    /// Replace the outline of a CollisionPolygon2D.
    pub fn set_polygon(&mut self, id: NodeId, polygon: Vec<Point>) {
        let ShapeSource::Polygon { points, .. } = &mut self.shape_node_mut(id).source else {
            panic!("node is not a CollisionPolygon2D");
        };
        *points = polygon;
        self.rebuild_owner_shapes(id);
        self.update_in_shape_owner(id, false);
        self.update(id);
    }

    /// The outline of a CollisionPolygon2D.
    pub fn polygon(&self, id: NodeId) -> &[Point] {
        match &self.shape_node(id).source {
            ShapeSource::Polygon { points, .. } => points,
            ShapeSource::Single(_) => &[],
        }
    }

    /// Choose how a CollisionPolygon2D builds its shapes.
    pub fn set_build_mode(&mut self, id: NodeId, mode: BuildMode) {
        let ShapeSource::Polygon { build_mode, .. } = &mut self.shape_node_mut(id).source else {
            panic!("node is not a CollisionPolygon2D");
        };
        *build_mode = mode;
        self.rebuild_owner_shapes(id);
        self.update_in_shape_owner(id, false);
        self.update(id);
    }

    /// How a CollisionPolygon2D builds its shapes.
    pub fn build_mode(&self, id: NodeId) -> BuildMode {
        match &self.shape_node(id).source {
            ShapeSource::Polygon { build_mode, .. } => *build_mode,
            ShapeSource::Single(_) => BuildMode::default(),
        }
    }

    /// Disable the node's shapes.
    pub fn set_shape_disabled(&mut self, id: NodeId, disabled: bool) {
        let node = self.shape_node_mut(id);
        node.disabled = disabled;
        if let Some((parent, owner)) = node.linked() {
            self.shape_owner_set_disabled(parent, owner, disabled);
        }
        self.update(id);
    }

    /// Whether the node's shapes are disabled.
    pub fn is_shape_disabled(&self, id: NodeId) -> bool {
        self.shape_node(id).disabled
    }

    /// Make the node's shapes collide only against their facing side.
    pub fn set_one_way_collision(&mut self, id: NodeId, enabled: bool) {
        let node = self.shape_node_mut(id);
        node.one_way = enabled;
        if let Some((parent, owner)) = node.linked() {
            self.shape_owner_set_one_way_collision(parent, owner, enabled);
        }
        self.update(id);
    }

    /// Whether the node's shapes collide one way.
    pub fn is_one_way_collision_enabled(&self, id: NodeId) -> bool {
        self.shape_node(id).one_way
    }

    /// Set the one-way collision margin.
    pub fn set_one_way_collision_margin(&mut self, id: NodeId, margin: f64) {
        let node = self.shape_node_mut(id);
        node.one_way_margin = margin;
        if let Some((parent, owner)) = node.linked() {
            self.shape_owner_set_one_way_collision_margin(parent, owner, margin);
        }
    }

    /// The one-way collision margin.
    pub fn one_way_collision_margin(&self, id: NodeId) -> f64 {
        self.shape_node(id).one_way_margin
    }

    /// The shape owner a shape node registered on its parent, if any.
    pub fn shape_owner_of(&self, id: NodeId) -> Option<ShapeOwnerId> {
        self.shape_node(id).owner
    }
}
