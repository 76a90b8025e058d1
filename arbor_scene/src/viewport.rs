// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewports and canvas layers: the nodes that own render canvases and physics spaces.

use arbor_server::{CanvasId, PhysicsServer, RenderServer, SpaceId};
use kurbo::Affine;

use crate::tree::SceneTree;
use crate::types::{NodeId, NodeKind};

/// The render canvas and physics space shared by everything below a viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct World2D {
    /// Canvas that top-level items below the viewport attach to.
    pub canvas: CanvasId,
    /// Space that collision objects below the viewport join.
    pub space: SpaceId,
}

#[derive(Clone, Debug)]
pub(crate) struct Viewport {
    pub(crate) world: World2D,
    pub(crate) canvas_transform: Affine,
}

#[derive(Clone, Debug)]
pub(crate) struct CanvasLayer {
    pub(crate) canvas: CanvasId,
    pub(crate) layer: i32,
    pub(crate) transform: Affine,
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    /// Create a detached viewport with its own canvas and physics space.
    pub fn create_viewport(&mut self) -> NodeId {
        let id = self.alloc_node(NodeKind::Viewport, None);
        let world = World2D {
            canvas: self.render.canvas_create(),
            space: self.physics.space_create(),
        };
        self.viewports.insert(
            id,
            Viewport {
                world,
                canvas_transform: Affine::IDENTITY,
            },
        );
        id
    }

    /// Create a detached canvas layer on stacking layer `1`.
    pub fn create_canvas_layer(&mut self) -> NodeId {
        let id = self.alloc_node(NodeKind::CanvasLayer, None);
        let canvas = self.render.canvas_create();
        self.render.canvas_set_layer(canvas, 1);
        self.canvas_layers.insert(
            id,
            CanvasLayer {
                canvas,
                layer: 1,
                transform: Affine::IDENTITY,
            },
        );
        id
    }

    /// The world owned by a viewport node.
    pub fn world(&self, viewport: NodeId) -> World2D {
        self.viewports
            .get(&viewport)
            .expect("node is not a viewport")
            .world
    }

    /// The world of the nearest viewport at or above `id`.
    pub fn world_2d(&self, id: NodeId) -> Option<World2D> {
        self.nearest_viewport(id).map(|v| self.world(v))
    }

    pub(crate) fn nearest_viewport(&self, mut id: NodeId) -> Option<NodeId> {
        loop {
            if self.viewports.contains_key(&id) {
                return Some(id);
            }
            id = self.parent_of(id)?;
        }
    }

    /// Walk up from `id` to the nearest canvas layer or viewport, whichever comes first.
    ///
    /// Returns the canvas found and, if it belongs to a layer, the layer node.
    pub(crate) fn resolve_canvas(&self, mut id: NodeId) -> Option<(CanvasId, Option<NodeId>)> {
        loop {
            if let Some(layer) = self.canvas_layers.get(&id) {
                return Some((layer.canvas, Some(id)));
            }
            if let Some(viewport) = self.viewports.get(&id) {
                return Some((viewport.world.canvas, None));
            }
            id = self.parent_of(id)?;
        }
    }

    /// Set the transform applied to a viewport's whole canvas.
    pub fn set_canvas_transform(&mut self, viewport: NodeId, transform: Affine) {
        let vp = self
            .viewports
            .get_mut(&viewport)
            .expect("node is not a viewport");
        vp.canvas_transform = transform;
        self.render.canvas_set_transform(vp.world.canvas, transform);
    }

    /// The transform applied to a viewport's whole canvas.
    pub fn viewport_canvas_transform(&self, viewport: NodeId) -> Affine {
        self.viewports
            .get(&viewport)
            .expect("node is not a viewport")
            .canvas_transform
    }

    /// Set a canvas layer's transform.
    pub fn set_canvas_layer_transform(&mut self, layer: NodeId, transform: Affine) {
        let cl = self
            .canvas_layers
            .get_mut(&layer)
            .expect("node is not a canvas layer");
        cl.transform = transform;
        self.render.canvas_set_transform(cl.canvas, transform);
    }

    /// Set a canvas layer's stacking index.
    pub fn set_canvas_layer_layer(&mut self, layer: NodeId, index: i32) {
        let cl = self
            .canvas_layers
            .get_mut(&layer)
            .expect("node is not a canvas layer");
        cl.layer = index;
        self.render.canvas_set_layer(cl.canvas, index);
    }

    /// A canvas layer's stacking index.
    pub fn canvas_layer_layer(&self, layer: NodeId) -> i32 {
        self.canvas_layers
            .get(&layer)
            .expect("node is not a canvas layer")
            .layer
    }

    /// The canvas owned by a canvas layer.
    pub fn canvas_layer_canvas(&self, layer: NodeId) -> CanvasId {
        self.canvas_layers
            .get(&layer)
            .expect("node is not a canvas layer")
            .canvas
    }
}

#[cfg(test)]
mod tests {
    use crate::SceneTree;
    use arbor_server::CanvasParent;
    use kurbo::Affine;

    #[test]
    fn items_under_a_layer_attach_to_its_canvas() {
        let mut tree = SceneTree::new();
        let layer = tree.create_canvas_layer();
        let item = tree.create_node_2d();
        tree.add_child(layer, item);
        tree.add_child(tree.root(), layer);
        let canvas = tree.canvas_layer_canvas(layer);
        assert_eq!(tree.canvas(item), Some(canvas));
        assert_eq!(tree.canvas_layer(item), Some(layer));
        let record = tree.render().canvas_item(tree.canvas_item(item)).unwrap();
        assert_eq!(record.parent, CanvasParent::Canvas(canvas));

        tree.set_canvas_layer_transform(layer, Affine::translate((4.0, 0.0)));
        assert_eq!(tree.canvas_transform(item), Affine::translate((4.0, 0.0)));
    }

    #[test]
    fn freeing_a_viewport_releases_its_world() {
        let mut tree = SceneTree::new();
        let vp = tree.create_viewport();
        let world = tree.world(vp);
        assert!(tree.physics().has_space(world.space));
        tree.free(vp);
        assert!(!tree.physics().has_space(world.space));
        assert!(tree.render().canvas(world.canvas).is_none());
    }
}
