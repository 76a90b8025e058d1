// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render server contract.

use alloc::vec::Vec;
use kurbo::{Affine, Point, Rect, Size};

use crate::{CanvasId, CanvasItemId, Color, MaterialId, TextureId};

/// A texture as seen by the scene graph: a handle plus its pixel size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Texture {
    /// Server handle.
    pub id: TextureId,
    /// Full size in pixels.
    pub size: Size,
}

/// Where a canvas item hangs in the draw hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum CanvasParent {
    /// Detached; the item is not drawn.
    #[default]
    None,
    /// Attached directly to a canvas root.
    Canvas(CanvasId),
    /// Attached under another canvas item, inheriting its transform.
    Item(CanvasItemId),
}

/// One entry of a canvas item's command buffer.
///
/// Rectangles used as draw destinations are not normalized: a negative width or height
/// means the texture is mirrored along that axis.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// A straight line.
    Line {
        /// Start point.
        from: Point,
        /// End point.
        to: Point,
        /// Stroke color.
        color: Color,
        /// Stroke width.
        width: f64,
    },
    /// An axis-aligned rectangle, filled or outlined.
    Rect {
        /// Rectangle in item space.
        rect: Rect,
        /// Fill or stroke color.
        color: Color,
        /// Whether the rectangle is filled.
        filled: bool,
    },
    /// A filled circle.
    Circle {
        /// Center in item space.
        center: Point,
        /// Radius.
        radius: f64,
        /// Fill color.
        color: Color,
    },
    /// A filled polygon.
    Polygon {
        /// Polygon vertices.
        points: Vec<Point>,
        /// Fill color.
        color: Color,
    },
    /// A whole texture stretched over a rectangle.
    TextureRect {
        /// Texture to draw.
        texture: TextureId,
        /// Destination rectangle.
        rect: Rect,
        /// Modulation color.
        modulate: Color,
        /// Swap the texture axes.
        transpose: bool,
    },
    /// A sub-region of a texture stretched over a rectangle.
    TextureRectRegion {
        /// Texture to draw.
        texture: TextureId,
        /// Destination rectangle.
        rect: Rect,
        /// Source region in texture pixels.
        source: Rect,
        /// Modulation color.
        modulate: Color,
        /// Swap the texture axes.
        transpose: bool,
        /// Clamp sampling to the source region.
        clip_uv: bool,
    },
    /// A texture drawn as a nine-patch with fixed margins.
    NinePatch {
        /// Texture to draw.
        texture: TextureId,
        /// Destination rectangle.
        rect: Rect,
        /// Source region in texture pixels.
        source: Rect,
        /// Left, top, right and bottom margins in pixels.
        margins: [f64; 4],
        /// Whether the center patch is drawn.
        draw_center: bool,
        /// Modulation color.
        modulate: Color,
    },
    /// Replace the transform applied to subsequent commands.
    SetTransform(Affine),
}

/// The render backend consumed by the scene graph.
///
/// Every method is a fire-and-forget state push. Geometry is passed by value; nothing
/// handed to the server is expected to outlive the call on the caller's side.
pub trait RenderServer {
    /// Create a canvas root.
    fn canvas_create(&mut self) -> CanvasId;
    /// Release a canvas root.
    fn canvas_free(&mut self, canvas: CanvasId);
    /// Set the transform applied to everything drawn on `canvas`.
    fn canvas_set_transform(&mut self, canvas: CanvasId, transform: Affine);
    /// Set the stacking layer of `canvas`.
    fn canvas_set_layer(&mut self, canvas: CanvasId, layer: i32);

    /// Create a detached, empty canvas item.
    fn canvas_item_create(&mut self) -> CanvasItemId;
    /// Release a canvas item.
    fn canvas_item_free(&mut self, item: CanvasItemId);
    /// Attach `item` to a canvas or another item, or detach it.
    fn canvas_item_set_parent(&mut self, item: CanvasItemId, parent: CanvasParent);
    /// Set the draw order of `item` among its siblings.
    fn canvas_item_set_draw_index(&mut self, item: CanvasItemId, index: i32);
    /// Set the transform of `item` relative to its parent.
    fn canvas_item_set_transform(&mut self, item: CanvasItemId, transform: Affine);
    /// Show or hide `item` and its children.
    fn canvas_item_set_visible(&mut self, item: CanvasItemId, visible: bool);
    /// Set the modulation inherited by children.
    fn canvas_item_set_modulate(&mut self, item: CanvasItemId, color: Color);
    /// Set the modulation applied to this item only.
    fn canvas_item_set_self_modulate(&mut self, item: CanvasItemId, color: Color);
    /// Set or clear the material.
    fn canvas_item_set_material(&mut self, item: CanvasItemId, material: Option<MaterialId>);
    /// Use the parent's material instead of this item's.
    fn canvas_item_set_use_parent_material(&mut self, item: CanvasItemId, enabled: bool);
    /// Set the light mask.
    fn canvas_item_set_light_mask(&mut self, item: CanvasItemId, mask: u32);
    /// Set the z index.
    fn canvas_item_set_z_index(&mut self, item: CanvasItemId, z: i32);
    /// Whether the z index is relative to the parent's.
    fn canvas_item_set_z_as_relative_to_parent(&mut self, item: CanvasItemId, relative: bool);
    /// Draw children sorted by their y position.
    fn canvas_item_set_sort_children_by_y(&mut self, item: CanvasItemId, enabled: bool);
    /// Drop every command recorded for `item`.
    fn canvas_item_clear(&mut self, item: CanvasItemId);
    /// Append a command to `item`'s buffer.
    fn canvas_item_add_command(&mut self, item: CanvasItemId, command: DrawCommand);
}
