// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing into a canvas item's command buffer, and per-node override hooks.

use alloc::boxed::Box;
use alloc::vec::Vec;

use arbor_server::{CanvasItemId, Color, DrawCommand, RenderServer, Shape, Texture};
use kurbo::{Affine, Point, Rect, Vec2};

use crate::transform::compose;
use crate::types::{NodeId, Notification};

/// Records draw commands for one canvas item during its redraw.
///
/// A context only exists while the item is being redrawn, so commands can never land in a
/// buffer that is about to be cleared.
pub struct DrawContext<'a> {
    render: &'a mut dyn RenderServer,
    item: CanvasItemId,
}

impl core::fmt::Debug for DrawContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DrawContext")
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

impl<'a> DrawContext<'a> {
    pub(crate) fn new(render: &'a mut dyn RenderServer, item: CanvasItemId) -> Self {
        Self { render, item }
    }

    /// The render handle being drawn into.
    pub fn canvas_item(&self) -> CanvasItemId {
        self.item
    }

    fn push(&mut self, command: DrawCommand) {
        self.render.canvas_item_add_command(self.item, command);
    }

    /// Draw a line.
    pub fn draw_line(&mut self, from: Point, to: Point, color: Color, width: f64) {
        self.push(DrawCommand::Line {
            from,
            to,
            color,
            width,
        });
    }

    /// Draw a rectangle, filled or outlined.
    pub fn draw_rect(&mut self, rect: Rect, color: Color, filled: bool) {
        self.push(DrawCommand::Rect {
            rect,
            color,
            filled,
        });
    }

    /// Draw a filled circle.
    pub fn draw_circle(&mut self, center: Point, radius: f64, color: Color) {
        self.push(DrawCommand::Circle {
            center,
            radius,
            color,
        });
    }

    /// Draw a filled polygon.
    pub fn draw_polygon(&mut self, points: &[Point], color: Color) {
        self.push(DrawCommand::Polygon {
            points: points.to_vec(),
            color,
        });
    }

    /// Draw a whole texture at its natural size.
    pub fn draw_texture(&mut self, texture: Texture, position: Point, modulate: Color) {
        let rect = Rect::new(
            position.x,
            position.y,
            position.x + texture.size.width,
            position.y + texture.size.height,
        );
        self.draw_texture_rect(texture, rect, modulate, false);
    }

    /// Draw a whole texture stretched over `rect`.
    pub fn draw_texture_rect(&mut self, texture: Texture, rect: Rect, modulate: Color, transpose: bool) {
        self.push(DrawCommand::TextureRect {
            texture: texture.id,
            rect,
            modulate,
            transpose,
        });
    }

    /// Draw the `source` region of a texture stretched over `rect`.
    pub fn draw_texture_rect_region(
        &mut self,
        texture: Texture,
        rect: Rect,
        source: Rect,
        modulate: Color,
        transpose: bool,
        clip_uv: bool,
    ) {
        self.push(DrawCommand::TextureRectRegion {
            texture: texture.id,
            rect,
            source,
            modulate,
            transpose,
            clip_uv,
        });
    }

    /// Draw a nine-patch.
    pub fn draw_nine_patch(
        &mut self,
        texture: Texture,
        rect: Rect,
        source: Rect,
        margins: [f64; 4],
        draw_center: bool,
        modulate: Color,
    ) {
        self.push(DrawCommand::NinePatch {
            texture: texture.id,
            rect,
            source,
            margins,
            draw_center,
            modulate,
        });
    }

    /// Transform the commands that follow.
    pub fn draw_set_transform(&mut self, position: Point, rotation: f64, scale: Vec2) {
        self.draw_set_transform_matrix(compose(position, rotation, scale, 0.0));
    }

    /// Transform the commands that follow by a raw matrix.
    pub fn draw_set_transform_matrix(&mut self, transform: Affine) {
        self.push(DrawCommand::SetTransform(transform));
    }

    /// Draw a collision shape's outline for debugging.
    pub fn draw_shape(&mut self, shape: &Shape, color: Color) {
        match shape {
            Shape::Circle { radius } => self.draw_circle(Point::ORIGIN, *radius, color),
            Shape::Rectangle { .. } => self.draw_rect(shape.rect(), color, true),
            Shape::Capsule { radius, height } => {
                let half = height * 0.5;
                self.draw_rect(Rect::new(-radius, -half, *radius, half), color, true);
                self.draw_circle(Point::new(0.0, -half), *radius, color);
                self.draw_circle(Point::new(0.0, half), *radius, color);
            }
            Shape::Segment { a, b } => self.draw_line(*a, *b, color, 1.0),
            Shape::ConvexPolygon { points } => self.draw_polygon(points, color),
            Shape::ConcavePolygon { segments } => {
                for pair in segments.chunks_exact(2) {
                    self.draw_line(pair[0], pair[1], color, 1.0);
                }
            }
        }
    }
}

/// Per-node override hooks.
///
/// A behavior receives every notification dispatched to its node, after the node's own
/// handling (before it, for exit notifications), and is asked to draw at the end of each
/// redraw of a canvas item.
pub trait Behavior {
    /// Called for every notification the node receives.
    fn notification(&mut self, _node: NodeId, _what: Notification) {}

    /// Called at the end of a redraw, after notification handlers and draw listeners.
    fn draw(&mut self, _node: NodeId, _ctx: &mut DrawContext<'_>) {}
}

/// A listener connected to a canvas item's draw signal.
pub type DrawListener = Box<dyn FnMut(NodeId, &mut DrawContext<'_>)>;

pub(crate) fn outline(points: &[Point]) -> Vec<(Point, Point)> {
    let n = points.len();
    (0..n).map(|i| (points[i], points[(i + 1) % n])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use arbor_server::HeadlessRenderServer;

    #[test]
    fn concave_polygon_draws_one_line_per_segment() {
        let mut rs = HeadlessRenderServer::new();
        let item = rs.canvas_item_create();
        let shape = Shape::ConcavePolygon {
            segments: vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
            ],
        };
        DrawContext::new(&mut rs, item).draw_shape(&shape, Color::WHITE);
        let commands = &rs.canvas_item(item).unwrap().commands;
        assert_eq!(commands.len(), 2);
        assert!(
            matches!(commands[1], DrawCommand::Line { to, .. } if to == Point::new(1.0, 1.0)),
            "second segment ends at (1, 1)"
        );
    }

    #[test]
    fn outline_closes_the_loop() {
        let pts = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(0.0, 2.0)];
        let edges = outline(&pts);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], (pts[2], pts[0]));
    }
}
