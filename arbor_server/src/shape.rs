// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;
use kurbo::{Point, Rect, Vec2};

/// A collision shape in its own local space.
///
/// Shapes are immutable values shared between owners and the physics server through
/// `Arc<Shape>`. The geometry itself is opaque to the scene graph, which only needs
/// [`Shape::rect`] for bounds and debug drawing.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Circle centered on the origin.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// Axis-aligned rectangle centered on the origin.
    Rectangle {
        /// Half width and half height.
        extents: Vec2,
    },
    /// Vertical capsule centered on the origin.
    Capsule {
        /// Radius of the two caps.
        radius: f64,
        /// Length of the straight middle section.
        height: f64,
    },
    /// Line segment.
    Segment {
        /// First endpoint.
        a: Point,
        /// Second endpoint.
        b: Point,
    },
    /// Convex polygon, counter-clockwise.
    ConvexPolygon {
        /// Polygon vertices.
        points: Vec<Point>,
    },
    /// Arbitrary soup of segments, stored as consecutive endpoint pairs.
    ConcavePolygon {
        /// Segment endpoints, two per segment.
        segments: Vec<Point>,
    },
}

impl Shape {
    /// Local-space bounds of the shape.
    pub fn rect(&self) -> Rect {
        match self {
            Self::Circle { radius } => Rect::new(-radius, -radius, *radius, *radius),
            Self::Rectangle { extents } => Rect::new(-extents.x, -extents.y, extents.x, extents.y),
            Self::Capsule { radius, height } => {
                let half = radius + height * 0.5;
                Rect::new(-radius, -half, *radius, half)
            }
            Self::Segment { a, b } => Rect::from_points(*a, *b),
            Self::ConvexPolygon { points } => bounds_of(points),
            Self::ConcavePolygon { segments } => bounds_of(segments),
        }
    }
}

fn bounds_of(points: &[Point]) -> Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return Rect::ZERO;
    };
    iter.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn capsule_rect_includes_caps() {
        let r = Shape::Capsule {
            radius: 5.0,
            height: 20.0,
        }
        .rect();
        assert_eq!(r, Rect::new(-5.0, -15.0, 5.0, 15.0));
    }

    #[test]
    fn polygon_rect_is_point_bounds() {
        let r = Shape::ConvexPolygon {
            points: vec![
                Point::new(-1.0, 2.0),
                Point::new(4.0, -3.0),
                Point::new(0.0, 7.0),
            ],
        }
        .rect();
        assert_eq!(r, Rect::new(-1.0, -3.0, 4.0, 7.0));
        let empty = Shape::ConcavePolygon {
            segments: Vec::new(),
        };
        assert_eq!(empty.rect(), Rect::ZERO);
    }
}
