// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rotation, scale and skew decomposition of 2D affine transforms.
//!
//! An [`Affine`] with coefficients `[a, b, c, d, e, f]` is read as a basis: the x axis is
//! `(a, b)`, the y axis is `(c, d)` and the origin is `(e, f)`. Composition builds
//!
//! ```text
//! x = ( cos r,      sin r     ) * sx
//! y = (-sin(r + k), cos(r + k)) * sy
//! ```
//!
//! and decomposition recovers `r` from the x axis, the scale from the axis lengths (the y
//! length carries the sign of the determinant) and `k` from the angle between the axes.

use core::f64::consts::{FRAC_PI_2, PI, TAU};

use kurbo::{Affine, Point, Vec2};

/// Scale components with a magnitude of zero are replaced by this value.
pub const CMP_EPSILON: f64 = 0.00001;

/// Build a transform from its decomposed parts.
pub fn compose(position: Point, rotation: f64, scale: Vec2, skew: f64) -> Affine {
    let x = Vec2::from_angle(rotation) * scale.x;
    let yk = Vec2::from_angle(rotation + skew);
    let y = Vec2::new(-yk.y, yk.x) * scale.y;
    Affine::new([x.x, x.y, y.x, y.y, position.x, position.y])
}

/// The x axis of the basis.
pub fn x_axis(t: Affine) -> Vec2 {
    let [a, b, ..] = t.as_coeffs();
    Vec2::new(a, b)
}

/// The y axis of the basis.
pub fn y_axis(t: Affine) -> Vec2 {
    let [_, _, c, d, ..] = t.as_coeffs();
    Vec2::new(c, d)
}

/// The origin.
pub fn origin(t: Affine) -> Point {
    t.translation().to_point()
}

/// Rotation of the x axis, in radians.
pub fn rotation(t: Affine) -> f64 {
    x_axis(t).atan2()
}

/// Per-axis scale; negative in y when the basis is mirrored.
pub fn scale(t: Affine) -> Vec2 {
    let sign = if t.determinant() < 0.0 { -1.0 } else { 1.0 };
    Vec2::new(x_axis(t).length(), sign * y_axis(t).length())
}

/// Skew between the axes, in radians, zero for an orthogonal basis.
pub fn skew(t: Affine) -> f64 {
    let sign = if t.determinant() < 0.0 { -1.0 } else { 1.0 };
    let x = x_axis(t);
    let y = y_axis(t) * sign;
    let between = Vec2::new(x.dot(y), x.cross(y)).atan2();
    wrap_angle(between - FRAC_PI_2)
}

/// Replace zero scale components with [`CMP_EPSILON`].
pub fn clamp_scale(scale: Vec2) -> Vec2 {
    Vec2::new(
        if scale.x == 0.0 { CMP_EPSILON } else { scale.x },
        if scale.y == 0.0 { CMP_EPSILON } else { scale.y },
    )
}

fn wrap_angle(angle: f64) -> f64 {
    if angle > PI {
        angle - TAU
    } else if angle < -PI {
        angle + TAU
    } else {
        angle
    }
}
