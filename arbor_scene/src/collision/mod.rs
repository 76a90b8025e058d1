// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collision objects and the nodes that own their shapes.
//!
//! A collision object is a Node2D bound to a physics body or area. Its shapes are grouped
//! under shape owners, usually one per [CollisionShape2D](crate::NodeKind::CollisionShape2D)
//! or [CollisionPolygon2D](crate::NodeKind::CollisionPolygon2D) child, so that each group can
//! be moved, disabled or made one-way as a unit.

mod object;
mod owners;
mod polygon;
mod shape;

pub use object::CollisionObjectKind;
pub use owners::{ShapeOwnerId, ShapeOwnerRegistry};
pub use shape::{BuildMode, DEBUG_COLLISIONS_COLOR};

pub(crate) use object::CollisionObject2D;
pub(crate) use shape::CollisionShapeNode;
