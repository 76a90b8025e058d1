// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Server: the backend contracts consumed by the Arbor scene graph.
//!
//! The scene graph never rasterizes or simulates anything itself. It owns opaque handles
//! into two servers and pushes state into them:
//!
//! - [`RenderServer`]: canvases and canvas items, with a per-item buffer of [`DrawCommand`]s.
//! - [`PhysicsServer`]: spaces, bodies and areas, each with an ordered list of [`Shape`]s
//!   addressed by a contiguous subshape index.
//!
//! Handles are plain copyable ids ([`CanvasItemId`], [`BodyId`], ...). They carry no
//! ownership; whoever created a handle is responsible for freeing it.
//!
//! ## Headless backends
//!
//! The [`headless`] module provides [`HeadlessRenderServer`] and [`HeadlessPhysicsServer`],
//! which record every call into inspectable tables. They are the default servers of the scene
//! tree and are what its tests run against.
//!
//! ## Features
//!
//! - `std` (enabled by default): use the standard library for floating-point math.
//! - `libm`: use `libm` for floating-point math in `no_std` builds.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod color;
pub mod headless;
mod ids;
mod physics;
mod render;
mod shape;

pub use color::Color;
pub use headless::{HeadlessPhysicsServer, HeadlessRenderServer};
pub use ids::{
    AreaId, BodyId, CanvasId, CanvasItemId, MaterialId, ObjectInstance, SpaceId, TextureId,
};
pub use physics::{BodyMode, BodyParam, PhysicsObject, PhysicsServer};
pub use render::{CanvasParent, DrawCommand, RenderServer, Texture};
pub use shape::Shape;
