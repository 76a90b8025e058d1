// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless servers that record state instead of rendering or simulating.
//!
//! Both servers keep one record per live handle and apply every call to it, so a caller can
//! inspect exactly what the scene graph pushed: parents, draw indices, command buffers,
//! shapes and their indices, spaces and transforms. Calls on unknown or freed handles panic,
//! which turns handle leaks and double frees into test failures.

mod physics;
mod render;

pub use physics::{HeadlessPhysicsServer, PhysicsObjectRecord, ShapeRecord};
pub use render::{CanvasItemRecord, CanvasRecord, HeadlessRenderServer};
