// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Scene: a retained 2D scene graph over pluggable render and physics servers.
//!
//! The scene graph owns a tree of nodes and mirrors their state into two backends,
//! a [`RenderServer`](arbor_server::RenderServer) and a
//! [`PhysicsServer`](arbor_server::PhysicsServer). Nodes never draw or simulate anything
//! themselves; they keep opaque handles and push state through them.
//!
//! - Canvas items: visibility, modulation, materials, light masks and draw-list
//!   ordering, with lazily cached global transforms.
//! - 2D nodes: a local transform decomposed into position, rotation, scale and skew.
//! - Collision objects: bodies and areas whose shapes are grouped into shape owners
//!   addressed by a dense subshape index.
//! - Collision shapes and polygons: children that publish geometry into the nearest
//!   collision object.
//! - Tile maps: a sparse cell grid rendered and collided in square quadrants that rebuild
//!   lazily after edits.
//!
//! ## API overview
//!
//! - [`SceneTree`]: owns every node and the two servers. All operations are methods on
//!   the tree taking a [`NodeId`].
//! - [`NodeKind`]: what a node is; fixed at creation.
//! - [`Notification`]: lifecycle and transform events delivered to a node's [`Behavior`].
//! - [`Signal`] / [`EmittedSignal`]: observable events recorded by the tree.
//! - [`DeferredQueue`]: work scheduled for the next [`SceneTree::flush_deferred`].
//! - [`ShapeOwnerRegistry`]: the owner-to-subshape bookkeeping behind every collision
//!   object.
//! - [`tile_map`]: tile sets, cell encoding and map coordinates.
//!
//! Key operations:
//! - [`SceneTree::add_child`] / [`SceneTree::remove_child`] / [`SceneTree::free`]
//!   drive the enter, ready and exit lifecycle.
//! - [`SceneTree::set_position`] and friends invalidate cached global transforms below
//!   the node; [`SceneTree::global_transform`] recomputes them on demand.
//! - [`SceneTree::update`] queues a redraw; [`SceneTree::process_frame`] runs deferred
//!   calls, redraws and transform notifications.
//! - [`SceneTree::set_cell`] edits a tile map; quadrants rebuild on the next flush.
//!
//! ## Example
//!
//! ```rust
//! use arbor_scene::SceneTree;
//! use kurbo::{Affine, Point};
//!
//! let mut tree = SceneTree::new();
//! let root = tree.root();
//! let parent = tree.create_node_2d();
//! let child = tree.create_node_2d();
//! tree.add_child(root, parent);
//! tree.add_child(parent, child);
//!
//! tree.set_position(parent, Point::new(10.0, 0.0));
//! tree.set_position(child, Point::new(0.0, 5.0));
//! assert_eq!(
//!     tree.global_transform(child),
//!     Affine::translate((10.0, 5.0))
//! );
//! ```
//!
//! ## Features
//!
//! - `std` (enabled by default): use the standard library for floating-point math.
//! - `libm`: use `libm` for floating-point math in `no_std` builds.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod canvas_item;
mod collision;
mod draw;
mod node_2d;
mod queue;
pub mod tile_map;
pub mod transform;
mod tree;
mod types;
mod viewport;

pub use collision::{
    BuildMode, CollisionObjectKind, DEBUG_COLLISIONS_COLOR, ShapeOwnerId, ShapeOwnerRegistry,
};
pub use draw::{Behavior, DrawContext, DrawListener};
pub use node_2d::{Z_MAX, Z_MIN};
pub use queue::{DeferredCall, DeferredQueue};
pub use tile_map::{TileMapConfig, TileMapStats, TileSet};
pub use tree::SceneTree;
pub use types::{EmittedSignal, NodeId, NodeKind, Notification, Signal};
pub use viewport::World2D;
