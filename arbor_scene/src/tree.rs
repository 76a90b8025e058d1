// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: node arena, topology, notification dispatch and frame drain.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use arbor_server::{HeadlessPhysicsServer, HeadlessRenderServer, PhysicsServer, RenderServer};
use hashbrown::HashMap;

use crate::canvas_item::CanvasItem;
use crate::collision::{CollisionObject2D, CollisionShapeNode};
use crate::draw::{Behavior, DrawListener};
use crate::node_2d::Node2D;
use crate::queue::{DeferredCall, DeferredQueue};
use crate::tile_map::TileMap;
use crate::types::{EmittedSignal, NodeId, NodeKind, Notification, Signal};
use crate::viewport::{CanvasLayer, Viewport};

/// A scene tree of 2D nodes driving a render server and a physics server.
///
/// The tree owns every node in an arena addressed by generational [`NodeId`]s. Nodes are
/// created detached and enter the tree when linked (directly or through an ancestor) under
/// the root [viewport](NodeKind::Viewport) created by [`SceneTree::new`].
///
/// Work is split between immediate state pushes and two per-frame worklists:
///
/// - redraws, tile-map quadrant rebuilds and canvas-group raises go through a FIFO of
///   deferred calls, drained by [`SceneTree::flush_deferred`];
/// - nodes whose global transform changed are collected once each and notified by
///   [`SceneTree::flush_transform_notifications`].
///
/// [`SceneTree::process_frame`] drains both in the order a frame loop should.
///
/// ## Example
///
/// ```rust
/// use arbor_scene::SceneTree;
/// use kurbo::Point;
///
/// let mut tree = SceneTree::new();
/// let parent = tree.create_node_2d();
/// let child = tree.create_node_2d();
/// tree.add_child(tree.root(), parent);
/// tree.add_child(parent, child);
///
/// tree.set_position(parent, Point::new(10.0, 0.0));
/// tree.set_position(child, Point::new(0.0, 5.0));
/// assert_eq!(tree.global_position(child), Point::new(10.0, 5.0));
///
/// tree.process_frame();
/// ```
pub struct SceneTree<R: RenderServer = HeadlessRenderServer, P: PhysicsServer = HeadlessPhysicsServer>
{
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
    pub(crate) viewports: HashMap<NodeId, Viewport>,
    pub(crate) canvas_layers: HashMap<NodeId, CanvasLayer>,
    pub(crate) collision_objects: HashMap<NodeId, CollisionObject2D>,
    pub(crate) shape_nodes: HashMap<NodeId, CollisionShapeNode>,
    pub(crate) tile_maps: HashMap<NodeId, TileMap>,
    pub(crate) behaviors: HashMap<NodeId, Box<dyn Behavior>>,
    pub(crate) draw_listeners: HashMap<NodeId, Vec<DrawListener>>,
    groups: HashMap<String, Vec<NodeId>>,
    pub(crate) signals: Vec<EmittedSignal>,
    pub(crate) queue: DeferredQueue,
    /// nodes awaiting `TransformChanged`, in registration order
    pub(crate) xform_changes: VecDeque<NodeId>,
    pub(crate) render: R,
    pub(crate) physics: P,
    pub(crate) debug_collisions: bool,
    pub(crate) global_transform_recomputes: Cell<u64>,
}

impl<R: RenderServer + core::fmt::Debug, P: PhysicsServer + core::fmt::Debug> core::fmt::Debug
    for SceneTree<R, P>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("SceneTree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("root", &self.root)
            .field("queued_calls", &self.queue.len())
            .field("pending_transforms", &self.xform_changes.len())
            .field("render", &self.render)
            .field("physics", &self.physics)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    generation: u32,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) in_tree: bool,
    pub(crate) item: Option<CanvasItem>,
    pub(crate) node_2d: Option<Node2D>,
}

impl Node {
    fn new(generation: u32, kind: NodeKind, item: Option<CanvasItem>) -> Self {
        Self {
            generation,
            kind,
            parent: None,
            children: Vec::new(),
            in_tree: false,
            node_2d: item.as_ref().map(|_| Node2D::default()),
            item,
        }
    }
}

impl SceneTree {
    /// Create a tree backed by headless servers, with a root viewport already in the tree.
    pub fn new() -> Self {
        Self::with_servers(HeadlessRenderServer::new(), HeadlessPhysicsServer::new())
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    /// Create a tree driving the given servers, with a root viewport already in the tree.
    pub fn with_servers(render: R, physics: P) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            viewports: HashMap::new(),
            canvas_layers: HashMap::new(),
            collision_objects: HashMap::new(),
            shape_nodes: HashMap::new(),
            tile_maps: HashMap::new(),
            behaviors: HashMap::new(),
            draw_listeners: HashMap::new(),
            groups: HashMap::new(),
            signals: Vec::new(),
            queue: DeferredQueue::new(),
            xform_changes: VecDeque::new(),
            render,
            physics,
            debug_collisions: false,
            global_transform_recomputes: Cell::new(0),
        };
        let root = tree.create_viewport();
        tree.root = root;
        tree.propagate_enter_tree(root);
        tree
    }

    /// The root viewport.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The render server.
    pub fn render(&self) -> &R {
        &self.render
    }

    /// The physics server.
    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub(crate) fn alloc_node(&mut self, kind: NodeKind, item: Option<CanvasItem>) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind, item));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId indices are 32-bit."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, kind, item)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId indices are 32-bit."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Create a plain node with no spatial state.
    pub fn create_node(&mut self) -> NodeId {
        self.alloc_node(NodeKind::Node, None)
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.node_opt(id).expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.node_opt_mut(id).expect("dangling NodeId")
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .filter(|n| n.generation == id.1)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.idx())
            .and_then(|n| n.as_mut())
            .filter(|n| n.generation == id.1)
    }

    /// The kind of a live node.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// Whether `id` is a live canvas item.
    pub fn is_canvas_item(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.kind.is_canvas_item())
    }

    /// Whether `id` is a live node with a decomposable local transform.
    pub fn is_node_2d(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.kind.is_node_2d())
    }

    /// Whether `id` is a live collision object.
    pub fn is_collision_object(&self, id: NodeId) -> bool {
        self.node_opt(id)
            .is_some_and(|n| n.kind == NodeKind::CollisionObject2D)
    }

    /// Whether the node is currently inside the tree. Stale ids are never inside.
    pub fn is_inside_tree(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.in_tree)
    }

    /// Return the parent of a live node, or `None` if it is detached or `id` is stale.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// Return the children of a live node in sibling order; empty for stale ids.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// The node's index among its parent's children.
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.node(parent).children.iter().position(|c| *c == id)
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent_of(id) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    /// Link `child` as the last child of `parent`.
    ///
    /// The child receives [`Notification::Parented`], then, if `parent` is inside the tree,
    /// the whole subtree enters the tree parent-first.
    ///
    /// # Panics
    ///
    /// Panics if either id is stale, if `child` already has a parent, or if `parent` is
    /// `child` or one of its descendants.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            self.is_alive(parent) && self.is_alive(child),
            "dangling NodeId"
        );
        assert!(
            self.node(child).parent.is_none(),
            "node already has a parent"
        );
        assert!(
            !self.is_ancestor_or_self(child, parent),
            "cannot add a node under itself or its descendants"
        );
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        self.notify(child, Notification::Parented);
        if self.node(parent).in_tree {
            self.propagate_enter_tree(child);
        }
    }

    /// Unlink `child` from `parent`.
    ///
    /// The subtree leaves the tree children-first, later siblings receive
    /// [`Notification::MovedInParent`] and the child receives [`Notification::Unparented`].
    ///
    /// # Panics
    ///
    /// Panics if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        assert_eq!(
            self.parent_of(child),
            Some(parent),
            "node is not a child of the given parent"
        );
        if self.node(child).in_tree {
            self.propagate_exit_tree(child);
        }
        let children = &mut self.node_mut(parent).children;
        let idx = children
            .iter()
            .position(|c| *c == child)
            .expect("child missing from parent's child list");
        children.remove(idx);
        let moved = children[idx..].to_vec();
        for sibling in moved {
            self.notify(sibling, Notification::MovedInParent);
        }
        self.node_mut(child).parent = None;
        self.notify(child, Notification::Unparented);
    }

    /// Move `child` to position `to` among its siblings.
    ///
    /// Every sibling whose index changed receives [`Notification::MovedInParent`].
    pub fn move_child(&mut self, child: NodeId, to: usize) {
        let parent = self.parent_of(child).expect("node has no parent");
        let children = &mut self.node_mut(parent).children;
        let from = children
            .iter()
            .position(|c| *c == child)
            .expect("child missing from parent's child list");
        let to = to.min(children.len() - 1);
        if from == to {
            return;
        }
        let id = children.remove(from);
        children.insert(to, id);
        let moved = children[from.min(to)..=from.max(to)].to_vec();
        for sibling in moved {
            self.notify(sibling, Notification::MovedInParent);
        }
    }

    /// Destroy a node and its whole subtree, releasing every server handle they own.
    ///
    /// Stale ids are ignored.
    ///
    /// # Panics
    ///
    /// Panics if `id` is the root viewport.
    pub fn free(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        assert_ne!(id, self.root, "the root viewport cannot be freed");
        if let Some(parent) = self.parent_of(id) {
            self.remove_child(parent, id);
        }
        self.free_detached(id);
    }

    fn free_detached(&mut self, id: NodeId) {
        while let Some(&child) = self.node(id).children.last() {
            self.remove_child(id, child);
            self.free_detached(child);
        }
        self.release_tile_map(id);
        if let Some(object) = self.collision_objects.remove(&id) {
            object.rid().free(&mut self.physics);
        }
        self.shape_nodes.remove(&id);
        if let Some(layer) = self.canvas_layers.remove(&id) {
            self.render.canvas_free(layer.canvas);
        }
        if let Some(viewport) = self.viewports.remove(&id) {
            self.render.canvas_free(viewport.world.canvas);
            self.physics.space_free(viewport.world.space);
        }
        if let Some(handle) = self.node(id).item.as_ref().map(|i| i.handle) {
            self.render.canvas_item_free(handle);
        }
        self.behaviors.remove(&id);
        self.draw_listeners.remove(&id);
        self.groups.retain(|_, members| {
            members.retain(|m| *m != id);
            !members.is_empty()
        });
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    fn propagate_enter_tree(&mut self, id: NodeId) {
        self.node_mut(id).in_tree = true;
        self.notify(id, Notification::EnterTree);
        let children = self.node(id).children.clone();
        for child in children {
            self.propagate_enter_tree(child);
        }
    }

    fn propagate_exit_tree(&mut self, id: NodeId) {
        let children = self.node(id).children.clone();
        for child in children.into_iter().rev() {
            self.propagate_exit_tree(child);
        }
        self.notify(id, Notification::ExitTree);
        self.node_mut(id).in_tree = false;
    }

    /// Dispatch a notification to a node.
    ///
    /// Canvas-item handling runs first, then the node kind's handler, then the node's
    /// [`Behavior`]. Exit notifications run in the reverse order. Stale ids are ignored.
    pub(crate) fn notify(&mut self, id: NodeId, what: Notification) {
        let Some(kind) = self.node_opt(id).map(|n| n.kind) else {
            return;
        };
        let reversed = matches!(what, Notification::ExitTree | Notification::ExitCanvas);
        if reversed {
            self.behavior_notification(id, what);
            self.kind_notification(id, kind, what);
        }
        if kind.is_canvas_item() {
            self.canvas_item_notification(id, what);
        }
        if !reversed {
            self.kind_notification(id, kind, what);
            self.behavior_notification(id, what);
        }
    }

    fn kind_notification(&mut self, id: NodeId, kind: NodeKind, what: Notification) {
        match kind {
            NodeKind::CollisionObject2D => self.collision_object_notification(id, what),
            NodeKind::CollisionShape2D | NodeKind::CollisionPolygon2D => {
                self.collision_shape_notification(id, what);
            }
            NodeKind::TileMap => self.tile_map_notification(id, what),
            NodeKind::Node | NodeKind::Viewport | NodeKind::CanvasLayer | NodeKind::Node2D => {}
        }
    }

    fn behavior_notification(&mut self, id: NodeId, what: Notification) {
        if let Some(mut behavior) = self.behaviors.remove(&id) {
            behavior.notification(id, what);
            self.behaviors.insert(id, behavior);
        }
    }

    /// Attach override hooks to a node, replacing any previous ones.
    pub fn set_behavior(&mut self, id: NodeId, behavior: Box<dyn Behavior>) {
        assert!(self.is_alive(id), "dangling NodeId");
        self.behaviors.insert(id, behavior);
    }

    /// Detach a node's override hooks.
    pub fn clear_behavior(&mut self, id: NodeId) -> Option<Box<dyn Behavior>> {
        self.behaviors.remove(&id)
    }

    /// Add a node to a named group. Adding twice is a no-op.
    pub fn add_to_group(&mut self, id: NodeId, group: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            if !members.contains(&id) {
                members.push(id);
            }
        } else {
            self.groups.insert(group.into(), vec![id]);
        }
    }

    /// Remove a node from a named group.
    pub fn remove_from_group(&mut self, id: NodeId, group: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.retain(|m| *m != id);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    /// Whether a node belongs to a named group.
    pub fn is_in_group(&self, id: NodeId, group: &str) -> bool {
        self.groups.get(group).is_some_and(|m| m.contains(&id))
    }

    /// Members of a named group, in tree order.
    pub fn nodes_in_group(&self, group: &str) -> Vec<NodeId> {
        let mut members: Vec<(Vec<usize>, NodeId)> = self
            .groups
            .get(group)
            .map(|m| m.iter().map(|id| (self.tree_path(*id), *id)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members.into_iter().map(|(_, id)| id).collect()
    }

    /// Sibling indices from the topmost ancestor down to `id`.
    fn tree_path(&self, mut id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        while let Some(idx) = self.child_index(id) {
            path.push(idx);
            id = self.parent_of(id).expect("indexed node has a parent");
        }
        path.reverse();
        path
    }

    pub(crate) fn emit(&mut self, node: NodeId, signal: Signal) {
        self.signals.push(EmittedSignal { node, signal });
    }

    /// Signals emitted since the last [`SceneTree::take_signals`].
    pub fn signals(&self) -> &[EmittedSignal] {
        &self.signals
    }

    /// Drain the emitted-signal log.
    pub fn take_signals(&mut self) -> Vec<EmittedSignal> {
        core::mem::take(&mut self.signals)
    }

    /// Enable debug drawing of collision shapes and polygons.
    pub fn set_debug_collisions_hint(&mut self, enabled: bool) {
        self.debug_collisions = enabled;
    }

    /// Whether collision shapes draw their outlines.
    pub fn is_debugging_collisions_hint(&self) -> bool {
        self.debug_collisions
    }

    /// Number of queued deferred calls.
    pub fn pending_deferred_calls(&self) -> usize {
        self.queue.len()
    }

    /// Run every queued deferred call in FIFO order, including calls queued meanwhile.
    ///
    /// Calls targeting nodes freed since they were queued are skipped.
    pub fn flush_deferred(&mut self) {
        while let Some(call) = self.queue.pop() {
            match call {
                DeferredCall::Update(id) => {
                    if self.is_canvas_item(id) {
                        self.update_callback(id);
                    }
                }
                DeferredCall::UpdateDirtyQuadrants(id) => {
                    if self.is_alive(id) && self.tile_maps.contains_key(&id) {
                        self.update_dirty_quadrants(id);
                    }
                }
                DeferredCall::RaiseCanvasGroup(group) => self.raise_canvas_group(&group),
            }
        }
    }

    /// Send [`Notification::TransformChanged`] once to every node registered since the last
    /// flush, in registration order, clearing each registration first.
    pub fn flush_transform_notifications(&mut self) {
        while let Some(id) = self.xform_changes.pop_front() {
            let Some(item) = self.node_opt_mut(id).and_then(|n| n.item.as_mut()) else {
                continue;
            };
            item.xform_pending = false;
            self.notify(id, Notification::TransformChanged);
        }
    }

    /// Drain one frame's worth of work: transform notifications, deferred calls, then the
    /// transform notifications those calls produced.
    pub fn process_frame(&mut self) {
        self.flush_transform_notifications();
        self.flush_deferred();
        self.flush_transform_notifications();
    }

    /// How many times a cached global transform was recomputed.
    pub fn global_transform_recomputes(&self) -> u64 {
        self.global_transform_recomputes.get()
    }
}
