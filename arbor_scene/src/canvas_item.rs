// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canvas items: render presence, canvas attachment, redraw scheduling, visibility and the
//! cached global transform.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

use arbor_server::{
    CanvasId, CanvasItemId, CanvasParent, Color, MaterialId, PhysicsServer, RenderServer,
};
use kurbo::Affine;

use crate::draw::DrawContext;
use crate::queue::DeferredCall;
use crate::tree::SceneTree;
use crate::types::{NodeId, NodeKind, Notification, Signal};

/// Canvas-item state carried by every canvas-item node.
#[derive(Clone, Debug)]
pub(crate) struct CanvasItem {
    pub(crate) handle: CanvasItemId,
    pub(crate) visible: bool,
    pub(crate) first_draw: bool,
    pub(crate) pending_update: bool,
    pub(crate) top_level: bool,
    pub(crate) modulate: Color,
    pub(crate) self_modulate: Color,
    pub(crate) material: Option<MaterialId>,
    pub(crate) use_parent_material: bool,
    pub(crate) light_mask: u32,
    pub(crate) global_transform: Cell<Affine>,
    pub(crate) global_invalid: Cell<bool>,
    pub(crate) notify_transform: bool,
    pub(crate) notify_local_transform: bool,
    pub(crate) block_transform_notify: bool,
    /// Registered in the tree's pending transform-notification list.
    pub(crate) xform_pending: bool,
    pub(crate) canvas: Option<CanvasId>,
    pub(crate) canvas_layer: Option<NodeId>,
    pub(crate) canvas_group: Option<String>,
    /// Direct canvas-item children, in the order they entered the tree.
    pub(crate) children_items: Vec<NodeId>,
}

impl CanvasItem {
    pub(crate) fn new(handle: CanvasItemId) -> Self {
        Self {
            handle,
            visible: true,
            first_draw: false,
            pending_update: false,
            top_level: false,
            modulate: Color::WHITE,
            self_modulate: Color::WHITE,
            material: None,
            use_parent_material: false,
            light_mask: 1,
            global_transform: Cell::new(Affine::IDENTITY),
            global_invalid: Cell::new(true),
            notify_transform: false,
            notify_local_transform: false,
            block_transform_notify: false,
            xform_pending: false,
            canvas: None,
            canvas_layer: None,
            canvas_group: None,
            children_items: Vec::new(),
        }
    }
}

impl<R: RenderServer, P: PhysicsServer> SceneTree<R, P> {
    pub(crate) fn alloc_canvas_item(&mut self, kind: NodeKind) -> NodeId {
        debug_assert!(kind.is_canvas_item(), "{kind:?} is not a canvas item");
        let handle = self.render.canvas_item_create();
        self.alloc_node(kind, Some(CanvasItem::new(handle)))
    }

    pub(crate) fn item(&self, id: NodeId) -> &CanvasItem {
        self.node(id)
            .item
            .as_ref()
            .expect("node is not a canvas item")
    }

    pub(crate) fn item_mut(&mut self, id: NodeId) -> &mut CanvasItem {
        self.node_mut(id)
            .item
            .as_mut()
            .expect("node is not a canvas item")
    }

    pub(crate) fn canvas_item_notification(&mut self, id: NodeId, what: Notification) {
        match what {
            Notification::EnterTree => {
                let item = self.item_mut(id);
                item.first_draw = true;
                item.global_invalid.set(true);
                if let Some(parent) = self.parent_of(id).filter(|p| self.is_canvas_item(*p)) {
                    self.item_mut(parent).children_items.push(id);
                }
                self.enter_canvas(id);
                let item = self.item(id);
                if !item.block_transform_notify && !item.xform_pending {
                    self.item_mut(id).xform_pending = true;
                    self.xform_changes.push_back(id);
                }
            }
            Notification::ExitTree => {
                if self.item(id).xform_pending {
                    self.item_mut(id).xform_pending = false;
                    self.xform_changes.retain(|n| *n != id);
                }
                self.exit_canvas(id);
                if let Some(parent) = self.parent_of(id).filter(|p| self.is_canvas_item(*p)) {
                    self.item_mut(parent).children_items.retain(|c| *c != id);
                }
                self.item(id).global_invalid.set(true);
            }
            Notification::MovedInParent => {
                if !self.is_inside_tree(id) {
                    return;
                }
                if let Some(group) = self.item(id).canvas_group.clone() {
                    self.queue.push_unique(DeferredCall::RaiseCanvasGroup(group));
                } else {
                    let handle = self.item(id).handle;
                    let index = self.draw_index_in_parent(id);
                    self.render.canvas_item_set_draw_index(handle, index);
                }
            }
            Notification::VisibilityChanged => self.emit(id, Signal::VisibilityChanged),
            _ => {}
        }
    }

    fn draw_index_in_parent(&self, id: NodeId) -> i32 {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_possible_wrap,
            reason = "Sibling counts stay far below i32::MAX."
        )]
        self.child_index(id).map_or(0, |i| i as i32)
    }

    fn enter_canvas(&mut self, id: NodeId) {
        let handle = self.item(id).handle;
        let parent_item = self.parent_of(id).filter(|p| self.is_canvas_item(*p));
        match parent_item {
            Some(parent) if !self.item(id).top_level => {
                let parent_handle = self.item(parent).handle;
                let canvas = self.item(parent).canvas;
                let layer = self.item(parent).canvas_layer;
                let item = self.item_mut(id);
                item.canvas = canvas;
                item.canvas_layer = layer;
                self.render
                    .canvas_item_set_parent(handle, CanvasParent::Item(parent_handle));
                let index = self.draw_index_in_parent(id);
                self.render.canvas_item_set_draw_index(handle, index);
            }
            _ => {
                let (canvas, layer) = self
                    .resolve_canvas(id)
                    .expect("canvas item inside the tree has a viewport ancestor");
                let group = format!("root_canvas{}", canvas.to_raw());
                let item = self.item_mut(id);
                item.canvas = Some(canvas);
                item.canvas_layer = layer;
                item.canvas_group = Some(group.clone());
                self.render
                    .canvas_item_set_parent(handle, CanvasParent::Canvas(canvas));
                self.add_to_group(id, &group);
                self.queue
                    .push_unique(DeferredCall::RaiseCanvasGroup(group));
            }
        }
        log::trace!("{id:?} entered canvas {:?}", self.item(id).canvas);
        self.update(id);
        self.notify(id, Notification::EnterCanvas);
    }

    fn exit_canvas(&mut self, id: NodeId) {
        self.notify(id, Notification::ExitCanvas);
        let item = self.item_mut(id);
        let handle = item.handle;
        item.canvas = None;
        item.canvas_layer = None;
        let group = item.canvas_group.take();
        self.render.canvas_item_set_parent(handle, CanvasParent::None);
        if let Some(group) = group {
            self.remove_from_group(id, &group);
        }
        log::trace!("{id:?} exited canvas");
    }

    /// Give every top-level member of a canvas group the draw index of its sibling position.
    pub(crate) fn raise_canvas_group(&mut self, group: &str) {
        for id in self.nodes_in_group(group) {
            if !self.is_inside_tree(id) || !self.is_canvas_item(id) {
                continue;
            }
            let handle = self.item(id).handle;
            let index = self.draw_index_in_parent(id);
            self.render.canvas_item_set_draw_index(handle, index);
        }
    }

    /// Schedule a redraw.
    ///
    /// Does nothing outside the tree or while a redraw is already pending, so any number of
    /// calls before the next [`SceneTree::flush_deferred`] produce a single redraw.
    pub fn update(&mut self, id: NodeId) {
        if !self.is_inside_tree(id) || self.item(id).pending_update {
            return;
        }
        self.item_mut(id).pending_update = true;
        self.queue.push(DeferredCall::Update(id));
    }

    /// Whether a redraw is scheduled and not yet run.
    pub fn is_pending_update(&self, id: NodeId) -> bool {
        self.item(id).pending_update
    }

    pub(crate) fn update_callback(&mut self, id: NodeId) {
        if !self.is_inside_tree(id) {
            self.item_mut(id).pending_update = false;
            return;
        }
        let handle = self.item(id).handle;
        self.render.canvas_item_clear(handle);
        if self.is_visible_in_tree(id) {
            if self.item(id).first_draw {
                self.item_mut(id).first_draw = false;
                self.notify(id, Notification::VisibilityChanged);
            }
            self.notify(id, Notification::Draw);
            self.emit(id, Signal::Draw);
            if let Some(mut listeners) = self.draw_listeners.remove(&id) {
                let mut ctx = DrawContext::new(&mut self.render, handle);
                for listener in &mut listeners {
                    listener(id, &mut ctx);
                }
                self.draw_listeners.insert(id, listeners);
            }
            if let Some(mut behavior) = self.behaviors.remove(&id) {
                behavior.draw(id, &mut DrawContext::new(&mut self.render, handle));
                self.behaviors.insert(id, behavior);
            }
        }
        self.item_mut(id).pending_update = false;
    }

    /// Connect a listener to a canvas item's draw signal.
    ///
    /// Listeners run in connection order during each redraw, after the `Draw` notification
    /// and before the node's [`Behavior::draw`](crate::Behavior::draw).
    pub fn connect_draw(
        &mut self,
        id: NodeId,
        listener: impl FnMut(NodeId, &mut DrawContext<'_>) + 'static,
    ) {
        assert!(self.is_canvas_item(id), "node is not a canvas item");
        self.draw_listeners
            .entry(id)
            .or_default()
            .push(Box::new(listener));
    }

    /// Disconnect every draw listener of a canvas item.
    pub fn disconnect_draw(&mut self, id: NodeId) {
        self.draw_listeners.remove(&id);
    }

    /// The render handle owned by a canvas item.
    pub fn canvas_item(&self, id: NodeId) -> CanvasItemId {
        self.item(id).handle
    }

    /// The canvas the item is attached to, while it is in the tree.
    pub fn canvas(&self, id: NodeId) -> Option<CanvasId> {
        self.item(id).canvas
    }

    /// The canvas layer the item draws into, if any.
    pub fn canvas_layer(&self, id: NodeId) -> Option<NodeId> {
        self.item(id).canvas_layer
    }

    /// The canvas-item parent whose transform this item composes with.
    ///
    /// `None` for top-level items and for items whose parent is not a canvas item.
    pub fn parent_item(&self, id: NodeId) -> Option<NodeId> {
        if self.item(id).top_level {
            return None;
        }
        self.parent_of(id).filter(|p| self.is_canvas_item(*p))
    }

    /// Show or hide the item.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if visible {
            self.show(id);
        } else {
            self.hide(id);
        }
    }

    /// Make the item visible, cascading into visible descendants when in the tree.
    pub fn show(&mut self, id: NodeId) {
        if self.item(id).visible {
            return;
        }
        let item = self.item_mut(id);
        item.visible = true;
        let handle = item.handle;
        self.render.canvas_item_set_visible(handle, true);
        if self.is_inside_tree(id) {
            self.propagate_visibility_changed(id, true);
        }
    }

    /// Hide the item, cascading into visible descendants when in the tree.
    pub fn hide(&mut self, id: NodeId) {
        if !self.item(id).visible {
            return;
        }
        let item = self.item_mut(id);
        item.visible = false;
        let handle = item.handle;
        self.render.canvas_item_set_visible(handle, false);
        if self.is_inside_tree(id) {
            self.propagate_visibility_changed(id, false);
        }
    }

    fn propagate_visibility_changed(&mut self, id: NodeId, visible: bool) {
        if visible && self.item(id).first_draw {
            self.item_mut(id).first_draw = false;
        }
        self.notify(id, Notification::VisibilityChanged);
        if visible {
            self.update(id);
        } else {
            self.emit(id, Signal::Hide);
        }
        let children = self.node(id).children.clone();
        for child in children {
            if self.is_canvas_item(child) {
                let item = self.item(child);
                if item.visible && !item.top_level {
                    self.propagate_visibility_changed(child, visible);
                }
            }
        }
    }

    /// The item's own visibility flag.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.item(id).visible
    }

    /// Whether the item and every canvas-item ancestor up to its transform root are visible.
    pub fn is_visible_in_tree(&self, id: NodeId) -> bool {
        if !self.is_inside_tree(id) {
            return false;
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if !self.item(node).visible {
                return false;
            }
            current = self.parent_item(node);
        }
        true
    }

    /// The item's transform relative to its parent item.
    pub(crate) fn local_transform(&self, id: NodeId) -> Affine {
        self.node(id)
            .node_2d
            .as_ref()
            .map_or(Affine::IDENTITY, |n| n.transform)
    }

    /// The item's transform in canvas space, recomputed only when invalidated.
    pub fn global_transform(&self, id: NodeId) -> Affine {
        let item = self.item(id);
        if item.global_invalid.get() {
            let local = self.local_transform(id);
            let global = match self.parent_item(id) {
                Some(parent) => self.global_transform(parent) * local,
                None => local,
            };
            item.global_transform.set(global);
            item.global_invalid.set(false);
            self.global_transform_recomputes
                .set(self.global_transform_recomputes.get() + 1);
        }
        item.global_transform.get()
    }

    /// The transform of the canvas the item draws into.
    pub fn canvas_transform(&self, id: NodeId) -> Affine {
        if let Some(layer) = self.item(id).canvas_layer {
            return self.canvas_layers[&layer].transform;
        }
        self.nearest_viewport(id)
            .map_or(Affine::IDENTITY, |vp| self.viewports[&vp].canvas_transform)
    }

    /// The item's global transform followed by its canvas transform.
    pub fn global_transform_with_canvas(&self, id: NodeId) -> Affine {
        self.canvas_transform(id) * self.global_transform(id)
    }

    /// Invalidate the global transform of the item and its non-top-level descendants, and
    /// register interested items for a deferred [`Notification::TransformChanged`].
    ///
    /// Items with local-transform notification enabled are told immediately.
    pub(crate) fn notify_transform(&mut self, id: NodeId) {
        if !self.is_inside_tree(id) {
            self.invalidate_detached(id);
            return;
        }
        self.propagate_notify_transform(id);
        let item = self.item(id);
        if item.notify_local_transform && !item.block_transform_notify {
            self.notify(id, Notification::LocalTransformChanged);
        }
    }

    /// Mark the cached global transforms of a detached item and its descendants stale.
    fn invalidate_detached(&self, id: NodeId) {
        self.item(id).global_invalid.set(true);
        for &child in &self.node(id).children {
            if self.is_canvas_item(child) && !self.item(child).top_level {
                self.invalidate_detached(child);
            }
        }
    }

    fn propagate_notify_transform(&mut self, id: NodeId) {
        let item = self.item_mut(id);
        item.global_invalid.set(true);
        let register =
            item.notify_transform && !item.xform_pending && !item.block_transform_notify;
        if register {
            item.xform_pending = true;
            self.xform_changes.push_back(id);
        }
        let children = self.item(id).children_items.clone();
        for child in children {
            if !self.item(child).top_level {
                self.propagate_notify_transform(child);
            }
        }
    }

    /// Make the item root its own transform space and attach directly to its canvas.
    pub fn set_as_top_level(&mut self, id: NodeId, top_level: bool) {
        if self.item(id).top_level == top_level {
            return;
        }
        if !self.is_inside_tree(id) {
            self.item_mut(id).top_level = top_level;
            return;
        }
        self.exit_canvas(id);
        self.item_mut(id).top_level = top_level;
        self.enter_canvas(id);
        self.notify_transform(id);
    }

    /// Whether the item roots its own transform space.
    pub fn is_set_as_top_level(&self, id: NodeId) -> bool {
        self.item(id).top_level
    }

    /// Receive [`Notification::TransformChanged`] after global transform changes.
    pub fn set_notify_transform(&mut self, id: NodeId, enabled: bool) {
        if self.item(id).notify_transform == enabled {
            return;
        }
        self.item_mut(id).notify_transform = enabled;
        if enabled && self.is_inside_tree(id) {
            self.global_transform(id);
        }
    }

    /// Whether the item receives [`Notification::TransformChanged`].
    pub fn is_transform_notification_enabled(&self, id: NodeId) -> bool {
        self.item(id).notify_transform
    }

    /// Receive [`Notification::LocalTransformChanged`] after local transform changes.
    pub fn set_notify_local_transform(&mut self, id: NodeId, enabled: bool) {
        self.item_mut(id).notify_local_transform = enabled;
    }

    /// Whether the item receives [`Notification::LocalTransformChanged`].
    pub fn is_local_transform_notification_enabled(&self, id: NodeId) -> bool {
        self.item(id).notify_local_transform
    }

    /// Suppress transform notifications for this item.
    pub fn set_block_transform_notify(&mut self, id: NodeId, blocked: bool) {
        self.item_mut(id).block_transform_notify = blocked;
    }

    /// Set the color multiplied into the item and its children.
    pub fn set_modulate(&mut self, id: NodeId, color: Color) {
        let item = self.item_mut(id);
        item.modulate = color;
        let handle = item.handle;
        self.render.canvas_item_set_modulate(handle, color);
    }

    /// The color multiplied into the item and its children.
    pub fn modulate(&self, id: NodeId) -> Color {
        self.item(id).modulate
    }

    /// Set the color multiplied into the item only.
    pub fn set_self_modulate(&mut self, id: NodeId, color: Color) {
        let item = self.item_mut(id);
        item.self_modulate = color;
        let handle = item.handle;
        self.render.canvas_item_set_self_modulate(handle, color);
    }

    /// The color multiplied into the item only.
    pub fn self_modulate(&self, id: NodeId) -> Color {
        self.item(id).self_modulate
    }

    /// Set the item's material.
    pub fn set_material(&mut self, id: NodeId, material: Option<MaterialId>) {
        let item = self.item_mut(id);
        item.material = material;
        let handle = item.handle;
        self.render.canvas_item_set_material(handle, material);
        if self.tile_maps.contains_key(&id) {
            self.tile_map_material_changed(id);
        }
    }

    /// The item's material.
    pub fn material(&self, id: NodeId) -> Option<MaterialId> {
        self.item(id).material
    }

    /// Draw with the parent's material instead of the item's own.
    pub fn set_use_parent_material(&mut self, id: NodeId, enabled: bool) {
        let item = self.item_mut(id);
        item.use_parent_material = enabled;
        let handle = item.handle;
        self.render
            .canvas_item_set_use_parent_material(handle, enabled);
        if self.tile_maps.contains_key(&id) {
            self.tile_map_material_changed(id);
        }
    }

    /// Whether the item draws with its parent's material.
    pub fn use_parent_material(&self, id: NodeId) -> bool {
        self.item(id).use_parent_material
    }

    /// Set the light layers the item is lit by.
    pub fn set_light_mask(&mut self, id: NodeId, mask: u32) {
        let item = self.item_mut(id);
        item.light_mask = mask;
        let handle = item.handle;
        self.render.canvas_item_set_light_mask(handle, mask);
        if self.tile_maps.contains_key(&id) {
            self.tile_map_light_mask_changed(id);
        }
    }

    /// The light layers the item is lit by.
    pub fn light_mask(&self, id: NodeId) -> u32 {
        self.item(id).light_mask
    }

    /// Request a redraw and emit [`Signal::ItemRectChanged`].
    pub fn item_rect_changed(&mut self, id: NodeId) {
        self.update(id);
        self.emit(id, Signal::ItemRectChanged);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Behavior, DrawContext, NodeId, Notification, SceneTree};
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use arbor_server::{CanvasParent, Color, DrawCommand};
    use core::cell::{Cell, RefCell};
    use kurbo::{Affine, Point, Rect, Vec2};

    type Log = Rc<RefCell<Vec<(NodeId, Notification)>>>;

    struct Recorder(Log);

    impl Behavior for Recorder {
        fn notification(&mut self, node: NodeId, what: Notification) {
            self.0.borrow_mut().push((node, what));
        }
    }

    struct Counter(Rc<Cell<usize>>);

    impl Behavior for Counter {
        fn draw(&mut self, _node: NodeId, ctx: &mut DrawContext<'_>) {
            self.0.set(self.0.get() + 1);
            ctx.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE, true);
        }
    }

    fn approx_affine(a: Affine, b: Affine) -> bool {
        a.as_coeffs()
            .iter()
            .zip(b.as_coeffs())
            .all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn global_transform_composes_the_chain_lazily() {
        let mut tree = SceneTree::new();
        let locals = [
            Affine::translate((10.0, 0.0)),
            Affine::rotate(0.5),
            Affine::scale_non_uniform(2.0, 3.0),
            Affine::translate((-1.0, 4.0)) * Affine::rotate(-0.2),
        ];
        let mut parent = tree.root();
        let mut chain = Vec::new();
        for local in locals {
            let n = tree.create_node_2d();
            tree.add_child(parent, n);
            tree.set_transform(n, local);
            chain.push(n);
            parent = n;
        }
        let leaf = *chain.last().unwrap();
        let expected = locals.iter().fold(Affine::IDENTITY, |acc, l| acc * *l);

        let before = tree.global_transform_recomputes();
        assert!(approx_affine(tree.global_transform(leaf), expected));
        let computed = tree.global_transform_recomputes() - before;
        assert_eq!(computed, 4, "every invalid link of the chain is computed once");

        let before = tree.global_transform_recomputes();
        let _ = tree.global_transform(leaf);
        assert_eq!(tree.global_transform_recomputes(), before, "cached read");

        tree.set_position(chain[2], Point::new(5.0, 5.0));
        let before = tree.global_transform_recomputes();
        let _ = tree.global_transform(leaf);
        assert_eq!(
            tree.global_transform_recomputes() - before,
            2,
            "only the moved node and its descendant are recomputed"
        );
    }

    #[test]
    fn repeated_updates_draw_once() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.add_child(tree.root(), n);
        let draws = Rc::new(Cell::new(0));
        tree.set_behavior(n, Box::new(Counter(draws.clone())));
        tree.process_frame();
        assert_eq!(draws.get(), 1, "entering the canvas schedules a redraw");

        for _ in 0..5 {
            tree.update(n);
        }
        assert!(tree.is_pending_update(n));
        tree.flush_deferred();
        assert_eq!(draws.get(), 2);
        assert!(!tree.is_pending_update(n));
        let record = tree.render().canvas_item(tree.canvas_item(n)).unwrap();
        assert_eq!(record.commands.len(), 1, "buffer is cleared before each redraw");
    }

    #[test]
    fn listeners_and_behavior_share_the_buffer() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.add_child(tree.root(), n);
        tree.connect_draw(n, |_, ctx| {
            ctx.draw_line(Point::ORIGIN, Point::new(1.0, 0.0), Color::WHITE, 1.0);
        });
        tree.set_behavior(n, Box::new(Counter(Rc::new(Cell::new(0)))));
        tree.process_frame();
        let commands = &tree.render().canvas_item(tree.canvas_item(n)).unwrap().commands;
        assert!(matches!(commands[0], DrawCommand::Line { .. }));
        assert!(matches!(commands[1], DrawCommand::Rect { .. }));
    }

    #[test]
    fn hidden_branches_are_skipped_by_the_cascade() {
        let mut tree = SceneTree::new();
        let log = Log::default();
        let p = tree.create_node_2d();
        let a = tree.create_node_2d();
        let b = tree.create_node_2d();
        let a1 = tree.create_node_2d();
        let b1 = tree.create_node_2d();
        tree.add_child(tree.root(), p);
        tree.add_child(p, a);
        tree.add_child(p, b);
        tree.add_child(a, a1);
        tree.add_child(b, b1);
        tree.hide(b);
        tree.process_frame();
        for id in [p, a, b, a1, b1] {
            tree.set_behavior(id, Box::new(Recorder(log.clone())));
        }

        tree.hide(p);
        tree.show(p);
        let changed: Vec<_> = log
            .borrow()
            .iter()
            .filter(|(_, w)| *w == Notification::VisibilityChanged)
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(changed, [p, a, a1, p, a, a1]);
        assert!(!tree.is_visible_in_tree(b1));
        assert!(tree.is_visible_in_tree(a1));
    }

    #[test]
    fn top_level_items_attach_to_the_canvas_and_ignore_parent_transforms() {
        let mut tree = SceneTree::new();
        let parent = tree.create_node_2d();
        let child = tree.create_node_2d();
        tree.add_child(tree.root(), parent);
        tree.add_child(parent, child);
        tree.set_position(parent, Point::new(100.0, 0.0));
        tree.set_position(child, Point::new(1.0, 1.0));
        assert_eq!(tree.global_position(child), Point::new(101.0, 1.0));

        tree.set_as_top_level(child, true);
        assert_eq!(tree.global_position(child), Point::new(1.0, 1.0));
        let canvas = tree.canvas(child).unwrap();
        let record = tree.render().canvas_item(tree.canvas_item(child)).unwrap();
        assert_eq!(record.parent, CanvasParent::Canvas(canvas));

        tree.set_as_top_level(child, false);
        let record = tree.render().canvas_item(tree.canvas_item(child)).unwrap();
        assert_eq!(record.parent, CanvasParent::Item(tree.canvas_item(parent)));
    }

    #[test]
    fn root_canvas_items_are_raised_in_sibling_order() {
        let mut tree = SceneTree::new();
        let a = tree.create_node_2d();
        let b = tree.create_node_2d();
        tree.add_child(tree.root(), a);
        tree.add_child(tree.root(), b);
        tree.process_frame();
        let canvas = tree.canvas(a).unwrap();
        let order = tree.render().children_of(CanvasParent::Canvas(canvas));
        assert_eq!(order, [tree.canvas_item(a), tree.canvas_item(b)]);

        tree.move_child(b, 0);
        tree.process_frame();
        let order = tree.render().children_of(CanvasParent::Canvas(canvas));
        assert_eq!(order, [tree.canvas_item(b), tree.canvas_item(a)]);
    }

    #[test]
    fn transform_changes_notify_once_per_flush() {
        let mut tree = SceneTree::new();
        let log = Log::default();
        let parent = tree.create_node_2d();
        let child = tree.create_node_2d();
        tree.add_child(tree.root(), parent);
        tree.add_child(parent, child);
        tree.set_notify_transform(child, true);
        tree.process_frame();
        tree.set_behavior(child, Box::new(Recorder(log.clone())));

        tree.translate(parent, Vec2::new(1.0, 0.0));
        tree.translate(parent, Vec2::new(1.0, 0.0));
        tree.set_rotation(parent, 0.3);
        tree.flush_transform_notifications();
        let count = log
            .borrow()
            .iter()
            .filter(|(_, w)| *w == Notification::TransformChanged)
            .count();
        assert_eq!(count, 1);

        tree.set_block_transform_notify(child, true);
        tree.translate(parent, Vec2::new(1.0, 0.0));
        tree.flush_transform_notifications();
        let count = log
            .borrow()
            .iter()
            .filter(|(_, w)| *w == Notification::TransformChanged)
            .count();
        assert_eq!(count, 1, "blocked items are not registered");
    }

    #[test]
    fn updates_outside_the_tree_are_ignored() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        tree.update(n);
        assert!(!tree.is_pending_update(n));
        assert_eq!(tree.pending_deferred_calls(), 0);
    }

    #[test]
    fn cached_transforms_read_while_detached_are_refreshed_on_entry() {
        let mut tree = SceneTree::new();
        let n = tree.create_node_2d();
        assert_eq!(tree.global_transform(n), Affine::IDENTITY);
        tree.set_position(n, Point::new(5.0, 0.0));
        assert_eq!(tree.global_transform(n), Affine::translate((5.0, 0.0)));
        tree.add_child(tree.root(), n);
        assert_eq!(tree.global_transform(n), Affine::translate((5.0, 0.0)));
    }

    #[test]
    fn detached_parent_edits_reach_cached_children() {
        let mut tree = SceneTree::new();
        let parent = tree.create_node_2d();
        let child = tree.create_node_2d();
        tree.add_child(parent, child);
        tree.set_position(child, Point::new(0.0, 1.0));
        assert_eq!(tree.global_transform(child), Affine::translate((0.0, 1.0)));
        tree.set_position(parent, Point::new(2.0, 0.0));
        assert_eq!(tree.global_transform(child), Affine::translate((2.0, 1.0)));

        tree.add_child(tree.root(), parent);
        tree.remove_child(tree.root(), parent);
        tree.set_position(parent, Point::new(-3.0, 0.0));
        tree.add_child(tree.root(), parent);
        assert_eq!(tree.global_transform(child), Affine::translate((-3.0, 1.0)));
    }
}
