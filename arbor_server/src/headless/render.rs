// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::Affine;

use crate::{
    CanvasId, CanvasItemId, CanvasParent, Color, DrawCommand, MaterialId, RenderServer,
};

/// Recorded state of a canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasRecord {
    /// Canvas transform.
    pub transform: Affine,
    /// Stacking layer.
    pub layer: i32,
}

/// Recorded state of a canvas item.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasItemRecord {
    /// Current parent.
    pub parent: CanvasParent,
    /// Draw order among siblings.
    pub draw_index: i32,
    /// Transform relative to the parent.
    pub transform: Affine,
    /// Visibility flag.
    pub visible: bool,
    /// Inherited modulation.
    pub modulate: Color,
    /// Own modulation.
    pub self_modulate: Color,
    /// Material, if any.
    pub material: Option<MaterialId>,
    /// Whether the parent material is used.
    pub use_parent_material: bool,
    /// Light mask.
    pub light_mask: u32,
    /// Z index.
    pub z_index: i32,
    /// Whether the z index is relative to the parent.
    pub z_as_relative: bool,
    /// Whether children are sorted by y.
    pub sort_children_by_y: bool,
    /// Commands added since the last clear.
    pub commands: Vec<DrawCommand>,
    /// How many times the buffer was cleared.
    pub clear_count: usize,
}

impl Default for CanvasItemRecord {
    fn default() -> Self {
        Self {
            parent: CanvasParent::None,
            draw_index: 0,
            transform: Affine::IDENTITY,
            visible: true,
            modulate: Color::WHITE,
            self_modulate: Color::WHITE,
            material: None,
            use_parent_material: false,
            light_mask: 1,
            z_index: 0,
            z_as_relative: true,
            sort_children_by_y: false,
            commands: Vec::new(),
            clear_count: 0,
        }
    }
}

/// A [`RenderServer`] that records every call.
#[derive(Debug, Default)]
pub struct HeadlessRenderServer {
    next_id: u64,
    canvases: HashMap<CanvasId, CanvasRecord>,
    items: HashMap<CanvasItemId, CanvasItemRecord>,
}

impl HeadlessRenderServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a live canvas.
    pub fn canvas(&self, canvas: CanvasId) -> Option<&CanvasRecord> {
        self.canvases.get(&canvas)
    }

    /// State of a live canvas item.
    pub fn canvas_item(&self, item: CanvasItemId) -> Option<&CanvasItemRecord> {
        self.items.get(&item)
    }

    /// Number of live canvas items.
    pub fn canvas_item_count(&self) -> usize {
        self.items.len()
    }

    /// Live items attached to `parent`, in draw order.
    pub fn children_of(&self, parent: CanvasParent) -> Vec<CanvasItemId> {
        let mut children: Vec<_> = self
            .items
            .iter()
            .filter(|(_, r)| r.parent == parent)
            .map(|(id, r)| (r.draw_index, *id))
            .collect();
        children.sort();
        children.into_iter().map(|(_, id)| id).collect()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn canvas_mut(&mut self, canvas: CanvasId) -> &mut CanvasRecord {
        self.canvases.get_mut(&canvas).expect("unknown CanvasId")
    }

    fn item_mut(&mut self, item: CanvasItemId) -> &mut CanvasItemRecord {
        self.items.get_mut(&item).expect("unknown CanvasItemId")
    }
}

impl RenderServer for HeadlessRenderServer {
    fn canvas_create(&mut self) -> CanvasId {
        let id = CanvasId::from_raw(self.next());
        self.canvases.insert(
            id,
            CanvasRecord {
                transform: Affine::IDENTITY,
                layer: 0,
            },
        );
        id
    }

    fn canvas_free(&mut self, canvas: CanvasId) {
        self.canvases.remove(&canvas).expect("unknown CanvasId");
    }

    fn canvas_set_transform(&mut self, canvas: CanvasId, transform: Affine) {
        self.canvas_mut(canvas).transform = transform;
    }

    fn canvas_set_layer(&mut self, canvas: CanvasId, layer: i32) {
        self.canvas_mut(canvas).layer = layer;
    }

    fn canvas_item_create(&mut self) -> CanvasItemId {
        let id = CanvasItemId::from_raw(self.next());
        self.items.insert(id, CanvasItemRecord::default());
        id
    }

    fn canvas_item_free(&mut self, item: CanvasItemId) {
        self.items.remove(&item).expect("unknown CanvasItemId");
    }

    fn canvas_item_set_parent(&mut self, item: CanvasItemId, parent: CanvasParent) {
        self.item_mut(item).parent = parent;
    }

    fn canvas_item_set_draw_index(&mut self, item: CanvasItemId, index: i32) {
        self.item_mut(item).draw_index = index;
    }

    fn canvas_item_set_transform(&mut self, item: CanvasItemId, transform: Affine) {
        self.item_mut(item).transform = transform;
    }

    fn canvas_item_set_visible(&mut self, item: CanvasItemId, visible: bool) {
        self.item_mut(item).visible = visible;
    }

    fn canvas_item_set_modulate(&mut self, item: CanvasItemId, color: Color) {
        self.item_mut(item).modulate = color;
    }

    fn canvas_item_set_self_modulate(&mut self, item: CanvasItemId, color: Color) {
        self.item_mut(item).self_modulate = color;
    }

    fn canvas_item_set_material(&mut self, item: CanvasItemId, material: Option<MaterialId>) {
        self.item_mut(item).material = material;
    }

    fn canvas_item_set_use_parent_material(&mut self, item: CanvasItemId, enabled: bool) {
        self.item_mut(item).use_parent_material = enabled;
    }

    fn canvas_item_set_light_mask(&mut self, item: CanvasItemId, mask: u32) {
        self.item_mut(item).light_mask = mask;
    }

    fn canvas_item_set_z_index(&mut self, item: CanvasItemId, z: i32) {
        self.item_mut(item).z_index = z;
    }

    fn canvas_item_set_z_as_relative_to_parent(&mut self, item: CanvasItemId, relative: bool) {
        self.item_mut(item).z_as_relative = relative;
    }

    fn canvas_item_set_sort_children_by_y(&mut self, item: CanvasItemId, enabled: bool) {
        self.item_mut(item).sort_children_by_y = enabled;
    }

    fn canvas_item_clear(&mut self, item: CanvasItemId) {
        let record = self.item_mut(item);
        record.commands.clear();
        record.clear_count += 1;
    }

    fn canvas_item_add_command(&mut self, item: CanvasItemId, command: DrawCommand) {
        self.item_mut(item).commands.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn children_are_listed_in_draw_order() {
        let mut rs = HeadlessRenderServer::new();
        let canvas = rs.canvas_create();
        let a = rs.canvas_item_create();
        let b = rs.canvas_item_create();
        rs.canvas_item_set_parent(a, CanvasParent::Canvas(canvas));
        rs.canvas_item_set_parent(b, CanvasParent::Canvas(canvas));
        rs.canvas_item_set_draw_index(a, 3);
        rs.canvas_item_set_draw_index(b, -1);
        assert_eq!(rs.children_of(CanvasParent::Canvas(canvas)), [b, a]);
    }

    #[test]
    fn clear_drops_commands_and_counts() {
        let mut rs = HeadlessRenderServer::new();
        let item = rs.canvas_item_create();
        rs.canvas_item_add_command(
            item,
            DrawCommand::Circle {
                center: Point::ORIGIN,
                radius: 2.0,
                color: Color::WHITE,
            },
        );
        rs.canvas_item_clear(item);
        let record = rs.canvas_item(item).unwrap();
        assert!(record.commands.is_empty(), "clear must drop recorded commands");
        assert_eq!(record.clear_count, 1);
    }

    #[test]
    #[should_panic(expected = "unknown CanvasItemId")]
    fn freed_items_reject_calls() {
        let mut rs = HeadlessRenderServer::new();
        let item = rs.canvas_item_create();
        rs.canvas_item_free(item);
        rs.canvas_item_set_visible(item, false);
    }
}
