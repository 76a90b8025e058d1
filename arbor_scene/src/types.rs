// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene tree: node identifiers, kinds, notifications and signals.

use arbor_server::ObjectInstance;

/// Identifier for a node in the scene tree (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// The object instance attached to physics objects owned by this node.
    pub const fn to_instance(self) -> ObjectInstance {
        ObjectInstance::from_raw(((self.1 as u64) << 32) | self.0 as u64)
    }

    /// Resolve an object instance back into the node id it was made from.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Both halves were packed from 32-bit values."
    )]
    pub const fn from_instance(instance: ObjectInstance) -> Self {
        let raw = instance.to_raw();
        Self(raw as u32, (raw >> 32) as u32)
    }
}

/// The closed set of node kinds, fixed when a node is created.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// A plain node with no spatial state.
    Node,
    /// A viewport: owns a canvas and a physics space for everything below it.
    Viewport,
    /// A canvas layer: owns a separate canvas with its own transform and stacking layer.
    CanvasLayer,
    /// A spatial canvas item with a decomposed local transform.
    Node2D,
    /// A [`Node2D`](NodeKind::Node2D) bound to a physics body or area.
    CollisionObject2D,
    /// A single-shape owner registering with its parent collision object.
    CollisionShape2D,
    /// A polygon owner registering its decomposition with its parent collision object.
    CollisionPolygon2D,
    /// A sparse tile grid bucketed into quadrants.
    TileMap,
}

impl NodeKind {
    /// Whether nodes of this kind carry canvas-item state.
    pub const fn is_canvas_item(self) -> bool {
        matches!(
            self,
            Self::Node2D
                | Self::CollisionObject2D
                | Self::CollisionShape2D
                | Self::CollisionPolygon2D
                | Self::TileMap
        )
    }

    /// Whether nodes of this kind carry a decomposed 2D transform.
    pub const fn is_node_2d(self) -> bool {
        self.is_canvas_item()
    }
}

/// Notifications dispatched to nodes by the scene tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Notification {
    /// The node entered the tree. Sent parent-first.
    EnterTree,
    /// The node is about to leave the tree. Sent children-first.
    ExitTree,
    /// The node was linked under a parent.
    Parented,
    /// The node was unlinked from its parent.
    Unparented,
    /// The node's index among its siblings changed.
    MovedInParent,
    /// A canvas item was attached to its canvas.
    EnterCanvas,
    /// A canvas item is about to be detached from its canvas.
    ExitCanvas,
    /// A canvas item is being redrawn.
    Draw,
    /// A canvas item's effective visibility changed.
    VisibilityChanged,
    /// A canvas item's global transform changed. Deferred, at most once per flush.
    TransformChanged,
    /// A canvas item's local transform changed. Immediate.
    LocalTransformChanged,
}

/// Signals emitted by nodes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signal {
    /// A canvas item finished a redraw.
    Draw,
    /// A canvas item's visibility changed.
    VisibilityChanged,
    /// A canvas item was hidden.
    Hide,
    /// A canvas item's bounding rectangle changed.
    ItemRectChanged,
    /// A tile map's geometry settings changed.
    SettingsChanged,
}

/// A signal together with the node that emitted it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EmittedSignal {
    /// The emitter.
    pub node: NodeId,
    /// The signal.
    pub signal: Signal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_round_trip_keeps_generation() {
        let id = NodeId::new(7, 3);
        assert_eq!(NodeId::from_instance(id.to_instance()), id);
        assert_ne!(id.to_instance(), NodeId::new(7, 4).to_instance());
    }
}
