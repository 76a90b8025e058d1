// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape owners: groups of physics shapes registered on one collision object.
//!
//! Every shape of a collision object has a global subshape index, the position the physics
//! server addresses it by. Indices are contiguous across all owners: a new shape takes index
//! `total_subshapes`, and removing a shape shifts every greater index down by one.

use alloc::sync::Arc;
use alloc::vec::Vec;

use arbor_server::{PhysicsObject, PhysicsServer, Shape};
use kurbo::Affine;
use smallvec::SmallVec;

use crate::types::NodeId;

/// Handle to a shape owner within one collision object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeOwnerId {
    idx: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
struct OwnedShape {
    shape: Arc<Shape>,
    index: usize,
}

#[derive(Clone, Debug)]
struct ShapeOwner {
    generation: u32,
    node: NodeId,
    transform: Affine,
    disabled: bool,
    one_way: bool,
    one_way_margin: f64,
    shapes: SmallVec<[OwnedShape; 2]>,
}

/// The shape owners of one collision object, mirroring their shapes into its physics object.
#[derive(Clone, Debug)]
pub struct ShapeOwnerRegistry {
    rid: PhysicsObject,
    slots: Vec<Option<ShapeOwner>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    total_subshapes: usize,
}

impl ShapeOwnerRegistry {
    pub(crate) fn new(rid: PhysicsObject) -> Self {
        Self {
            rid,
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            total_subshapes: 0,
        }
    }

    fn entry(&self, owner: ShapeOwnerId) -> &ShapeOwner {
        self.slots
            .get(owner.idx as usize)
            .and_then(|s| s.as_ref())
            .filter(|s| s.generation == owner.generation)
            .expect("unknown shape owner")
    }

    fn entry_mut(&mut self, owner: ShapeOwnerId) -> &mut ShapeOwner {
        self.slots
            .get_mut(owner.idx as usize)
            .and_then(|s| s.as_mut())
            .filter(|s| s.generation == owner.generation)
            .expect("unknown shape owner")
    }

    /// The physics object the shapes are mirrored into.
    pub fn rid(&self) -> PhysicsObject {
        self.rid
    }

    /// Register an empty owner for `node`. New owners are enabled, untransformed and not
    /// one-way, with a one-way margin of `1.0`.
    pub(crate) fn create_owner(&mut self, node: NodeId) -> ShapeOwnerId {
        let entry = |generation| ShapeOwner {
            generation,
            node,
            transform: Affine::IDENTITY,
            disabled: false,
            one_way: false,
            one_way_margin: 1.0,
            shapes: SmallVec::new(),
        };
        let idx = if let Some(idx) = self.free_list.pop() {
            self.generations[idx] += 1;
            self.slots[idx] = Some(entry(self.generations[idx]));
            idx
        } else {
            self.generations.push(1);
            self.slots.push(Some(entry(1)));
            self.slots.len() - 1
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Owner counts stay far below u32::MAX."
        )]
        ShapeOwnerId {
            idx: idx as u32,
            generation: self.generations[idx],
        }
    }

    /// Remove every shape of an owner, then the owner itself.
    pub(crate) fn remove_owner(&mut self, server: &mut dyn PhysicsServer, owner: ShapeOwnerId) {
        self.clear_shapes(server, owner);
        self.slots[owner.idx as usize] = None;
        self.free_list.push(owner.idx as usize);
    }

    /// Append a shape at the next global index, with the owner's transform and state.
    pub(crate) fn add_shape(
        &mut self,
        server: &mut dyn PhysicsServer,
        owner: ShapeOwnerId,
        shape: Arc<Shape>,
    ) {
        let index = self.total_subshapes;
        let rid = self.rid;
        let entry = self.entry_mut(owner);
        rid.add_shape(server, shape.clone(), entry.transform, entry.disabled);
        if entry.one_way {
            rid.set_shape_one_way_collision(server, index, true, entry.one_way_margin);
        }
        entry.shapes.push(OwnedShape { shape, index });
        self.total_subshapes += 1;
    }

    /// Remove the owner's `local`-th shape and renumber every later global index.
    pub(crate) fn remove_shape(
        &mut self,
        server: &mut dyn PhysicsServer,
        owner: ShapeOwnerId,
        local: usize,
    ) {
        let entry = self.entry_mut(owner);
        assert!(local < entry.shapes.len(), "shape index out of range");
        let removed = entry.shapes.remove(local).index;
        self.rid.remove_shape(server, removed);
        for shape in self
            .slots
            .iter_mut()
            .flatten()
            .flat_map(|o| o.shapes.iter_mut())
        {
            if shape.index > removed {
                shape.index -= 1;
            }
        }
        self.total_subshapes -= 1;
    }

    /// Remove every shape of an owner.
    pub(crate) fn clear_shapes(&mut self, server: &mut dyn PhysicsServer, owner: ShapeOwnerId) {
        while !self.entry(owner).shapes.is_empty() {
            self.remove_shape(server, owner, 0);
        }
    }

    /// Set the owner's transform relative to the collision object.
    pub(crate) fn set_transform(
        &mut self,
        server: &mut dyn PhysicsServer,
        owner: ShapeOwnerId,
        transform: Affine,
    ) {
        let rid = self.rid;
        let entry = self.entry_mut(owner);
        entry.transform = transform;
        for shape in &entry.shapes {
            rid.set_shape_transform(server, shape.index, transform);
        }
    }

    /// Enable or disable all of the owner's shapes.
    pub(crate) fn set_disabled(
        &mut self,
        server: &mut dyn PhysicsServer,
        owner: ShapeOwnerId,
        disabled: bool,
    ) {
        let rid = self.rid;
        let entry = self.entry_mut(owner);
        entry.disabled = disabled;
        for shape in &entry.shapes {
            rid.set_shape_disabled(server, shape.index, disabled);
        }
    }

    /// Set one-way collision for all of the owner's shapes. Only bodies forward it.
    pub(crate) fn set_one_way_collision(
        &mut self,
        server: &mut dyn PhysicsServer,
        owner: ShapeOwnerId,
        enabled: bool,
    ) {
        let rid = self.rid;
        let entry = self.entry_mut(owner);
        entry.one_way = enabled;
        for shape in &entry.shapes {
            rid.set_shape_one_way_collision(server, shape.index, enabled, entry.one_way_margin);
        }
    }

    /// Set the one-way margin for all of the owner's shapes. Only bodies forward it.
    pub(crate) fn set_one_way_collision_margin(
        &mut self,
        server: &mut dyn PhysicsServer,
        owner: ShapeOwnerId,
        margin: f64,
    ) {
        let rid = self.rid;
        let entry = self.entry_mut(owner);
        entry.one_way_margin = margin;
        for shape in &entry.shapes {
            rid.set_shape_one_way_collision(server, shape.index, entry.one_way, margin);
        }
    }

    /// The node the owner was registered for.
    pub fn owner_node(&self, owner: ShapeOwnerId) -> NodeId {
        self.entry(owner).node
    }

    /// The owner's transform relative to the collision object.
    pub fn transform(&self, owner: ShapeOwnerId) -> Affine {
        self.entry(owner).transform
    }

    /// Whether the owner's shapes are disabled.
    pub fn is_disabled(&self, owner: ShapeOwnerId) -> bool {
        self.entry(owner).disabled
    }

    /// Whether the owner's shapes collide one way.
    pub fn is_one_way_collision(&self, owner: ShapeOwnerId) -> bool {
        self.entry(owner).one_way
    }

    /// The owner's one-way margin.
    pub fn one_way_collision_margin(&self, owner: ShapeOwnerId) -> f64 {
        self.entry(owner).one_way_margin
    }

    /// Number of shapes held by the owner.
    pub fn shape_count(&self, owner: ShapeOwnerId) -> usize {
        self.entry(owner).shapes.len()
    }

    /// The owner's `local`-th shape.
    pub fn shape(&self, owner: ShapeOwnerId, local: usize) -> &Arc<Shape> {
        &self.entry(owner).shapes[local].shape
    }

    /// Global subshape index of the owner's `local`-th shape.
    pub fn shape_index(&self, owner: ShapeOwnerId, local: usize) -> usize {
        self.entry(owner).shapes[local].index
    }

    /// The owner holding the shape at a global subshape index.
    pub fn find_owner(&self, global: usize) -> Option<ShapeOwnerId> {
        self.owners().find(|owner| {
            self.entry(*owner)
                .shapes
                .iter()
                .any(|s| s.index == global)
        })
    }

    /// Whether `owner` is registered.
    pub fn contains(&self, owner: ShapeOwnerId) -> bool {
        self.slots
            .get(owner.idx as usize)
            .and_then(|s| s.as_ref())
            .is_some_and(|s| s.generation == owner.generation)
    }

    /// Every registered owner.
    pub fn owners(&self) -> impl Iterator<Item = ShapeOwnerId> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, s)| {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Owner counts stay far below u32::MAX."
            )]
            s.as_ref().map(|s| ShapeOwnerId {
                idx: idx as u32,
                generation: s.generation,
            })
        })
    }

    /// Number of shapes across all owners.
    pub fn total_subshapes(&self) -> usize {
        self.total_subshapes
    }
}
