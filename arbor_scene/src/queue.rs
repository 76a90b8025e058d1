// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The deferred call queue drained once per frame.

use alloc::collections::VecDeque;
use alloc::string::String;

use crate::types::NodeId;

/// A call scheduled to run at the next drain point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeferredCall {
    /// Redraw a canvas item.
    Update(NodeId),
    /// Rebuild the dirty quadrants of a tile map.
    UpdateDirtyQuadrants(NodeId),
    /// Reassign draw indices for every top-level item of a canvas group.
    RaiseCanvasGroup(String),
}

/// FIFO of deferred calls.
///
/// Calls pushed while the queue is being drained run in the same drain, after everything
/// that was already queued.
#[derive(Clone, Debug, Default)]
pub struct DeferredQueue {
    calls: VecDeque<DeferredCall>,
}

impl DeferredQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call.
    pub fn push(&mut self, call: DeferredCall) {
        self.calls.push_back(call);
    }

    /// Append a call unless an equal call is already queued.
    pub fn push_unique(&mut self, call: DeferredCall) {
        if !self.calls.contains(&call) {
            self.calls.push_back(call);
        }
    }

    /// Take the oldest call.
    pub fn pop(&mut self) -> Option<DeferredCall> {
        self.calls.pop_front()
    }

    /// Number of queued calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Whether an equal call is queued.
    pub fn contains(&self, call: &DeferredCall) -> bool {
        self.calls.contains(call)
    }
}
