// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opaque server handles.

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw server-assigned value.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw server-assigned value.
            pub const fn to_raw(self) -> u64 {
                self.0
            }
        }
    };
}

handle!(
    /// A render-server canvas: the root that top-level canvas items attach to.
    CanvasId
);
handle!(
    /// A render-server canvas item: a node in the draw hierarchy with its own command buffer.
    CanvasItemId
);
handle!(
    /// A material resource shared between canvas items.
    MaterialId
);
handle!(
    /// A texture resource.
    TextureId
);
handle!(
    /// A physics space. Bodies and areas only interact with objects in the same space.
    SpaceId
);
handle!(
    /// A physics body.
    BodyId
);
handle!(
    /// A physics area.
    AreaId
);
handle!(
    /// User data attached to a physics object so callbacks can resolve the owning node.
    ObjectInstance
);
