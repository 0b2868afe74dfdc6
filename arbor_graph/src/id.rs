// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node and property identifiers.
//!
//! [`NodeId`] names a node inside one [`Db`](crate::Db); [`PropertyId`] names
//! a slot in a node's sparse property array. Neither carries a schema: the
//! numbers are chosen by the registry (nodes) or by callers (properties).

use core::fmt;

/// Identity of a node within its owning [`Db`](crate::Db).
///
/// Ids are unique among live (and reserved) nodes of one registry. Once a
/// node is destroyed its id may be handed out again.
///
/// # Example
///
/// ```rust
/// use arbor_graph::NodeId;
///
/// let id = NodeId::new(7);
/// assert_eq!(id.get(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node id from its raw value.
    #[must_use]
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this id.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.0).finish()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for NodeId {
    #[inline]
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Index of a property slot on a [`Node`](crate::Node).
///
/// Property ids are plain integers picked by the application, usually as
/// constants:
///
/// ```rust
/// use arbor_graph::PropertyId;
///
/// const TITLE: PropertyId = PropertyId::new(2);
/// const LOCATION: PropertyId = PropertyId::new(3);
///
/// assert!(TITLE < LOCATION);
/// assert_eq!(TITLE.index(), 2);
/// ```
///
/// A node's property array grows to cover the largest id ever set on it, so
/// keep the numbers small and dense. Ids are 16 bits wide, which bounds the
/// array at [`PropertyId::MAX`] + 1 slots.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u16);

impl PropertyId {
    /// The largest property id.
    pub const MAX: Self = Self(u16::MAX);

    /// Creates a property id from its raw value.
    #[must_use]
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this id.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns the slot index this id addresses.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u16> for PropertyId {
    #[inline]
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}
