// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The node entity: properties, relations and policy flags.
//!
//! A [`Node`] is only ever reached through its [`Db`](crate::Db). Reads go
//! through `&Node`; every mutation is a `Db` method so that it can honor the
//! registry's mutability flag, keep sibling indices consistent and emit
//! events.

use alloc::vec::Vec;
use core::iter::FusedIterator;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::id::{NodeId, PropertyId};
use crate::observer::ObserverTable;
use crate::value::PropertyValue;

bitflags! {
    /// Drag-and-drop policy carried by a node.
    ///
    /// The graph never interprets these bits; they are consulted by whatever
    /// presents the node to a user.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DragPolicy: u8 {
        /// The node may be dragged.
        const SOURCE = 1 << 0;
        /// Other nodes may be dropped onto this node.
        const DEST = 1 << 1;
    }
}

/// A relation recording that a node sits at `index` in `parent`'s children.
///
/// Edges do not own anything: neither the parent nor the child keeps the
/// other alive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParentEdge {
    pub(crate) parent: NodeId,
    pub(crate) index: usize,
}

impl ParentEdge {
    /// The parent node.
    #[must_use]
    #[inline]
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Position of the child within the parent's children.
    #[must_use]
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Alive,
    /// The last reference went away mid-emission; destroy once it returns.
    PendingDestroy,
    Destroying,
}

/// Most nodes have one parent, some two (a list and a category).
const INLINE_PARENTS: usize = 2;

/// A graph entity with typed properties and DAG relations.
///
/// # Sentinels
///
/// The typed getters never fail. A missing property, an id beyond the end of
/// the property array, or a value of another kind all read as the sentinel
/// listed on each getter. Use [`property`](Self::property) when "missing"
/// must be told apart from a stored sentinel value.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    pub(crate) properties: Vec<Option<PropertyValue>>,
    pub(crate) parents: SmallVec<[ParentEdge; INLINE_PARENTS]>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) observers: ObserverTable,
    pub(crate) ref_count: u32,
    pub(crate) drag: DragPolicy,
    pub(crate) lifecycle: Lifecycle,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            properties: Vec::new(),
            parents: SmallVec::new(),
            children: Vec::new(),
            observers: ObserverTable::default(),
            ref_count: 1,
            drag: DragPolicy::empty(),
            lifecycle: Lifecycle::Alive,
        }
    }

    /// The node's identity within its registry.
    #[must_use]
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current reference count. A freshly created node starts at 1.
    #[must_use]
    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// The node's drag-and-drop policy.
    #[must_use]
    #[inline]
    pub fn drag_policy(&self) -> DragPolicy {
        self.drag
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.lifecycle == Lifecycle::Alive
    }

    pub(crate) fn take_pending_destroy(&mut self) -> bool {
        if self.lifecycle == Lifecycle::PendingDestroy {
            self.lifecycle = Lifecycle::Alive;
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the stored value, or `None` if the slot is empty or out of
    /// range.
    #[must_use]
    pub fn property(&self, property: PropertyId) -> Option<&PropertyValue> {
        self.properties.get(property.index())?.as_ref()
    }

    /// Returns `true` if a value is stored for `property`.
    #[must_use]
    pub fn has_property(&self, property: PropertyId) -> bool {
        self.property(property).is_some()
    }

    /// Length of the property array, including empty slots.
    ///
    /// The array grows to cover the largest id ever set and never shrinks.
    #[must_use]
    pub fn property_slots(&self) -> usize {
        self.properties.len()
    }

    /// Iterates the set properties in id order.
    pub fn properties(&self) -> impl Iterator<Item = (PropertyId, &PropertyValue)> + '_ {
        self.properties.iter().enumerate().filter_map(|(i, slot)| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slots are only created from u16 property ids"
            )]
            let id = PropertyId::new(i as u16);
            slot.as_ref().map(|value| (id, value))
        })
    }

    /// Text value, or `""`.
    #[must_use]
    pub fn string(&self, property: PropertyId) -> &str {
        self.property(property)
            .and_then(PropertyValue::as_str)
            .unwrap_or("")
    }

    /// Boolean value, or `false`.
    #[must_use]
    pub fn bool(&self, property: PropertyId) -> bool {
        self.property(property)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    /// `Int` value, or `-1`.
    #[must_use]
    pub fn int(&self, property: PropertyId) -> i32 {
        self.property(property)
            .and_then(PropertyValue::as_int)
            .unwrap_or(-1)
    }

    /// `Long` value, or `-1`.
    #[must_use]
    pub fn long(&self, property: PropertyId) -> i64 {
        self.property(property)
            .and_then(PropertyValue::as_long)
            .unwrap_or(-1)
    }

    /// `Float` value, or `-1.0`.
    #[must_use]
    pub fn float(&self, property: PropertyId) -> f32 {
        self.property(property)
            .and_then(PropertyValue::as_float)
            .unwrap_or(-1.0)
    }

    /// `Double` value, or `-1.0`.
    #[must_use]
    pub fn double(&self, property: PropertyId) -> f64 {
        self.property(property)
            .and_then(PropertyValue::as_double)
            .unwrap_or(-1.0)
    }

    /// Referenced node, or `None`.
    ///
    /// The reference is an identity only; check [`Db::contains`](crate::Db::contains)
    /// before relying on the target still existing.
    #[must_use]
    pub fn node_ref(&self, property: PropertyId) -> Option<NodeId> {
        self.property(property).and_then(PropertyValue::as_node)
    }

    /// Stores `value` in the slot for `property`, growing the array if needed.
    ///
    /// Clearing (`None`) never grows the array. Returns `false` if nothing
    /// changed shape, i.e. a clear of a slot that does not exist.
    pub(crate) fn store(&mut self, property: PropertyId, value: Option<PropertyValue>) -> bool {
        let index = property.index();
        if index >= self.properties.len() {
            if value.is_none() {
                return false;
            }
            self.properties.resize_with(index + 1, || None);
        }
        self.properties[index] = value;
        true
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Children in display order.
    #[must_use]
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of children.
    #[must_use]
    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// The child at position `n`, if any.
    #[must_use]
    pub fn nth_child(&self, n: usize) -> Option<NodeId> {
        self.children.get(n).copied()
    }

    /// The parent edges of this node, in the order they were established.
    pub fn parents(&self) -> Parents<'_> {
        Parents {
            inner: self.parents.iter(),
        }
    }

    /// Number of parents.
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// The edge to `parent`, if this node is one of its children.
    #[must_use]
    pub fn parent_edge(&self, parent: NodeId) -> Option<&ParentEdge> {
        self.parents.iter().find(|e| e.parent == parent)
    }

    /// Returns `true` if this node is a child of `parent`.
    #[must_use]
    pub fn is_child_of(&self, parent: NodeId) -> bool {
        self.parent_edge(parent).is_some()
    }

    pub(crate) fn parent_edge_mut(&mut self, parent: NodeId) -> Option<&mut ParentEdge> {
        self.parents.iter_mut().find(|e| e.parent == parent)
    }

    pub(crate) fn remove_parent_edge(&mut self, parent: NodeId) -> Option<ParentEdge> {
        let pos = self.parents.iter().position(|e| e.parent == parent)?;
        Some(self.parents.remove(pos))
    }
}

/// Iterator over a node's [`ParentEdge`]s.
#[derive(Clone, Debug)]
pub struct Parents<'a> {
    inner: core::slice::Iter<'a, ParentEdge>,
}

impl<'a> Iterator for Parents<'a> {
    type Item = &'a ParentEdge;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Parents<'_> {}

impl FusedIterator for Parents<'_> {}
