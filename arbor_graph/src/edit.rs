// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node mutations: properties, relations and ordering.
//!
//! Every operation here is a no-op returning `false` when the registry is
//! immutable or a node involved is missing. Structural operations also
//! refuse nodes that are being destroyed.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use smallvec::SmallVec;

use crate::db::Db;
use crate::id::{NodeId, PropertyId};
use crate::node::{DragPolicy, Node, ParentEdge};
use crate::observer::Event;
use crate::value::PropertyValue;

impl Db {
    // =========================================================================
    // Properties
    // =========================================================================

    /// Stores `value` in `property` of `node`, replacing any previous value.
    ///
    /// Each parent is notified with [`Event::ChildChanged`] first, then the
    /// node's own observers with [`Event::Changed`].
    ///
    /// ```rust
    /// use arbor_graph::{Db, PropertyId};
    ///
    /// const TITLE: PropertyId = PropertyId::new(2);
    ///
    /// let mut db = Db::new("bookmarks");
    /// let node = db.new_node().unwrap();
    /// assert!(db.set_property(node, TITLE, "Arbor"));
    /// assert_eq!(db.node(node).unwrap().string(TITLE), "Arbor");
    ///
    /// db.set_immutable(true);
    /// assert!(!db.set_property(node, TITLE, "ignored"));
    /// assert_eq!(db.node(node).unwrap().string(TITLE), "Arbor");
    /// ```
    pub fn set_property(
        &mut self,
        node: NodeId,
        property: PropertyId,
        value: impl Into<PropertyValue>,
    ) -> bool {
        if self.is_immutable() {
            return false;
        }
        let Some(slot) = self.slot_mut(node) else {
            return false;
        };
        slot.store(property, Some(value.into()));
        self.notify_changed(node, property);
        true
    }

    /// Empties the slot for `property`. The property array keeps its length.
    ///
    /// Emits the same notifications as [`set_property`](Self::set_property).
    /// Returns `false` (and emits nothing) if the property was not set.
    pub fn clear_property(&mut self, node: NodeId, property: PropertyId) -> bool {
        if self.is_immutable() {
            return false;
        }
        let Some(slot) = self.slot_mut(node) else {
            return false;
        };
        if !slot.has_property(property) {
            return false;
        }
        slot.store(property, None);
        self.notify_changed(node, property);
        true
    }

    /// Stores a value without notifying anyone.
    ///
    /// Persistence uses this while a node is being reconstructed, then calls
    /// [`mark_restored`](Self::mark_restored) once it is complete.
    pub fn restore_property(
        &mut self,
        node: NodeId,
        property: PropertyId,
        value: PropertyValue,
    ) -> bool {
        if self.is_immutable() {
            return false;
        }
        self.slot_mut(node)
            .is_some_and(|slot| slot.store(property, Some(value)))
    }

    /// Emits [`Event::Restored`] on `node`.
    pub fn mark_restored(&mut self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        self.emit(node, &Event::Restored);
        true
    }

    fn notify_changed(&mut self, node: NodeId, property: PropertyId) {
        let parents: SmallVec<[NodeId; 2]> = self
            .node(node)
            .map(|n| n.parents().map(ParentEdge::parent).collect())
            .unwrap_or_default();
        for parent in parents {
            self.emit(
                parent,
                &Event::ChildChanged {
                    child: node,
                    property,
                },
            );
        }
        self.emit(node, &Event::Changed(property));
    }

    /// Sets the drag-and-drop policy of `node`.
    ///
    /// The policy is presentation metadata and may be changed on an
    /// immutable registry.
    pub fn set_drag_policy(&mut self, node: NodeId, policy: DragPolicy) -> bool {
        self.slot_mut(node).is_some_and(|slot| {
            slot.drag = policy;
            true
        })
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Appends `child` to the children of `parent`.
    ///
    /// Adding a node that is already a child of `parent` changes nothing and
    /// returns `false`; so does adding a node to itself. Otherwise the child
    /// records the edge with its new index and `parent` emits
    /// [`Event::ChildAdded`].
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.is_immutable() {
            return false;
        }
        if parent == child {
            log::warn!("refusing to make node {parent} its own child");
            return false;
        }
        let (Some(p), Some(c)) = (self.usable(parent), self.usable(child)) else {
            return false;
        };
        if c.is_child_of(parent) {
            return false;
        }
        let index = p.child_count();

        if let Some(p) = self.slot_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.slot_mut(child) {
            c.parents.push(ParentEdge { parent, index });
        }
        self.emit(parent, &Event::ChildAdded(child));
        true
    }

    /// Removes `child` from the children of `parent`.
    ///
    /// Later siblings shift down by one. After the edge is gone `parent`
    /// emits [`Event::ChildRemoved`] with the position the child occupied.
    ///
    /// ```rust
    /// use arbor_graph::Db;
    ///
    /// let mut db = Db::new("bookmarks");
    /// let list = db.new_node().unwrap();
    /// let (a, b, c) = (
    ///     db.new_node().unwrap(),
    ///     db.new_node().unwrap(),
    ///     db.new_node().unwrap(),
    /// );
    /// for child in [a, b, c] {
    ///     db.add_child(list, child);
    /// }
    ///
    /// assert!(db.remove_child(list, a));
    /// assert_eq!(db.node(list).unwrap().children(), &[b, c]);
    /// assert_eq!(db.child_index(list, c), Some(1));
    /// ```
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.is_immutable() {
            return false;
        }
        if self.usable(parent).is_none() || self.usable(child).is_none() {
            return false;
        }
        self.detach(parent, child)
    }

    /// Removes the edge between `parent` and `child`, fixes sibling indices
    /// and emits [`Event::ChildRemoved`] on `parent`.
    pub(crate) fn detach(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(edge) = self
            .slot_mut(child)
            .and_then(|c| c.remove_parent_edge(parent))
        else {
            return false;
        };
        let old_index = edge.index();
        let Some(p) = self.slot_mut(parent) else {
            return false;
        };
        debug_assert_eq!(
            p.children.get(old_index),
            Some(&child),
            "parent edge index out of sync"
        );
        p.children.remove(old_index);
        self.reindex_children(parent, old_index);
        self.emit(parent, &Event::ChildRemoved { child, old_index });
        true
    }

    /// Rewrites the parent edge index of every child of `parent` at or after
    /// position `from`.
    fn reindex_children(&mut self, parent: NodeId, from: usize) {
        let mut index = from;
        while let Some(child) = self.node(parent).and_then(|p| p.nth_child(index)) {
            if let Some(edge) = self
                .slot_mut(child)
                .and_then(|c| c.parent_edge_mut(parent))
            {
                edge.index = index;
            }
            index += 1;
        }
    }

    /// Stable-sorts the children of `parent` with `compare`.
    ///
    /// Emits [`Event::ChildrenReordered`] with the old-to-new mapping.
    pub fn sort_children<F>(&mut self, parent: NodeId, mut compare: F) -> bool
    where
        F: FnMut(&Node, &Node) -> Ordering,
    {
        if self.is_immutable() {
            return false;
        }
        let Some(children) = self.usable(parent).map(|p| p.children.clone()) else {
            return false;
        };

        let mut order: Vec<(usize, NodeId)> = children.into_iter().enumerate().collect();
        order.sort_by(|(_, a), (_, b)| match (self.node(*a), self.node(*b)) {
            (Some(a), Some(b)) => compare(a, b),
            _ => Ordering::Equal,
        });
        self.apply_order(parent, &order);
        true
    }

    /// Rearranges the children of `parent`.
    ///
    /// `order[old] = new`: the child currently at position `i` moves to
    /// `order[i]`. This is the same shape as the
    /// [`Event::ChildrenReordered`] payload, which for this call equals
    /// `order`. `order` must be a permutation of `0..child_count`; anything
    /// else is rejected with a warning and changes nothing.
    ///
    /// ```rust
    /// use arbor_graph::{Db, Event, EventKind};
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let mut db = Db::new("bookmarks");
    /// let list = db.new_node().unwrap();
    /// let a = db.new_node().unwrap();
    /// let b = db.new_node().unwrap();
    /// let c = db.new_node().unwrap();
    /// for child in [a, b, c] {
    ///     db.add_child(list, child);
    /// }
    ///
    /// let seen = Rc::new(RefCell::new(None));
    /// let sink = seen.clone();
    /// db.connect(list, EventKind::ChildrenReordered, move |_, _, event| {
    ///     if let Event::ChildrenReordered(map) = event {
    ///         *sink.borrow_mut() = Some(map.clone());
    ///     }
    /// })
    /// .unwrap();
    ///
    /// // a moves 0 -> 1, b moves 1 -> 2, c moves 2 -> 0.
    /// assert!(db.reorder_children(list, &[1, 2, 0]));
    /// assert_eq!(db.node(list).unwrap().children(), &[c, a, b]);
    /// assert_eq!(seen.borrow().as_deref(), Some(&[1, 2, 0][..]));
    /// ```
    pub fn reorder_children(&mut self, parent: NodeId, order: &[usize]) -> bool {
        if self.is_immutable() {
            return false;
        }
        let Some(children) = self.usable(parent).map(|p| p.children.clone()) else {
            return false;
        };
        if !is_permutation(order, children.len()) {
            log::warn!(
                "ignoring reorder of node {parent}: {order:?} is not a permutation of 0..{}",
                children.len()
            );
            return false;
        }
        let mut placed: Vec<(usize, NodeId)> = children.into_iter().enumerate().collect();
        placed.sort_unstable_by_key(|&(old, _)| order[old]);
        self.apply_order(parent, &placed);
        true
    }

    /// Installs `order` (new position -> (old position, child)) as the
    /// children of `parent` and emits the old-to-new map.
    fn apply_order(&mut self, parent: NodeId, order: &[(usize, NodeId)]) {
        let mut new_order = vec![-1_isize; order.len()];
        for (new, &(old, _)) in order.iter().enumerate() {
            new_order[old] = new as isize;
        }
        if let Some(p) = self.slot_mut(parent) {
            p.children = order.iter().map(|&(_, child)| child).collect();
        }
        self.reindex_children(parent, 0);
        self.emit(parent, &Event::ChildrenReordered(new_order));
    }

    // =========================================================================
    // Relation queries
    // =========================================================================

    /// Returns `true` if `child` is a child of `parent`.
    #[must_use]
    pub fn has_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.node(child).is_some_and(|c| c.is_child_of(parent))
    }

    /// Position of `child` within `parent`'s children.
    #[must_use]
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(child)?.parent_edge(parent).map(ParentEdge::index)
    }

    /// The sibling after `child` under `parent`.
    #[must_use]
    pub fn next_child(&self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let index = self.child_index(parent, child)?;
        self.node(parent)?.nth_child(index + 1)
    }

    /// The sibling before `child` under `parent`.
    #[must_use]
    pub fn previous_child(&self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let index = self.child_index(parent, child)?.checked_sub(1)?;
        self.node(parent)?.nth_child(index)
    }
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
