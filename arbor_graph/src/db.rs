// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The node registry: identity allocation, mutability and lifetime.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::error::Rejected;
use crate::id::NodeId;
use crate::node::{Lifecycle, Node};
use crate::observer::Event;

/// Builder for a [`Db`].
///
/// ```rust
/// use arbor_graph::{Db, NodeId};
///
/// // Ids 0..10 are left for hand-placed roots.
/// let mut db = Db::builder("bookmarks").reserved_ids(10).build();
/// assert_eq!(db.new_node().unwrap(), NodeId::new(10));
///
/// let root = db.new_node_with_id(NodeId::new(0)).unwrap();
/// assert!(db.contains(root));
/// ```
#[derive(Clone, Debug)]
pub struct DbBuilder {
    name: String,
    reserved_ids: u32,
    immutable: bool,
    capacity: usize,
}

impl DbBuilder {
    /// Number of low ids that automatic allocation never hands out.
    ///
    /// Defaults to 1, so id 0 is never allocated and the first node created
    /// with [`Db::new_node`] receives id 1. Reserved ids can still be claimed
    /// explicitly with [`Db::new_node_with_id`].
    #[must_use]
    pub fn reserved_ids(mut self, count: u32) -> Self {
        self.reserved_ids = count;
        self
    }

    /// Starts the registry in the immutable state.
    #[must_use]
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    /// Pre-allocates room for `capacity` nodes.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds the registry.
    #[must_use]
    pub fn build(self) -> Db {
        Db {
            name: self.name,
            immutable: self.immutable,
            nodes: HashMap::with_capacity(self.capacity),
            reserved: HashSet::new(),
            floor: self.reserved_ids,
            cursor: self.reserved_ids,
        }
    }
}

/// Owner of a set of nodes.
///
/// The registry hands out node ids, stores every live node in a table keyed
/// by id, and carries the mutability flag every mutation consults. Relations
/// between nodes are plain ids resolved through this table, so neither a
/// parent nor a child keeps the other alive.
///
/// # Mutability
///
/// While [`is_immutable`](Self::is_immutable) is set, node creation fails with
/// [`Rejected::Immutable`] and every other mutation is a no-op returning
/// `false`. Reference counting is exempt: readers of an immutable registry
/// still take and drop references.
///
/// # Lifetime
///
/// A node starts with one reference. When [`unref_node`](Self::unref_node)
/// drops the count to zero the node is destroyed:
///
/// 1. observers of [`EventKind::Destroy`](crate::EventKind::Destroy) run while
///    the node is still fully readable;
/// 2. the node is removed from every parent, each of which emits
///    [`Event::ChildRemoved`];
/// 3. its children lose their edge to it but are otherwise untouched;
/// 4. the id is released and the property storage freed.
///
/// If the count hits zero while the node is emitting, destruction waits until
/// the outermost emission on it returns.
#[derive(Debug)]
pub struct Db {
    name: String,
    immutable: bool,
    nodes: HashMap<NodeId, Node>,
    reserved: HashSet<NodeId>,
    /// Lowest id automatic allocation considers.
    floor: u32,
    /// Where the next search for a free id starts.
    cursor: u32,
}

impl Db {
    /// Creates an empty, mutable registry with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Starts building a registry.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> DbBuilder {
        DbBuilder {
            name: name.into(),
            reserved_ids: 1,
            immutable: false,
            capacity: 0,
        }
    }

    /// The registry's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if mutations are currently rejected.
    #[must_use]
    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Sets or lifts the immutability flag.
    pub fn set_immutable(&mut self, immutable: bool) {
        self.immutable = immutable;
    }

    /// Number of nodes in the registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the registry holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `id` names a node in this registry.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Ids of every node, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub(crate) fn slot_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Returns the node if it exists and is not being torn down.
    pub(crate) fn usable(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(&id)
            .filter(|n| n.lifecycle != Lifecycle::Destroying)
    }

    // =========================================================================
    // Id allocation
    // =========================================================================

    fn is_taken(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id) || self.reserved.contains(&id)
    }

    fn next_free_id(&self) -> Result<NodeId, Rejected> {
        let mut raw = self.cursor.max(self.floor);
        loop {
            let id = NodeId::new(raw);
            if !self.is_taken(id) {
                return Ok(id);
            }
            raw = raw.checked_add(1).ok_or(Rejected::IdsExhausted)?;
        }
    }

    fn advance_cursor(&mut self, id: NodeId) {
        self.cursor = id.get().saturating_add(1);
    }

    fn rewind_cursor(&mut self, id: NodeId) {
        self.cursor = self.cursor.min(id.get()).max(self.floor);
    }

    /// Reserves a fresh id without creating a node.
    ///
    /// The id will not be handed out by [`new_node`](Self::new_node) until it
    /// is released; claim it with [`new_node_with_id`](Self::new_node_with_id).
    pub fn reserve_id(&mut self) -> Result<NodeId, Rejected> {
        let id = self.next_free_id()?;
        self.reserved.insert(id);
        self.advance_cursor(id);
        Ok(id)
    }

    /// Returns `id` to the pool.
    ///
    /// Forgets a reservation, or re-offers the id of a node that no longer
    /// exists. Refused (returns `false`) while a live node holds the id.
    pub fn release_id(&mut self, id: NodeId) -> bool {
        if self.nodes.contains_key(&id) {
            log::warn!("refusing to release id {id}: node is live");
            return false;
        }
        self.reserved.remove(&id);
        self.rewind_cursor(id);
        true
    }

    /// Returns `true` if `id` is reserved and not yet claimed.
    #[must_use]
    pub fn is_reserved(&self, id: NodeId) -> bool {
        self.reserved.contains(&id)
    }

    // =========================================================================
    // Creation and lifetime
    // =========================================================================

    /// Creates a node with a freshly allocated id.
    pub fn new_node(&mut self) -> Result<NodeId, Rejected> {
        if self.immutable {
            return Err(Rejected::Immutable);
        }
        let id = self.next_free_id()?;
        self.advance_cursor(id);
        self.nodes.insert(id, Node::new(id));
        Ok(id)
    }

    /// Creates a node with a caller-chosen id.
    ///
    /// Used when reconstructing persisted nodes and for well-known roots. A
    /// reservation for `id` is consumed.
    pub fn new_node_with_id(&mut self, id: NodeId) -> Result<NodeId, Rejected> {
        if self.immutable {
            return Err(Rejected::Immutable);
        }
        if self.nodes.contains_key(&id) {
            return Err(Rejected::IdInUse(id));
        }
        self.reserved.remove(&id);
        self.nodes.insert(id, Node::new(id));
        Ok(id)
    }

    /// Takes a reference on `id`. Returns `false` if there is no such node or
    /// it is being destroyed.
    ///
    /// Taking a reference on a node whose destruction was deferred cancels
    /// the destruction.
    pub fn ref_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        match node.lifecycle {
            Lifecycle::Destroying => false,
            Lifecycle::PendingDestroy => {
                node.lifecycle = Lifecycle::Alive;
                node.ref_count = 1;
                true
            }
            Lifecycle::Alive => {
                node.ref_count = node.ref_count.saturating_add(1);
                true
            }
        }
    }

    /// Drops a reference on `id`, destroying the node when none remain.
    ///
    /// Returns `false` if there is no such node or it has no references left.
    pub fn unref_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.lifecycle != Lifecycle::Alive || node.ref_count == 0 {
            return false;
        }
        node.ref_count -= 1;
        if node.ref_count == 0 {
            self.destroy(id);
        }
        true
    }

    /// Current reference count of `id`, or 0 if there is no such node.
    #[must_use]
    pub fn ref_count(&self, id: NodeId) -> u32 {
        self.nodes.get(&id).map_or(0, Node::ref_count)
    }

    pub(crate) fn destroy(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        match node.lifecycle {
            Lifecycle::Destroying => return,
            _ if node.observers.is_emitting() => {
                log::debug!("deferring destruction of node {id} until dispatch completes");
                node.lifecycle = Lifecycle::PendingDestroy;
                return;
            }
            _ => node.lifecycle = Lifecycle::Destroying,
        }

        self.emit(id, &Event::Destroy);

        let parents: SmallVec<[NodeId; 2]> = self
            .nodes
            .get(&id)
            .map(|n| n.parents().map(|e| e.parent()).collect())
            .unwrap_or_default();
        for parent in parents {
            self.detach(parent, id);
        }

        let children: Vec<NodeId> = self
            .nodes
            .get_mut(&id)
            .map(|n| core::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            if let Some(child) = self.nodes.get_mut(&child) {
                child.remove_parent_edge(id);
            }
        }

        if let Some(mut node) = self.nodes.remove(&id) {
            node.observers.clear();
        }
        self.rewind_cursor(id);
        log::trace!("destroyed node {id}");
    }
}
