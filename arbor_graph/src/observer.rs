// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node observers and reentrancy-safe dispatch.
//!
//! Every node carries a table of observers, each registered for one
//! [`EventKind`]. Mutations emit an [`Event`] synchronously; the callback
//! receives `&mut Db` and may itself mutate the graph, including
//! disconnecting observers of the node that is currently emitting.
//!
//! ## Invalidate, then sweep
//!
//! While a node is emitting (its emission depth is non-zero) its observer
//! table is never restructured:
//!
//! - [`Db::connect`] is rejected with [`ConnectError::EmissionInProgress`].
//! - [`Db::disconnect`] only flags the entry as invalidated and bumps the
//!   node's invalidated counter. The dispatcher skips flagged entries.
//! - When the outermost emission on the node returns, every flagged entry is
//!   removed in one pass.
//!
//! Observers connected with [`Db::connect_owned`] hold their owner weakly. An
//! entry whose owner has been dropped is treated exactly like a disconnect:
//! flagged when noticed during dispatch and swept afterwards.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use arbor_graph::{Db, Event, EventKind, PropertyId};
//!
//! const TITLE: PropertyId = PropertyId::new(0);
//!
//! let mut db = Db::new("bookmarks");
//! let node = db.new_node().unwrap();
//!
//! // An observer that removes itself the first time it runs.
//! let calls = Rc::new(Cell::new(0));
//! let seen = calls.clone();
//! let slot = Rc::new(Cell::new(None));
//! let me = slot.clone();
//! let id = db
//!     .connect(node, EventKind::Changed, move |db, node, _event| {
//!         seen.set(seen.get() + 1);
//!         if let Some(id) = me.get() {
//!             db.disconnect(node, id);
//!         }
//!     })
//!     .unwrap();
//! slot.set(Some(id));
//!
//! db.set_property(node, TITLE, "first");
//! db.set_property(node, TITLE, "second");
//! assert_eq!(calls.get(), 1);
//! assert_eq!(db.observer_count(node), 0);
//! ```

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::db::Db;
use crate::error::ConnectError;
use crate::id::{NodeId, PropertyId};

/// The kinds of event a node emits; observers subscribe to one kind each.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The node is about to be torn down.
    Destroy,
    /// The node was reconstructed from persisted data.
    Restored,
    /// A property of the node changed.
    Changed,
    /// A child was appended.
    ChildAdded,
    /// A property of one of the node's children changed.
    ChildChanged,
    /// A child was removed.
    ChildRemoved,
    /// The children were sorted or permuted.
    ChildrenReordered,
}

/// An event emitted by a node, with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Emitted before any teardown so observers can still read the node.
    Destroy,
    /// Emitted once a node loaded from persisted data is fully populated.
    Restored,
    /// The given property was set or cleared.
    Changed(PropertyId),
    /// The given node was appended to the children.
    ChildAdded(NodeId),
    /// A property of a child was set or cleared.
    ChildChanged {
        /// The child whose property changed.
        child: NodeId,
        /// The property that changed.
        property: PropertyId,
    },
    /// A child was removed from the given position.
    ChildRemoved {
        /// The removed child.
        child: NodeId,
        /// The position it occupied before removal.
        old_index: usize,
    },
    /// Children were rearranged. Entry `i` is the new position of the child
    /// previously at position `i`, or `-1` if that position was not
    /// referenced by the new ordering.
    ChildrenReordered(Vec<isize>),
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Destroy => EventKind::Destroy,
            Self::Restored => EventKind::Restored,
            Self::Changed(_) => EventKind::Changed,
            Self::ChildAdded(_) => EventKind::ChildAdded,
            Self::ChildChanged { .. } => EventKind::ChildChanged,
            Self::ChildRemoved { .. } => EventKind::ChildRemoved,
            Self::ChildrenReordered(_) => EventKind::ChildrenReordered,
        }
    }
}

/// Handle for a connected observer, unique per node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u32);

impl ObserverId {
    /// Returns the raw value of this id.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Observer callback: the registry, the emitting node and the event.
pub type ObserverFn = Rc<dyn Fn(&mut Db, NodeId, &Event)>;

struct ObserverEntry {
    id: ObserverId,
    kind: EventKind,
    callback: ObserverFn,
    owner: Option<Weak<dyn Any>>,
    invalidated: bool,
}

impl ObserverEntry {
    fn owner_dropped(&self) -> bool {
        self.owner.as_ref().is_some_and(|w| w.strong_count() == 0)
    }

    fn owned_by(&self, owner: *const ()) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|w| core::ptr::addr_eq(w.as_ptr(), owner))
    }
}

/// What the dispatcher should do with the entry at a given position.
pub(crate) enum Dispatch {
    /// No entry at this position; the pass is over.
    Done,
    /// Entry exists but must not run (other kind, or invalidated).
    Skip,
    /// Run this callback.
    Invoke(ObserverFn),
}

/// A node's observer table plus its emission bookkeeping.
#[derive(Default)]
pub(crate) struct ObserverTable {
    entries: Vec<ObserverEntry>,
    next_id: u32,
    depth: u32,
    invalidated: u32,
}

impl ObserverTable {
    pub(crate) fn is_emitting(&self) -> bool {
        self.depth > 0
    }

    /// Number of entries that are still eligible to run.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.invalidated && !e.owner_dropped())
            .count()
    }

    /// Entries flagged but not yet swept.
    pub(crate) fn invalidated(&self) -> u32 {
        self.invalidated
    }

    pub(crate) fn connect(
        &mut self,
        kind: EventKind,
        callback: ObserverFn,
        owner: Option<Weak<dyn Any>>,
    ) -> Option<ObserverId> {
        if self.is_emitting() {
            return None;
        }
        // At rest nothing is iterating, so entries whose owner went away can
        // be dropped outright.
        self.entries.retain(|e| !e.owner_dropped());
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(ObserverEntry {
            id,
            kind,
            callback,
            owner,
            invalidated: false,
        });
        Some(id)
    }

    pub(crate) fn disconnect(&mut self, id: ObserverId) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        if self.is_emitting() {
            self.invalidate(pos)
        } else {
            self.entries.remove(pos);
            true
        }
    }

    pub(crate) fn disconnect_owner(&mut self, kind: EventKind, owner: *const ()) -> usize {
        if !self.is_emitting() {
            let before = self.entries.len();
            self.entries
                .retain(|e| !(e.kind == kind && e.owned_by(owner)));
            return before - self.entries.len();
        }
        let mut count = 0;
        for pos in 0..self.entries.len() {
            let entry = &self.entries[pos];
            if entry.kind == kind && entry.owned_by(owner) && self.invalidate(pos) {
                count += 1;
            }
        }
        count
    }

    fn invalidate(&mut self, pos: usize) -> bool {
        let entry = &mut self.entries[pos];
        if entry.invalidated {
            return false;
        }
        entry.invalidated = true;
        self.invalidated += 1;
        true
    }

    pub(crate) fn begin_emission(&mut self) {
        self.depth += 1;
    }

    /// Leaves one emission frame; the outermost frame sweeps invalidated
    /// entries.
    pub(crate) fn end_emission(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 && self.invalidated > 0 {
            self.entries.retain(|e| !e.invalidated);
            self.invalidated = 0;
        }
    }

    pub(crate) fn prepare(&mut self, index: usize, kind: EventKind) -> Dispatch {
        let Some(entry) = self.entries.get_mut(index) else {
            return Dispatch::Done;
        };
        if entry.invalidated || entry.kind != kind {
            return Dispatch::Skip;
        }
        if entry.owner_dropped() {
            entry.invalidated = true;
            self.invalidated += 1;
            return Dispatch::Skip;
        }
        Dispatch::Invoke(entry.callback.clone())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.invalidated = 0;
    }
}

impl fmt::Debug for ObserverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverTable")
            .field("entries", &self.entries.len())
            .field("depth", &self.depth)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Connects an observer for one kind of event on `node`.
    ///
    /// Fails if `node` is not live or is currently emitting.
    pub fn connect<F>(
        &mut self,
        node: NodeId,
        kind: EventKind,
        callback: F,
    ) -> Result<ObserverId, ConnectError>
    where
        F: Fn(&mut Self, NodeId, &Event) + 'static,
    {
        self.connect_entry(node, kind, Rc::new(callback), None)
    }

    /// Connects an observer whose lifetime is tied to `owner`.
    ///
    /// The table keeps only a weak reference. Once every strong reference to
    /// `owner` is dropped the observer stops running and is removed from the
    /// table at the next opportunity, following the same invalidate-then-sweep
    /// path as [`disconnect`](Self::disconnect).
    pub fn connect_owned<T, F>(
        &mut self,
        node: NodeId,
        kind: EventKind,
        owner: &Rc<T>,
        callback: F,
    ) -> Result<ObserverId, ConnectError>
    where
        T: Any,
        F: Fn(&mut Self, NodeId, &Event) + 'static,
    {
        let weak: Weak<T> = Rc::downgrade(owner);
        let weak: Weak<dyn Any> = weak;
        self.connect_entry(node, kind, Rc::new(callback), Some(weak))
    }

    fn connect_entry(
        &mut self,
        node: NodeId,
        kind: EventKind,
        callback: ObserverFn,
        owner: Option<Weak<dyn Any>>,
    ) -> Result<ObserverId, ConnectError> {
        let Some(slot) = self.slot_mut(node) else {
            return Err(ConnectError::UnknownNode(node));
        };
        match slot.observers.connect(kind, callback, owner) {
            Some(id) => Ok(id),
            None => {
                log::warn!("rejected {kind:?} observer on node {node}: emission in progress");
                Err(ConnectError::EmissionInProgress(node))
            }
        }
    }

    /// Disconnects an observer.
    ///
    /// Outside of dispatch the entry is removed immediately. While `node` is
    /// emitting it is only flagged; it will not run again and is removed once
    /// the outermost emission returns. Returns `false` if no such observer is
    /// connected (or it was already disconnected during this dispatch).
    pub fn disconnect(&mut self, node: NodeId, observer: ObserverId) -> bool {
        self.slot_mut(node)
            .is_some_and(|slot| slot.observers.disconnect(observer))
    }

    /// Disconnects every observer of `kind` on `node` that was connected with
    /// `owner`. Returns how many were disconnected.
    pub fn disconnect_owner<T: Any>(
        &mut self,
        node: NodeId,
        kind: EventKind,
        owner: &Rc<T>,
    ) -> usize {
        let ptr = Rc::as_ptr(owner).cast::<()>();
        self.slot_mut(node)
            .map_or(0, |slot| slot.observers.disconnect_owner(kind, ptr))
    }

    /// Number of observers on `node` that may still run.
    #[must_use]
    pub fn observer_count(&self, node: NodeId) -> usize {
        self.node(node).map_or(0, |n| n.observers.len())
    }

    /// Number of observers on `node` that were disconnected during the
    /// current dispatch and are waiting to be swept. Always zero at rest.
    #[must_use]
    pub fn invalidated_observer_count(&self, node: NodeId) -> u32 {
        self.node(node).map_or(0, |n| n.observers.invalidated())
    }

    /// Returns `true` while `node` is dispatching an event.
    #[must_use]
    pub fn is_emitting(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.observers.is_emitting())
    }

    /// Dispatches `event` to the observers of `node` registered for its kind.
    ///
    /// Callbacks run in connection order. The table cannot grow or shrink
    /// while the emission is open, so walking it by position is stable even
    /// when callbacks reenter.
    pub(crate) fn emit(&mut self, node: NodeId, event: &Event) {
        let kind = event.kind();
        let Some(slot) = self.slot_mut(node) else {
            return;
        };
        slot.observers.begin_emission();
        log::trace!("emit {kind:?} on node {node}");

        let mut index = 0;
        loop {
            // Destruction is deferred while emitting, so the slot outlives
            // this loop.
            let Some(slot) = self.slot_mut(node) else {
                break;
            };
            let callback = match slot.observers.prepare(index, kind) {
                Dispatch::Done => break,
                Dispatch::Skip => {
                    index += 1;
                    continue;
                }
                Dispatch::Invoke(callback) => callback,
            };
            index += 1;
            callback(self, node, event);
        }

        let destroy = match self.slot_mut(node) {
            Some(slot) => {
                slot.observers.end_emission();
                !slot.observers.is_emitting() && slot.take_pending_destroy()
            }
            None => false,
        };
        if destroy {
            self.destroy(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ObserverFn {
        Rc::new(|_: &mut Db, _: NodeId, _: &Event| {})
    }

    #[test]
    fn event_kind_matches_payload() {
        assert_eq!(Event::Destroy.kind(), EventKind::Destroy);
        assert_eq!(
            Event::Changed(PropertyId::new(1)).kind(),
            EventKind::Changed
        );
        assert_eq!(
            Event::ChildRemoved {
                child: NodeId::new(2),
                old_index: 0
            }
            .kind(),
            EventKind::ChildRemoved
        );
        assert_eq!(
            Event::ChildrenReordered(Vec::new()).kind(),
            EventKind::ChildrenReordered
        );
    }

    #[test]
    fn connect_is_refused_while_emitting() {
        let mut table = ObserverTable::default();
        table.begin_emission();
        assert!(table.connect(EventKind::Changed, noop(), None).is_none());
        table.end_emission();
        assert!(table.connect(EventKind::Changed, noop(), None).is_some());
    }

    #[test]
    fn disconnect_at_rest_removes_immediately() {
        let mut table = ObserverTable::default();
        let id = table.connect(EventKind::Changed, noop(), None).unwrap();
        assert!(table.disconnect(id));
        assert_eq!(table.entries.len(), 0);
        assert!(!table.disconnect(id));
    }

    #[test]
    fn disconnect_while_emitting_defers_removal_to_outermost_frame() {
        let mut table = ObserverTable::default();
        let a = table.connect(EventKind::Changed, noop(), None).unwrap();
        let _b = table.connect(EventKind::Changed, noop(), None).unwrap();

        table.begin_emission();
        table.begin_emission();
        assert!(table.disconnect(a));
        // Second disconnect of the same entry is not counted twice.
        assert!(!table.disconnect(a));
        assert_eq!(table.invalidated(), 1);
        assert_eq!(table.entries.len(), 2);
        assert!(matches!(table.prepare(0, EventKind::Changed), Dispatch::Skip));

        table.end_emission();
        assert_eq!(table.entries.len(), 2, "inner frame must not sweep");
        table.end_emission();
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.invalidated(), 0);
    }

    #[test]
    fn prepare_skips_other_kinds_and_ends_past_the_table() {
        let mut table = ObserverTable::default();
        table.connect(EventKind::ChildAdded, noop(), None).unwrap();
        assert!(matches!(table.prepare(0, EventKind::Changed), Dispatch::Skip));
        assert!(matches!(
            table.prepare(0, EventKind::ChildAdded),
            Dispatch::Invoke(_)
        ));
        assert!(matches!(table.prepare(1, EventKind::ChildAdded), Dispatch::Done));
    }

    #[test]
    fn dropped_owner_is_invalidated_on_dispatch() {
        let mut table = ObserverTable::default();
        let owner = Rc::new(());
        let weak: Weak<()> = Rc::downgrade(&owner);
        let weak: Weak<dyn Any> = weak;
        table.connect(EventKind::Changed, noop(), Some(weak)).unwrap();
        assert_eq!(table.len(), 1);

        drop(owner);
        assert_eq!(table.len(), 0);

        table.begin_emission();
        assert!(matches!(table.prepare(0, EventKind::Changed), Dispatch::Skip));
        assert_eq!(table.invalidated(), 1);
        table.end_emission();
        assert!(table.entries.is_empty());
    }
}
