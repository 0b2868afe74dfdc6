// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leveled filters.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use arbor_graph::{Db, NodeId};
use smallvec::SmallVec;

use crate::expression::Expression;

/// Levels rarely hold more than a couple of alternatives.
type Level = SmallVec<[Expression; 2]>;

/// Handle for a listener registered with [`Filter::connect_changed`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

impl ListenerId {
    /// Returns the raw value of this id.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

type Listener = Box<dyn FnMut(&Filter)>;

/// A conjunction of disjunctions of [`Expression`]s.
///
/// Expressions are grouped into numbered levels. A node passes when, for
/// every non-empty level, at least one of that level's expressions matches.
/// Levels are tried in order and each level stops at its first match, so
/// the first failing level ends the evaluation.
///
/// Editing a filter is silent. Once a batch of edits is complete, call
/// [`done_changing`](Self::done_changing) to bump the
/// [revision](Self::revision) and notify listeners that the set of matching
/// nodes may have changed.
///
/// ```rust
/// use arbor_filter::{Expression, Filter};
/// use arbor_graph::{Db, PropertyId};
///
/// const TITLE: PropertyId = PropertyId::new(0);
/// const VISITS: PropertyId = PropertyId::new(1);
///
/// let mut db = Db::new("history");
/// let a = db.new_node().unwrap();
/// db.set_property(a, TITLE, "Rust Blog");
/// db.set_property(a, VISITS, 12_i32);
/// let b = db.new_node().unwrap();
/// db.set_property(b, TITLE, "Gardening");
/// db.set_property(b, VISITS, 40_i32);
///
/// // (title contains "rust" OR title contains "garden") AND visits > 20
/// let mut filter = Filter::new();
/// filter.add_expression(Expression::string_property_contains(TITLE, "rust"), 0);
/// filter.add_expression(Expression::string_property_contains(TITLE, "GARDEN"), 0);
/// filter.add_expression(Expression::int_property_greater(VISITS, 20), 1);
/// filter.done_changing();
///
/// assert!(!filter.evaluate(&db, a));
/// assert!(filter.evaluate(&db, b));
/// ```
#[derive(Default)]
pub struct Filter {
    levels: Vec<Level>,
    revision: u64,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u32,
}

impl Filter {
    /// Creates a filter with no levels. It matches every node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `expression` to `level`, creating empty levels up to it.
    pub fn add_expression(&mut self, expression: Expression, level: usize) {
        if level >= self.levels.len() {
            self.levels.resize_with(level + 1, Level::new);
        }
        self.levels[level].push(expression);
    }

    /// Drops every level and expression.
    pub fn empty(&mut self) {
        self.levels.clear();
    }

    /// Number of levels, including empty ones.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` if the filter has no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The expressions of one level.
    #[must_use]
    pub fn level(&self, level: usize) -> Option<&[Expression]> {
        self.levels.get(level).map(|l| l.as_slice())
    }

    /// Iterates the levels in evaluation order.
    pub fn levels(&self) -> impl ExactSizeIterator<Item = &[Expression]> + '_ {
        self.levels.iter().map(|l| l.as_slice())
    }

    /// Returns `true` if `node` passes every non-empty level.
    #[must_use]
    pub fn evaluate(&self, db: &Db, node: NodeId) -> bool {
        self.levels
            .iter()
            .all(|level| level.is_empty() || level.iter().any(|e| e.evaluate(db, node)))
    }

    /// Yields the `candidates` that pass, in order.
    pub fn select<'a, I>(&'a self, db: &'a Db, candidates: I) -> impl Iterator<Item = NodeId> + 'a
    where
        I: IntoIterator<Item = NodeId>,
        I::IntoIter: 'a,
    {
        candidates
            .into_iter()
            .filter(move |&node| self.evaluate(db, node))
    }

    /// Current revision. Starts at 0 and increases by one per
    /// [`done_changing`](Self::done_changing).
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Marks the end of a batch of edits and notifies listeners.
    pub fn done_changing(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        log::debug!(
            "filter changed: {} levels, revision {}",
            self.levels.len(),
            self.revision
        );
        let mut listeners = core::mem::take(&mut self.listeners);
        for (_, listener) in &mut listeners {
            listener(self);
        }
        self.listeners = listeners;
    }

    /// Registers `listener` to run on every [`done_changing`](Self::done_changing).
    pub fn connect_changed<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Self) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.wrapping_add(1);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn disconnect_changed(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("levels", &self.levels)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .field("next_listener", &self.next_listener)
            .finish()
    }
}
