// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Graph: a reference-counted node graph with typed properties and
//! reentrancy-safe observers.
//!
//! A [`Db`] owns a set of [`Node`]s. Each node has a sparse array of typed
//! [`PropertyValue`]s, any number of parents and an ordered list of children
//! (the graph is a DAG, not a tree), and a table of observers that are told,
//! synchronously, about every change.
//!
//! ## Core Concepts
//!
//! - **Identity**: nodes are addressed by [`NodeId`], allocated by the
//!   registry. Relations and node-valued properties store ids, never
//!   ownership.
//! - **Mutability**: a registry can be made immutable, turning every mutation
//!   into a documented no-op that returns `false`.
//! - **Lifetime**: nodes are reference counted. Dropping the last reference
//!   notifies [`EventKind::Destroy`] observers, detaches the node from its
//!   parents and children and releases its id.
//! - **Observers**: callbacks receive `&mut Db` and may mutate the graph,
//!   including disconnecting themselves mid-dispatch. See [`observer`] for
//!   the invalidate-then-sweep protocol that makes that safe.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use arbor_graph::{Db, Event, EventKind, NodeId, PropertyId};
//!
//! const TITLE: PropertyId = PropertyId::new(0);
//!
//! let mut db = Db::new("bookmarks");
//! let a = db.new_node().unwrap();
//! let b = db.new_node().unwrap();
//! assert_eq!((a, b), (NodeId::new(1), NodeId::new(2)));
//!
//! let events = Rc::new(RefCell::new(Vec::new()));
//! let log = events.clone();
//! db.connect(a, EventKind::ChildRemoved, move |_, _, event| {
//!     log.borrow_mut().push(event.clone());
//! })
//! .unwrap();
//!
//! db.add_child(a, b);
//! assert_eq!(db.node(a).unwrap().children(), &[b]);
//! assert_eq!(db.child_index(a, b), Some(0));
//!
//! db.set_property(b, TITLE, "Arbor");
//! assert_eq!(db.node(b).unwrap().string(TITLE), "Arbor");
//!
//! db.remove_child(a, b);
//! assert!(db.node(a).unwrap().children().is_empty());
//! assert_eq!(
//!     events.borrow().as_slice(),
//!     &[Event::ChildRemoved { child: b, old_index: 0 }]
//! );
//! ```
//!
//! ## Errors
//!
//! Only node creation ([`Rejected`]) and observer registration
//! ([`ConnectError`]) report why they failed. Everything else answers with a
//! `bool` or an `Option`, and property getters return sentinels.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod db;
mod edit;
mod error;
mod id;
mod node;
pub mod observer;
mod value;

pub use db::{Db, DbBuilder};
pub use error::{ConnectError, Rejected};
pub use id::{NodeId, PropertyId};
pub use node::{DragPolicy, Node, ParentEdge, Parents};
pub use observer::{Event, EventKind, ObserverFn, ObserverId};
pub use value::{PropertyValue, ValueType};
