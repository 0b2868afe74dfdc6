// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Filter: leveled boolean predicates over `arbor_graph` nodes.
//!
//! A [`Filter`] answers "should this node be visible?" for live-filtered
//! views. It is a conjunction of disjunctions: expressions within a level are
//! alternatives, and every non-empty level must be satisfied.
//!
//! ```text
//! levels: [[A, B], [], [C]]   =>   (A or B) and C
//! ```
//!
//! Filters never mutate the graph and never own nodes; every node operand is
//! an id.
//!
//! ## Text matching
//!
//! Two families of string predicates exist:
//!
//! - **String** predicates fold both sides with [`fold_case`] at evaluation
//!   time.
//! - **Key** predicates compare the node's property verbatim against a key
//!   built once from the search text by a [`Collator`]. Use them when nodes
//!   already store a precomputed key (for example a folded title) and the
//!   per-node folding cost matters.
//!
//! ## Change notification
//!
//! Edits are silent; [`Filter::done_changing`] closes a batch of edits,
//! bumps [`Filter::revision`] and calls every listener registered with
//! [`Filter::connect_changed`], so a consumer rescans its candidates once.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod expression;
mod filter;
mod fold;

pub use expression::Expression;
pub use filter::{Filter, ListenerId};
pub use fold::{Collator, FoldingCollator, fold_case};
