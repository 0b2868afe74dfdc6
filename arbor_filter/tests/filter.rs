// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for filter evaluation over a small bookmarks-like graph.

use std::cell::Cell;
use std::rc::Rc;

use arbor_filter::{Expression, Filter, fold_case};
use arbor_graph::{Db, NodeId, PropertyId};

const TITLE: PropertyId = PropertyId::new(0);
const TITLE_KEY: PropertyId = PropertyId::new(1);
const VISITS: PropertyId = PropertyId::new(2);
const TOPIC: PropertyId = PropertyId::new(3);

const FLAG_A: PropertyId = PropertyId::new(10);
const FLAG_B: PropertyId = PropertyId::new(11);
const FLAG_C: PropertyId = PropertyId::new(12);

fn page(db: &mut Db, title: &str, visits: i32) -> NodeId {
    let node = db.new_node().unwrap();
    db.set_property(node, TITLE, title);
    db.set_property(node, TITLE_KEY, fold_case(title));
    db.set_property(node, VISITS, visits);
    node
}

#[test]
fn levels_are_and_of_ors() {
    let mut db = Db::new("cnf");
    let mut filter = Filter::new();
    filter.add_expression(Expression::int_property_equals(FLAG_A, 1), 0);
    filter.add_expression(Expression::int_property_equals(FLAG_B, 1), 0);
    filter.add_expression(Expression::int_property_equals(FLAG_C, 1), 1);

    for bits in 0..8_i32 {
        let node = db.new_node().unwrap();
        let (a, b, c) = (bits & 1, (bits >> 1) & 1, (bits >> 2) & 1);
        db.set_property(node, FLAG_A, a);
        db.set_property(node, FLAG_B, b);
        db.set_property(node, FLAG_C, c);

        let expected = (a == 1 || b == 1) && c == 1;
        assert_eq!(filter.evaluate(&db, node), expected, "bits {bits:03b}");
    }
}

#[test]
fn empty_filter_matches_everything() {
    let mut db = Db::new("empty");
    let node = db.new_node().unwrap();
    let filter = Filter::new();
    assert!(filter.evaluate(&db, node));
    assert!(filter.evaluate(&db, NodeId::new(1234)));
}

#[test]
fn a_level_with_no_match_fails_the_node() {
    let mut db = Db::new("levels");
    let node = page(&mut db, "Rust", 3);
    let mut filter = Filter::new();
    filter.add_expression(Expression::always_true(), 0);
    filter.add_expression(Expression::string_property_equals(TITLE, "go"), 2);
    assert!(!filter.evaluate(&db, node));

    filter.add_expression(Expression::string_property_equals(TITLE, "RUST"), 2);
    assert!(filter.evaluate(&db, node));
}

#[test]
fn string_predicates_fold_both_sides() {
    let mut db = Db::new("strings");
    let node = page(&mut db, "The Rust Programming Language", 1);

    assert!(Expression::string_property_contains(TITLE, "rust prog").evaluate(&db, node));
    assert!(Expression::string_property_contains(TITLE, "LANGUAGE").evaluate(&db, node));
    assert!(!Expression::string_property_contains(TITLE, "python").evaluate(&db, node));
    assert!(
        Expression::string_property_equals(TITLE, "the rust programming language")
            .evaluate(&db, node)
    );
    assert!(!Expression::string_property_equals(TITLE, "the rust").evaluate(&db, node));
}

#[test]
fn key_predicates_compare_stored_keys_verbatim() {
    let mut db = Db::new("keys");
    let node = page(&mut db, "Straße", 1);

    assert!(Expression::key_property_equals(TITLE_KEY, "STRASSE").evaluate(&db, node));
    assert!(Expression::key_property_contains(TITLE_KEY, "ASS").evaluate(&db, node));
    // The raw title is not a key, so only an exact-case match would hit.
    assert!(!Expression::key_property_equals(TITLE, "STRASSE").evaluate(&db, node));

    let reverse = |s: &str| s.chars().rev().collect::<String>();
    db.set_property(node, TITLE_KEY, reverse(&fold_case("Straße")));
    assert!(
        Expression::key_property_equals_with(TITLE_KEY, "strasse", &reverse).evaluate(&db, node)
    );
}

#[test]
fn int_predicates() {
    let mut db = Db::new("ints");
    let node = page(&mut db, "x", 10);
    assert!(Expression::int_property_equals(VISITS, 10).evaluate(&db, node));
    assert!(Expression::int_property_greater(VISITS, 9).evaluate(&db, node));
    assert!(!Expression::int_property_greater(VISITS, 10).evaluate(&db, node));
    assert!(Expression::int_property_less(VISITS, 11).evaluate(&db, node));
    assert!(!Expression::int_property_less(VISITS, 10).evaluate(&db, node));
}

#[test]
fn relation_predicates() {
    let mut db = Db::new("relations");
    let folder = db.new_node().unwrap();
    let topic = db.new_node().unwrap();
    let other_topic = db.new_node().unwrap();
    let a = page(&mut db, "a", 1);
    let b = page(&mut db, "b", 1);
    db.add_child(folder, a);
    db.set_property(a, TOPIC, topic);
    db.set_property(b, TOPIC, other_topic);

    assert!(Expression::has_parent(folder).evaluate(&db, a));
    assert!(!Expression::has_parent(folder).evaluate(&db, b));
    assert!(Expression::has_child(a).evaluate(&db, folder));
    assert!(!Expression::has_child(b).evaluate(&db, folder));
    assert!(Expression::equals(a).evaluate(&db, a));
    assert!(!Expression::equals(a).evaluate(&db, b));

    assert!(Expression::node_property_equals(TOPIC, topic).evaluate(&db, a));
    assert!(!Expression::node_property_equals(TOPIC, topic).evaluate(&db, b));

    // Any child with the property is enough.
    assert!(Expression::child_property_equals(TOPIC, topic).evaluate(&db, folder));
    assert!(!Expression::child_property_equals(TOPIC, other_topic).evaluate(&db, folder));
    db.add_child(folder, b);
    assert!(Expression::child_property_equals(TOPIC, other_topic).evaluate(&db, folder));
}

#[test]
fn select_keeps_candidate_order() {
    let mut db = Db::new("select");
    let nodes: Vec<_> = (0..6).map(|i| page(&mut db, "p", i)).collect();
    let mut filter = Filter::new();
    filter.add_expression(Expression::int_property_less(VISITS, 2), 0);
    filter.add_expression(Expression::int_property_greater(VISITS, 4), 0);

    let picked: Vec<_> = filter.select(&db, nodes.iter().copied()).collect();
    assert_eq!(picked, vec![nodes[0], nodes[1], nodes[5]]);
}

#[test]
fn done_changing_notifies_once_per_batch() {
    let mut filter = Filter::new();
    let calls = Rc::new(Cell::new(0));
    let seen_revision = Rc::new(Cell::new(0));
    let (c, r) = (calls.clone(), seen_revision.clone());
    let id = filter.connect_changed(move |f| {
        c.set(c.get() + 1);
        r.set(f.revision());
    });

    filter.add_expression(Expression::always_true(), 0);
    filter.add_expression(Expression::always_true(), 1);
    assert_eq!(calls.get(), 0);
    assert_eq!(filter.revision(), 0);

    filter.done_changing();
    assert_eq!(calls.get(), 1);
    assert_eq!(seen_revision.get(), 1);

    filter.empty();
    assert_eq!(calls.get(), 1);
    filter.done_changing();
    assert_eq!(calls.get(), 2);
    assert_eq!(seen_revision.get(), 2);

    assert!(filter.disconnect_changed(id));
    filter.done_changing();
    assert_eq!(calls.get(), 2);
    assert_eq!(filter.revision(), 3);
}

#[test]
fn destroyed_operands_stop_matching() {
    let mut db = Db::new("lifetime");
    let folder = db.new_node().unwrap();
    let a = page(&mut db, "a", 1);
    db.add_child(folder, a);
    let mut filter = Filter::new();
    filter.add_expression(Expression::has_parent(folder), 0);
    assert!(filter.evaluate(&db, a));

    db.unref_node(folder);
    assert!(!filter.evaluate(&db, a));
}
