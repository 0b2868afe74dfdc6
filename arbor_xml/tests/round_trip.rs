// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for saving and loading whole documents.

use std::cell::Cell;
use std::rc::Rc;

use arbor_graph::{Db, Event, EventKind, NodeId, PropertyId, PropertyValue};
use arbor_xml::{
    ForwardRefs, LoadOptions, Section, WriteOptions, XmlError, load_from_file, load_from_str,
    save_to_file, write_document,
};

const BOOKMARKS: NodeId = NodeId::new(0);
const TOPICS: NodeId = NodeId::new(1);

const TITLE: PropertyId = PropertyId::new(0);
const VISITS: PropertyId = PropertyId::new(1);
const PINNED: PropertyId = PropertyId::new(2);
const SIZE: PropertyId = PropertyId::new(3);
const RATIO: PropertyId = PropertyId::new(4);
const SCORE: PropertyId = PropertyId::new(5);
const TOPIC: PropertyId = PropertyId::new(6);
const EMPTY: PropertyId = PropertyId::new(9);

/// A registry with the two well-known roots in place.
fn registry() -> Db {
    let mut db = Db::builder("bookmarks").reserved_ids(10).build();
    db.new_node_with_id(BOOKMARKS).unwrap();
    db.new_node_with_id(TOPICS).unwrap();
    db
}

fn write_to_string(db: &Db, sections: &[Section<'_>]) -> String {
    let mut out = Vec::new();
    write_document(
        db,
        &mut out,
        &WriteOptions::new("bookmarks", "1.0").comment("saved by tests"),
        sections,
    )
    .unwrap();
    String::from_utf8(out).unwrap()
}

fn options() -> LoadOptions {
    LoadOptions::new("bookmarks").version("1.0")
}

fn node_elements(xml: &str) -> usize {
    xml.matches("<node ").count()
}

#[test]
fn every_value_type_round_trips() {
    let mut db = registry();
    let topic = db.new_node().unwrap();
    db.add_child(TOPICS, topic);
    db.set_property(topic, TITLE, "Languages");

    let page = db.new_node().unwrap();
    db.add_child(BOOKMARKS, page);
    db.add_child(topic, page);
    db.set_property(page, TITLE, "Rust & <friends> \"quoted\"\nsecond line");
    db.set_property(page, VISITS, -42_i32);
    db.set_property(page, PINNED, true);
    db.set_property(page, SIZE, i64::MIN);
    db.set_property(page, RATIO, 0.1_f32);
    db.set_property(page, SCORE, 1.0_f64 / 3.0);
    db.set_property(page, TOPIC, topic);
    db.set_property(page, EMPTY, "");

    let other = db.new_node().unwrap();
    db.add_child(BOOKMARKS, other);
    db.set_property(other, SCORE, -0.0_f64);
    db.set_property(other, RATIO, f32::MAX);
    db.set_property(other, PINNED, false);

    let xml = write_to_string(
        &db,
        &[Section::children_of(BOOKMARKS), Section::children_of(TOPICS)],
    );
    assert_eq!(node_elements(&xml), 3);

    let mut copy = registry();
    let report = load_from_str(&mut copy, &xml, &options()).unwrap();
    assert_eq!(report.nodes, 3);
    assert_eq!(report.parent_edges, 4);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.skipped_nodes, 0);
    assert_eq!(report.skipped_properties, 0);

    for id in [topic, page, other] {
        let a = db.node(id).unwrap();
        let b = copy.node(id).unwrap();
        let left: Vec<_> = a.properties().collect();
        let right: Vec<_> = b.properties().collect();
        assert_eq!(left, right, "properties of {id}");
        for (p, value) in left {
            match value {
                PropertyValue::Float(v) => {
                    let back = b.property(p).and_then(PropertyValue::as_float);
                    assert_eq!(back.map(f32::to_bits), Some(v.to_bits()));
                }
                PropertyValue::Double(v) => {
                    let back = b.property(p).and_then(PropertyValue::as_double);
                    assert_eq!(back.map(f64::to_bits), Some(v.to_bits()));
                }
                _ => {}
            }
        }
        for edge in a.parents() {
            assert!(copy.has_child(edge.parent(), id), "edge {} -> {id}", edge.parent());
        }
        assert_eq!(a.parent_count(), b.parent_count());
    }
    assert_eq!(copy.child_index(BOOKMARKS, page), Some(0));
    assert_eq!(copy.child_index(BOOKMARKS, other), Some(1));
}

#[test]
fn control_characters_are_scrubbed() {
    let mut db = registry();
    let page = db.new_node().unwrap();
    db.add_child(BOOKMARKS, page);
    db.set_property(page, TITLE, "bell\u{7}tab\tend\u{1b}");

    let xml = write_to_string(&db, &[Section::children_of(BOOKMARKS)]);
    let mut copy = registry();
    load_from_str(&mut copy, &xml, &options()).unwrap();
    assert_eq!(copy.node(page).unwrap().string(TITLE), "bell tab\tend ");
}

#[test]
fn dangling_node_references_are_not_written() {
    let mut db = registry();
    let page = db.new_node().unwrap();
    let gone = db.new_node().unwrap();
    db.add_child(BOOKMARKS, page);
    db.set_property(page, TOPIC, gone);
    db.unref_node(gone);

    let xml = write_to_string(&db, &[Section::children_of(BOOKMARKS)]);
    assert!(!xml.contains("gpointer"));
}

#[test]
fn forward_references_resolve_by_default() {
    let xml = r#"<?xml version="1.0"?>
<bookmarks version="1.0">
  <node id="20">
    <property id="6" value_type="gpointer">22</property>
    <parent id="21"/>
  </node>
  <node id="21">
    <parent id="0"/>
  </node>
  <node id="22"/>
</bookmarks>
"#;
    let mut db = registry();
    let report = load_from_str(&mut db, xml, &options()).unwrap();

    assert_eq!(report.nodes, 3);
    assert_eq!(report.parent_edges, 2);
    assert_eq!(report.deferred_resolved, 2);
    assert_eq!(report.dropped, 0);
    assert!(db.has_child(NodeId::new(21), NodeId::new(20)));
    assert!(db.has_child(BOOKMARKS, NodeId::new(21)));
    assert_eq!(
        db.node(NodeId::new(20)).unwrap().node_ref(TOPIC),
        Some(NodeId::new(22))
    );
}

#[test]
fn forward_references_can_be_dropped() {
    let xml = r#"<bookmarks version="1.0">
  <node id="20">
    <property id="6" value_type="gpointer">22</property>
    <parent id="21"/>
  </node>
  <node id="21"><parent id="0"/></node>
  <node id="22"/>
</bookmarks>"#;
    let mut db = registry();
    let report = load_from_str(&mut db, xml, &options().forward_refs(ForwardRefs::Drop)).unwrap();

    assert_eq!(report.parent_edges, 1);
    assert_eq!(report.dropped, 2);
    assert_eq!(db.node(NodeId::new(20)).unwrap().parent_count(), 0);
    assert!(!db.node(NodeId::new(20)).unwrap().has_property(TOPIC));
}

#[test]
fn references_that_never_resolve_are_counted() {
    let xml = r#"<bookmarks version="1.0"><node id="20"><parent id="99"/></node></bookmarks>"#;
    let mut db = registry();
    let report = load_from_str(&mut db, xml, &options()).unwrap();
    assert_eq!(report.nodes, 1);
    assert_eq!(report.dropped, 1);
    assert!(db.contains(NodeId::new(20)));
}

#[test]
fn header_is_checked() {
    let mut db = registry();

    let err = load_from_str(&mut db, r#"<history version="1.0"/>"#, &options()).unwrap_err();
    assert!(matches!(err, XmlError::UnexpectedRoot { ref found, .. } if found == "history"));

    let err = load_from_str(&mut db, r#"<bookmarks version="0.9"/>"#, &options()).unwrap_err();
    assert!(matches!(
        err,
        XmlError::VersionMismatch { found: Some(ref v), .. } if v == "0.9"
    ));

    let err = load_from_str(&mut db, "<bookmarks/>", &options()).unwrap_err();
    assert!(matches!(err, XmlError::VersionMismatch { found: None, .. }));

    let err = load_from_str(&mut db, "", &options()).unwrap_err();
    assert!(matches!(err, XmlError::MissingRoot));

    // Without a required version any version is accepted.
    assert!(load_from_str(&mut db, "<bookmarks/>", &LoadOptions::new("bookmarks")).is_ok());
}

#[test]
fn load_lifts_and_restores_immutability() {
    let xml = r#"<bookmarks version="1.0"><node id="20"><parent id="0"/></node></bookmarks>"#;
    let mut db = registry();
    db.set_immutable(true);

    let report = load_from_str(&mut db, xml, &options()).unwrap();
    assert_eq!(report.nodes, 1);
    assert!(db.is_immutable());

    assert!(load_from_str(&mut db, "<other/>", &options()).is_err());
    assert!(db.is_immutable());
}

#[test]
fn bad_nodes_and_properties_are_skipped() {
    let xml = r#"<bookmarks version="1.0">
  <node id="30"><property id="0" value_type="gchararray">first</property></node>
  <node id="30"><property id="0" value_type="gchararray">second</property></node>
  <node><property id="0" value_type="gint">1</property></node>
  <node id="31">
    <property id="0" value_type="guint">1</property>
    <property id="1" value_type="gint">many</property>
    <property value_type="gint">2</property>
    <property id="2" value_type="gboolean">1</property>
  </node>
</bookmarks>"#;
    let mut db = registry();
    let report = load_from_str(&mut db, xml, &options()).unwrap();

    assert_eq!(report.nodes, 2);
    assert_eq!(report.skipped_nodes, 2);
    assert_eq!(report.skipped_properties, 3);
    assert_eq!(db.node(NodeId::new(30)).unwrap().string(TITLE), "first");
    assert!(db.node(NodeId::new(31)).unwrap().bool(PINNED));
}

#[test]
fn out_of_range_property_ids_are_skipped() {
    let xml = r#"<bookmarks version="1.0">
  <node id="50">
    <property id="20000000" value_type="gint">1</property>
    <property id="4294967295" value_type="gint">2</property>
    <property id="65536" value_type="gint">3</property>
    <property id="1" value_type="gint">4</property>
  </node>
</bookmarks>"#;
    let mut db = registry();
    let report = load_from_str(&mut db, xml, &options()).unwrap();

    assert_eq!(report.nodes, 1);
    assert_eq!(report.skipped_properties, 3);
    let node = db.node(NodeId::new(50)).unwrap();
    assert_eq!(node.property_slots(), 2);
    assert_eq!(node.int(VISITS), 4);
}

#[test]
fn comments_never_contain_double_hyphens() {
    let mut db = registry();
    let page = db.new_node().unwrap();
    db.add_child(BOOKMARKS, page);

    let mut out = Vec::new();
    write_document(
        &db,
        &mut out,
        &WriteOptions::new("bookmarks", "1.0").comment("a---b -"),
        &[Section::children_of(BOOKMARKS)],
    )
    .unwrap();
    let xml = String::from_utf8(out).unwrap();

    let start = xml.find("<!--").unwrap() + 4;
    let end = xml.find("-->").unwrap();
    assert!(!xml[start..end].contains("--"), "{xml}");
    assert!(!xml[start..end].ends_with('-'), "{xml}");

    let mut copy = registry();
    assert_eq!(load_from_str(&mut copy, &xml, &options()).unwrap().nodes, 1);
}

#[test]
fn restored_fires_after_the_node_is_attached() {
    let xml = r#"<bookmarks version="1.0">
  <node id="40">
    <property id="0" value_type="gchararray">Arbor</property>
    <parent id="0"/>
  </node>
</bookmarks>"#;
    let mut db = registry();
    let restored_title = Rc::new(Cell::new(false));
    let flag = restored_title.clone();
    // The child does not exist yet; hook it as soon as it is attached.
    db.connect(BOOKMARKS, EventKind::ChildAdded, move |db, _, event| {
        if let Event::ChildAdded(child) = *event {
            let flag = flag.clone();
            db.connect(child, EventKind::Restored, move |db, node, _| {
                flag.set(db.node(node).unwrap().string(TITLE) == "Arbor");
            })
            .unwrap();
        }
    })
    .unwrap();

    load_from_str(&mut db, xml, &options()).unwrap();
    assert!(restored_title.get());
}

#[test]
fn recursive_sections_write_each_node_once() {
    let mut db = registry();
    let a = db.new_node().unwrap();
    let b = db.new_node().unwrap();
    let c = db.new_node().unwrap();
    let shared = db.new_node().unwrap();
    db.add_child(BOOKMARKS, a);
    db.add_child(BOOKMARKS, c);
    db.add_child(a, b);
    db.add_child(a, shared);
    db.add_child(c, shared);

    let xml = write_to_string(&db, &[Section::children_of(BOOKMARKS).recursive()]);
    assert_eq!(node_elements(&xml), 4);

    let flat = write_to_string(&db, &[Section::children_of(BOOKMARKS)]);
    assert_eq!(node_elements(&flat), 2);

    let skip_a = |_: &Db, id: NodeId| id != a;
    let filtered = write_to_string(
        &db,
        &[Section::children_of(BOOKMARKS).recursive().filter(&skip_a)],
    );
    // a and b are gone; shared is still reachable through c.
    assert_eq!(node_elements(&filtered), 2);

    let mut copy = registry();
    let report = load_from_str(&mut copy, &xml, &options()).unwrap();
    assert_eq!(report.nodes, 4);
    assert!(copy.has_child(a, shared));
    assert!(copy.has_child(c, shared));
    assert_eq!(copy.child_index(a, b), Some(0));
}

#[test]
fn files_are_replaced_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookmarks.xml");

    let mut db = registry();
    let page = db.new_node().unwrap();
    db.add_child(BOOKMARKS, page);
    db.set_property(page, TITLE, "saved");

    let write = WriteOptions::new("bookmarks", "1.0");
    save_to_file(&db, &path, &write, &[Section::children_of(BOOKMARKS)]).unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("bookmarks.xml.tmp").exists());

    let mut copy = registry();
    let report = load_from_file(&mut copy, &path, &options()).unwrap();
    assert_eq!(report.nodes, 1);
    assert_eq!(copy.node(page).unwrap().string(TITLE), "saved");

    let missing_dir = dir.path().join("nope").join("bookmarks.xml");
    assert!(save_to_file(&db, &missing_dir, &write, &[]).is_err());
    assert!(!missing_dir.exists());
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = registry();
    let err = load_from_file(&mut db, dir.path().join("absent.xml"), &options()).unwrap_err();
    assert!(matches!(err, XmlError::Io(_)));
}
