// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor XML: persistence for [`arbor_graph`] registries.
//!
//! A document holds a flat list of `<node>` elements under a caller-chosen
//! document element:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <bookmarks version="1.0">
//!   <node id="12">
//!     <property id="2" value_type="gchararray">Arbor</property>
//!     <property id="5" value_type="gpointer">3</property>
//!     <parent id="1"/>
//!   </node>
//! </bookmarks>
//! ```
//!
//! Property text is locale independent. Strings are scrubbed of control
//! characters XML cannot carry (see [`scrub`]); everything else restores
//! exactly, floats included.
//!
//! ## Writing
//!
//! [`write_document`] and [`save_to_file`] take a list of [`Section`]s, each
//! naming a root node whose children are written. Roots themselves are not
//! written: they are expected to exist at well-known ids in the registry that
//! later loads the document.
//!
//! ## Loading
//!
//! [`load_from_str`], [`load_document`] and [`load_from_file`] recreate every
//! node with its stored id, restore its properties without notification,
//! reattach it to its parents and then emit
//! [`Event::Restored`](arbor_graph::Event::Restored). A parent edge or
//! node reference naming an id that has not been loaded yet is handled per
//! [`ForwardRefs`].
//!
//! ```rust
//! use arbor_graph::{Db, NodeId, PropertyId};
//! use arbor_xml::{LoadOptions, Section, WriteOptions, load_from_str, write_document};
//!
//! const TITLE: PropertyId = PropertyId::new(0);
//!
//! let mut db = Db::new("bookmarks");
//! let root = db.new_node_with_id(NodeId::new(0)).unwrap();
//! let page = db.new_node().unwrap();
//! db.set_property(page, TITLE, "Arbor");
//! db.add_child(root, page);
//!
//! let mut out = Vec::new();
//! write_document(
//!     &db,
//!     &mut out,
//!     &WriteOptions::new("bookmarks", "1.0"),
//!     &[Section::children_of(root)],
//! )
//! .unwrap();
//!
//! let mut copy = Db::new("bookmarks");
//! let copy_root = copy.new_node_with_id(NodeId::new(0)).unwrap();
//! let xml = String::from_utf8(out).unwrap();
//! let report = load_from_str(&mut copy, &xml, &LoadOptions::new("bookmarks").version("1.0"))
//!     .unwrap();
//!
//! assert_eq!(report.nodes, 1);
//! assert_eq!(copy.node(page).unwrap().string(TITLE), "Arbor");
//! assert_eq!(copy.child_index(copy_root, page), Some(0));
//! ```

mod codec;
mod error;
mod read;
mod write;

pub use codec::{decode, encode, scrub, type_from_name, type_name};
pub use error::XmlError;
pub use read::{
    ForwardRefs, LoadOptions, LoadReport, load_document, load_from_file, load_from_str, read_node,
};
pub use write::{NodeFilter, Section, WriteOptions, save_to_file, write_document, write_node};
