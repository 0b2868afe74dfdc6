// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconstructing nodes.

use std::fs;
use std::io::Read;
use std::path::Path;

use arbor_graph::{Db, NodeId, PropertyId, PropertyValue, Rejected};
use hashbrown::HashMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::codec;
use crate::error::{XmlError, malformed};

/// What to do with a parent edge or node reference naming an id that has
/// not been loaded yet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ForwardRefs {
    /// Remember the reference and establish it when the target node appears
    /// later in the document. References still unresolved at the end are
    /// dropped with a warning.
    #[default]
    Resolve,
    /// Drop the reference immediately. Documents must then list parents
    /// before their children.
    Drop,
}

/// Settings for loading a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    root: String,
    version: Option<String>,
    forward_refs: ForwardRefs,
}

impl LoadOptions {
    /// Expects a document element named `root`, any version.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            version: None,
            forward_refs: ForwardRefs::default(),
        }
    }

    /// Requires the document element's `version` attribute to equal
    /// `version`.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the forward-reference policy.
    #[must_use]
    pub fn forward_refs(mut self, policy: ForwardRefs) -> Self {
        self.forward_refs = policy;
        self
    }
}

/// Counters describing a completed load.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Nodes created.
    pub nodes: usize,
    /// Parent edges established, including deferred ones.
    pub parent_edges: usize,
    /// Forward references resolved once their target appeared.
    pub deferred_resolved: usize,
    /// Parent edges and node references dropped because their target never
    /// appeared.
    pub dropped: usize,
    /// `<node>` elements skipped (missing id, or id already in use).
    pub skipped_nodes: usize,
    /// `<property>` elements skipped (missing attributes, an id above
    /// [`PropertyId::MAX`], unknown type or unparsable text).
    pub skipped_properties: usize,
}

/// A `<node>` element as parsed, before anything touches the registry.
#[derive(Debug, Default)]
struct NodeRecord {
    id: Option<NodeId>,
    properties: Vec<PropertyRecord>,
    parents: Vec<Option<NodeId>>,
}

#[derive(Debug)]
struct PropertyRecord {
    /// Raw id; may be out of range for [`PropertyId`].
    id: Option<u32>,
    value_type: Option<String>,
    text: String,
}

/// A reference waiting for its target node.
#[derive(Copy, Clone, Debug)]
enum Deferred {
    ParentEdge { child: NodeId },
    NodeRef { node: NodeId, property: PropertyId },
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, XmlError> {
    match start.try_get_attribute(name).map_err(malformed)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(malformed)?.into_owned())),
        None => Ok(None),
    }
}

fn id_attribute(start: &BytesStart<'_>) -> Result<Option<u32>, XmlError> {
    Ok(attribute(start, "id")?.and_then(|v| v.trim().parse().ok()))
}

/// Reads the body of an element opened by a `Start` event, up to its end.
fn read_text(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<String, XmlError> {
    let mut text = String::new();
    let mut depth = 0_usize;
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(malformed)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth > 0 => depth -= 1,
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::Malformed(format!(
                    "unterminated <{}>",
                    String::from_utf8_lossy(start.name().as_ref())
                )));
            }
            _ => {}
        }
    }
}

/// Parses a `<node>` element whose `Start` event was just read.
fn parse_node(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<NodeRecord, XmlError> {
    let mut record = NodeRecord {
        id: id_attribute(start)?.map(NodeId::new),
        ..NodeRecord::default()
    };
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"property" => {
                let id = id_attribute(&e)?;
                let value_type = attribute(&e, "value_type")?;
                let text = read_text(reader, &e)?;
                record.properties.push(PropertyRecord {
                    id,
                    value_type,
                    text,
                });
            }
            Event::Empty(e) if e.name().as_ref() == b"property" => {
                record.properties.push(PropertyRecord {
                    id: id_attribute(&e)?,
                    value_type: attribute(&e, "value_type")?,
                    text: String::new(),
                });
            }
            Event::Empty(e) if e.name().as_ref() == b"parent" => {
                record.parents.push(id_attribute(&e)?.map(NodeId::new));
            }
            Event::Start(e) if e.name().as_ref() == b"parent" => {
                record.parents.push(id_attribute(&e)?.map(NodeId::new));
                reader.read_to_end(e.name())?;
            }
            Event::Start(e) => {
                reader.read_to_end(e.name())?;
            }
            Event::End(_) => return Ok(record),
            Event::Eof => return Err(XmlError::Malformed("unterminated <node>".into())),
            _ => {}
        }
    }
}

/// Applies parsed records to a registry.
struct Loader<'d> {
    db: &'d mut Db,
    policy: ForwardRefs,
    pending: HashMap<NodeId, Vec<Deferred>>,
    report: LoadReport,
}

impl<'d> Loader<'d> {
    fn new(db: &'d mut Db, policy: ForwardRefs) -> Self {
        Self {
            db,
            policy,
            pending: HashMap::new(),
            report: LoadReport::default(),
        }
    }

    /// Creates the node described by `record`.
    ///
    /// Properties are restored silently, then parent edges are added (each
    /// emitting `ChildAdded` on the parent), then the node emits `Restored`.
    /// Finally any references that were waiting for this node are resolved.
    fn apply(&mut self, record: NodeRecord) -> Result<NodeId, XmlError> {
        let id = record.id.ok_or(XmlError::MissingAttribute {
            element: "node",
            attribute: "id",
        })?;
        self.db
            .new_node_with_id(id)
            .map_err(|source| XmlError::Rejected { id, source })?;

        for property in record.properties {
            self.restore(id, property);
        }

        for parent in record.parents {
            let Some(parent) = parent else {
                log::warn!("node {id}: <parent> without a valid id");
                continue;
            };
            if self.db.contains(parent) {
                if self.db.add_child(parent, id) {
                    self.report.parent_edges += 1;
                }
            } else {
                self.defer(parent, Deferred::ParentEdge { child: id });
            }
        }

        self.db.mark_restored(id);
        self.report.nodes += 1;
        self.resolve(id);
        Ok(id)
    }

    fn restore(&mut self, node: NodeId, property: PropertyRecord) {
        let (Some(raw), Some(type_name)) = (property.id, property.value_type.as_deref()) else {
            log::warn!("node {node}: <property> without id or value_type");
            self.report.skipped_properties += 1;
            return;
        };
        // Slots are allocated up to the id, so an unbounded id is refused
        // before it reaches the node.
        let Ok(prop) = u16::try_from(raw).map(PropertyId::new) else {
            log::warn!("node {node}: property id {raw} exceeds {}", PropertyId::MAX);
            self.report.skipped_properties += 1;
            return;
        };
        let Some(value_type) = codec::type_from_name(type_name) else {
            log::warn!("node {node}: unknown value_type {type_name:?} for property {prop}");
            self.report.skipped_properties += 1;
            return;
        };
        let Some(value) = codec::decode(value_type, &property.text) else {
            log::warn!(
                "node {node}: cannot parse {:?} as {type_name} for property {prop}",
                property.text
            );
            self.report.skipped_properties += 1;
            return;
        };
        if let PropertyValue::Node(target) = value {
            if !self.db.contains(target) {
                self.defer(
                    target,
                    Deferred::NodeRef {
                        node,
                        property: prop,
                    },
                );
                return;
            }
        }
        self.db.restore_property(node, prop, value);
    }

    fn defer(&mut self, target: NodeId, deferred: Deferred) {
        match self.policy {
            ForwardRefs::Resolve => self.pending.entry(target).or_default().push(deferred),
            ForwardRefs::Drop => {
                log::debug!("dropping reference to unknown node {target}: {deferred:?}");
                self.report.dropped += 1;
            }
        }
    }

    fn resolve(&mut self, target: NodeId) {
        let Some(waiting) = self.pending.remove(&target) else {
            return;
        };
        for deferred in waiting {
            match deferred {
                Deferred::ParentEdge { child } => {
                    if self.db.add_child(target, child) {
                        self.report.parent_edges += 1;
                        self.report.deferred_resolved += 1;
                    }
                }
                Deferred::NodeRef { node, property } => {
                    // The referring node was already announced as restored,
                    // so late values go through the notifying path.
                    if self.db.set_property(node, property, target) {
                        self.report.deferred_resolved += 1;
                    }
                }
            }
        }
    }

    fn finish(mut self) -> LoadReport {
        for (target, waiting) in self.pending.drain() {
            for deferred in waiting {
                log::warn!("node {target} never appeared; dropping {deferred:?}");
                self.report.dropped += 1;
            }
        }
        self.report
    }
}

/// Loads every `<node>` of a document held in memory.
///
/// The document element must match `options`. Nodes are created with their
/// stored ids; a node whose id is already in use is skipped with a warning.
/// Immutability is lifted for the duration of the load and restored
/// afterwards, whether or not the load succeeds.
pub fn load_from_str(db: &mut Db, xml: &str, options: &LoadOptions) -> Result<LoadReport, XmlError> {
    let was_immutable = db.is_immutable();
    db.set_immutable(false);
    let result = load_nodes(db, xml, options);
    db.set_immutable(was_immutable);
    if let Ok(report) = &result {
        log::debug!("loaded {} nodes into {}: {report:?}", report.nodes, db.name());
    }
    result
}

fn load_nodes(db: &mut Db, xml: &str, options: &LoadOptions) -> Result<LoadReport, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut loader = Loader::new(db, options.forward_refs);
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if !seen_root => {
                check_root(&e, options)?;
                seen_root = true;
            }
            Event::Start(e) if e.name().as_ref() == b"node" => {
                let record = parse_node(&mut reader, &e)?;
                loader.apply_or_skip(record);
            }
            Event::Empty(e) if e.name().as_ref() == b"node" => {
                let record = NodeRecord {
                    id: id_attribute(&e)?.map(NodeId::new),
                    ..NodeRecord::default()
                };
                loader.apply_or_skip(record);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(XmlError::MissingRoot);
    }
    Ok(loader.finish())
}

impl Loader<'_> {
    fn apply_or_skip(&mut self, record: NodeRecord) {
        if let Err(err) = self.apply(record) {
            log::warn!("skipping <node>: {err}");
            self.report.skipped_nodes += 1;
        }
    }
}

fn check_root(start: &BytesStart<'_>, options: &LoadOptions) -> Result<(), XmlError> {
    let name = start.name();
    if name.as_ref() != options.root.as_bytes() {
        return Err(XmlError::UnexpectedRoot {
            expected: options.root.clone(),
            found: String::from_utf8_lossy(name.as_ref()).into_owned(),
        });
    }
    if let Some(expected) = &options.version {
        let found = attribute(start, "version")?;
        if found.as_deref() != Some(expected.as_str()) {
            return Err(XmlError::VersionMismatch {
                expected: expected.clone(),
                found,
            });
        }
    }
    Ok(())
}

/// Loads a document from any reader.
pub fn load_document<R: Read>(
    db: &mut Db,
    mut input: R,
    options: &LoadOptions,
) -> Result<LoadReport, XmlError> {
    let mut xml = String::new();
    input.read_to_string(&mut xml)?;
    load_from_str(db, &xml, options)
}

/// Loads a document from a file.
pub fn load_from_file(
    db: &mut Db,
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<LoadReport, XmlError> {
    let path = path.as_ref();
    log::debug!("loading {} from {}", db.name(), path.display());
    let xml = fs::read_to_string(path)?;
    load_from_str(db, &xml, options)
}

/// Reconstructs a single `<node>` element.
///
/// References to nodes the registry does not hold are dropped. Unlike a
/// document load, a missing id or an id already in use is an error, and
/// immutability is respected.
///
/// ```rust
/// use arbor_graph::{Db, NodeId, PropertyId};
/// use arbor_xml::read_node;
///
/// let mut db = Db::new("bookmarks");
/// let root = db.new_node_with_id(NodeId::new(0)).unwrap();
///
/// let id = read_node(
///     &mut db,
///     r#"<node id="7">
///          <property id="2" value_type="gchararray">Rust &amp; friends</property>
///          <parent id="0"/>
///        </node>"#,
/// )
/// .unwrap();
///
/// assert_eq!(id, NodeId::new(7));
/// assert_eq!(db.node(id).unwrap().string(PropertyId::new(2)), "Rust & friends");
/// assert_eq!(db.child_index(root, id), Some(0));
/// ```
pub fn read_node(db: &mut Db, xml: &str) -> Result<NodeId, XmlError> {
    if db.is_immutable() {
        let id = first_node_id(xml)?;
        return Err(XmlError::Rejected {
            id,
            source: Rejected::Immutable,
        });
    }
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"node" => {
                let record = parse_node(&mut reader, &e)?;
                let mut loader = Loader::new(db, ForwardRefs::Drop);
                let id = loader.apply(record)?;
                loader.finish();
                return Ok(id);
            }
            Event::Empty(e) if e.name().as_ref() == b"node" => {
                let record = NodeRecord {
                    id: id_attribute(&e)?.map(NodeId::new),
                    ..NodeRecord::default()
                };
                return Loader::new(db, ForwardRefs::Drop).apply(record);
            }
            Event::Eof => return Err(XmlError::MissingNode),
            _ => {}
        }
    }
}

fn first_node_id(xml: &str) -> Result<NodeId, XmlError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"node" => {
                return id_attribute(&e)?.map(NodeId::new).ok_or(
                    XmlError::MissingAttribute {
                        element: "node",
                        attribute: "id",
                    },
                );
            }
            Event::Eof => return Err(XmlError::MissingNode),
            _ => {}
        }
    }
}
