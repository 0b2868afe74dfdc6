// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Serializing nodes.

use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use arbor_graph::{Db, Node, NodeId, PropertyValue};
use hashbrown::HashSet;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::codec;
use crate::error::XmlError;

/// Document-level settings for [`write_document`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    root: String,
    version: String,
    comment: Option<String>,
    indent: usize,
}

impl WriteOptions {
    /// Writes a document element named `root` with the given `version`.
    #[must_use]
    pub fn new(root: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            version: version.into(),
            comment: None,
            indent: 2,
        }
    }

    /// Places a comment directly inside the document element.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Spaces per nesting level. Defaults to 2.
    #[must_use]
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

/// Predicate deciding whether a node is written.
pub type NodeFilter<'a> = &'a dyn Fn(&Db, NodeId) -> bool;

/// One group of nodes to write: the children of a root node.
///
/// The root itself is not written; it is expected to exist (usually at a
/// well-known id) in whatever registry later loads the document.
#[derive(Clone, Copy)]
pub struct Section<'a> {
    root: NodeId,
    filter: Option<NodeFilter<'a>>,
    recursive: bool,
}

impl<'a> Section<'a> {
    /// Writes the children of `root`.
    #[must_use]
    pub fn children_of(root: NodeId) -> Self {
        Self {
            root,
            filter: None,
            recursive: false,
        }
    }

    /// Skips nodes for which `filter` returns `false`.
    ///
    /// In recursive mode a skipped node's descendants are skipped with it.
    #[must_use]
    pub fn filter(mut self, filter: NodeFilter<'a>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Also writes every descendant, each exactly once, parents before
    /// children along the first path that reaches them.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

impl fmt::Debug for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("root", &self.root)
            .field("filter", &self.filter.is_some())
            .field("recursive", &self.recursive)
            .finish()
    }
}

/// Writes a full document: declaration, document element, then the nodes
/// of every section in order.
///
/// A node reachable from several sections (or several parents) is written
/// once. Errors abort the write; whatever reached `out` stays there.
pub fn write_document<W: Write>(
    db: &Db,
    out: W,
    options: &WriteOptions,
    sections: &[Section<'_>],
) -> Result<(), XmlError> {
    let mut xml = Writer::new_with_indent(out, b' ', options.indent);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new(options.root.as_str());
    root.push_attribute(("version", options.version.as_str()));
    xml.write_event(Event::Start(root))?;
    if let Some(comment) = &options.comment {
        let comment = comment_text(comment);
        xml.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?;
    }

    let mut written = HashSet::new();
    let mut count = 0_usize;
    for section in sections {
        count += write_section(db, &mut xml, section, &mut written)?;
    }

    xml.write_event(Event::End(BytesEnd::new(options.root.as_str())))?;
    let mut out = xml.into_inner();
    out.write_all(b"\n")?;
    out.flush()?;
    log::debug!("wrote {count} nodes under <{}>", options.root);
    Ok(())
}

/// Comment bodies may neither contain `--` nor end in `-`; hyphens are
/// split with a space where either would happen.
fn comment_text(comment: &str) -> String {
    let mut text = String::with_capacity(comment.len() + 1);
    for c in comment.chars() {
        if c == '-' && text.ends_with('-') {
            text.push(' ');
        }
        text.push(c);
    }
    if text.ends_with('-') {
        text.push(' ');
    }
    text
}

fn write_section<W: Write>(
    db: &Db,
    xml: &mut Writer<W>,
    section: &Section<'_>,
    written: &mut HashSet<NodeId>,
) -> Result<usize, XmlError> {
    let Some(root) = db.node(section.root) else {
        log::warn!("skipping section: root node {} does not exist", section.root);
        return Ok(0);
    };
    let mut count = 0;
    let mut stack: Vec<NodeId> = root.children().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        if section.filter.is_some_and(|keep| !keep(db, id)) {
            continue;
        }
        let Some(node) = db.node(id) else {
            continue;
        };
        if !written.insert(id) {
            continue;
        }
        write_node_to(db, xml, node)?;
        count += 1;
        if section.recursive {
            stack.extend(node.children().iter().rev());
        }
    }
    Ok(count)
}

/// Writes one `<node>` element for `node` to `out`, without a document
/// around it.
pub fn write_node<W: Write>(db: &Db, out: W, node: NodeId) -> Result<(), XmlError> {
    let Some(node) = db.node(node) else {
        return Ok(());
    };
    let mut xml = Writer::new_with_indent(out, b' ', 2);
    write_node_to(db, &mut xml, node)
}

fn write_node_to<W: Write>(db: &Db, xml: &mut Writer<W>, node: &Node) -> Result<(), XmlError> {
    let id = node.id().to_string();
    let mut start = BytesStart::new("node");
    start.push_attribute(("id", id.as_str()));
    xml.write_event(Event::Start(start))?;

    for (property, value) in node.properties() {
        if let PropertyValue::Node(target) = value {
            if !db.contains(*target) {
                log::trace!("node {id}: dropping dangling reference to {target}");
                continue;
            }
        }
        let prop_id = property.to_string();
        let mut element = BytesStart::new("property");
        element.push_attribute(("id", prop_id.as_str()));
        element.push_attribute(("value_type", codec::type_name(value.value_type())));
        xml.write_event(Event::Start(element))?;
        xml.write_event(Event::Text(BytesText::new(&codec::encode(value))))?;
        xml.write_event(Event::End(BytesEnd::new("property")))?;
    }

    for edge in node.parents() {
        let parent = edge.parent().to_string();
        let mut element = BytesStart::new("parent");
        element.push_attribute(("id", parent.as_str()));
        xml.write_event(Event::Empty(element))?;
    }

    xml.write_event(Event::End(BytesEnd::new("node")))?;
    Ok(())
}

/// Saves a document to `path`.
///
/// The document is written to a sibling `<path>.tmp` file first and renamed
/// over `path` only once it is complete, so a failed save leaves any
/// previous file at `path` untouched.
pub fn save_to_file(
    db: &Db,
    path: impl AsRef<Path>,
    options: &WriteOptions,
    sections: &[Section<'_>],
) -> Result<(), XmlError> {
    let path = path.as_ref();
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let result = write_atomically(db, path, tmp.as_os_str(), options, sections);

    match result {
        Ok(()) => {
            log::debug!("saved {} to {}", db.name(), path.display());
            Ok(())
        }
        Err(err) => {
            log::warn!("failed to save {} to {}: {err}", db.name(), path.display());
            let _ = fs::remove_file(&tmp);
            Err(err)
        }
    }
}

fn write_atomically(
    db: &Db,
    path: &Path,
    tmp: &OsStr,
    options: &WriteOptions,
    sections: &[Section<'_>],
) -> Result<(), XmlError> {
    let mut out = BufWriter::new(File::create(tmp)?);
    write_document(db, &mut out, options, sections)?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}
