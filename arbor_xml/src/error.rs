// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt;
use std::io;

use arbor_graph::{NodeId, Rejected};
use thiserror::Error;

/// Everything that can go wrong while saving or loading a document.
#[derive(Debug, Error)]
pub enum XmlError {
    /// Reading or writing the underlying stream or file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The XML codec reported an error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The document is not well formed (bad escape, bad attribute, ...).
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// The document element has an unexpected name.
    #[error("expected root element <{expected}>, found <{found}>")]
    UnexpectedRoot {
        /// Name the loader was told to expect.
        expected: String,
        /// Name found in the document.
        found: String,
    },

    /// The document element carries the wrong `version`.
    #[error("document version {found:?} does not match required version {expected:?}")]
    VersionMismatch {
        /// Required version.
        expected: String,
        /// Version in the document, if any.
        found: Option<String>,
    },

    /// The input contains no element at all.
    #[error("document has no root element")]
    MissingRoot,

    /// A fragment handed to [`read_node`](crate::read_node) holds no `<node>`.
    #[error("no <node> element found")]
    MissingNode,

    /// A required attribute is absent or not a valid id.
    #[error("<{element}> lacks a valid `{attribute}` attribute")]
    MissingAttribute {
        /// Element name.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
    },

    /// The registry refused to create the node.
    #[error("node {id} rejected: {source}")]
    Rejected {
        /// Id of the node in the document.
        id: NodeId,
        /// Why the registry refused it.
        #[source]
        source: Rejected,
    },
}

pub(crate) fn malformed(err: impl fmt::Display) -> XmlError {
    XmlError::Malformed(err.to_string())
}
