// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Most graph mutations never fail loudly: against an immutable registry or
//! a missing node they are no-ops that return `false`. The errors here cover
//! the two places where a caller needs to know *why* nothing happened: node
//! creation and observer registration.

use thiserror::Error;

use crate::id::NodeId;

/// Why a node could not be created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Rejected {
    /// The registry is immutable.
    #[error("registry is immutable")]
    Immutable,
    /// The requested id already belongs to a live node.
    #[error("id {0} is already in use")]
    IdInUse(NodeId),
    /// Every id up to `u32::MAX` is taken.
    #[error("node id space is exhausted")]
    IdsExhausted,
}

/// Why an observer could not be connected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// No live node has this id.
    #[error("no live node with id {0}")]
    UnknownNode(NodeId),
    /// The node is dispatching an event; observers cannot be added until the
    /// outermost emission on it returns.
    #[error("node {0} is emitting; connect after dispatch completes")]
    EmissionInProgress(NodeId),
}
