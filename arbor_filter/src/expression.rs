// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single predicates over a node.

use alloc::string::String;

use arbor_graph::{Db, Node, NodeId, PropertyId};

use crate::fold::{Collator, FoldingCollator, fold_case};

/// One predicate a [`Filter`](crate::Filter) evaluates against a node.
///
/// Expressions hold node operands as ids, never as references, so they may
/// outlive the nodes they mention; a predicate naming a node that no longer
/// exists simply fails to match.
///
/// Build expressions with the constructor functions rather than the variants
/// directly: the string and key constructors prepare their operand (folding
/// or collating it) once, up front.
///
/// # Missing properties
///
/// String and key predicates never match a node that lacks the property.
/// Integer predicates read a missing property as `-1`, so
/// `int_property_less(p, 0)` matches nodes without `p`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    /// Matches every node.
    AlwaysTrue,
    /// Matches every node if `a == b`, none otherwise.
    NodeEquals {
        /// First operand.
        a: NodeId,
        /// Second operand.
        b: NodeId,
    },
    /// Matches exactly `node`.
    Equals {
        /// The node to match.
        node: NodeId,
    },
    /// Matches children of `parent`.
    HasParent {
        /// The required parent.
        parent: NodeId,
    },
    /// Matches parents of `child`.
    HasChild {
        /// The required child.
        child: NodeId,
    },
    /// Matches nodes whose `property` references `node`.
    NodePropertyEquals {
        /// Node-valued property to read.
        property: PropertyId,
        /// Expected target.
        node: NodeId,
    },
    /// Matches nodes with at least one child whose `property` references
    /// `node`.
    ChildPropertyEquals {
        /// Node-valued property to read on each child.
        property: PropertyId,
        /// Expected target.
        node: NodeId,
    },
    /// Matches nodes whose folded `property` contains `folded`.
    StringPropertyContains {
        /// String property to read.
        property: PropertyId,
        /// Case-folded needle.
        folded: String,
    },
    /// Matches nodes whose folded `property` equals `folded`.
    StringPropertyEquals {
        /// String property to read.
        property: PropertyId,
        /// Case-folded operand.
        folded: String,
    },
    /// Matches nodes whose stored key `property` contains `key`.
    KeyPropertyContains {
        /// Property holding a precomputed key.
        property: PropertyId,
        /// Key of the search text.
        key: String,
    },
    /// Matches nodes whose stored key `property` equals `key`.
    KeyPropertyEquals {
        /// Property holding a precomputed key.
        property: PropertyId,
        /// Key of the search text.
        key: String,
    },
    /// Matches nodes whose `Int` `property` equals `value`.
    IntPropertyEquals {
        /// Integer property to read.
        property: PropertyId,
        /// Operand.
        value: i32,
    },
    /// Matches nodes whose `Int` `property` is greater than `value`.
    IntPropertyGreater {
        /// Integer property to read.
        property: PropertyId,
        /// Operand.
        value: i32,
    },
    /// Matches nodes whose `Int` `property` is less than `value`.
    IntPropertyLess {
        /// Integer property to read.
        property: PropertyId,
        /// Operand.
        value: i32,
    },
}

impl Expression {
    /// See [`Expression::AlwaysTrue`].
    #[must_use]
    pub fn always_true() -> Self {
        Self::AlwaysTrue
    }

    /// See [`Expression::NodeEquals`].
    #[must_use]
    pub fn node_equals(a: NodeId, b: NodeId) -> Self {
        Self::NodeEquals { a, b }
    }

    /// See [`Expression::Equals`].
    #[must_use]
    pub fn equals(node: NodeId) -> Self {
        Self::Equals { node }
    }

    /// See [`Expression::HasParent`].
    #[must_use]
    pub fn has_parent(parent: NodeId) -> Self {
        Self::HasParent { parent }
    }

    /// See [`Expression::HasChild`].
    #[must_use]
    pub fn has_child(child: NodeId) -> Self {
        Self::HasChild { child }
    }

    /// See [`Expression::NodePropertyEquals`].
    #[must_use]
    pub fn node_property_equals(property: PropertyId, node: NodeId) -> Self {
        Self::NodePropertyEquals { property, node }
    }

    /// See [`Expression::ChildPropertyEquals`].
    #[must_use]
    pub fn child_property_equals(property: PropertyId, node: NodeId) -> Self {
        Self::ChildPropertyEquals { property, node }
    }

    /// Caseless substring match. `text` is folded here, once.
    #[must_use]
    pub fn string_property_contains(property: PropertyId, text: &str) -> Self {
        Self::StringPropertyContains {
            property,
            folded: fold_case(text),
        }
    }

    /// Caseless equality. `text` is folded here, once.
    #[must_use]
    pub fn string_property_equals(property: PropertyId, text: &str) -> Self {
        Self::StringPropertyEquals {
            property,
            folded: fold_case(text),
        }
    }

    /// Key substring match using [`FoldingCollator`].
    #[must_use]
    pub fn key_property_contains(property: PropertyId, text: &str) -> Self {
        Self::key_property_contains_with(property, text, &FoldingCollator)
    }

    /// Key substring match. The search text is folded, then keyed by
    /// `collator`.
    #[must_use]
    pub fn key_property_contains_with(
        property: PropertyId,
        text: &str,
        collator: &impl Collator,
    ) -> Self {
        Self::KeyPropertyContains {
            property,
            key: collator.key(&fold_case(text)),
        }
    }

    /// Key equality using [`FoldingCollator`].
    #[must_use]
    pub fn key_property_equals(property: PropertyId, text: &str) -> Self {
        Self::key_property_equals_with(property, text, &FoldingCollator)
    }

    /// Key equality. The search text is folded, then keyed by `collator`.
    #[must_use]
    pub fn key_property_equals_with(
        property: PropertyId,
        text: &str,
        collator: &impl Collator,
    ) -> Self {
        Self::KeyPropertyEquals {
            property,
            key: collator.key(&fold_case(text)),
        }
    }

    /// See [`Expression::IntPropertyEquals`].
    #[must_use]
    pub fn int_property_equals(property: PropertyId, value: i32) -> Self {
        Self::IntPropertyEquals { property, value }
    }

    /// See [`Expression::IntPropertyGreater`].
    #[must_use]
    pub fn int_property_greater(property: PropertyId, value: i32) -> Self {
        Self::IntPropertyGreater { property, value }
    }

    /// See [`Expression::IntPropertyLess`].
    #[must_use]
    pub fn int_property_less(property: PropertyId, value: i32) -> Self {
        Self::IntPropertyLess { property, value }
    }

    /// Evaluates this predicate against `node` in `db`.
    #[must_use]
    pub fn evaluate(&self, db: &Db, node: NodeId) -> bool {
        match *self {
            Self::AlwaysTrue => return true,
            Self::NodeEquals { a, b } => return a == b,
            Self::Equals { node: target } => return target == node,
            _ => {}
        }
        let Some(n) = db.node(node) else {
            return false;
        };
        match self {
            Self::AlwaysTrue | Self::NodeEquals { .. } | Self::Equals { .. } => true,
            Self::HasParent { parent } => n.is_child_of(*parent),
            Self::HasChild { child } => db.has_child(node, *child),
            Self::NodePropertyEquals {
                property,
                node: target,
            } => n.node_ref(*property) == Some(*target),
            Self::ChildPropertyEquals {
                property,
                node: target,
            } => n
                .children()
                .iter()
                .filter_map(|c| db.node(*c))
                .any(|c| c.node_ref(*property) == Some(*target)),
            Self::StringPropertyContains { property, folded } => {
                string_of(n, *property).is_some_and(|s| fold_case(s).contains(folded.as_str()))
            }
            Self::StringPropertyEquals { property, folded } => {
                string_of(n, *property).is_some_and(|s| fold_case(s) == *folded)
            }
            Self::KeyPropertyContains { property, key } => {
                string_of(n, *property).is_some_and(|s| s.contains(key.as_str()))
            }
            Self::KeyPropertyEquals { property, key } => {
                string_of(n, *property).is_some_and(|s| s == key.as_str())
            }
            Self::IntPropertyEquals { property, value } => n.int(*property) == *value,
            Self::IntPropertyGreater { property, value } => n.int(*property) > *value,
            Self::IntPropertyLess { property, value } => n.int(*property) < *value,
        }
    }
}

fn string_of(node: &Node, property: PropertyId) -> Option<&str> {
    node.property(property)?.as_str()
}
