// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed property values.

use alloc::string::String;

use crate::id::NodeId;

/// The value stored in one property slot of a [`Node`](crate::Node).
///
/// A closed set of kinds: text, the four integer-ish kinds, the two floating
/// kinds and a reference to another node. Node references are identities,
/// not ownership; the referenced node may be destroyed independently, after
/// which the reference dangles (see [`Db::contains`](crate::Db::contains)).
///
/// # Example
///
/// ```rust
/// use arbor_graph::{NodeId, PropertyValue, ValueType};
///
/// let title = PropertyValue::from("Rust");
/// assert_eq!(title.value_type(), ValueType::String);
/// assert_eq!(title.as_str(), Some("Rust"));
///
/// let topic = PropertyValue::from(NodeId::new(4));
/// assert_eq!(topic.as_node(), Some(NodeId::new(4)));
/// assert_eq!(topic.as_int(), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// UTF-8 text.
    String(String),
    /// A boolean flag.
    Bool(bool),
    /// A 32-bit signed integer.
    Int(i32),
    /// A 64-bit signed integer.
    Long(i64),
    /// A single-precision float.
    Float(f32),
    /// A double-precision float.
    Double(f64),
    /// A reference to another node of the same registry.
    Node(NodeId),
}

/// The kind of a [`PropertyValue`], without its payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// [`PropertyValue::String`].
    String,
    /// [`PropertyValue::Bool`].
    Bool,
    /// [`PropertyValue::Int`].
    Int,
    /// [`PropertyValue::Long`].
    Long,
    /// [`PropertyValue::Float`].
    Float,
    /// [`PropertyValue::Double`].
    Double,
    /// [`PropertyValue::Node`].
    Node,
}

impl ValueType {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::String,
        Self::Bool,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Node,
    ];
}

impl PropertyValue {
    /// Returns the kind of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Long(_) => ValueType::Long,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::Node(_) => ValueType::Node,
        }
    }

    /// Returns the text if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int` value.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the integer if this is a `Long` value.
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match *self {
            Self::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the number if this is a `Float` value.
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the number if this is a `Double` value.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the referenced node if this is a node reference.
    #[must_use]
    pub fn as_node(&self) -> Option<NodeId> {
        match *self {
            Self::Node(id) => Some(id),
            _ => None,
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<NodeId> for PropertyValue {
    fn from(value: NodeId) -> Self {
        Self::Node(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_impls_pick_the_matching_kind() {
        assert_eq!(PropertyValue::from("a").value_type(), ValueType::String);
        assert_eq!(PropertyValue::from(true).value_type(), ValueType::Bool);
        assert_eq!(PropertyValue::from(1_i32).value_type(), ValueType::Int);
        assert_eq!(PropertyValue::from(1_i64).value_type(), ValueType::Long);
        assert_eq!(PropertyValue::from(1.5_f32).value_type(), ValueType::Float);
        assert_eq!(PropertyValue::from(1.5_f64).value_type(), ValueType::Double);
        assert_eq!(
            PropertyValue::from(NodeId::new(3)).value_type(),
            ValueType::Node
        );
    }

    #[test]
    fn accessors_reject_other_kinds() {
        let v = PropertyValue::Int(5);
        assert_eq!(v.as_int(), Some(5));
        assert_eq!(v.as_long(), None);
        assert_eq!(v.as_str(), None);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_node(), None);
    }

    #[test]
    fn all_lists_every_kind_once() {
        for (i, a) in ValueType::ALL.iter().enumerate() {
            for b in &ValueType::ALL[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
