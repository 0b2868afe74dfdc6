// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text encoding of property values.
//!
//! The `value_type` names are the historical GLib type names, kept so that
//! existing documents stay readable.

use std::borrow::Cow;

use arbor_graph::{NodeId, PropertyValue, ValueType};

/// The `value_type` attribute for a kind.
#[must_use]
pub fn type_name(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::String => "gchararray",
        ValueType::Bool => "gboolean",
        ValueType::Int => "gint",
        ValueType::Long => "glong",
        ValueType::Float => "gfloat",
        ValueType::Double => "gdouble",
        ValueType::Node => "gpointer",
    }
}

/// The kind named by a `value_type` attribute.
#[must_use]
pub fn type_from_name(name: &str) -> Option<ValueType> {
    ValueType::ALL.into_iter().find(|t| type_name(*t) == name)
}

/// Replaces control characters that XML 1.0 cannot carry with a space.
///
/// Tab, carriage return and line feed are kept.
///
/// ```rust
/// use arbor_xml::scrub;
///
/// assert_eq!(scrub("a\u{1}b\tc"), "a b\tc");
/// ```
#[must_use]
pub fn scrub(text: &str) -> Cow<'_, str> {
    let illegal = |c: char| c < '\u{20}' && !matches!(c, '\t' | '\r' | '\n');
    if !text.contains(illegal) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if illegal(c) { ' ' } else { c })
            .collect(),
    )
}

/// Element text for a value.
///
/// Floats use the shortest decimal form that parses back to the same bits,
/// which is independent of any locale.
#[must_use]
pub fn encode(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => scrub(s).into_owned(),
        PropertyValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
        PropertyValue::Int(v) => v.to_string(),
        PropertyValue::Long(v) => v.to_string(),
        PropertyValue::Float(v) => v.to_string(),
        PropertyValue::Double(v) => v.to_string(),
        PropertyValue::Node(id) => id.to_string(),
    }
}

/// Parses element text as a value of `value_type`.
///
/// Numbers may carry surrounding whitespace. Booleans accept `1`/`0` and
/// `true`/`false`. Returns `None` if the text does not parse.
#[must_use]
pub fn decode(value_type: ValueType, text: &str) -> Option<PropertyValue> {
    let trimmed = text.trim();
    let value = match value_type {
        ValueType::String => PropertyValue::String(text.to_owned()),
        ValueType::Bool => PropertyValue::Bool(match trimmed {
            "1" | "true" | "TRUE" => true,
            "0" | "false" | "FALSE" => false,
            _ => return None,
        }),
        ValueType::Int => PropertyValue::Int(trimmed.parse().ok()?),
        ValueType::Long => PropertyValue::Long(trimmed.parse().ok()?),
        ValueType::Float => PropertyValue::Float(trimmed.parse().ok()?),
        ValueType::Double => PropertyValue::Double(trimmed.parse().ok()?),
        ValueType::Node => PropertyValue::Node(NodeId::new(trimmed.parse().ok()?)),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for t in ValueType::ALL {
            assert_eq!(type_from_name(type_name(t)), Some(t));
        }
        assert_eq!(type_from_name("guint"), None);
    }

    #[test]
    fn scrub_keeps_whitespace_controls() {
        assert!(matches!(scrub("plain\ttext\r\n"), Cow::Borrowed(_)));
        assert_eq!(scrub("\u{0}\u{8}x\u{1f}"), "  x ");
    }

    #[test]
    fn floats_are_bit_exact() {
        for v in [0.1_f64, -0.0, 1e300, f64::MIN_POSITIVE, 1.0 / 3.0] {
            let text = encode(&PropertyValue::Double(v));
            let back = decode(ValueType::Double, &text).and_then(|p| p.as_double());
            assert_eq!(back.map(f64::to_bits), Some(v.to_bits()), "{text}");
        }
        let text = encode(&PropertyValue::Float(f32::INFINITY));
        assert_eq!(
            decode(ValueType::Float, &text),
            Some(PropertyValue::Float(f32::INFINITY))
        );
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert_eq!(decode(ValueType::Int, "12x"), None);
        assert_eq!(decode(ValueType::Bool, "yes"), None);
        assert_eq!(decode(ValueType::Node, "-3"), None);
        assert_eq!(decode(ValueType::Int, " 42\n"), Some(PropertyValue::Int(42)));
    }

    #[test]
    fn strings_keep_surrounding_whitespace() {
        assert_eq!(
            decode(ValueType::String, "  spaced  "),
            Some(PropertyValue::String(String::from("  spaced  ")))
        );
    }
}
