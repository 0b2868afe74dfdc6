// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Case folding and collation keys.

use alloc::string::String;

/// Folds `text` for caseless comparison.
///
/// Lowercases every character and applies the full folds that lowercasing
/// alone misses (`ß` and `ẞ` become `ss`, final sigma becomes `σ`), so that
/// two strings differing only in case fold to the same text.
///
/// ```rust
/// use arbor_filter::fold_case;
///
/// assert_eq!(fold_case("Straße"), "strasse");
/// assert_eq!(fold_case("ΟΔΟΣ"), fold_case("οδος"));
/// ```
#[must_use]
pub fn fold_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'ß' | 'ẞ' => out.push_str("ss"),
            'ς' => out.push('σ'),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Turns text into a key whose plain string comparison reflects a chosen
/// collation.
///
/// Key expressions compare a node's stored property verbatim against a key
/// built once from the search text, so the stored property must have been
/// produced by the same collator.
pub trait Collator {
    /// Builds the comparison key for `text`.
    fn key(&self, text: &str) -> String;
}

/// The default collator: keys are the case-folded text.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FoldingCollator;

impl Collator for FoldingCollator {
    fn key(&self, text: &str) -> String {
        fold_case(text)
    }
}

impl<F> Collator for F
where
    F: Fn(&str) -> String,
{
    fn key(&self, text: &str) -> String {
        self(text)
    }
}
