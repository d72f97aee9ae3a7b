//! Attribute ordering for reproducible output
//!
//! Directory servers return attributes in no particular order. Sorting the
//! attribute lines of every record with an [`AttributeOrdering`] makes two
//! exports of the same data byte-identical.
//!
//! Every ordering here ends with a case-sensitive comparison of the unfolded
//! line text, so two lines only compare equal when they are identical.

use std::cmp::Ordering;

use crate::ldif::AttrValLine;

/// A deterministic total order over the attribute lines of one entry.
pub trait AttributeOrdering: Send + Sync {
    fn compare(&self, a: &AttrValLine, b: &AttrValLine) -> Ordering;

    fn sort(&self, lines: &mut [AttrValLine]) {
        lines.sort_by(|a, b| self.compare(a, b));
    }
}

/// Schema-agnostic ordering: leading attributes first (by default
/// `objectClass`), then everything else alphabetically.
#[derive(Debug, Clone)]
pub struct DefaultAttributeOrdering {
    leading: Vec<String>,
}

/// Ordering driven by schema hints: leading attributes, then the
/// attributes an entry must have, then those it may have, then the rest.
#[derive(Debug, Clone)]
pub struct SchemaAttributeOrdering {
    leading: Vec<String>,
    must: Vec<String>,
    may: Vec<String>,
}

fn position(names: &[String], name: &str) -> Option<usize> {
    names.iter().position(|n| n.eq_ignore_ascii_case(name))
}

fn by_name_then_text(a: &AttrValLine, b: &AttrValLine) -> Ordering {
    a.name()
        .to_ascii_lowercase()
        .cmp(&b.name().to_ascii_lowercase())
        .then_with(|| a.unfolded().cmp(b.unfolded()))
}

impl DefaultAttributeOrdering {
    pub fn new(leading: Vec<String>) -> Self {
        Self { leading }
    }

    fn rank(&self, name: &str) -> usize {
        position(&self.leading, name).unwrap_or(self.leading.len())
    }
}

impl Default for DefaultAttributeOrdering {
    fn default() -> Self {
        Self::new(vec!["objectClass".to_string()])
    }
}

impl AttributeOrdering for DefaultAttributeOrdering {
    fn compare(&self, a: &AttrValLine, b: &AttrValLine) -> Ordering {
        self.rank(a.name())
            .cmp(&self.rank(b.name()))
            .then_with(|| by_name_then_text(a, b))
    }
}

impl SchemaAttributeOrdering {
    pub fn new(leading: Vec<String>, must: Vec<String>, may: Vec<String>) -> Self {
        Self { leading, must, may }
    }

    fn rank(&self, name: &str) -> (u8, usize) {
        if let Some(i) = position(&self.leading, name) {
            (0, i)
        } else if position(&self.must, name).is_some() {
            (1, 0)
        } else if position(&self.may, name).is_some() {
            (2, 0)
        } else {
            (3, 0)
        }
    }
}

impl AttributeOrdering for SchemaAttributeOrdering {
    fn compare(&self, a: &AttrValLine, b: &AttrValLine) -> Ordering {
        self.rank(a.name())
            .cmp(&self.rank(b.name()))
            .then_with(|| by_name_then_text(a, b))
    }
}
