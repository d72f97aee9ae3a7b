//! LDIF content records
//!
//! A [`ContentRecord`] is built line by line: a `dn` line, any number of
//! attribute lines, and finally a separator. Finishing a record freezes it.

use crate::directory::Value;
use crate::error::CodecError;

use super::codec::{FormatParams, attr_val_text};

/// The `dn:` line of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnLine {
    dn: String,
}

/// One `name: value` line of a record.
///
/// The unfolded text is computed once, in the format it will be written
/// with, so comparators can use it as a stable tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrValLine {
    name: String,
    value: Value,
    text: String,
}

/// The blank line terminating a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SepLine;

/// A content record: DN, attribute lines and a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    dn_line: DnLine,
    attr_vals: Vec<AttrValLine>,
    sep_line: Option<SepLine>,
}

impl DnLine {
    pub fn new(dn: impl Into<String>) -> Self {
        Self { dn: dn.into() }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }
}

impl AttrValLine {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self::with_params(name, value, &FormatParams::default())
    }

    /// Build a line whose unfolded text follows `params`, e.g. base64 for
    /// every value under `ForceEncoded`.
    pub fn with_params(name: impl Into<String>, value: Value, params: &FormatParams) -> Self {
        let name = name.into();
        let text = attr_val_text(&name, &value, params);
        Self { name, value, text }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self::new(name, Value::Text(value.to_string()))
    }

    pub fn binary(name: &str, value: &[u8]) -> Self {
        Self::new(name, Value::Binary(value.to_vec()))
    }

    /// Attribute description, as received.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The unfolded line, e.g. `cn: John` or `jpegPhoto:: /9j/`.
    pub fn unfolded(&self) -> &str {
        &self.text
    }
}

impl ContentRecord {
    pub fn new(dn_line: DnLine) -> Self {
        Self {
            dn_line,
            attr_vals: Vec::new(),
            sep_line: None,
        }
    }

    pub fn add_attr_val(&mut self, line: AttrValLine) -> Result<(), CodecError> {
        if self.is_finished() {
            return Err(CodecError::RecordFinished);
        }
        self.attr_vals.push(line);
        Ok(())
    }

    /// Append the separator. No lines can be added afterwards.
    pub fn finish(&mut self, sep_line: SepLine) -> Result<(), CodecError> {
        if self.is_finished() {
            return Err(CodecError::RecordFinished);
        }
        self.sep_line = Some(sep_line);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.sep_line.is_some()
    }

    pub fn dn_line(&self) -> &DnLine {
        &self.dn_line
    }

    pub fn attr_vals(&self) -> &[AttrValLine] {
        &self.attr_vals
    }
}
