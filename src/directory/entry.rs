//! Directory entries as returned by a search

use super::dn::Dn;

/// A single attribute value.
///
/// The kind comes from the directory response and is never guessed from
/// the bytes: a binary value stays binary even when it happens to be
/// printable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Binary(Vec<u8>),
}

/// One `(attribute name, value)` pair of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub name: String,
    pub value: Value,
}

/// A directory entry: a DN plus its attribute values in response order.
///
/// Multi-valued attributes appear as repeated pairs with the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    dn: Dn,
    attributes: Vec<AttributeValue>,
}

impl Value {
    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Text(s) => s.as_bytes(),
            Value::Binary(b) => b,
        }
    }
}

impl AttributeValue {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::Text(value.into()))
    }

    pub fn binary(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(name, Value::Binary(value.into()))
    }
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: Vec::new(),
        }
    }

    /// Append one value. Values of the same attribute need not be adjacent.
    pub fn push(&mut self, value: AttributeValue) {
        self.attributes.push(value);
    }

    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.push(AttributeValue::text(name, value));
        self
    }

    pub fn with_binary(mut self, name: &str, value: &[u8]) -> Self {
        self.push(AttributeValue::binary(name, value));
        self
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn attributes(&self) -> &[AttributeValue] {
        &self.attributes
    }

    /// All values of an attribute, matched case-insensitively.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.attributes
            .iter()
            .filter(move |av| av.name.eq_ignore_ascii_case(name))
            .map(|av| &av.value)
    }

    /// Distinct attribute names in first-seen order.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for av in &self.attributes {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&av.name)) {
                names.push(&av.name);
            }
        }
        names
    }

    /// Keep only the named attributes. `*` or an empty list keeps all,
    /// `1.1` keeps none.
    pub fn project(&mut self, requested: &[String]) {
        if requested.is_empty() || requested.iter().any(|r| r == "*") {
            return;
        }
        self.attributes
            .retain(|av| requested.iter().any(|r| r.eq_ignore_ascii_case(&av.name)));
    }

    pub fn into_parts(self) -> (Dn, Vec<AttributeValue>) {
        (self.dn, self.attributes)
    }
}
