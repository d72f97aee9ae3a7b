//! RFC 4515 search filters
//!
//! Parses the string representation of a search filter and evaluates it
//! against an [`Entry`]. Matching follows the rules most directory servers
//! apply to string syntaxes by default: attribute descriptions and text
//! values compare case-insensitively, binary values compare byte for byte.
//! Extensible matches (`attr:rule:=value`) are not supported.

use std::cmp::Ordering;

use crate::error::FilterError;

use super::entry::{Entry, Value};

/// A parsed search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality {
        attr: String,
        value: Vec<u8>,
    },
    Substrings {
        attr: String,
        initial: Option<Vec<u8>>,
        any: Vec<Vec<u8>>,
        last: Option<Vec<u8>>,
    },
    GreaterOrEqual {
        attr: String,
        value: Vec<u8>,
    },
    LessOrEqual {
        attr: String,
        value: Vec<u8>,
    },
    Present(String),
    Approx {
        attr: String,
        value: Vec<u8>,
    },
}

#[derive(Clone, Copy)]
enum ItemOp {
    Equal,
    Approx,
    GreaterOrEqual,
    LessOrEqual,
}

struct FilterParser<'a> {
    text: &'a str,
    pos: usize,
}

impl Filter {
    /// Parse a filter string. A bare item without the outer parentheses,
    /// such as `objectClass=*`, is accepted as well.
    pub fn parse(input: &str) -> Result<Filter, FilterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FilterError::Empty);
        }

        let wrapped;
        let text = if trimmed.starts_with('(') {
            trimmed
        } else {
            wrapped = format!("({trimmed})");
            wrapped.as_str()
        };

        let mut parser = FilterParser { text, pos: 0 };
        let filter = parser.filter()?;
        parser.skip_ws();
        if parser.pos < text.len() {
            return Err(FilterError::TrailingInput(parser.pos));
        }
        Ok(filter)
    }

    /// Evaluate the filter against an entry.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            Filter::Present(attr) => entry.values(attr).next().is_some(),
            Filter::Equality { attr, value } => {
                entry.values(attr).any(|v| compare(v, value) == Some(Ordering::Equal))
            }
            Filter::GreaterOrEqual { attr, value } => entry
                .values(attr)
                .any(|v| matches!(compare(v, value), Some(Ordering::Greater | Ordering::Equal))),
            Filter::LessOrEqual { attr, value } => entry
                .values(attr)
                .any(|v| matches!(compare(v, value), Some(Ordering::Less | Ordering::Equal))),
            Filter::Approx { attr, value } => {
                let wanted = squash(value);
                entry.values(attr).any(|v| match v {
                    Value::Text(s) => squash(s.as_bytes()) == wanted,
                    Value::Binary(b) => b == value,
                })
            }
            Filter::Substrings {
                attr,
                initial,
                any,
                last,
            } => entry.values(attr).any(|v| match v {
                Value::Text(s) => substring_match(s, initial.as_deref(), any, last.as_deref()),
                Value::Binary(_) => false,
            }),
        }
    }
}

/// Compare a stored value with an assertion value. Integers compare
/// numerically, other text case-insensitively, binary values only for
/// equality.
fn compare(stored: &Value, assertion: &[u8]) -> Option<Ordering> {
    match stored {
        Value::Binary(bytes) => (bytes.as_slice() == assertion).then_some(Ordering::Equal),
        Value::Text(text) => {
            let wanted = String::from_utf8_lossy(assertion);
            let (left, right) = (text.trim(), wanted.trim());
            if let (Ok(a), Ok(b)) = (left.parse::<i64>(), right.parse::<i64>()) {
                return Some(a.cmp(&b));
            }
            Some(left.to_lowercase().cmp(&right.to_lowercase()))
        }
    }
}

fn squash(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn substring_match(
    value: &str,
    initial: Option<&[u8]>,
    any: &[Vec<u8>],
    last: Option<&[u8]>,
) -> bool {
    let haystack = value.to_lowercase();
    let lower = |bytes: &[u8]| String::from_utf8_lossy(bytes).to_lowercase();

    let mut rest = haystack.as_str();
    if let Some(initial) = initial {
        let initial = lower(initial);
        match rest.strip_prefix(initial.as_str()) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    for part in any {
        let part = lower(part);
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(lower(last).as_str()),
        None => true,
    }
}

impl<'a> FilterParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> FilterError {
        match self.text[self.pos..].chars().next() {
            Some(found) => FilterError::UnexpectedChar {
                position: self.pos,
                found,
            },
            None => FilterError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), FilterError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_ws();
        self.expect(b'(')?;
        self.skip_ws();
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(FilterError::UnexpectedEnd),
        };
        self.skip_ws();
        self.expect(b')')?;
        Ok(filter)
    }

    // An empty list is allowed: `(&)` is absolute true, `(|)` absolute false (RFC 4526).
    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut filters = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'(') {
                return Ok(filters);
            }
            filters.push(self.filter()?);
        }
    }

    fn item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'=' | b'~' | b'<' | b'>' => break,
                b'(' | b')' | b'*' | b':' | b'\\' => return Err(self.unexpected()),
                _ => self.pos += 1,
            }
        }
        let attr = self.text[start..self.pos].trim().to_string();
        if attr.is_empty() {
            return Err(FilterError::MissingAttribute(start));
        }

        let op = match self.peek() {
            Some(b'=') => ItemOp::Equal,
            Some(b'~') => ItemOp::Approx,
            Some(b'>') => ItemOp::GreaterOrEqual,
            Some(b'<') => ItemOp::LessOrEqual,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        if !matches!(op, ItemOp::Equal) {
            self.expect(b'=')?;
        }

        let (segments, star_at) = self.assertion_value()?;

        match (op, star_at) {
            (ItemOp::Equal, None) => Ok(Filter::Equality {
                attr,
                value: segments.into_iter().next().unwrap_or_default(),
            }),
            (ItemOp::Equal, Some(_)) => {
                if segments.len() == 2 && segments.iter().all(Vec::is_empty) {
                    return Ok(Filter::Present(attr));
                }
                let mut segments = segments;
                let last = segments.pop().filter(|s| !s.is_empty());
                let mut rest = segments.into_iter();
                let initial = rest.next().filter(|s| !s.is_empty());
                let any = rest.filter(|s| !s.is_empty()).collect();
                Ok(Filter::Substrings {
                    attr,
                    initial,
                    any,
                    last,
                })
            }
            (_, Some(position)) => Err(FilterError::UnexpectedChar {
                position,
                found: '*',
            }),
            (ItemOp::Approx, None) => Ok(Filter::Approx {
                attr,
                value: segments.into_iter().next().unwrap_or_default(),
            }),
            (ItemOp::GreaterOrEqual, None) => Ok(Filter::GreaterOrEqual {
                attr,
                value: segments.into_iter().next().unwrap_or_default(),
            }),
            (ItemOp::LessOrEqual, None) => Ok(Filter::LessOrEqual {
                attr,
                value: segments.into_iter().next().unwrap_or_default(),
            }),
        }
    }

    /// Read an assertion value up to the closing parenthesis, splitting it
    /// at unescaped `*`. Returns the segments and the first star position.
    fn assertion_value(&mut self) -> Result<(Vec<Vec<u8>>, Option<usize>), FilterError> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        let mut first_star = None;

        loop {
            match self.peek() {
                None => return Err(FilterError::UnexpectedEnd),
                Some(b')') => break,
                Some(b'(') => return Err(self.unexpected()),
                Some(b'*') => {
                    first_star.get_or_insert(self.pos);
                    segments.push(std::mem::take(&mut current));
                    self.pos += 1;
                }
                Some(b'\\') => {
                    let escape_at = self.pos;
                    let hex = self
                        .text
                        .get(self.pos + 1..self.pos + 3)
                        .ok_or(FilterError::InvalidEscape(escape_at))?;
                    let byte = u8::from_str_radix(hex, 16)
                        .map_err(|_| FilterError::InvalidEscape(escape_at))?;
                    current.push(byte);
                    self.pos += 3;
                }
                Some(b) => {
                    current.push(b);
                    self.pos += 1;
                }
            }
        }
        segments.push(current);
        Ok((segments, first_star))
    }
}
