//! Distinguished names
//!
//! A [`Dn`] keeps the string exactly as the server returned it, so that the
//! exported `dn:` line is byte-identical to the source, and additionally
//! splits it into relative distinguished names for scope checks.

use std::fmt;

use crate::error::{DirectoryError, StatusCode};

/// One `type=value` assertion inside an RDN. The value is kept escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ava {
    pub attr_type: String,
    pub value: String,
}

/// A relative distinguished name: one or more AVAs joined by `+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    avas: Vec<Ava>,
}

/// A parsed distinguished name, leaf RDN first.
#[derive(Debug, Clone)]
pub struct Dn {
    raw: String,
    rdns: Vec<Rdn>,
}

impl Ava {
    fn normalized(&self) -> (String, String) {
        (
            self.attr_type.to_ascii_lowercase(),
            self.value.trim().to_lowercase(),
        )
    }
}

impl Rdn {
    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }

    fn normalized(&self) -> Vec<(String, String)> {
        let mut avas: Vec<_> = self.avas.iter().map(Ava::normalized).collect();
        avas.sort();
        avas
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", ava.attr_type, ava.value)?;
        }
        Ok(())
    }
}

impl Dn {
    /// The empty DN naming the root DSE.
    pub fn root() -> Self {
        Self {
            raw: String::new(),
            rdns: Vec::new(),
        }
    }

    /// Parse a string DN (RFC 4514).
    ///
    /// Escaped characters (`\,`, `\2C`) and quoted values are kept verbatim
    /// in the AVA values; only the structure is interpreted.
    pub fn parse(input: &str) -> Result<Self, DirectoryError> {
        if input.trim().is_empty() {
            return Ok(Self::root());
        }

        let invalid =
            |why: &str| DirectoryError::new(StatusCode::InvalidDnSyntax, format!("{why}: {input}"));

        let mut rdns = Vec::new();
        let mut avas = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        let mut quoted = false;

        let close_ava = |text: &str, avas: &mut Vec<Ava>| -> Result<(), DirectoryError> {
            let (attr_type, value) = split_ava(text).ok_or_else(|| invalid("missing '='"))?;
            if attr_type.is_empty() {
                return Err(invalid("empty attribute type"));
            }
            avas.push(Ava {
                attr_type: attr_type.to_string(),
                value: value.to_string(),
            });
            Ok(())
        };

        for c in input.chars() {
            if escaped {
                current.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    current.push(c);
                    escaped = true;
                }
                '"' => {
                    current.push(c);
                    quoted = !quoted;
                }
                '+' if !quoted => {
                    close_ava(&current, &mut avas)?;
                    current.clear();
                }
                ',' | ';' if !quoted => {
                    close_ava(&current, &mut avas)?;
                    current.clear();
                    rdns.push(Rdn {
                        avas: std::mem::take(&mut avas),
                    });
                }
                _ => current.push(c),
            }
        }

        if escaped || quoted {
            return Err(invalid("unterminated escape or quote"));
        }
        close_ava(&current, &mut avas)?;
        rdns.push(Rdn { avas });

        Ok(Self {
            raw: input.to_string(),
            rdns,
        })
    }

    /// The DN exactly as it was supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The DN one level up, `None` for the root DSE.
    pub fn parent(&self) -> Option<Dn> {
        if self.is_root() {
            return None;
        }
        let rdns = self.rdns[1..].to_vec();
        let raw = rdns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Some(Dn { raw, rdns })
    }

    /// Whether `self` equals `ancestor` or lies somewhere below it.
    pub fn is_within(&self, ancestor: &Dn) -> bool {
        if ancestor.len() > self.len() {
            return false;
        }
        let offset = self.len() - ancestor.len();
        self.rdns[offset..]
            .iter()
            .zip(ancestor.rdns.iter())
            .all(|(a, b)| a.normalized() == b.normalized())
    }

    /// Whether `self` is an immediate child of `parent`.
    pub fn is_child_of(&self, parent: &Dn) -> bool {
        self.len() == parent.len() + 1 && self.is_within(parent)
    }
}

/// Split `type=value` at the first unescaped `=`, trimming the type and
/// leading blanks of the value.
fn split_ava(text: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '=' => {
                let value = text[i + 1..].trim_start();
                let value = if value.ends_with("\\ ") {
                    value
                } else {
                    value.trim_end()
                };
                return Some((text[..i].trim(), value));
            }
            _ => {}
        }
    }
    None
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_within(other)
    }
}

impl Eq for Dn {}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
