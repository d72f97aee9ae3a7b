//! Search parameters and the pull-based result cursor
//!
//! This module provides the interface between the export pipeline and a
//! directory session without tying the pipeline to a particular backend.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

use super::entry::Entry;

/// Search scope relative to the search base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the base entry itself
    Base,
    /// Immediate children of the base
    #[serde(alias = "one", alias = "onelevel")]
    OneLevel,
    /// The base and everything below it
    #[default]
    #[serde(alias = "sub")]
    Subtree,
}

/// A directory search as issued by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Search base DN
    pub base: String,
    /// RFC 4515 search filter
    pub filter: String,
    pub scope: Scope,
    /// Server-side time limit in seconds, 0 for unlimited
    pub time_limit: u32,
    /// Maximum number of entries, 0 for unlimited
    pub size_limit: u32,
    /// Attributes to return; empty or `*` for all user attributes
    pub returning_attributes: Vec<String>,
}

impl QuerySpec {
    pub fn new(base: impl Into<String>, filter: impl Into<String>, scope: Scope) -> Self {
        Self {
            base: base.into(),
            filter: filter.into(),
            scope,
            time_limit: 0,
            size_limit: 0,
            returning_attributes: Vec::new(),
        }
    }

    pub fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn with_size_limit(mut self, entries: u32) -> Self {
        self.size_limit = entries;
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.returning_attributes = attributes;
        self
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Base => write!(f, "base"),
            Scope::OneLevel => write!(f, "one"),
            Scope::Subtree => write!(f, "sub"),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" | "object" => Ok(Scope::Base),
            "one" | "onelevel" | "one-level" => Ok(Scope::OneLevel),
            "sub" | "subtree" => Ok(Scope::Subtree),
            other => Err(format!("unknown scope '{other}' (expected base, one or sub)")),
        }
    }
}

/// A lazy, single-pass sequence of search results.
///
/// Nothing is fetched until `has_next` or `next` is called. Once the cursor
/// reported exhaustion or an error it cannot be reused; run a new search.
#[async_trait]
pub trait ResultCursor: Send {
    /// Probe for another entry, fetching it from the server if needed.
    async fn has_next(&mut self) -> Result<bool, DirectoryError>;

    /// Return the next entry with all of its attributes and values.
    ///
    /// Must not be called after `has_next` returned `false` or an error.
    async fn next(&mut self) -> Result<Entry, DirectoryError>;
}

/// A connected directory session able to run searches.
#[async_trait]
pub trait DirectorySession: Send + Sync {
    /// Start a search. The returned cursor has not fetched any entry yet.
    async fn search(&self, query: &QuerySpec) -> Result<Box<dyn ResultCursor>, DirectoryError>;
}
