//! Directory access for export operations
//!
//! This module describes what the export pipeline needs from a directory
//! server and nothing more:
//! - [`QuerySpec`]: search base, filter, scope and limits
//! - [`DirectorySession`]: a connected session able to start searches
//! - [`ResultCursor`]: a lazy, single-pass cursor over search results
//! - [`Entry`]: a DN plus its attribute values
//!
//! [`MemoryDirectory`] implements the session over an in-memory snapshot.

pub mod cursor;
pub mod dn;
pub mod entry;
pub mod filter;
pub mod memory;

pub use cursor::{DirectorySession, QuerySpec, ResultCursor, Scope};
pub use dn::{Dn, Rdn};
pub use entry::{AttributeValue, Entry, Value};
pub use filter::Filter;
pub use memory::{MemoryCursor, MemoryDirectory};
