//! LDAP Export Library
//!
//! This library streams the results of a directory search into an LDIF file.
//! Entries are pulled from a lazy cursor one at a time, their attribute lines
//! are sorted into a deterministic order, and each record is encoded and
//! written before the next entry is fetched.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `directory`: Search parameters, result cursors and an in-memory directory
//! - `error`: Error types and handling
//! - `export`: Export pipeline, sinks, progress and cancellation
//! - `ldif`: LDIF records and encoding
//! - `ordering`: Deterministic attribute ordering
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ldapexport::directory::{MemoryDirectory, QuerySpec, Scope};
//! use ldapexport::export::{ExportPipeline, LdifFileSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(MemoryDirectory::from_file("snapshot.json")?);
//!     let query = QuerySpec::new("dc=example,dc=com", "(objectClass=*)", Scope::Subtree);
//!
//!     let report = ExportPipeline::new(session, query, Box::new(LdifFileSink::new("out.ldif")))
//!         .execute()
//!         .await
//!         .into_result()?;
//!
//!     println!("Exported {} records", report.records_exported);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod ldif;
pub mod ordering;

// Re-export commonly used types
pub use config::Config;
pub use directory::{DirectorySession, Entry, MemoryDirectory, QuerySpec, ResultCursor, Scope};
pub use error::{ExportError, Result};
pub use export::{ExportPipeline, ExportReport, ExportState, LdifFileSink};
pub use ldif::{FormatParams, LdifCodec};
pub use ordering::{AttributeOrdering, DefaultAttributeOrdering};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
