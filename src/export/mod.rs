//! Export module for streaming LDIF export operations
//!
//! This module turns the results of one directory search into an LDIF file
//! without holding the result set in memory:
//! - Entries are pulled from the cursor one at a time
//! - Attribute lines are sorted so repeated exports are byte-identical
//! - Server-side limits end the export normally
//! - Progress and cancellation are checked between records
//!
//! # Architecture
//!
//! The export system is built on three main components:
//!
//! 1. **ExportSink**: Append-only destination for encoded records
//! 2. **ProgressSink**: Advisory progress notifications
//! 3. **CancellationSignal**: Read-only stop flag
//!
//! These components are orchestrated by the **ExportPipeline**, which manages
//! the entire export run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ldapexport::directory::{MemoryDirectory, QuerySpec, Scope};
//! use ldapexport::export::{ExportPipeline, LdifFileSink};
//!
//! # async fn run() -> ldapexport::Result<()> {
//! let session = Arc::new(MemoryDirectory::from_file("snapshot.json")?);
//! let query = QuerySpec::new("dc=example,dc=com", "(objectClass=person)", Scope::Subtree);
//! let sink = Box::new(LdifFileSink::new("people.ldif"));
//!
//! let report = ExportPipeline::new(session, query, sink).execute().await;
//! println!("{} records exported", report.records_exported);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod coordinator;
pub mod progress;
pub mod sink;

pub use cancel::CancellationSignal;
pub use coordinator::{BenignStatusCodes, ExportPipeline, ExportReport, ExportState, build_record};
pub use progress::{ExportCounter, NoProgress, ProgressSink, ProgressTracker};
pub use sink::{ExportSink, LdifFileSink, default_filename};
