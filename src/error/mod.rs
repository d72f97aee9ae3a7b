//! Error handling module for export operations.
//!
//! This module provides the error taxonomy used by the export pipeline:
//! - Directory errors carrying an optional LDAP status code
//! - Sink errors for the export destination
//! - Codec errors for broken record life cycles
//! - Filter and configuration errors for the front end
//!
//! # Example
//!
//! ```rust
//! use ldapexport::error::{DirectoryError, StatusCode};
//!
//! let err = DirectoryError::new(StatusCode::SizeLimitExceeded, "size limit reached");
//! assert_eq!(err.status().map(|s| s.code()), Some(4));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    CodecError, ConfigError, DirectoryError, ExportError, FilterError, Result, SinkError,
    StatusCode,
};
