//! Export destinations
//!
//! An [`ExportSink`] is opened once by the pipeline, receives encoded records
//! in cursor order, and is closed exactly once whatever the outcome.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::SinkError;

/// Append-only destination for encoded records.
#[async_trait]
pub trait ExportSink: Send {
    /// Create the destination. Called once, before any write.
    async fn open(&mut self) -> Result<(), SinkError>;

    /// Append one encoded record.
    async fn write(&mut self, text: &str) -> Result<(), SinkError>;

    /// Flush and release the destination. Calling it again is a no-op, as is
    /// closing a sink that was never opened.
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Bytes accepted so far.
    fn bytes_written(&self) -> u64;
}

/// Writes LDIF to a file through a buffered writer.
pub struct LdifFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl LdifFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            written: 0,
        }
    }
}

/// Suggested output file name, e.g. `export-2024-05-01_12-00-00.ldif`.
pub fn default_filename() -> String {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("export-{}.ldif", timestamp)
}

fn validate_path(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(SinkError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Directory does not exist: {}", parent.display()),
                ),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl ExportSink for LdifFileSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        validate_path(&self.path)?;
        let file = File::create(&self.path).await.map_err(|source| SinkError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.writer = Some(BufWriter::with_capacity(1024 * 1024, file));
        debug!("Opened LDIF output: {}", self.path.display());
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotOpen)?;
        writer
            .write_all(text.as_bytes())
            .await
            .map_err(SinkError::Write)?;
        self.written += text.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await.map_err(SinkError::Close)?;
            writer.shutdown().await.map_err(SinkError::Close)?;
            debug!(
                "Closed LDIF output: {} ({} bytes)",
                self.path.display(),
                self.written
            );
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Drop for LdifFileSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            warn!(
                "LDIF output {} dropped without close; buffered data may be lost",
                self.path.display()
            );
        }
    }
}
