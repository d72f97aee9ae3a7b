//! Progress tracking for export operations
//!
//! The pipeline publishes the number of exported records in two ways: a
//! shared [`ExportCounter`] that any observer may read at any time, and a
//! [`ProgressSink`] notified after every record.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress notifications.
///
/// Notifications are advisory. Implementations must return quickly and have
/// no way to fail the export.
pub trait ProgressSink: Send + Sync {
    /// Called after each record with the running total.
    fn on_progress(&self, exported: u64);

    /// Called once when the run is over.
    fn finish(&self, _exported: u64) {}
}

/// Number of exported records, shared between the pipeline and observers.
#[derive(Debug, Clone, Default)]
pub struct ExportCounter(Arc<AtomicU64>);

/// Ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

/// Terminal progress display for export operations
///
/// Shows a spinner with the number of exported entries and the current
/// speed.
pub struct ProgressTracker {
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ExportCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Add one record and return the new total.
    pub(crate) fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl ProgressSink for NoProgress {
    fn on_progress(&self, _exported: u64) {}
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner on the terminal
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} entries exported {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar
        });

        Self {
            start_time: Instant::now(),
            bar,
        }
    }
}

impl ProgressSink for ProgressTracker {
    fn on_progress(&self, exported: u64) {
        if let Some(ref bar) = self.bar {
            bar.set_position(exported);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = exported as f64 / elapsed;
                bar.set_message(format!("({:.0} entries/sec)", speed));
            }
        }
    }

    fn finish(&self, _exported: u64) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
