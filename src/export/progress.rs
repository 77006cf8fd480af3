//! Progress tracking for export operations
//!
//! This module provides progress bar and statistics tracking for long-running
//! exports, giving users real-time feedback while pages are pulled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for export operations
///
/// Tracks exported rows and finalized chunks and displays a spinner with
/// the current throughput.
pub struct ProgressTracker {
    /// Number of rows processed so far
    processed: AtomicU64,
    /// Number of chunks finalized so far
    chunks: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner on stderr
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            // The template is a literal; fall back to the default style if it is ever rejected
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} {pos} rows {msg}")
            {
                bar.set_style(style);
            }
            bar
        });

        Self {
            processed: AtomicU64::new(0),
            chunks: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Update progress with new totals
    ///
    /// # Arguments
    /// * `rows` - Total number of rows processed so far
    /// * `chunks` - Total number of chunks finalized so far
    pub fn update(&self, rows: u64, chunks: u64) {
        self.processed.store(rows, Ordering::Relaxed);
        self.chunks.store(chunks, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(rows);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = rows as f64 / elapsed;
                bar.set_message(format!("in {} chunks ({:.0} rows/sec)", chunks, speed));
            }
        }
    }

    /// Rows recorded by the last update
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Chunks recorded by the last update
    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_records_totals() {
        let tracker = ProgressTracker::new(false);
        tracker.update(500, 2);
        assert_eq!(tracker.processed(), 500);
        assert_eq!(tracker.chunks(), 2);
        tracker.finish();
    }

    #[test]
    fn test_progress_tracker_with_bar() {
        let tracker = ProgressTracker::new(true);
        tracker.update(10, 0);
        tracker.finish();
        assert_eq!(tracker.processed(), 10);
    }
}
