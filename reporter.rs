//! Progress reporting for concurrent erase jobs.
//!
//! Every job in a batch reports into one shared [`ProgressSink`]. Reports from
//! different workers arrive in arbitrary order, so sinks serialize their own
//! output.
//!
//! - [`ConsoleReporter`]: per-file progress bars on a single `MultiProgress`
//! - [`BatchTally`]: lock-free running totals, snapshotted as [`BatchReport`]

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Resolution of the per-file progress bars.
const BAR_SCALE: u64 = 1000;

/// Receives per-file progress and outcomes from running jobs.
pub trait ProgressSink: Send + Sync {
    /// `fraction` is in `[0, 1]` and non-decreasing for a given `name`.
    fn report(&self, name: &str, fraction: f64);

    /// Terminal outcome for one file.
    fn report_finish(&self, name: &str, success: bool);

    /// Target was dropped before a job was built for it.
    fn report_skip(&self, _name: &str) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _name: &str, _fraction: f64) {}
    fn report_finish(&self, _name: &str, _success: bool) {}
}

/// Summary of one drained batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Files that reached a terminal outcome
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Paths dropped at enumeration (missing)
    pub skipped: usize,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Running totals for a batch.
#[derive(Debug, Default)]
pub struct BatchTally {
    total: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl BatchTally {
    pub fn record_finish(&self, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> BatchReport {
        BatchReport {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Forwards to an inner sink while keeping a [`BatchTally`].
pub struct TallySink {
    inner: Arc<dyn ProgressSink>,
    tally: Arc<BatchTally>,
}

impl TallySink {
    pub fn new(inner: Arc<dyn ProgressSink>, tally: Arc<BatchTally>) -> Self {
        Self { inner, tally }
    }
}

impl ProgressSink for TallySink {
    fn report(&self, name: &str, fraction: f64) {
        self.inner.report(name, fraction);
    }

    fn report_finish(&self, name: &str, success: bool) {
        self.tally.record_finish(success);
        self.inner.report_finish(name, success);
    }

    fn report_skip(&self, name: &str) {
        self.tally.record_skip();
        self.inner.report_skip(name);
    }
}

/// Terminal reporter: one progress bar per in-flight file.
///
/// All output goes through the same `MultiProgress`, so lines printed by
/// different workers never interleave.
pub struct ConsoleReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    style: ProgressStyle,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    /// Print a line above the progress bars.
    pub fn println(&self, line: impl AsRef<str>) {
        if let Err(e) = self.multi.println(line) {
            debug!(error = %e, "console write failed");
        }
    }

    fn bar(&self, name: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        bars.entry(name.to_string())
            .or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new(BAR_SCALE));
                pb.set_style(self.style.clone());
                pb.set_message(name.to_string());
                pb
            })
            .clone()
    }
}

impl ProgressSink for ConsoleReporter {
    fn report(&self, name: &str, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_SCALE as f64).round() as u64;
        self.bar(name).set_position(position);
    }

    fn report_finish(&self, name: &str, success: bool) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if let Some(pb) = bar {
            pb.finish_and_clear();
            self.multi.remove(&pb);
        }

        if success {
            self.println(format!("OK: {}", name));
        } else {
            self.println(format!("FAIL: {}", name));
        }
    }

    fn report_skip(&self, name: &str) {
        self.println(format!("SKIP: {} (does not exist)", name));
    }
}
