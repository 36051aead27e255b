//! Batch erase driver.
//!
//! This module provides [`EraseOrchestrator`], the primary interface for
//! erasing a set of files: it drops targets that no longer exist, wraps every
//! survivor in a [`SecureEraser`] job and drives the jobs through a fresh
//! [`JobScheduler`] sized to the worker budget.
//!
//! ## Features
//!
//! - Asynchronous batches (`start` / `finished` / `wait`) and `run` for both
//! - Sequential mode that erases on the calling thread
//! - Per-batch totals via [`BatchReport`]
//! - Rejects a second batch while one is still draining

use crate::config::{default_workers, Config};
use crate::eraser::{EraseErrorKind, EraseOutcome, SecureEraser, BUFFER_SIZE};
use crate::error::SafeWipeError;
use crate::replacement::ReplacementSource;
use crate::reporter::{BatchReport, BatchTally, ProgressSink, TallySink};
use crate::scheduler::{Job, JobScheduler, SchedulerStats};
use crate::targets::FileTarget;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EraseOrchestrator {
    source: Arc<dyn ReplacementSource>,
    sink: Arc<dyn ProgressSink>,
    workers: usize,
    chunk_size: usize,
    scheduler: Option<JobScheduler>,
    tally: Arc<BatchTally>,
}

impl EraseOrchestrator {
    pub fn new(source: Arc<dyn ReplacementSource>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            source,
            sink,
            workers: default_workers(),
            chunk_size: BUFFER_SIZE,
            scheduler: None,
            tally: Arc::new(BatchTally::default()),
        }
    }

    /// Build from validated settings.
    pub fn from_config(cfg: &Config, sink: Arc<dyn ProgressSink>) -> Self {
        Self::new(cfg.pattern.source(), sink)
            .with_workers(cfg.effective_workers())
            .with_chunk_size(cfg.chunk_size)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue one job per existing target and launch the batch.
    ///
    /// Returns the number of files queued. Fails with `Busy` while a previous
    /// batch on this orchestrator is still draining.
    pub fn start<I, T>(&mut self, targets: I) -> Result<usize, SafeWipeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<FileTarget>,
    {
        if !self.finished() {
            return Err(SafeWipeError::busy("erase batch in progress"));
        }

        let (eraser, sink) = self.begin_batch();
        let existing = filter_existing(targets, sink.as_ref());

        let scheduler = JobScheduler::new(self.workers)?;
        for target in &existing {
            let eraser = eraser.clone();
            scheduler.submit(Job::with_arg(
                target.name(),
                move |target: FileTarget| {
                    let outcome = eraser.run(&target.path);
                    match outcome.error_kind {
                        None | Some(EraseErrorKind::TargetMissing) => Ok(()),
                        Some(kind) => anyhow::bail!("{}: {}", outcome.name, kind),
                    }
                },
                target.clone(),
            ))?;
        }

        let started = scheduler.launch()?;
        info!(
            queued = existing.len(),
            started,
            workers = self.workers,
            pattern = self.source.name(),
            "erase batch started"
        );

        self.scheduler = Some(scheduler);
        Ok(existing.len())
    }

    /// True when no batch is running.
    pub fn finished(&self) -> bool {
        self.scheduler.as_ref().map_or(true, JobScheduler::is_idle)
    }

    /// Wait for the current batch to drain.
    pub async fn wait(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.wait_idle().await;
        }
    }

    /// Start a batch and wait for it to drain.
    pub async fn run<I, T>(&mut self, targets: I) -> Result<BatchReport, SafeWipeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<FileTarget>,
    {
        self.start(targets)?;
        self.wait().await;
        let report = self.report();
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "erase batch finished"
        );
        Ok(report)
    }

    /// Erase targets one after another on the calling thread.
    pub fn run_sequential<I, T>(&mut self, targets: I) -> Result<Vec<EraseOutcome>, SafeWipeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<FileTarget>,
    {
        if !self.finished() {
            return Err(SafeWipeError::busy("erase batch in progress"));
        }

        let (eraser, sink) = self.begin_batch();
        let outcomes = filter_existing(targets, sink.as_ref())
            .iter()
            .map(|target| eraser.run(&target.path))
            .collect();
        Ok(outcomes)
    }

    /// Totals for the most recent batch.
    pub fn report(&self) -> BatchReport {
        self.tally.summary()
    }

    pub fn scheduler_stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(JobScheduler::stats)
    }

    /// Reset per-batch totals and build the eraser every job shares.
    fn begin_batch(&mut self) -> (SecureEraser, Arc<dyn ProgressSink>) {
        self.tally = Arc::new(BatchTally::default());
        let sink: Arc<dyn ProgressSink> =
            Arc::new(TallySink::new(self.sink.clone(), self.tally.clone()));
        let eraser =
            SecureEraser::new(self.source.clone(), sink.clone()).with_chunk_size(self.chunk_size);
        (eraser, sink)
    }
}

/// Keep targets that exist now; report the rest as skipped.
///
/// Repeated paths are queued once.
fn filter_existing<I, T>(targets: I, sink: &dyn ProgressSink) -> Vec<FileTarget>
where
    I: IntoIterator<Item = T>,
    T: Into<FileTarget>,
{
    let mut existing = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for target in targets.into_iter().map(Into::into) {
        if !seen.insert(target.path.clone()) {
            debug!(path = %target.path.display(), "duplicate target ignored");
            continue;
        }
        if target.exists() {
            existing.push(target);
        } else {
            warn!(path = %target.path.display(), "file does not exist, skipping");
            sink.report_skip(&target.name());
        }
    }

    debug!(count = existing.len(), "targets ready");
    existing
}
