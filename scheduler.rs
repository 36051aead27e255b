//! Bounded-concurrency job scheduler.
//!
//! [`JobScheduler`] keeps a FIFO queue of pending [`Job`]s and runs at most
//! `max_concurrency` of them at once on tokio's blocking pool. When a job
//! finishes, the worker that ran it pulls the next queued job itself, so the
//! pool stays saturated until the queue drains.
//!
//! ## Batch discipline
//!
//! A scheduler moves between two states:
//!
//! ```text
//! Idle --launch()--> Draining --last job done--> Idle
//! ```
//!
//! `submit` and `launch` are rejected with [`SafeWipeError::Busy`] while
//! `Draining`. Dequeue, the active counter and the state all live behind one
//! mutex, and completion bookkeeping runs before a job's error or panic is
//! surfaced, so a failing job can never wedge the pool.

use crate::error::SafeWipeError;
use anyhow::Result;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error};

type JobFn = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A unit of work, opaque to the scheduler.
pub struct Job {
    label: String,
    action: JobFn,
}

impl Job {
    pub fn new<F>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }

    /// Bind an action to the argument it will be called with.
    pub fn with_arg<A, F>(label: impl Into<String>, action: F, arg: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Result<()> + Send + 'static,
    {
        Self::new(label, move || action(arg))
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Idle,
    Draining,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub max_concurrency: usize,
    pub active: usize,
    pub queued: usize,
    pub completed: usize,
    pub failed: usize,
}

struct State {
    queue: VecDeque<Job>,
    active: usize,
    batch: BatchState,
    completed: usize,
    failed: usize,
}

struct Inner {
    max_concurrency: usize,
    state: Mutex<State>,
    idle: watch::Sender<bool>,
    runtime: Handle,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(self: &Arc<Self>, job: Job) {
        let inner = Arc::clone(self);
        debug!(job = %job.label, "dispatching job");
        self.runtime.spawn_blocking(move || inner.run(job));
    }

    fn run(self: Arc<Self>, job: Job) {
        let Job { label, action } = job;
        let result = panic::catch_unwind(AssertUnwindSafe(action));

        let succeeded = matches!(result, Ok(Ok(())));
        if let Some(next) = self.complete(succeeded) {
            self.spawn(next);
        }

        match result {
            Ok(Ok(())) => debug!(job = %label, "job finished"),
            Ok(Err(e)) => debug!(job = %label, error = %e, "job failed"),
            Err(payload) => {
                error!(job = %label, "job panicked");
                panic::resume_unwind(payload);
            }
        }
    }

    /// Account for one finished job and claim the next one if capacity allows.
    fn complete(&self, succeeded: bool) -> Option<Job> {
        let mut state = self.lock();
        state.active -= 1;
        if succeeded {
            state.completed += 1;
        } else {
            state.failed += 1;
        }

        let next = if state.active < self.max_concurrency {
            state.queue.pop_front()
        } else {
            None
        };

        if next.is_some() {
            state.active += 1;
        } else if state.active == 0 {
            state.batch = BatchState::Idle;
            self.idle.send_replace(true);
            debug!(
                completed = state.completed,
                failed = state.failed,
                "batch drained"
            );
        }

        next
    }
}

/// Runs queued jobs with at most `max_concurrency` in flight.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    /// Create a scheduler on the current tokio runtime.
    pub fn new(max_concurrency: usize) -> Result<Self, SafeWipeError> {
        let handle = Handle::try_current()
            .map_err(|e| SafeWipeError::runtime(format!("no tokio runtime: {}", e)))?;
        Self::with_handle(max_concurrency, handle)
    }

    pub fn with_handle(max_concurrency: usize, runtime: Handle) -> Result<Self, SafeWipeError> {
        if max_concurrency == 0 {
            return Err(SafeWipeError::config("max_concurrency must be at least 1"));
        }

        let (idle, _) = watch::channel(true);
        Ok(Self {
            inner: Arc::new(Inner {
                max_concurrency,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    active: 0,
                    batch: BatchState::Idle,
                    completed: 0,
                    failed: 0,
                }),
                idle,
                runtime,
            }),
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Append a job to the pending queue.
    pub fn submit(&self, job: Job) -> Result<(), SafeWipeError> {
        let mut state = self.inner.lock();
        if state.batch == BatchState::Draining {
            return Err(SafeWipeError::busy(format!(
                "cannot submit '{}' while a batch is draining",
                job.label
            )));
        }
        state.queue.push_back(job);
        Ok(())
    }

    /// Start up to `max_concurrency` queued jobs. Does not block.
    ///
    /// Returns the number of jobs started.
    pub fn launch(&self) -> Result<usize, SafeWipeError> {
        let started: Vec<Job> = {
            let mut state = self.inner.lock();
            if state.batch == BatchState::Draining {
                return Err(SafeWipeError::busy("batch already launched"));
            }
            if state.queue.is_empty() {
                return Ok(0);
            }

            state.batch = BatchState::Draining;
            self.inner.idle.send_replace(false);

            let mut started = Vec::new();
            while state.active < self.inner.max_concurrency {
                match state.queue.pop_front() {
                    Some(job) => {
                        state.active += 1;
                        started.push(job);
                    }
                    None => break,
                }
            }
            debug!(
                started = started.len(),
                queued = state.queue.len(),
                max = self.inner.max_concurrency,
                "batch launched"
            );
            started
        };

        let count = started.len();
        for job in started {
            self.inner.spawn(job);
        }
        Ok(count)
    }

    /// True when no job is running.
    pub fn is_idle(&self) -> bool {
        self.inner.lock().active == 0
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.lock();
        SchedulerStats {
            max_concurrency: self.inner.max_concurrency,
            active: state.active,
            queued: state.queue.len(),
            completed: state.completed,
            failed: state.failed,
        }
    }

    /// Resolve once no job is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobScheduler")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn tracked_job(
        label: String,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        runs: Arc<AtomicUsize>,
    ) -> Job {
        Job::new(label, move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(15));
            running.fetch_sub(1, Ordering::SeqCst);
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_never_exceeds_max_concurrency() {
        let scheduler = JobScheduler::new(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        for i in 0..20 {
            scheduler
                .submit(tracked_job(
                    format!("job-{}", i),
                    running.clone(),
                    peak.clone(),
                    runs.clone(),
                ))
                .unwrap();
        }

        assert_eq!(scheduler.launch().unwrap(), 3);
        let stats = scheduler.stats();
        assert!(stats.active <= 3);
        assert_eq!(stats.active + stats.queued + stats.completed, 20);

        scheduler.wait_idle().await;

        assert_eq!(runs.load(Ordering::SeqCst), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let stats = scheduler.stats();
        assert_eq!(stats.completed, 20);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued, 0);
        assert!(scheduler.is_idle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_do_not_stall_queue() {
        let scheduler = JobScheduler::new(2).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let runs = runs.clone();
            scheduler
                .submit(Job::with_arg(
                    format!("job-{}", i),
                    move |n: usize| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        match n % 3 {
                            0 => anyhow::bail!("job {} failed", n),
                            1 if n == 4 => panic!("job {} panicked", n),
                            _ => Ok(()),
                        }
                    },
                    i,
                ))
                .unwrap();
        }

        scheduler.launch().unwrap();
        scheduler.wait_idle().await;

        let stats = scheduler.stats();
        assert_eq!(runs.load(Ordering::SeqCst), 10);
        // 0, 3, 6, 9 bail; 4 panics
        assert_eq!(stats.failed, 5);
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_worker_runs_fifo() {
        let scheduler = JobScheduler::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..8 {
            let order = order.clone();
            scheduler
                .submit(Job::new(format!("job-{}", i), move || {
                    order.lock().unwrap().push(i);
                    Ok(())
                }))
                .unwrap();
        }

        scheduler.launch().unwrap();
        scheduler.wait_idle().await;

        assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejects_submit_and_launch_while_draining() {
        let scheduler = JobScheduler::new(2).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        scheduler
            .submit(Job::new("blocker", move || {
                release_rx.recv()?;
                Ok(())
            }))
            .unwrap();
        scheduler.launch().unwrap();

        let err = scheduler.submit(Job::new("late", || Ok(()))).unwrap_err();
        assert!(matches!(err, SafeWipeError::Busy(_)));
        assert!(matches!(scheduler.launch(), Err(SafeWipeError::Busy(_))));
        assert!(!scheduler.is_idle());

        release_tx.send(()).unwrap();
        scheduler.wait_idle().await;

        // A drained scheduler accepts the next batch
        scheduler.submit(Job::new("next", || Ok(()))).unwrap();
        assert_eq!(scheduler.launch().unwrap(), 1);
        scheduler.wait_idle().await;
        assert_eq!(scheduler.stats().completed, 2);
    }

    #[tokio::test]
    async fn test_empty_launch_stays_idle() {
        let scheduler = JobScheduler::new(4).unwrap();
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.launch().unwrap(), 0);
        assert!(scheduler.is_idle());
        scheduler.wait_idle().await;
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        assert!(matches!(
            JobScheduler::new(0),
            Err(SafeWipeError::Config(_))
        ));
    }

    #[test]
    fn test_new_without_runtime_fails() {
        assert!(matches!(
            JobScheduler::new(1),
            Err(SafeWipeError::Runtime(_))
        ));
    }
}
