//! # Scheduled Trigger
//!
//! Periodic invoker for one job: every tick it takes the job's
//! single-flight lock, runs the job runner once, and logs the outcome. A
//! tick that finds the lock held elsewhere is skipped silently. Errors are
//! logged and the trigger waits for the next tick — re-invocation is safe
//! by contract, so the job simply stalls at its last checkpoint until the
//! fault clears.
//!
//! Triggers run on the tokio runtime's blocking-tolerant worker pool via
//! `tokio::spawn`; chunk fetch and processing may block on network or
//! database calls, so keep latency-sensitive traffic on its own runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::errors::SchedulerResult;
use super::job::Job;
use super::lock::{with_lock, JobLock, LockOutcome};
use super::runner::{JobRunner, RunSummary};

/// Periodically runs one job under its single-flight lock.
pub struct ScheduledTrigger<T> {
    runner: Arc<JobRunner<T>>,
    lock: Arc<dyn JobLock>,
    job: Arc<dyn Job<T>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
}

impl<T: Send + Sync + 'static> ScheduledTrigger<T> {
    pub fn new(
        runner: Arc<JobRunner<T>>,
        lock: Arc<dyn JobLock>,
        job: Arc<dyn Job<T>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            runner,
            lock,
            job,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
        }
    }

    /// One scheduled invocation: lock, run, release. `Skipped` means
    /// another node or a still-running prior invocation holds the lock.
    pub async fn run_once(&self) -> SchedulerResult<LockOutcome<SchedulerResult<RunSummary>>> {
        let name = self.job.name();
        with_lock(self.lock.as_ref(), name, self.runner.run(self.job.as_ref())).await
    }

    /// Spawn the periodic loop. Returns the task handle; the loop exits
    /// after [`stop`](Self::stop).
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::Release);
        let trigger = self;
        tokio::spawn(async move {
            info!(
                job = trigger.job.name(),
                interval_ms = trigger.poll_interval.as_millis() as u64,
                "Scheduled trigger started"
            );
            let mut interval = tokio::time::interval(trigger.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            while trigger.running.load(Ordering::Acquire) {
                tokio::select! {
                    _ = interval.tick() => trigger.tick().await,
                    _ = trigger.shutdown_notify.notified() => break,
                }
            }
            info!(job = trigger.job.name(), "Scheduled trigger stopped");
        })
    }

    /// Stop the periodic loop. The runner finishes committing any chunk in
    /// flight before its run ends.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.shutdown_notify.notify_waiters();
    }

    async fn tick(&self) {
        let job_name = self.job.name();
        match self.run_once().await {
            Ok(LockOutcome::Skipped) => {
                debug!(job = job_name, "Tick skipped, lock held elsewhere");
            }
            Ok(LockOutcome::Completed(Ok(summary))) => {
                info!(
                    job = job_name,
                    chunks = summary.chunks_processed,
                    items = summary.items_processed,
                    completed = summary.completed,
                    "Tick completed"
                );
            }
            Ok(LockOutcome::Completed(Err(e))) => {
                error!(
                    job = job_name,
                    error = %e,
                    "Tick failed; job stalls at last checkpoint until next tick"
                );
            }
            Err(e) => {
                error!(job = job_name, error = %e, "Lock operation failed");
            }
        }
    }
}
