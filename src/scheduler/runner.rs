//! # Job Runner
//!
//! Orchestrates one run of one job: read the last committed checkpoint,
//! fetch a chunk (`start` on first run, `resume` after), dispatch it to the
//! registered processor inside a fresh unit of work, stage the chunk's
//! checkpoint into that same unit of work, commit, and loop until a terminal
//! chunk, an error, or a shutdown request.
//!
//! Guarantees:
//! - strictly one chunk in flight per job; no fetch-ahead, no pipelining;
//! - processing effects and checkpoint advancement commit or roll back
//!   together;
//! - any error aborts the run with no checkpoint change, so the next
//!   scheduled invocation redelivers from the last committed checkpoint
//!   (at-least-once, processors must tolerate redelivery);
//! - a shutdown request is honored only between chunks — the chunk in
//!   flight always completes its commit.
//!
//! The runner enforces no cross-process exclusion; the scheduling trigger
//! wraps each invocation in a single-flight lock (see `lock`).

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::checkpoint::CheckpointStore;
use super::errors::{SchedulerError, SchedulerResult};
use super::job::{Job, JobId};
use super::processor::ProcessorRegistry;

/// Outcome of one completed (or interrupted) run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub job_id: JobId,
    pub chunks_processed: usize,
    pub items_processed: usize,
    /// True when the run ended on a terminal chunk.
    pub completed: bool,
    /// True when the run stopped early on a shutdown request.
    pub interrupted: bool,
    pub final_checkpoint: Option<Value>,
}

/// Executes the read-checkpoint → fetch → process → commit loop for jobs
/// producing chunks of item type `T`.
pub struct JobRunner<T> {
    store: Arc<dyn CheckpointStore>,
    registry: Arc<ProcessorRegistry<T>>,
    shutdown: Arc<AtomicBool>,
}

impl<T: Send + 'static> JobRunner<T> {
    pub fn new(store: Arc<dyn CheckpointStore>, registry: Arc<ProcessorRegistry<T>>) -> Self {
        Self {
            store,
            registry,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for requesting a cooperative stop. Observed between chunks
    /// only; the in-flight chunk always finishes committing.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn registry(&self) -> &ProcessorRegistry<T> {
        &self.registry
    }

    /// Run the job until its chunk sequence is exhausted for now.
    ///
    /// Errors propagate to the caller (normally the scheduling trigger,
    /// which logs and waits for the next tick); the checkpoint is left at
    /// the last successful commit.
    #[instrument(skip_all, fields(job = job.name()))]
    pub async fn run(&self, job: &dyn Job<T>) -> SchedulerResult<RunSummary> {
        let job_id = job.id();
        let mut checkpoint = self.store.load(job_id).await?;
        let mut summary = RunSummary {
            job_id,
            chunks_processed: 0,
            items_processed: 0,
            completed: false,
            interrupted: false,
            final_checkpoint: checkpoint.clone(),
        };

        debug!(
            job_id = %job_id,
            has_checkpoint = checkpoint.is_some(),
            "Starting job run"
        );

        loop {
            let chunk = match checkpoint.clone() {
                None => job.start().await,
                Some(value) => job.resume(value).await,
            }
            .map_err(|e| SchedulerError::chunk_fetch(job.name(), e.to_string()))?;

            if chunk.job_id() != job_id {
                return Err(SchedulerError::JobIdMismatch {
                    job_id: job_id.to_string(),
                    chunk_job_id: chunk.job_id().to_string(),
                });
            }

            // Resolve before opening the unit of work so an unregistered
            // kind fails with zero side effects.
            let kind = chunk.kind().clone();
            let processor = self.registry.resolve(&kind)?;

            let next_checkpoint = chunk.checkpoint().clone();
            let last_chunk = chunk.is_last();
            let chunk_size = chunk.size();

            let mut uow = self.store.begin().await?;
            let processed = match processor.process(uow.as_mut(), chunk).await {
                Ok(processed) => processed,
                Err(e) => {
                    if let Err(rollback_err) = uow.rollback().await {
                        warn!(error = %rollback_err, "Rollback after processing failure also failed");
                    }
                    return Err(SchedulerError::processing(
                        job.name(),
                        kind.as_str(),
                        e.to_string(),
                    ));
                }
            };

            if let Err(e) = self
                .store
                .save(uow.as_mut(), job_id, &next_checkpoint)
                .await
            {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after checkpoint stage failure also failed");
                }
                return Err(e);
            }

            // Processing effects and the checkpoint advance commit as one.
            uow.commit().await?;

            summary.chunks_processed += 1;
            summary.items_processed += processed.size();
            summary.final_checkpoint = Some(next_checkpoint.clone());
            checkpoint = Some(next_checkpoint);

            debug!(
                job_id = %job_id,
                kind = %kind,
                items = chunk_size,
                last_chunk,
                "Chunk committed"
            );

            if last_chunk {
                summary.completed = true;
                break;
            }

            if self.shutdown.load(Ordering::Acquire) {
                summary.interrupted = true;
                info!(job_id = %job_id, "Shutdown requested, stopping after committed chunk");
                break;
            }
        }

        info!(
            job_id = %job_id,
            chunks = summary.chunks_processed,
            items = summary.items_processed,
            completed = summary.completed,
            interrupted = summary.interrupted,
            "Job run finished"
        );
        Ok(summary)
    }

    /// Run and log instead of propagating. Convenience for triggers that
    /// treat every failure as "stall until the next tick".
    pub async fn run_logged(&self, job: &dyn Job<T>) -> Option<RunSummary> {
        match self.run(job).await {
            Ok(summary) => Some(summary),
            Err(e) if e.is_configuration_error() => {
                error!(job = job.name(), error = %e, "Job run failed on configuration; will not self-heal");
                None
            }
            Err(e) => {
                error!(job = job.name(), error = %e, "Job run failed; resuming from last checkpoint on next tick");
                None
            }
        }
    }
}
