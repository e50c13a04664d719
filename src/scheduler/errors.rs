//! # Scheduler Error Types
//!
//! Error taxonomy for the resumable job framework, using thiserror for
//! structured error types instead of `Box<dyn Error>` patterns.
//!
//! Every failure mode of the read-checkpoint → fetch → process → commit loop
//! has its own variant so the scheduling trigger can log precisely where a
//! run stopped. None of these are retried by the framework itself; the next
//! scheduled invocation resumes from the last committed checkpoint.

use thiserror::Error;

/// Errors surfaced by the job runner, processor registry and checkpoint store.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// `start`/`resume` failed to produce a chunk. The run aborts with no
    /// checkpoint change.
    #[error("Chunk fetch failed for job {job_name}: {message}")]
    ChunkFetch { job_name: String, message: String },

    /// No processor is registered for a chunk kind. Fatal configuration
    /// error, raised before any side effect is applied.
    #[error("No processor registered for chunk kind: {kind}")]
    ProcessorNotFound { kind: String },

    /// More than one processor claims the same chunk kind. Rejected at
    /// registration time so the misconfiguration never reaches a run.
    #[error("Ambiguous processor registration for chunk kind {kind}: {matches} bindings match")]
    AmbiguousProcessor { kind: String, matches: usize },

    /// A processor failed on a chunk. The chunk's unit of work rolls back and
    /// the checkpoint does not advance.
    #[error("Processing failed for job {job_name}, chunk kind {kind}: {message}")]
    Processing {
        job_name: String,
        kind: String,
        message: String,
    },

    /// Reading the last committed checkpoint failed.
    #[error("Checkpoint load failed for job {job_id}: {message}")]
    CheckpointLoad { job_id: String, message: String },

    /// Writing or committing the checkpoint failed after successful
    /// processing. Treated exactly like a processing failure: no forward
    /// progress is recorded and the chunk will be redelivered.
    #[error("Checkpoint persist failed for job {job_id}: {message}")]
    CheckpointPersist { job_id: String, message: String },

    /// A job produced a chunk stamped with a different job identifier.
    #[error("Job {job_id} produced a chunk owned by {chunk_job_id}")]
    JobIdMismatch { job_id: String, chunk_job_id: String },

    /// Acquiring or releasing a single-flight lock failed. Distinct from the
    /// lock being held elsewhere, which is a silent skip, not an error.
    #[error("Lock operation failed for {name}: {message}")]
    Lock { name: String, message: String },

    /// Framework wiring error, e.g. a unit of work handed to a store backend
    /// it does not belong to.
    #[error("Scheduler configuration error: {message}")]
    Configuration { message: String },
}

impl SchedulerError {
    /// Create a chunk fetch error
    pub fn chunk_fetch(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ChunkFetch {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a processing error
    pub fn processing(
        job_name: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Processing {
            job_name: job_name.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a checkpoint load error
    pub fn checkpoint_load(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckpointLoad {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a checkpoint persist error
    pub fn checkpoint_persist(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckpointPersist {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a lock error
    pub fn lock(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lock {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error points at wiring rather than a transient fault.
    /// Triggers use this to escalate instead of waiting for the next tick.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ProcessorNotFound { .. }
                | Self::AmbiguousProcessor { .. }
                | Self::Configuration { .. }
        )
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
