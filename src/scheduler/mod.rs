//! # Resumable Job Scheduler
//!
//! The checkpointed job-execution framework every broker pipeline (source
//! record import, bibliographic ingest, search index synchronization) is
//! built on. Jobs produce one chunk of work at a time; the runner
//! dispatches each chunk to its registered processor inside a fresh unit of
//! work and commits the chunk's checkpoint in that same unit of work, so a
//! crash at any point resumes from the last committed checkpoint without
//! losing work.
//!
//! ## Components
//!
//! - [`Job`] / [`JobId`] — named, resumable chunk producers (`job`)
//! - [`Chunk`] / [`ChunkKind`] — immutable batches with opaque checkpoints
//!   (`chunk`)
//! - [`ChunkProcessor`] / [`ProcessorRegistry`] — typed, startup-validated
//!   dispatch (`processor`)
//! - [`CheckpointStore`] / [`UnitOfWork`] — atomic persistence of effects
//!   plus checkpoint (`checkpoint`)
//! - [`JobRunner`] — the read-fetch-process-commit loop (`runner`)
//! - [`JobLock`] / [`ScheduledTrigger`] — single-flight scheduling
//!   (`lock`, `trigger`)
//!
//! ## Delivery contract
//!
//! At-least-once: an error between processing and checkpoint commit rolls
//! both back, and the next run redelivers the chunk. Processors must be
//! idempotent. Exactly-once is explicitly not offered.

pub mod checkpoint;
pub mod chunk;
pub mod errors;
pub mod job;
pub mod lock;
pub mod processor;
pub mod runner;
pub mod trigger;

pub use checkpoint::{
    CheckpointRecord, CheckpointStore, MemoryCheckpointStore, PostgresCheckpointStore, UnitOfWork,
};
pub use chunk::{Chunk, ChunkKind};
pub use errors::{SchedulerError, SchedulerResult};
pub use job::{Job, JobId};
pub use lock::{with_lock, JobLock, LockGuard, LockOutcome, PgAdvisoryLock, ProcessLock};
pub use processor::{ChunkProcessor, ProcessorFactory, ProcessorRegistry};
pub use runner::{JobRunner, RunSummary};
pub use trigger::ScheduledTrigger;
