//! # Checkpoint Persistence
//!
//! Per-job persistence of the last successfully committed checkpoint value.
//! The store is the only resource the framework mutates directly: one record
//! per job identifier, overwritten in place after every committed chunk, and
//! kept forever — a terminal chunk ends a run, never a job.
//!
//! The checkpoint value is opaque JSON. The framework persists and returns
//! it; only the owning job interprets it.
//!
//! ## Units of work
//!
//! Chunk processing and checkpoint advancement must commit or roll back
//! together. The store therefore begins a [`UnitOfWork`] for each chunk; the
//! processor stages its business effects into it, the runner stages the
//! checkpoint write into it, and the runner commits both as one. Backends
//! that can share a transaction with domain effects (Postgres) get real
//! atomicity; backends that cannot must document the duplicate-delivery
//! window instead of hiding it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;

use super::errors::SchedulerResult;
use super::job::JobId;

pub use memory::MemoryCheckpointStore;
pub use postgres::PostgresCheckpointStore;

/// Persisted checkpoint row: job identifier (key) plus the opaque value.
/// Absent until the first successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: JobId,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// An open, independent transaction scope for exactly one chunk.
///
/// Begun fresh by the runner regardless of any enclosing transaction, so a
/// checkpoint read performed outside this scope can never be poisoned by it.
/// Processors must never commit it themselves; the runner owns the commit
/// after the checkpoint write has been staged.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Backend downcast hook. Domain processors that share the store's
    /// backend use this to stage effects into the same transaction, e.g.
    /// [`postgres::PgUnitOfWork::transaction`].
    fn as_any(&mut self) -> &mut dyn Any;

    /// Commit everything staged in this scope.
    async fn commit(self: Box<Self>) -> SchedulerResult<()>;

    /// Discard everything staged in this scope.
    async fn rollback(self: Box<Self>) -> SchedulerResult<()>;
}

/// Storage contract for per-job checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the last committed checkpoint, or `None` if the job has never
    /// committed one.
    async fn load(&self, job_id: JobId) -> SchedulerResult<Option<Value>>;

    /// Open a fresh unit of work for one chunk.
    async fn begin(&self) -> SchedulerResult<Box<dyn UnitOfWork>>;

    /// Stage the checkpoint write into the given unit of work. Takes effect
    /// only when the unit of work commits.
    async fn save(
        &self,
        uow: &mut dyn UnitOfWork,
        job_id: JobId,
        value: &Value,
    ) -> SchedulerResult<()>;
}
