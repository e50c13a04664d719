//! # Job Contract
//!
//! A job is a named, resumable producer of chunks. Pagination is driven by
//! the runner calling `resume` repeatedly; a job returns exactly one chunk
//! per call and never streams.
//!
//! Job identity is derived deterministically from the stable job name, so a
//! restarted process finds the same checkpoint row. Renaming a job orphans
//! its checkpoint by design.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::chunk::Chunk;

/// Namespace for deriving job identifiers from job names (UUID v5).
/// Frozen for the life of the deployment: changing it orphans every
/// checkpoint in the store.
pub const JOB_ID_NAMESPACE: Uuid = Uuid::from_u128(0x9d1b_42f7_6a0e_4c5d_8b3a_51e2_7f90_c4d6);

/// Stable identifier for a job instance, used as the checkpoint key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Derive the identifier for a job name. Deterministic: the same name
    /// always yields the same identifier, across processes and restarts.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&JOB_ID_NAMESPACE, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A resumable unit of recurring work producing an ordered sequence of
/// chunks.
///
/// `start` is called when no checkpoint has ever been committed for this
/// job; `resume` is called with the last committed checkpoint otherwise.
/// Both must return exactly one chunk. A failure to produce a chunk (for
/// example an unreachable host LMS) propagates as an error and aborts the
/// current run with no checkpoint change.
///
/// The checkpoint value is opaque to the framework: only the job that wrote
/// it interprets it, and each chunk's checkpoint must represent strictly
/// more progress than the one that produced it.
#[async_trait]
pub trait Job<T>: Send + Sync {
    /// Stable, unique job name. Must not change across restarts.
    fn name(&self) -> &str;

    /// Derived identifier used as the checkpoint key.
    fn id(&self) -> JobId {
        JobId::from_name(self.name())
    }

    /// Produce the first chunk of a never-before-run job.
    async fn start(&self) -> anyhow::Result<Chunk<T>>;

    /// Produce the next chunk after the given committed checkpoint.
    async fn resume(&self, checkpoint: Value) -> anyhow::Result<Chunk<T>>;
}
