//! # Chunk Model
//!
//! A chunk is one immutable batch of domain items plus the opaque checkpoint
//! marking progress up to and including that batch. Chunks carry a kind tag
//! that the processor registry dispatches on, replacing runtime reflection
//! with an explicit, startup-validated mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::job::JobId;

/// Type tag identifying the concrete kind of a chunk, used for processor
/// resolution. Kinds are plain strings so domain crates can mint them
/// without the framework knowing their item types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkKind(String);

impl ChunkKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkKind {
    fn from(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

/// One batch of work produced by a job.
///
/// Invariants:
/// - `job_id` equals the producing job's identifier (the runner enforces
///   this and aborts the run on a mismatch).
/// - `data` may be empty while `last_chunk` is false, meaning "nothing
///   ready yet, not finished" — the runner still commits the checkpoint and
///   keeps polling.
/// - the checkpoint must represent strictly more progress than the
///   checkpoint the chunk was produced from.
///
/// Fields are private; a chunk cannot be mutated once produced.
#[derive(Debug, Clone)]
pub struct Chunk<T> {
    job_id: JobId,
    kind: ChunkKind,
    checkpoint: Value,
    data: Vec<T>,
    last_chunk: bool,
}

impl<T> Chunk<T> {
    /// Build a non-terminal chunk: more work follows after this one.
    pub fn new(job_id: JobId, kind: ChunkKind, checkpoint: Value, data: Vec<T>) -> Self {
        Self {
            job_id,
            kind,
            checkpoint,
            data,
            last_chunk: false,
        }
    }

    /// Build a terminal chunk: this run has caught up with available work.
    /// The job itself is not finished — the next scheduled run resumes from
    /// this chunk's checkpoint.
    pub fn terminal(job_id: JobId, kind: ChunkKind, checkpoint: Value, data: Vec<T>) -> Self {
        Self {
            job_id,
            kind,
            checkpoint,
            data,
            last_chunk: true,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }

    /// Opaque resumption token. Never interpreted by the framework.
    pub fn checkpoint(&self) -> &Value {
        &self.checkpoint
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn is_last(&self) -> bool {
        self.last_chunk
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the chunk, yielding its items in order.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}
