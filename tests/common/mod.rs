//! Shared fixtures for scheduler integration tests: a deterministic
//! scripted job and a processor that records what it was given.

use async_trait::async_trait;
use libshare_core::scheduler::checkpoint::memory::MemoryUnitOfWork;
use libshare_core::scheduler::{Chunk, ChunkKind, ChunkProcessor, Job, JobId, UnitOfWork};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Minimal stand-in for a harvested host-LMS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
}

impl SourceRecord {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

/// Offset-style checkpoint, the shape most import jobs use.
pub fn offset(n: u64) -> Value {
    json!({ "offset": n })
}

/// Job with a fixed, deterministic chunk script. `start` returns the first
/// chunk; `resume(cp)` returns the chunk after the one whose checkpoint
/// equals `cp`, mirroring how a paging import resumes from a committed
/// offset.
pub struct ScriptedJob {
    name: String,
    chunks: Vec<Chunk<SourceRecord>>,
    start_calls: AtomicUsize,
    resume_calls: AtomicUsize,
}

impl ScriptedJob {
    pub fn new(name: &str, chunks: Vec<Chunk<SourceRecord>>) -> Self {
        Self {
            name: name.to_string(),
            chunks,
            start_calls: AtomicUsize::new(0),
            resume_calls: AtomicUsize::new(0),
        }
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Job<SourceRecord> for ScriptedJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> anyhow::Result<Chunk<SourceRecord>> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.chunks
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no chunks scripted"))
    }

    async fn resume(&self, checkpoint: Value) -> anyhow::Result<Chunk<SourceRecord>> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        let position = self
            .chunks
            .iter()
            .position(|chunk| chunk.checkpoint() == &checkpoint)
            .ok_or_else(|| anyhow::anyhow!("unknown checkpoint: {checkpoint}"))?;
        self.chunks
            .get(position + 1)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("resumed past the terminal chunk"))
    }
}

/// Job whose fetch always fails, simulating an unreachable host system.
pub struct UnreachableJob;

#[async_trait]
impl Job<SourceRecord> for UnreachableJob {
    fn name(&self) -> &str {
        "unreachable-host"
    }

    async fn start(&self) -> anyhow::Result<Chunk<SourceRecord>> {
        anyhow::bail!("host LMS unreachable")
    }

    async fn resume(&self, _checkpoint: Value) -> anyhow::Result<Chunk<SourceRecord>> {
        anyhow::bail!("host LMS unreachable")
    }
}

/// Processor recording every invocation immediately and staging "applied"
/// record ids into the in-memory unit of work, so tests can tell an
/// invocation (happens even when the chunk later rolls back) apart from a
/// committed effect.
pub struct RecordingProcessor {
    kinds: Vec<ChunkKind>,
    invocations: Arc<Mutex<Vec<(ChunkKind, Vec<String>)>>>,
    applied: Arc<Mutex<Vec<String>>>,
    fail_on_checkpoint: Option<Value>,
    shutdown: Mutex<Option<Arc<AtomicBool>>>,
}

impl RecordingProcessor {
    pub fn new(kinds: Vec<ChunkKind>) -> Self {
        Self {
            kinds,
            invocations: Arc::new(Mutex::new(Vec::new())),
            applied: Arc::new(Mutex::new(Vec::new())),
            fail_on_checkpoint: None,
            shutdown: Mutex::new(None),
        }
    }

    /// Fail the chunk whose checkpoint equals `checkpoint`.
    pub fn failing_on(mut self, checkpoint: Value) -> Self {
        self.fail_on_checkpoint = Some(checkpoint);
        self
    }

    /// Trip the given flag (normally the runner's shutdown handle) while
    /// processing, to exercise the finish-the-in-flight-commit rule. Armed
    /// after construction because the runner owns the flag.
    pub fn arm_shutdown(&self, flag: Arc<AtomicBool>) {
        *self.shutdown.lock() = Some(flag);
    }

    /// Chunks seen, in order, with their item ids.
    pub fn invocations(&self) -> Vec<(ChunkKind, Vec<String>)> {
        self.invocations.lock().clone()
    }

    /// Record ids whose effects actually committed.
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl ChunkProcessor<SourceRecord> for RecordingProcessor {
    fn applies_to(&self) -> &[ChunkKind] {
        &self.kinds
    }

    async fn process(
        &self,
        uow: &mut dyn UnitOfWork,
        chunk: Chunk<SourceRecord>,
    ) -> anyhow::Result<Chunk<SourceRecord>> {
        let ids: Vec<String> = chunk.data().iter().map(|r| r.id.clone()).collect();
        self.invocations.lock().push((chunk.kind().clone(), ids.clone()));

        if let Some(flag) = self.shutdown.lock().as_ref() {
            flag.store(true, Ordering::SeqCst);
        }

        if self.fail_on_checkpoint.as_ref() == Some(chunk.checkpoint()) {
            anyhow::bail!("scripted processing failure at {}", chunk.checkpoint());
        }

        let mem = uow
            .as_any()
            .downcast_mut::<MemoryUnitOfWork>()
            .expect("tests run against the in-memory store");
        let applied = Arc::clone(&self.applied);
        mem.stage(move || applied.lock().extend(ids));

        Ok(chunk)
    }
}

/// Two-chunk script for the canonical offset-10/offset-20 scenario.
pub fn two_chunk_script(job_id: JobId, kind: &ChunkKind) -> Vec<Chunk<SourceRecord>> {
    vec![
        Chunk::new(
            job_id,
            kind.clone(),
            offset(10),
            vec![SourceRecord::new("x1"), SourceRecord::new("x2")],
        ),
        Chunk::terminal(job_id, kind.clone(), offset(20), vec![SourceRecord::new("x3")]),
    ]
}
