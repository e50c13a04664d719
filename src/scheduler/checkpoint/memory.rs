//! In-process checkpoint store.
//!
//! Backs single-node deployments without a database and the deterministic
//! crash/restart tests. Its unit of work stages both domain effects (as
//! closures) and the checkpoint write, applying them together on commit, so
//! it honors the same atomicity contract as the Postgres store.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{CheckpointStore, UnitOfWork};
use crate::scheduler::errors::{SchedulerError, SchedulerResult};
use crate::scheduler::job::JobId;

type Effect = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Shared {
    records: RwLock<HashMap<JobId, Value>>,
    /// When set, the next unit-of-work commit fails and clears the flag.
    /// Lets tests exercise the crash-between-process-and-commit window.
    fail_next_commit: AtomicBool,
}

/// Checkpoint store holding everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    shared: Arc<Shared>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the committed checkpoint for a job, bypassing the store
    /// contract. Test and diagnostics helper.
    pub fn committed(&self, job_id: JobId) -> Option<Value> {
        self.shared.records.read().get(&job_id).cloned()
    }

    /// Make the next unit-of-work commit fail with a persist error,
    /// discarding everything staged in it. Simulates a crash after
    /// processing but before the checkpoint commit.
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

/// Unit of work over the in-memory store: staged effects and checkpoint
/// writes are applied only on commit, in staging order.
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    effects: Mutex<Vec<Effect>>,
    staged_checkpoint: Option<(JobId, Value)>,
}

impl MemoryUnitOfWork {
    /// Stage a domain effect to run when this unit of work commits. This is
    /// how in-memory processors join the chunk's transaction scope.
    pub fn stage(&self, effect: impl FnOnce() + Send + 'static) {
        self.effects.lock().push(Box::new(effect));
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn as_any(&mut self) -> &mut dyn Any {
        self
    }

    async fn commit(self: Box<Self>) -> SchedulerResult<()> {
        let MemoryUnitOfWork {
            shared,
            effects,
            staged_checkpoint,
        } = *self;

        if shared.fail_next_commit.swap(false, Ordering::SeqCst) {
            let job_id = staged_checkpoint
                .as_ref()
                .map(|(id, _)| id.to_string())
                .unwrap_or_else(|| "<none>".to_string());
            return Err(SchedulerError::checkpoint_persist(
                job_id,
                "simulated commit failure",
            ));
        }

        for effect in effects.into_inner() {
            effect();
        }
        if let Some((job_id, value)) = staged_checkpoint {
            shared.records.write().insert(job_id, value);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> SchedulerResult<()> {
        debug!(
            staged_effects = self.effects.lock().len(),
            "Rolling back in-memory unit of work"
        );
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, job_id: JobId) -> SchedulerResult<Option<Value>> {
        Ok(self.shared.records.read().get(&job_id).cloned())
    }

    async fn begin(&self) -> SchedulerResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            effects: Mutex::new(Vec::new()),
            staged_checkpoint: None,
        }))
    }

    async fn save(
        &self,
        uow: &mut dyn UnitOfWork,
        job_id: JobId,
        value: &Value,
    ) -> SchedulerResult<()> {
        let uow = uow
            .as_any()
            .downcast_mut::<MemoryUnitOfWork>()
            .ok_or_else(|| {
                SchedulerError::configuration(
                    "unit of work does not belong to MemoryCheckpointStore",
                )
            })?;
        uow.staged_checkpoint = Some((job_id, value.clone()));
        Ok(())
    }
}
