//! # Single-Flight Job Locks
//!
//! The runner assumes at most one active run per job identifier but does
//! not enforce it. Scheduling triggers wrap each invocation in a named lock
//! acquired here: if another node (or a still-running prior invocation)
//! holds it, the trigger skips silently — a skip is normal operation, not
//! an error.
//!
//! Two implementations: a PostgreSQL advisory lock for multi-node
//! deployments, and a process-local lock for tests and single-node use.

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{SchedulerError, SchedulerResult};
use super::job::JOB_ID_NAMESPACE;

/// Held lock. Must be released explicitly; [`with_lock`] does this for you.
#[async_trait]
pub trait LockGuard: Send {
    async fn release(self: Box<Self>) -> SchedulerResult<()>;
}

/// Acquire-or-skip mutual exclusion keyed by job name.
#[async_trait]
pub trait JobLock: Send + Sync {
    /// Try to take the named lock. `None` means it is held elsewhere and
    /// the caller should skip this invocation.
    async fn try_acquire(&self, name: &str) -> SchedulerResult<Option<Box<dyn LockGuard>>>;
}

/// Result of running a body under [`with_lock`].
#[derive(Debug)]
pub enum LockOutcome<R> {
    /// The lock was acquired; the body ran to completion.
    Completed(R),
    /// The lock was held elsewhere; the body never ran.
    Skipped,
}

impl<R> LockOutcome<R> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, LockOutcome::Skipped)
    }
}

/// Run `body` only if the named lock can be acquired, releasing it after.
pub async fn with_lock<R, F>(
    lock: &dyn JobLock,
    name: &str,
    body: F,
) -> SchedulerResult<LockOutcome<R>>
where
    F: std::future::Future<Output = R> + Send,
{
    match lock.try_acquire(name).await? {
        None => {
            debug!(lock = name, "Lock held elsewhere, skipping");
            Ok(LockOutcome::Skipped)
        }
        Some(guard) => {
            let result = body.await;
            guard.release().await?;
            Ok(LockOutcome::Completed(result))
        }
    }
}

/// Process-local lock: a shared set of held names.
#[derive(Clone, Default)]
pub struct ProcessLock {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ProcessLock {
    pub fn new() -> Self {
        Self::default()
    }
}

struct ProcessLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    name: String,
    released: bool,
}

#[async_trait]
impl LockGuard for ProcessLockGuard {
    async fn release(mut self: Box<Self>) -> SchedulerResult<()> {
        self.held.lock().remove(&self.name);
        self.released = true;
        Ok(())
    }
}

impl Drop for ProcessLockGuard {
    fn drop(&mut self) {
        // Dropped without release (body panicked): free the name so the
        // next tick is not wedged forever.
        if !self.released {
            self.held.lock().remove(&self.name);
        }
    }
}

#[async_trait]
impl JobLock for ProcessLock {
    async fn try_acquire(&self, name: &str) -> SchedulerResult<Option<Box<dyn LockGuard>>> {
        let acquired = self.held.lock().insert(name.to_string());
        if !acquired {
            return Ok(None);
        }
        Ok(Some(Box::new(ProcessLockGuard {
            held: Arc::clone(&self.held),
            name: name.to_string(),
            released: false,
        })))
    }
}

/// Advisory-lock key for a name: the first eight bytes of the name's
/// derived UUID, as a signed 64-bit integer. Stable across nodes.
fn advisory_key(name: &str) -> i64 {
    let uuid = Uuid::new_v5(&JOB_ID_NAMESPACE, name.as_bytes());
    let bytes = uuid.as_bytes();
    i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Distributed lock using `pg_try_advisory_lock`.
///
/// Session-scoped: the guard pins one pool connection for the duration of
/// the run and unlocks on that same connection before returning it.
#[derive(Clone)]
pub struct PgAdvisoryLock {
    pool: PgPool,
}

impl PgAdvisoryLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PgAdvisoryLockGuard {
    conn: PoolConnection<Postgres>,
    key: i64,
    name: String,
    released: bool,
}

#[async_trait]
impl LockGuard for PgAdvisoryLockGuard {
    async fn release(mut self: Box<Self>) -> SchedulerResult<()> {
        sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| SchedulerError::lock(&self.name, e.to_string()))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for PgAdvisoryLockGuard {
    fn drop(&mut self) {
        if !self.released {
            // The connection returns to the pool still holding the session
            // lock. Surface it loudly; the lock clears when the session
            // ends.
            warn!(
                lock = %self.name,
                "Advisory lock guard dropped without release"
            );
        }
    }
}

#[async_trait]
impl JobLock for PgAdvisoryLock {
    async fn try_acquire(&self, name: &str) -> SchedulerResult<Option<Box<dyn LockGuard>>> {
        let key = advisory_key(name);
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| SchedulerError::lock(name, e.to_string()))?;

        let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| SchedulerError::lock(name, e.to_string()))?;

        if !acquired {
            return Ok(None);
        }

        debug!(lock = name, key, "Advisory lock acquired");
        Ok(Some(Box::new(PgAdvisoryLockGuard {
            conn,
            key,
            name: name.to_string(),
            released: false,
        })))
    }
}
