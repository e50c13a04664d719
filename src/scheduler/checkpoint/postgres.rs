//! PostgreSQL checkpoint store.
//!
//! One row per job identifier in `libshare_job_checkpoints`, with the opaque
//! checkpoint held as JSONB and overwritten in place on every commit. The
//! unit of work wraps a single sqlx transaction; domain processors that
//! write to the same database downcast to [`PgUnitOfWork`] and stage their
//! effects in that transaction, which gives processing and checkpoint
//! advancement genuine all-or-nothing semantics.
//!
//! Processors that write to systems outside this database fall outside that
//! guarantee: a crash between their external effect and the transaction
//! commit redelivers the chunk. That window is inherent to the at-least-once
//! contract and must be absorbed by idempotent processing.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::any::Any;
use tracing::{debug, info};

use super::{CheckpointRecord, CheckpointStore, UnitOfWork};
use crate::scheduler::errors::{SchedulerError, SchedulerResult};
use crate::scheduler::job::JobId;

const ENSURE_SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS libshare_job_checkpoints (
    id UUID PRIMARY KEY,
    value JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const UPSERT_SQL: &str = r"
INSERT INTO libshare_job_checkpoints (id, value, updated_at)
VALUES ($1, $2, NOW())
ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()";

const LOAD_SQL: &str = "SELECT value FROM libshare_job_checkpoints WHERE id = $1";

const LOAD_RECORD_SQL: &str =
    "SELECT value, updated_at FROM libshare_job_checkpoints WHERE id = $1";

/// Checkpoint store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PostgresCheckpointStore {
    pool: PgPool,
}

impl PostgresCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a dedicated pool and ensure the checkpoint table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> SchedulerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                SchedulerError::configuration(format!("checkpoint store connect failed: {e}"))
            })?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the checkpoint table if it does not exist. Idempotent.
    pub async fn ensure_schema(&self) -> SchedulerResult<()> {
        sqlx::query(ENSURE_SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                SchedulerError::configuration(format!("checkpoint schema bootstrap failed: {e}"))
            })?;
        info!("Checkpoint schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Full checkpoint row including its commit timestamp, for operational
    /// inspection of a stalled job.
    pub async fn load_record(&self, job_id: JobId) -> SchedulerResult<Option<CheckpointRecord>> {
        let row = sqlx::query(LOAD_RECORD_SQL)
            .bind(job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SchedulerError::checkpoint_load(job_id.to_string(), e.to_string()))?;

        Ok(row.map(|r| CheckpointRecord {
            id: job_id,
            value: r.get("value"),
            updated_at: r.get("updated_at"),
        }))
    }
}

/// Unit of work wrapping one sqlx Postgres transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    /// The underlying transaction, for processors staging domain writes into
    /// the same commit scope as the checkpoint.
    pub fn transaction(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.tx
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn as_any(&mut self) -> &mut dyn Any {
        self
    }

    async fn commit(self: Box<Self>) -> SchedulerResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| SchedulerError::checkpoint_persist("<tx>", e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> SchedulerResult<()> {
        debug!("Rolling back checkpoint transaction");
        self.tx
            .rollback()
            .await
            .map_err(|e| SchedulerError::checkpoint_persist("<tx>", e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn load(&self, job_id: JobId) -> SchedulerResult<Option<Value>> {
        let row = sqlx::query(LOAD_SQL)
            .bind(job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SchedulerError::checkpoint_load(job_id.to_string(), e.to_string()))?;

        Ok(row.map(|r| r.get::<Value, _>("value")))
    }

    async fn begin(&self) -> SchedulerResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(|e| {
            SchedulerError::checkpoint_persist("<begin>", e.to_string())
        })?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn save(
        &self,
        uow: &mut dyn UnitOfWork,
        job_id: JobId,
        value: &Value,
    ) -> SchedulerResult<()> {
        let uow = uow.as_any().downcast_mut::<PgUnitOfWork>().ok_or_else(|| {
            SchedulerError::configuration(
                "unit of work does not belong to PostgresCheckpointStore",
            )
        })?;

        sqlx::query(UPSERT_SQL)
            .bind(job_id.as_uuid())
            .bind(value)
            .execute(&mut *uow.tx)
            .await
            .map_err(|e| SchedulerError::checkpoint_persist(job_id.to_string(), e.to_string()))?;

        debug!(job_id = %job_id, "Checkpoint staged in transaction");
        Ok(())
    }
}
