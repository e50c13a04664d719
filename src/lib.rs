#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Libshare Core
//!
//! Resumable job-execution and checkpoint core for a consortial library
//! resource-sharing broker. Ingest and synchronization pipelines (source
//! record import from Sierra/Polaris/Alma/FOLIO hosts, bibliographic
//! ingest, search index sync) are long-running and incremental; this crate
//! provides the framework that lets them survive process restarts without
//! losing work or duplicating it indefinitely.
//!
//! ## Architecture
//!
//! - [`scheduler`] — jobs, chunks, processors, the checkpointed runner
//!   loop, single-flight locks and scheduled triggers
//! - [`config`] — file + environment configuration with explicit validation
//! - [`logging`] — structured tracing initialization
//! - [`error`] — crate-level error facade
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use libshare_core::scheduler::{
//!     Chunk, ChunkKind, ChunkProcessor, Job, JobRunner, MemoryCheckpointStore,
//!     ProcessorRegistry, UnitOfWork,
//! };
//!
//! struct CatalogImport;
//!
//! #[async_trait]
//! impl Job<String> for CatalogImport {
//!     fn name(&self) -> &str {
//!         "catalog-import"
//!     }
//!
//!     async fn start(&self) -> anyhow::Result<Chunk<String>> {
//!         Ok(Chunk::terminal(
//!             self.id(),
//!             "source-record".into(),
//!             json!({"offset": 2}),
//!             vec!["rec-1".to_string(), "rec-2".to_string()],
//!         ))
//!     }
//!
//!     async fn resume(&self, checkpoint: Value) -> anyhow::Result<Chunk<String>> {
//!         Ok(Chunk::terminal(self.id(), "source-record".into(), checkpoint, vec![]))
//!     }
//! }
//!
//! struct SourceRecordProcessor {
//!     kinds: Vec<ChunkKind>,
//! }
//!
//! #[async_trait]
//! impl ChunkProcessor<String> for SourceRecordProcessor {
//!     fn applies_to(&self) -> &[ChunkKind] {
//!         &self.kinds
//!     }
//!
//!     async fn process(
//!         &self,
//!         _uow: &mut dyn UnitOfWork,
//!         chunk: Chunk<String>,
//!     ) -> anyhow::Result<Chunk<String>> {
//!         // Apply business effects to chunk.data() here.
//!         Ok(chunk)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(
//!     ProcessorRegistry::builder()
//!         .register(Arc::new(SourceRecordProcessor {
//!             kinds: vec!["source-record".into()],
//!         }))
//!         .build()
//!         .unwrap(),
//! );
//! let store = Arc::new(MemoryCheckpointStore::new());
//! let runner = JobRunner::new(store.clone(), registry);
//!
//! let summary = runner.run(&CatalogImport).await.unwrap();
//! assert!(summary.completed);
//! assert_eq!(summary.items_processed, 2);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;

pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use logging::init_structured_logging;
pub use scheduler::{
    Chunk, ChunkKind, ChunkProcessor, CheckpointStore, Job, JobId, JobLock, JobRunner,
    LockOutcome, MemoryCheckpointStore, PgAdvisoryLock, PostgresCheckpointStore, ProcessLock,
    ProcessorRegistry, RunSummary, ScheduledTrigger, SchedulerError, SchedulerResult, UnitOfWork,
};
