//! # Chunk Processors and the Processor Registry
//!
//! A processor is domain logic bound to one or more chunk kinds: it applies
//! the business effect of a chunk's items inside the unit of work the runner
//! supplies, and never commits that unit of work itself.
//!
//! ## Registry
//!
//! Dispatch replaces runtime reflection with an explicit registry built at
//! startup: each binding declares the kinds it handles, the builder rejects
//! a kind claimed by two bindings, and `validate` lets the boot path prove
//! every expected kind resolves before any job runs. Long-lived singleton
//! processors are resolved once and cached; factory bindings are re-invoked
//! on every resolution so per-call processors stay per-call.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::checkpoint::UnitOfWork;
use super::chunk::{Chunk, ChunkKind};
use super::errors::{SchedulerError, SchedulerResult};

/// Domain handler for one or more chunk kinds.
///
/// `process` receives the chunk and the open unit of work for it. All
/// staged effects commit together with the checkpoint, or roll back
/// together on failure. Returning the chunk (or an equivalent) confirms
/// processing for logging; it is not a retry signal.
///
/// Chunks are redelivered after a crash between processing and checkpoint
/// commit, so effects must be idempotent. Processors wanting
/// partial-success semantics must capture per-item failures internally
/// rather than letting them propagate, because a propagated error fails the
/// whole chunk.
#[async_trait]
pub trait ChunkProcessor<T>: Send + Sync {
    /// The chunk kinds this processor handles.
    fn applies_to(&self) -> &[ChunkKind];

    /// Apply the business effect of one chunk.
    async fn process(
        &self,
        uow: &mut dyn UnitOfWork,
        chunk: Chunk<T>,
    ) -> anyhow::Result<Chunk<T>>;
}

impl<T> std::fmt::Debug for dyn ChunkProcessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkProcessor")
            .field("applies_to", &self.applies_to())
            .finish()
    }
}

/// Constructor for per-call processors. Invoked on every resolution.
pub type ProcessorFactory<T> = Box<dyn Fn() -> Arc<dyn ChunkProcessor<T>> + Send + Sync>;

enum Binding<T> {
    /// One long-lived instance, shared across runs, cacheable.
    Singleton(Arc<dyn ChunkProcessor<T>>),
    /// Fresh instance per resolution; declared kinds are explicit because
    /// the instance does not exist until resolution time.
    Factory {
        kinds: Vec<ChunkKind>,
        make: ProcessorFactory<T>,
    },
}

impl<T> Binding<T> {
    fn kinds(&self) -> Vec<ChunkKind> {
        match self {
            Binding::Singleton(processor) => processor.applies_to().to_vec(),
            Binding::Factory { kinds, .. } => kinds.clone(),
        }
    }
}

/// Startup-validated mapping from chunk kind to processor.
pub struct ProcessorRegistry<T> {
    bindings: Vec<Binding<T>>,
    /// Resolution cache, singletons only.
    cache: RwLock<HashMap<ChunkKind, Arc<dyn ChunkProcessor<T>>>>,
}

impl<T> std::fmt::Debug for ProcessorRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("kinds", &self.registered_kinds())
            .finish()
    }
}

impl<T> ProcessorRegistry<T> {
    pub fn builder() -> ProcessorRegistryBuilder<T> {
        ProcessorRegistryBuilder {
            bindings: Vec::new(),
        }
    }

    /// Find the single processor bound to a kind.
    ///
    /// Singleton resolutions are cached after the first hit; factory
    /// bindings construct a fresh processor every call. Zero matches is a
    /// fatal configuration error.
    pub fn resolve(&self, kind: &ChunkKind) -> SchedulerResult<Arc<dyn ChunkProcessor<T>>> {
        if let Some(cached) = self.cache.read().get(kind) {
            return Ok(Arc::clone(cached));
        }

        let mut matches = self
            .bindings
            .iter()
            .filter(|binding| binding.kinds().contains(kind));

        let binding = matches.next().ok_or_else(|| SchedulerError::ProcessorNotFound {
            kind: kind.to_string(),
        })?;

        // The builder rejects duplicates, so a second match here means the
        // registry was assembled by hand; fail the same way.
        let extra = matches.count();
        if extra > 0 {
            return Err(SchedulerError::AmbiguousProcessor {
                kind: kind.to_string(),
                matches: extra + 1,
            });
        }

        match binding {
            Binding::Singleton(processor) => {
                let processor = Arc::clone(processor);
                self.cache
                    .write()
                    .insert(kind.clone(), Arc::clone(&processor));
                debug!(kind = %kind, "Cached singleton processor resolution");
                Ok(processor)
            }
            Binding::Factory { make, .. } => Ok(make()),
        }
    }

    /// Prove every expected kind resolves to exactly one processor. Run at
    /// boot so missing bindings fail before any job is scheduled.
    pub fn validate(&self, expected: &[ChunkKind]) -> SchedulerResult<()> {
        for kind in expected {
            self.resolve(kind)?;
        }
        info!(kinds = expected.len(), "Processor registry validated");
        Ok(())
    }

    /// All kinds with a binding, in registration order.
    pub fn registered_kinds(&self) -> Vec<ChunkKind> {
        self.bindings
            .iter()
            .flat_map(|binding| binding.kinds())
            .collect()
    }
}

/// Builder collecting bindings before the registry is sealed.
pub struct ProcessorRegistryBuilder<T> {
    bindings: Vec<Binding<T>>,
}

impl<T> ProcessorRegistryBuilder<T> {
    /// Bind a long-lived singleton processor to the kinds it declares.
    pub fn register(mut self, processor: Arc<dyn ChunkProcessor<T>>) -> Self {
        self.bindings.push(Binding::Singleton(processor));
        self
    }

    /// Bind a per-call processor factory to an explicit kind set.
    pub fn register_factory(
        mut self,
        kinds: Vec<ChunkKind>,
        make: ProcessorFactory<T>,
    ) -> Self {
        self.bindings.push(Binding::Factory { kinds, make });
        self
    }

    /// Seal the registry, rejecting any kind claimed by more than one
    /// binding.
    pub fn build(self) -> SchedulerResult<ProcessorRegistry<T>> {
        let mut seen: HashMap<ChunkKind, usize> = HashMap::new();
        for binding in &self.bindings {
            for kind in binding.kinds() {
                *seen.entry(kind).or_insert(0) += 1;
            }
        }
        if let Some((kind, count)) = seen.into_iter().find(|(_, count)| *count > 1) {
            return Err(SchedulerError::AmbiguousProcessor {
                kind: kind.to_string(),
                matches: count,
            });
        }

        info!(bindings = self.bindings.len(), "Processor registry built");
        Ok(ProcessorRegistry {
            bindings: self.bindings,
            cache: RwLock::new(HashMap::new()),
        })
    }
}
