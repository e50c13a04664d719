//! Integration tests for the resumable job runner: checkpoint resumption,
//! at-least-once redelivery, dispatch, termination and rollback behavior,
//! all driven by deterministic scripted jobs over the in-memory store.

mod common;

use common::{offset, RecordingProcessor, ScriptedJob, SourceRecord, UnreachableJob};
use libshare_core::scheduler::{
    Chunk, ChunkKind, JobId, JobRunner, MemoryCheckpointStore, ProcessorRegistry, SchedulerError,
};
use serde_json::Value;
use std::sync::Arc;

fn harness(
    kinds: &[&str],
) -> (
    Arc<MemoryCheckpointStore>,
    Arc<RecordingProcessor>,
    JobRunner<SourceRecord>,
) {
    let processor = Arc::new(RecordingProcessor::new(
        kinds.iter().map(|k| ChunkKind::from(*k)).collect(),
    ));
    let registry = Arc::new(
        ProcessorRegistry::builder()
            .register(processor.clone())
            .build()
            .unwrap(),
    );
    let store = Arc::new(MemoryCheckpointStore::new());
    let runner = JobRunner::new(store.clone(), registry);
    (store, processor, runner)
}

async fn seed_checkpoint(store: &MemoryCheckpointStore, job_id: JobId, value: Value) {
    use libshare_core::scheduler::CheckpointStore;
    let mut uow = store.begin().await.unwrap();
    store.save(uow.as_mut(), job_id, &value).await.unwrap();
    uow.commit().await.unwrap();
}

#[tokio::test]
async fn canonical_two_chunk_trace() {
    let (store, processor, runner) = harness(&["source-record"]);
    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("job-a");
    let job = ScriptedJob::new("job-a", common::two_chunk_script(job_id, &kind));

    let summary = runner.run(&job).await.unwrap();

    assert!(summary.completed);
    assert!(!summary.interrupted);
    assert_eq!(summary.chunks_processed, 2);
    assert_eq!(summary.items_processed, 3);
    assert_eq!(summary.final_checkpoint, Some(offset(20)));
    assert_eq!(store.committed(job_id), Some(offset(20)));

    // Exactly two processor invocations, in order.
    assert_eq!(
        processor.invocations(),
        vec![
            (kind.clone(), vec!["x1".to_string(), "x2".to_string()]),
            (kind.clone(), vec!["x3".to_string()]),
        ]
    );
    assert_eq!(processor.applied(), ["x1", "x2", "x3"]);

    // start once, resume once ({offset:10}), then stop on the terminal chunk.
    assert_eq!(job.start_calls(), 1);
    assert_eq!(job.resume_calls(), 1);
}

#[tokio::test]
async fn resumes_exactly_after_seeded_checkpoint() {
    let (store, processor, runner) = harness(&["source-record"]);
    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("paged-import");

    let chunks = vec![
        Chunk::new(job_id, kind.clone(), offset(10), vec![SourceRecord::new("r1")]),
        Chunk::new(job_id, kind.clone(), offset(20), vec![SourceRecord::new("r2")]),
        Chunk::new(job_id, kind.clone(), offset(30), vec![SourceRecord::new("r3")]),
        Chunk::terminal(job_id, kind.clone(), offset(40), vec![SourceRecord::new("r4")]),
    ];
    let job = ScriptedJob::new("paged-import", chunks);

    // As if a previous run committed through chunk 2 and then stopped.
    seed_checkpoint(&store, job_id, offset(20)).await;

    let summary = runner.run(&job).await.unwrap();

    // No gaps, no repeats of earlier data: chunks 3 and 4 only.
    assert_eq!(summary.chunks_processed, 2);
    assert_eq!(
        processor.invocations(),
        vec![
            (kind.clone(), vec!["r3".to_string()]),
            (kind.clone(), vec!["r4".to_string()]),
        ]
    );
    assert_eq!(store.committed(job_id), Some(offset(40)));
    assert_eq!(job.start_calls(), 0);
}

#[tokio::test]
async fn crash_before_checkpoint_commit_redelivers_the_chunk() {
    let (store, processor, runner) = harness(&["source-record"]);
    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("job-a");
    let job = ScriptedJob::new("job-a", common::two_chunk_script(job_id, &kind));

    // First run: processing succeeds but the commit fails, as if the
    // process died between the effect and the checkpoint write.
    store.fail_next_commit();
    let err = runner.run(&job).await.unwrap_err();
    assert!(matches!(err, SchedulerError::CheckpointPersist { .. }));

    // The chunk was delivered once but nothing advanced.
    assert_eq!(processor.invocations().len(), 1);
    assert!(processor.applied().is_empty());
    assert_eq!(store.committed(job_id), None);

    // Next scheduled run starts over and redelivers chunk 1.
    let summary = runner.run(&job).await.unwrap();
    assert!(summary.completed);
    assert_eq!(
        processor.invocations(),
        vec![
            (kind.clone(), vec!["x1".to_string(), "x2".to_string()]),
            (kind.clone(), vec!["x1".to_string(), "x2".to_string()]),
            (kind.clone(), vec!["x3".to_string()]),
        ]
    );
    assert_eq!(processor.applied(), ["x1", "x2", "x3"]);
    assert_eq!(store.committed(job_id), Some(offset(20)));
}

#[tokio::test]
async fn empty_non_terminal_chunk_commits_and_keeps_polling() {
    let (store, _processor, runner) = harness(&["source-record"]);
    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("quiet-source");

    let chunks = vec![
        // Nothing ready yet, but not finished.
        Chunk::new(job_id, kind.clone(), offset(10), vec![]),
        Chunk::terminal(job_id, kind.clone(), offset(20), vec![SourceRecord::new("r1")]),
    ];
    let job = ScriptedJob::new("quiet-source", chunks);

    let summary = runner.run(&job).await.unwrap();

    // The empty chunk still counted, still committed, and resume was
    // called with its checkpoint.
    assert_eq!(summary.chunks_processed, 2);
    assert_eq!(summary.items_processed, 1);
    assert_eq!(job.resume_calls(), 1);
    assert_eq!(store.committed(job_id), Some(offset(20)));
}

#[tokio::test]
async fn empty_chunk_checkpoint_survives_a_later_failure() {
    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("quiet-source");

    // Fail chunk 2: the empty chunk's checkpoint must already be durable.
    let processor =
        Arc::new(RecordingProcessor::new(vec![kind.clone()]).failing_on(offset(20)));
    let registry: Arc<ProcessorRegistry<SourceRecord>> = Arc::new(
        ProcessorRegistry::builder()
            .register(processor.clone())
            .build()
            .unwrap(),
    );
    let store = Arc::new(MemoryCheckpointStore::new());
    let runner = JobRunner::new(store.clone(), registry);

    let chunks = vec![
        Chunk::new(job_id, kind.clone(), offset(10), vec![]),
        Chunk::terminal(job_id, kind.clone(), offset(20), vec![SourceRecord::new("r1")]),
    ];
    let job = ScriptedJob::new("quiet-source", chunks);

    let err = runner.run(&job).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Processing { .. }));
    assert_eq!(store.committed(job_id), Some(offset(10)));
}

#[tokio::test]
async fn disjoint_kinds_reach_only_their_own_processor() {
    let bib = Arc::new(RecordingProcessor::new(vec!["bib".into()]));
    let holdings = Arc::new(RecordingProcessor::new(vec!["holdings".into()]));
    let registry: Arc<ProcessorRegistry<SourceRecord>> = Arc::new(
        ProcessorRegistry::builder()
            .register(bib.clone())
            .register(holdings.clone())
            .build()
            .unwrap(),
    );
    let store = Arc::new(MemoryCheckpointStore::new());
    let runner = JobRunner::new(store.clone(), registry);

    let job_id = JobId::from_name("mixed-ingest");
    let chunks = vec![
        Chunk::new(job_id, "bib".into(), offset(10), vec![SourceRecord::new("b1")]),
        Chunk::terminal(
            job_id,
            "holdings".into(),
            offset(20),
            vec![SourceRecord::new("h1")],
        ),
    ];
    let job = ScriptedJob::new("mixed-ingest", chunks);

    runner.run(&job).await.unwrap();

    assert_eq!(
        bib.invocations(),
        vec![(ChunkKind::from("bib"), vec!["b1".to_string()])]
    );
    assert_eq!(
        holdings.invocations(),
        vec![(ChunkKind::from("holdings"), vec!["h1".to_string()])]
    );
}

#[tokio::test]
async fn unregistered_kind_fails_before_any_side_effect() {
    let (store, processor, runner) = harness(&["bib"]);
    let job_id = JobId::from_name("misconfigured");
    let chunks = vec![Chunk::terminal(
        job_id,
        "holdings".into(),
        offset(10),
        vec![SourceRecord::new("h1")],
    )];
    let job = ScriptedJob::new("misconfigured", chunks);

    let err = runner.run(&job).await.unwrap_err();
    assert!(matches!(err, SchedulerError::ProcessorNotFound { .. }));
    assert!(err.is_configuration_error());

    assert!(processor.invocations().is_empty());
    assert!(processor.applied().is_empty());
    assert_eq!(store.committed(job_id), None);
}

#[tokio::test]
async fn fetch_failure_leaves_checkpoint_untouched() {
    let (store, processor, runner) = harness(&["source-record"]);
    let job_id = JobId::from_name("unreachable-host");
    seed_checkpoint(&store, job_id, offset(10)).await;

    let err = runner.run(&UnreachableJob).await.unwrap_err();
    assert!(matches!(err, SchedulerError::ChunkFetch { .. }));
    assert!(processor.invocations().is_empty());
    assert_eq!(store.committed(job_id), Some(offset(10)));
}

#[tokio::test]
async fn processing_failure_rolls_back_the_failing_chunk_only() {
    let processor = Arc::new(
        RecordingProcessor::new(vec!["source-record".into()]).failing_on(offset(20)),
    );
    let registry: Arc<ProcessorRegistry<SourceRecord>> = Arc::new(
        ProcessorRegistry::builder()
            .register(processor.clone())
            .build()
            .unwrap(),
    );
    let store = Arc::new(MemoryCheckpointStore::new());
    let runner = JobRunner::new(store.clone(), registry);

    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("job-a");
    let job = ScriptedJob::new("job-a", common::two_chunk_script(job_id, &kind));

    let err = runner.run(&job).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Processing { .. }));

    // Chunk 1 committed; chunk 2 was invoked but rolled back entirely.
    assert_eq!(processor.invocations().len(), 2);
    assert_eq!(processor.applied(), ["x1", "x2"]);
    assert_eq!(store.committed(job_id), Some(offset(10)));
}

#[tokio::test]
async fn shutdown_finishes_the_in_flight_chunk_first() {
    let (store, processor, runner) = harness(&["source-record"]);
    let kind = ChunkKind::from("source-record");
    let job_id = JobId::from_name("interrupted-import");

    // The processor trips the runner's shutdown flag while processing the
    // first chunk.
    processor.arm_shutdown(runner.shutdown_handle());

    let chunks = vec![
        Chunk::new(job_id, kind.clone(), offset(10), vec![SourceRecord::new("r1")]),
        Chunk::new(job_id, kind.clone(), offset(20), vec![SourceRecord::new("r2")]),
        Chunk::terminal(job_id, kind.clone(), offset(30), vec![SourceRecord::new("r3")]),
    ];
    let job = ScriptedJob::new("interrupted-import", chunks);

    let summary = runner.run(&job).await.unwrap();

    // The in-flight chunk committed; no further chunk was fetched.
    assert!(summary.interrupted);
    assert!(!summary.completed);
    assert_eq!(summary.chunks_processed, 1);
    assert_eq!(processor.applied(), ["r1"]);
    assert_eq!(store.committed(job_id), Some(offset(10)));
    assert_eq!(job.resume_calls(), 0);
}

#[tokio::test]
async fn chunk_owned_by_another_job_aborts_the_run() {
    let (store, processor, runner) = harness(&["source-record"]);
    let kind = ChunkKind::from("source-record");

    // Chunks stamped with a different job's identifier.
    let foreign_id = JobId::from_name("someone-else");
    let chunks = vec![Chunk::terminal(
        foreign_id,
        kind,
        offset(10),
        vec![SourceRecord::new("r1")],
    )];
    let job = ScriptedJob::new("job-a", chunks);

    let err = runner.run(&job).await.unwrap_err();
    assert!(matches!(err, SchedulerError::JobIdMismatch { .. }));
    assert!(processor.invocations().is_empty());
    assert_eq!(store.committed(JobId::from_name("job-a")), None);
}
