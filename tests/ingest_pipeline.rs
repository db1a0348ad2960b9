//! End-to-end ingestion runs against the in-memory database with scripted
//! OCR output and deterministic embeddings.

mod common;

use std::sync::Arc;

use susi::blob::ObjectStore;
use susi::control::CancelSignal;
use susi::error::CoreError;
use susi::ingest::raster::FixtureRasterizer;
use susi::ingest::IngestPipeline;
use susi::progress::{self, ProgressEvent};
use susi::types::{Category, RecordStatus};

use common::{test_env, TestEnv, EMBED_DIM};

const BATCH_ONE: &str = r#"{"chunks":[
    {"category":"성적","chunk_text":"수학: 1등급, 물리학Ⅰ: 2등급"},
    {"category":"세특","chunk_text":"미분계수의 기하학적 의미를 탐구하고 발표함."},
    {"category":"출결","chunk_text":"3년간 개근. [일부 텍스트 누락]"}
]}"#;

const BATCH_TWO: &str = r#"{"chunks":[
    {"category":"독서","chunk_text":"「코스모스」를 읽고 과학적 회의주의에 대해 토론함."},
    {"category":"진로","chunk_text":"소프트웨어 개발자를 희망하며 동아리 활동을 주도함."}
]}"#;

fn pipeline(env: &TestEnv, pages: usize) -> IngestPipeline {
    IngestPipeline::new(
        env.records.clone(),
        env.chunks.clone(),
        env.gateway.clone(),
        env.blobs.clone(),
        Arc::new(FixtureRasterizer::new(pages)),
        env.settings.ingest_batch_pages,
        env.settings.ingest_parallelism,
    )
}

fn progress_values(events: &[ProgressEvent]) -> Vec<u8> {
    events
        .iter()
        .map(|event| match event {
            ProgressEvent::Processing { progress } => *progress,
            ProgressEvent::Complete { progress } => *progress,
            ProgressEvent::Error { progress, .. } => *progress,
        })
        .collect()
}

#[tokio::test]
async fn six_page_document_follows_the_progress_budget() {
    let env = test_env().await;
    env.blobs
        .put_blob("users/1/records/life.pdf", b"%PDF-1.7 six pages".to_vec())
        .await
        .unwrap();
    let record_id = env.new_record("users/1/records/life.pdf").await;

    // 6 pages at batch size 3: exactly two OCR calls.
    env.provider.push_generation(BATCH_ONE);
    env.provider.push_generation(BATCH_TWO);

    let (tx, rx) = progress::channel(32);
    let outcome = pipeline(&env, 6)
        .run(record_id, tx, CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.page_count, 6);
    assert_eq!(outcome.chunk_count, 5);
    assert_eq!(env.provider.remaining_generations(), 0);

    let events = rx.collect_to_end().await;
    assert_eq!(progress_values(&events), vec![10, 20, 30, 50, 70, 85, 95, 100]);
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));

    assert_eq!(
        env.records.get(record_id).await.unwrap().status,
        RecordStatus::Ready
    );

    // Chunk invariants: indices form 0..N-1 and every embedding has the
    // declared dimension.
    let stored = env.chunks.get_all(record_id).await.unwrap();
    for (expected_index, chunk) in stored.iter().enumerate() {
        assert_eq!(chunk.chunk_index, expected_index as i64);
        assert_eq!(chunk.embedding.len(), EMBED_DIM);
    }
    assert_eq!(stored[0].category, Category::Grades);
    assert_eq!(stored[2].text, "3년간 개근. [일부 텍스트 누락]");
}

#[tokio::test]
async fn reingest_purges_and_reproduces_the_same_chunks() {
    let env = test_env().await;
    env.blobs
        .put_blob("users/1/records/life.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    let record_id = env.new_record("users/1/records/life.pdf").await;
    let pipeline = pipeline(&env, 3);

    env.provider.push_generation(BATCH_ONE);
    let (tx, _rx) = progress::channel(32);
    pipeline
        .run(record_id, tx, CancelSignal::never())
        .await
        .unwrap();
    let first: Vec<(i64, String)> = env
        .chunks
        .get_all(record_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.chunk_index, c.text))
        .collect();

    // Identical input on a re-run yields the identical index → text map.
    env.provider.push_generation(BATCH_ONE);
    let (tx, _rx) = progress::channel(32);
    pipeline
        .run(record_id, tx, CancelSignal::never())
        .await
        .unwrap();
    let second: Vec<(i64, String)> = env
        .chunks
        .get_all(record_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.chunk_index, c.text))
        .collect();

    assert_eq!(first, second);
    assert_eq!(env.chunks.count(record_id).await.unwrap(), 3);
}

#[tokio::test]
async fn failure_marks_record_failed_and_purges_partials() {
    let env = test_env().await;
    env.blobs
        .put_blob("users/1/records/life.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    let record_id = env.new_record("users/1/records/life.pdf").await;

    // Two batches needed, only one scripted: the second OCR call fails.
    env.provider.push_generation(BATCH_ONE);

    let (tx, rx) = progress::channel(32);
    let err = pipeline(&env, 6)
        .run(record_id, tx, CancelSignal::never())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);

    let events = rx.collect_to_end().await;
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Error { progress: 0, .. })
    ));
    assert_eq!(
        env.records.get(record_id).await.unwrap().status,
        RecordStatus::Failed
    );
    assert_eq!(env.chunks.count(record_id).await.unwrap(), 0);
}

#[tokio::test]
async fn missing_blob_fails_fast() {
    let env = test_env().await;
    let record_id = env.new_record("users/1/records/missing.pdf").await;

    let (tx, rx) = progress::channel(32);
    let err = pipeline(&env, 6)
        .run(record_id, tx, CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Blob(_)));

    let events = rx.collect_to_end().await;
    assert!(matches!(events.last(), Some(ProgressEvent::Error { .. })));
    assert_eq!(
        env.records.get(record_id).await.unwrap().status,
        RecordStatus::Failed
    );
}

#[tokio::test]
async fn cancellation_leaves_record_failed_with_no_chunks() {
    let env = test_env().await;
    env.blobs
        .put_blob("users/1/records/life.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    let record_id = env.new_record("users/1/records/life.pdf").await;
    env.provider.push_generation(BATCH_ONE);
    env.provider.push_generation(BATCH_TWO);

    let (handle, signal) = CancelSignal::new();
    handle.cancel(); // aborts at the first stage boundary

    let (tx, rx) = progress::channel(32);
    let err = pipeline(&env, 6)
        .run(record_id, tx, signal)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));

    let events = rx.collect_to_end().await;
    assert!(matches!(events.last(), Some(ProgressEvent::Error { .. })));
    assert_eq!(
        env.records.get(record_id).await.unwrap().status,
        RecordStatus::Failed
    );
    assert_eq!(env.chunks.count(record_id).await.unwrap(), 0);
}
