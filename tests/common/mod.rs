//! Shared fixtures for the integration tests: an in-memory database, a
//! scripted model provider, and the stores wired the way the service wires
//! them.

// Not every test binary touches every fixture.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use susi::blob::MemoryObjectStore;
use susi::config::Settings;
use susi::model::{MockModelProvider, ModelGateway};
use susi::store::{
    self, CheckpointStore, ChunkStore, NewChunk, NewRecord, QuestionStore, RecordStore,
    SessionRegistry,
};
use susi::types::{Category, RecordStatus};

pub const EMBED_DIM: usize = 8;

pub struct TestEnv {
    pub pool: sqlx::SqlitePool,
    pub settings: Settings,
    pub provider: MockModelProvider,
    pub gateway: ModelGateway,
    pub records: RecordStore,
    pub chunks: ChunkStore,
    pub questions: QuestionStore,
    pub sessions: SessionRegistry,
    pub checkpoints: CheckpointStore,
    pub blobs: Arc<MemoryObjectStore>,
}

pub async fn test_env() -> TestEnv {
    let settings = Settings {
        embedding_dim: EMBED_DIM,
        ingest_batch_pages: 3,
        ingest_parallelism: 2,
        qgen_parallelism: 2,
        model_max_retries: 2,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(2),
        model_call_timeout: Duration::from_millis(2_000),
        ..Settings::default()
    };
    let provider = MockModelProvider::new().with_embedding_dim(EMBED_DIM);
    let gateway = ModelGateway::new(Arc::new(provider.clone()), &settings);
    let pool = store::connect_in_memory().await.expect("in-memory database");
    TestEnv {
        records: RecordStore::new(pool.clone()),
        chunks: ChunkStore::new(pool.clone()),
        questions: QuestionStore::new(pool.clone()),
        sessions: SessionRegistry::new(pool.clone()),
        checkpoints: CheckpointStore::new(pool.clone()),
        blobs: Arc::new(MemoryObjectStore::new()),
        pool,
        settings,
        provider,
        gateway,
    }
}

impl TestEnv {
    /// Insert a record row pointing at `blob_key`.
    pub async fn new_record(&self, blob_key: &str) -> i64 {
        self.records
            .create(NewRecord {
                user_id: 1,
                title: "3학년 생활기록부".into(),
                blob_key: blob_key.into(),
                target_school: Some("한국대학교".into()),
                target_major: Some("소프트웨어학과".into()),
                interview_type: Some("종합전형".into()),
            })
            .await
            .expect("record insert")
    }

    /// Insert a READY record pre-populated with chunks in the given
    /// categories (one chunk per category, deterministic embeddings).
    pub async fn ready_record(&self, categories: &[Category]) -> i64 {
        let record_id = self.new_record("users/1/records/seed.pdf").await;
        let rows: Vec<NewChunk> = categories
            .iter()
            .enumerate()
            .map(|(index, category)| NewChunk {
                chunk_index: index as i64,
                text: format!("{category} 영역의 기록 내용입니다."),
                category: *category,
                embedding: MockModelProvider::embedding_for(category.as_str(), EMBED_DIM),
            })
            .collect();
        self.chunks
            .put_chunks(record_id, &rows)
            .await
            .expect("chunk insert");
        self.records
            .set_status(record_id, RecordStatus::Ready)
            .await
            .expect("status update");
        record_id
    }
}
