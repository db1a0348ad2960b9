//! Top-level wiring: build the stores, gateway, pipelines, and orchestrator
//! from one [`Settings`] plus the external seams.

use std::sync::Arc;

use crate::audio::SpeechSynthesizer;
use crate::blob::ObjectStore;
use crate::config::Settings;
use crate::error::Result;
use crate::ingest::raster::PageRasterizer;
use crate::ingest::IngestPipeline;
use crate::interview::{InterviewNodes, InterviewOrchestrator, RoutingConfig};
use crate::model::{ModelGateway, ModelProvider};
use crate::qgen::QuestionGenPipeline;
use crate::store::{
    self, CheckpointStore, ChunkStore, QuestionStore, RecordStore, SessionRegistry,
};

/// The assembled core service.
///
/// Routing glue (HTTP, auth) lives outside; this struct hands it the three
/// long-running flows plus the stores they share.
#[derive(Clone)]
pub struct Service {
    pub records: RecordStore,
    pub chunks: ChunkStore,
    pub questions: QuestionStore,
    pub sessions: SessionRegistry,
    pub checkpoints: CheckpointStore,
    pub gateway: ModelGateway,
    pub ingest: IngestPipeline,
    pub qgen: QuestionGenPipeline,
    pub interview: InterviewOrchestrator,
}

impl Service {
    /// Connect the database and wire every subsystem.
    pub async fn connect(
        settings: &Settings,
        provider: Arc<dyn ModelProvider>,
        blobs: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self> {
        let pool = store::connect(&settings.database_url).await?;
        Ok(Self::assemble(pool, settings, provider, blobs, rasterizer, speech))
    }

    /// Wire every subsystem over an existing pool.
    pub fn assemble(
        pool: sqlx::SqlitePool,
        settings: &Settings,
        provider: Arc<dyn ModelProvider>,
        blobs: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let records = RecordStore::new(pool.clone());
        let chunks = ChunkStore::new(pool.clone());
        let questions = QuestionStore::new(pool.clone());
        let sessions = SessionRegistry::new(pool.clone());
        let checkpoints = CheckpointStore::new(pool);
        let gateway = ModelGateway::new(provider, settings);

        let ingest = IngestPipeline::new(
            records.clone(),
            chunks.clone(),
            gateway.clone(),
            Arc::clone(&blobs),
            rasterizer,
            settings.ingest_batch_pages,
            settings.ingest_parallelism,
        );
        let qgen = QuestionGenPipeline::new(
            records.clone(),
            chunks.clone(),
            questions.clone(),
            gateway.clone(),
            settings.qgen_parallelism,
        );
        let routing = RoutingConfig {
            wrap_up_threshold_s: settings.interview_wrap_up_threshold_s,
            max_follow_ups: settings.interview_max_follow_ups,
            max_topics: settings.interview_max_topics,
        };
        let interview = InterviewOrchestrator::new(
            records.clone(),
            sessions.clone(),
            checkpoints.clone(),
            InterviewNodes::new(gateway.clone(), chunks.clone(), routing),
            gateway.clone(),
            blobs,
            speech,
            settings.interview_total_time_s,
        );

        Self {
            records,
            chunks,
            questions,
            sessions,
            checkpoints,
            gateway,
            ingest,
            qgen,
            interview,
        }
    }
}
