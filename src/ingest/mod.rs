//! The ingestion pipeline: source PDF → page images → categorized verbatim
//! chunks → embeddings → vector store.
//!
//! The run is staged and resumable by record: a fresh run first purges any
//! chunks a previous attempt left behind, so re-ingesting a record is
//! idempotent. Progress is streamed on a fixed budget:
//!
//! | stage                    | progress |
//! |--------------------------|----------|
//! | fetch source blob        | 10 → 20  |
//! | page rasterization       | 20 → 30  |
//! | OCR + categorization     | 30 → 70  |
//! | embedding + persistence  | 70 → 95  |
//! | finalization             | 95 → 100 |
//!
//! Any terminal failure (including cancellation) purges partial chunks,
//! flips the record to FAILED, and ends the stream with an `error` event.

pub mod raster;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::control::CancelSignal;
use crate::error::{CoreError, Result};
use crate::blob::ObjectStore;
use crate::model::provider::{GenerateRequest, MediaPart};
use crate::model::{ModelCall, ModelGateway, PageExtraction};
use crate::progress::ProgressSender;
use crate::store::{ChunkStore, NewChunk, RecordStore};
use crate::types::RecordStatus;

use raster::{PageImage, PageRasterizer};

/// Result of a successful ingestion run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestOutcome {
    pub chunk_count: usize,
    pub page_count: usize,
}

/// Staged PDF→vector-store pipeline.
#[derive(Clone)]
pub struct IngestPipeline {
    records: RecordStore,
    chunks: ChunkStore,
    gateway: ModelGateway,
    blobs: Arc<dyn ObjectStore>,
    rasterizer: Arc<dyn PageRasterizer>,
    batch_pages: usize,
    parallelism: usize,
}

impl IngestPipeline {
    pub fn new(
        records: RecordStore,
        chunks: ChunkStore,
        gateway: ModelGateway,
        blobs: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn PageRasterizer>,
        batch_pages: usize,
        parallelism: usize,
    ) -> Self {
        Self {
            records,
            chunks,
            gateway,
            blobs,
            rasterizer,
            batch_pages: batch_pages.max(1),
            parallelism: parallelism.max(1),
        }
    }

    /// Ingest one record end to end.
    ///
    /// The record moves PENDING/FAILED → PROCESSING → READY, or FAILED on
    /// any terminal error. Progress events flow to `progress`; the signal in
    /// `cancel` aborts at the next stage boundary.
    #[instrument(skip(self, progress, cancel))]
    pub async fn run(
        &self,
        record_id: i64,
        progress: ProgressSender,
        cancel: CancelSignal,
    ) -> Result<IngestOutcome> {
        let record = self.records.get(record_id).await?;
        self.records
            .set_status(record_id, RecordStatus::Processing)
            .await?;

        // Idempotent re-ingest: any chunks from a previous attempt go first.
        let purged = self.chunks.delete_by_record(record_id).await?;
        if purged > 0 {
            info!(record_id, purged, "purged stale chunks before re-ingest");
        }

        match self.run_stages(record_id, &record.blob_key, &progress, &cancel).await {
            Ok(outcome) => {
                self.records.set_status(record_id, RecordStatus::Ready).await?;
                progress.complete();
                info!(record_id, chunks = outcome.chunk_count, "ingestion complete");
                Ok(outcome)
            }
            Err(err) => {
                warn!(record_id, error = %err, "ingestion failed, purging partial chunks");
                // Best-effort cleanup; the FAILED status is what re-ingest
                // keys off.
                let _ = self.chunks.delete_by_record(record_id).await;
                let _ = self.records.set_status(record_id, RecordStatus::Failed).await;
                progress.error(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        record_id: i64,
        blob_key: &str,
        progress: &ProgressSender,
        cancel: &CancelSignal,
    ) -> Result<IngestOutcome> {
        // Stage 1: fetch. Permission/not-found failures are terminal
        // immediately; there is nothing to retry.
        progress.processing(10);
        let pdf = self.blobs.get_blob(blob_key).await?;
        progress.processing(20);
        ensure_live(cancel)?;

        // Stage 2: one image per page, order preserved.
        let pages = self.rasterizer.rasterize(&pdf).await?;
        progress.processing(30);
        ensure_live(cancel)?;

        // Stage 3: OCR + categorization in page batches.
        let batches: Vec<&[PageImage]> = pages.chunks(self.batch_pages).collect();
        let batch_count = batches.len();
        let mut extracted = Vec::new();
        for (batch_number, batch) in batches.into_iter().enumerate() {
            let call = ModelCall::new("ocr_batch", ocr_request(batch));
            let extraction: PageExtraction = self.gateway.generate_json(call).await?;
            extracted.extend(extraction.chunks);
            let done = (batch_number + 1) as u64;
            progress.processing((30 + 40 * done / batch_count as u64) as u8);
            ensure_live(cancel)?;
        }
        if extracted.is_empty() {
            return Err(CoreError::InvalidRequest(
                "no text could be extracted from the document".into(),
            ));
        }

        // Stage 4: embed with a bounded worker pool, then persist the whole
        // record atomically. Results merge back in chunk order regardless of
        // completion order.
        let permits = Arc::new(Semaphore::new(self.parallelism));
        let mut workers = JoinSet::new();
        for (index, chunk) in extracted.iter().enumerate() {
            let permits = Arc::clone(&permits);
            let gateway = self.gateway.clone();
            let text = chunk.chunk_text.clone();
            workers.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, gateway.embed(&text).await)
            });
        }
        let mut embeddings: Vec<Option<Vec<f32>>> = vec![None; extracted.len()];
        while let Some(joined) = workers.join_next().await {
            let (index, embedding) = joined.map_err(|err| CoreError::Task(err.to_string()))?;
            embeddings[index] = Some(embedding?);
        }
        progress.processing(85);
        ensure_live(cancel)?;

        let rows: Vec<NewChunk> = extracted
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (chunk, embedding))| NewChunk {
                chunk_index: index as i64,
                text: chunk.chunk_text,
                category: chunk.category,
                // Every worker either stored its vector or we bailed above.
                embedding: embedding.unwrap_or_default(),
            })
            .collect();
        self.chunks.put_chunks(record_id, &rows).await?;
        progress.processing(95);

        Ok(IngestOutcome {
            chunk_count: rows.len(),
            page_count: pages.len(),
        })
    }
}

fn ensure_live(cancel: &CancelSignal) -> Result<()> {
    if cancel.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}

/// The verbatim-extraction request for one page batch.
fn ocr_request(batch: &[PageImage]) -> GenerateRequest {
    let prompt = "당신은 학교생활기록부 PDF 페이지를 전사하는 OCR 엔진입니다. \
첨부된 각 페이지 이미지에서 텍스트를 추출해 카테고리별 조각으로 나누세요.\n\n\
**전사 규칙 (반드시 지킬 것)**:\n\
1. 원문을 글자 그대로 복사하세요. 공백, 문장부호, 줄바꿈을 보존하고, \
요약·의역·내용 추론을 절대 하지 마세요.\n\
2. 판독이 불가능한 영역은 정확히 `[일부 텍스트 누락]` 토큰으로 대체하세요.\n\
3. 개인정보(학생 이름, 학교명, 학번, 주민등록번호)는 제거하세요.\n\
4. 각 조각의 category는 성적, 세특, 창체, 행특, 출결, 독서, 수상, 진로, 기타 \
중 하나여야 합니다.\n\n\
JSON 형식으로만 응답하세요.";

    GenerateRequest::text(prompt)
        .with_media(
            batch
                .iter()
                .map(|page| MediaPart {
                    mime_type: "image/png".to_string(),
                    data: page.png.clone(),
                })
                .collect(),
        )
        .with_temperature(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_request_carries_every_page() {
        let pages: Vec<PageImage> = (0..3)
            .map(|index| PageImage {
                index,
                png: vec![index as u8],
            })
            .collect();
        let request = ocr_request(&pages);
        assert_eq!(request.media.len(), 3);
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.prompt.contains("[일부 텍스트 누락]"));
    }
}
