//! Bulk question generation: per-category retrieval plus question, model
//! answer, and purpose synthesis.
//!
//! Each category present in the vector store is handed its own generation
//! task (bounded by the configured parallelism); results are merged back in
//! the fixed category order and written as one immutable question set. The
//! record must be READY, otherwise the run fails with 409 semantics before
//! any work starts.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::control::CancelSignal;
use crate::error::{CoreError, Result};
use crate::model::provider::GenerateRequest;
use crate::model::{
    ModelCall, ModelGateway, QuestionBatch, MAX_QUESTIONS_PER_CATEGORY, MAX_QUESTION_CHARS,
};
use crate::progress::ProgressSender;
use crate::store::{ChunkStore, NewQuestion, NewQuestionSet, QuestionStore, RecordStore, StoredChunk};
use crate::types::{Category, RecordStatus};

/// Request parameters; unset targets fall back to the record's stored
/// defaults.
#[derive(Clone, Debug)]
pub struct QuestionGenRequest {
    pub record_id: i64,
    pub target_school: Option<String>,
    pub target_major: Option<String>,
    pub interview_type: Option<String>,
    pub title: String,
}

/// Per-category fan-out pipeline producing one question set.
#[derive(Clone)]
pub struct QuestionGenPipeline {
    records: RecordStore,
    chunks: ChunkStore,
    questions: QuestionStore,
    gateway: ModelGateway,
    parallelism: usize,
}

impl QuestionGenPipeline {
    pub fn new(
        records: RecordStore,
        chunks: ChunkStore,
        questions: QuestionStore,
        gateway: ModelGateway,
        parallelism: usize,
    ) -> Self {
        Self {
            records,
            chunks,
            questions,
            gateway,
            parallelism: parallelism.max(1),
        }
    }

    /// Generate a question set for a READY record; returns the set id.
    #[instrument(skip(self, request, progress, cancel), fields(record_id = request.record_id))]
    pub async fn run(
        &self,
        request: QuestionGenRequest,
        progress: ProgressSender,
        cancel: CancelSignal,
    ) -> Result<i64> {
        match self.run_inner(&request, &progress, &cancel).await {
            Ok(set_id) => {
                progress.complete();
                Ok(set_id)
            }
            Err(err) => {
                progress.error(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        request: &QuestionGenRequest,
        progress: &ProgressSender,
        cancel: &CancelSignal,
    ) -> Result<i64> {
        let record = self.records.get(request.record_id).await?;
        if record.status != RecordStatus::Ready {
            return Err(CoreError::RecordNotReady {
                record_id: record.id,
                status: record.status.to_string(),
            });
        }

        let target_school = request
            .target_school
            .clone()
            .or(record.target_school)
            .unwrap_or_else(|| "알 수 없음".to_string());
        let target_major = request
            .target_major
            .clone()
            .or(record.target_major)
            .unwrap_or_else(|| "알 수 없음".to_string());
        let interview_type = request
            .interview_type
            .clone()
            .or(record.interview_type)
            .unwrap_or_else(|| "종합전형".to_string());

        let categories = self.chunks.categories(record.id).await?;
        if categories.is_empty() {
            return Err(CoreError::InvalidRequest(format!(
                "record {} has no chunks to generate from",
                record.id
            )));
        }
        progress.processing(5);

        // Fan out one generation task per category, bounded by the worker
        // pool. Completion order is arbitrary; the merge below restores the
        // fixed category order.
        let permits = Arc::new(Semaphore::new(self.parallelism));
        let mut workers = JoinSet::new();
        for (slot, category) in categories.iter().copied().enumerate() {
            let permits = Arc::clone(&permits);
            let gateway = self.gateway.clone();
            let chunks = self.chunks.clone();
            let record_id = record.id;
            let school = target_school.clone();
            let major = target_major.clone();
            let interview = interview_type.clone();
            workers.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let sources = chunks.get_by_category(record_id, category).await?;
                let batch =
                    generate_for_category(&gateway, category, &sources, &school, &major, &interview)
                        .await?;
                Ok::<_, CoreError>((slot, category, batch))
            });
        }

        let total = categories.len();
        let mut merged: Vec<Option<Vec<NewQuestion>>> = vec![None; total];
        let mut done = 0usize;
        while let Some(joined) = workers.join_next().await {
            if cancel.is_cancelled() {
                workers.abort_all();
                return Err(CoreError::Cancelled);
            }
            let (slot, category, batch) =
                joined.map_err(|err| CoreError::Task(err.to_string()))??;
            merged[slot] = Some(batch);
            done += 1;
            progress.processing((5 + 85 * done as u64 / total as u64) as u8);
            info!(record_id = record.id, %category, done, total, "category generated");
        }

        let questions: Vec<NewQuestion> = merged.into_iter().flatten().flatten().collect();
        if questions.is_empty() {
            return Err(CoreError::InvalidRequest(
                "generation produced no usable questions".into(),
            ));
        }

        let set_id = self
            .questions
            .insert_set(
                NewQuestionSet {
                    record_id: record.id,
                    target_school,
                    target_major,
                    interview_type,
                    title: request.title.clone(),
                },
                &questions,
            )
            .await?;
        progress.processing(95);
        info!(record_id = record.id, set_id, count = questions.len(), "question set stored");
        Ok(set_id)
    }
}

/// Ask the model for up to five grounded questions for one category.
async fn generate_for_category(
    gateway: &ModelGateway,
    category: Category,
    sources: &[StoredChunk],
    target_school: &str,
    target_major: &str,
    interview_type: &str,
) -> Result<Vec<NewQuestion>> {
    let context = sources
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = format!(
        "당신은 대학 입시 면접관입니다. 아래 학생부 '{category}' 영역 기록만을 근거로 \
예상 면접 질문을 만드세요.\n\n\
**목표 학교**: {target_school}\n\
**목표 전공**: {target_major}\n\
**전형 유형**: {interview_type}\n\n\
**'{category}' 영역 기록**:\n{context}\n\n\
**지침**:\n\
1. 질문은 최대 {MAX_QUESTIONS_PER_CATEGORY}개, 제공된 기록에 명시된 내용만 근거로 삼으세요.\n\
2. 각 질문의 difficulty는 BASIC(기본) 또는 DEEP(심화)로 구분하세요.\n\
3. 각 질문에 모범 답안의 핵심 포인트(model_answer)와 질문 의도(purpose)를 덧붙이세요.\n\
4. 질문은 {MAX_QUESTION_CHARS}자를 넘지 않아야 합니다.\n\n\
JSON 형식으로만 응답하세요."
    );

    let call = ModelCall::new("question_batch", GenerateRequest::text(prompt));
    let batch: QuestionBatch = gateway.generate_json(call).await?;

    let mut questions = Vec::new();
    for generated in batch.questions.into_iter().take(MAX_QUESTIONS_PER_CATEGORY) {
        if generated.body.chars().count() > MAX_QUESTION_CHARS {
            warn!(%category, "dropping over-length question");
            continue;
        }
        questions.push(NewQuestion {
            category,
            body: generated.body,
            difficulty: generated.difficulty,
            model_answer: generated.model_answer,
            purpose: generated.purpose,
        });
    }
    Ok(questions)
}
