//! Interview graph nodes.
//!
//! Each node is a function from one [`InterviewState`] to the next; the
//! orchestrator commits a checkpoint after every node run. Routing itself is
//! pure (`InterviewState::decide_next_action`); the nodes here do the model
//! and retrieval work around it.

use tracing::{info, instrument};

use crate::error::Result;
use crate::model::provider::GenerateRequest;
use crate::model::{
    AnswerAnalysis, ModelCall, ModelGateway, NextQuestion, WrapUpReport,
};
use crate::store::ChunkStore;

use super::state::{
    topic_guideline, AnswerRecord, Evaluation, Grade, InterviewState, NextAction, RoutingConfig,
    Stage,
};

/// Chunks retrieved as context for a fresh topic.
const TOPIC_CONTEXT_K: usize = 3;

/// Answers longer than this are clipped in the wrap-up summary prompt.
const SUMMARY_ANSWER_CHARS: usize = 500;

/// Shared services the nodes run against.
#[derive(Clone)]
pub struct InterviewNodes {
    gateway: ModelGateway,
    chunks: ChunkStore,
    routing: RoutingConfig,
}

impl InterviewNodes {
    pub fn new(gateway: ModelGateway, chunks: ChunkStore, routing: RoutingConfig) -> Self {
        Self {
            gateway,
            chunks,
            routing,
        }
    }

    /// Score the latest candidate answer, append its [`AnswerRecord`], and
    /// decide the next action.
    #[instrument(skip(self, state), fields(topic = %state.current_sub_topic))]
    pub async fn analyzer(
        &self,
        state: InterviewState,
        response_time_s: u32,
    ) -> Result<InterviewState> {
        let question = state.last_question().unwrap_or_default().to_string();
        let answer = state.last_answer().unwrap_or_default().to_string();
        let topic = if state.current_sub_topic.is_empty() {
            "자기소개".to_string()
        } else {
            state.current_sub_topic.clone()
        };
        let context = state.current_context.join("\n\n");

        let prompt = format!(
            "당신은 대학 입시 면접관입니다. 고등학생의 답변을 평가하세요.\n\n\
**면접 난이도**: {difficulty}\n\
**현재 주제**: {topic}\n\
**남은 시간**: {remaining}초\n\n\
**이전 질문**:\n{question}\n\n\
**학생 답변** (소요 시간: {response_time_s}초):\n{answer}\n\n\
**관련 학생부 정보**:\n{context}\n\n\
**평가 지침**:\n\
1. 고등학생 수준에 맞게 판단하세요. 현직자 수준의 잣대를 들이대지 마세요.\n\
2. 답변의 충실도, 구체성, 논리성을 근거로 0~100점 score를 매기세요.\n\
3. 한두 문장의 feedback과 강점/약점 태그를 덧붙이세요.\n\n\
JSON 형식으로만 응답하세요.",
            difficulty = state.difficulty,
            remaining = state.remaining_time_s,
            context = if context.is_empty() { "해당 없음" } else { context.as_str() },
        );

        let call = ModelCall::new("answer_analysis", GenerateRequest::text(prompt));
        let analysis: AnswerAnalysis = self.gateway.generate_json(call).await?;
        let score = analysis.score.min(100);

        let record = AnswerRecord {
            question,
            answer,
            response_time_s,
            sub_topic: state.current_sub_topic.clone(),
            evaluation: Evaluation {
                score,
                grade: Grade::from_score(score),
                feedback: analysis.feedback,
                strength_tags: analysis.strength_tags,
                weakness_tags: analysis.weakness_tags,
            },
            context_used: state.current_context.clone(),
        };

        let mut state = state.with_answer_record(record);
        state.next_action = state.decide_next_action(score, &self.routing);
        info!(score, action = ?state.next_action, "answer analyzed");
        Ok(state)
    }

    /// Produce a deeper probe on the current sub-topic, reusing its context.
    #[instrument(skip(self, state), fields(topic = %state.current_sub_topic))]
    pub async fn follow_up_generator(&self, state: InterviewState) -> Result<InterviewState> {
        let answer = state.last_answer().unwrap_or_default().to_string();
        let context = state.current_context.join("\n\n");
        let prompt = format!(
            "당신은 대학 입시 면접관입니다. 학생의 답변에 대해 꼬리 질문을 생성하세요.\n\n\
**면접 난이도**: {difficulty}\n\
**현재 주제**: {topic}\n\
**꼬리 질문 횟수**: {round}회차\n\n\
**이전 답변**:\n{answer}\n\n\
**관련 학생부 정보**:\n{context}\n\n\
**꼬리 질문 생성 지침**:\n\
1. 답변에서 언급된 구체적 사례, 판단 근거, 배운 점을 파고드세요.\n\
2. \"왜 그렇게 생각했나?\", \"구체적으로 어떤 결과였나?\" 패턴을 활용하세요.\n\
3. Hard 모드에서는 논리적 허점을 찌르는 압박 질문을 생성하세요.\n\
4. 학생부 정보와 교차 검증하여 질문하세요.\n\n\
JSON 형식으로만 응답하세요.",
            difficulty = state.difficulty,
            topic = state.current_sub_topic,
            round = state.follow_up_count + 1,
        );

        let call = ModelCall::new(
            "follow_up_question",
            GenerateRequest::text(prompt).with_temperature(0.8),
        );
        let generated: NextQuestion = self.gateway.generate_json(call).await?;

        let mut state = state.with_interviewer_question(&generated.question);
        state.follow_up_count += 1;
        Ok(state)
    }

    /// Pick the first unused sub-topic, retrieve fresh context for it, and
    /// switch the state over. When the pool is exhausted the state routes to
    /// wrap-up instead.
    #[instrument(skip(self, state))]
    pub async fn retrieve_new_topic(&self, state: InterviewState) -> Result<InterviewState> {
        let Some(topic) = state.remaining_topics().first().copied() else {
            info!("sub-topic pool exhausted, wrapping up");
            let mut state = state;
            state.next_action = NextAction::WrapUp;
            return Ok(state);
        };

        let seed = format!("{topic}: {}", topic_guideline(topic));
        let query = self.gateway.embed(&seed).await?;
        let hits = self
            .chunks
            .search(state.record_id, &query, TOPIC_CONTEXT_K, None)
            .await?;
        let context: Vec<String> = hits.into_iter().map(|(chunk, _)| chunk.text).collect();
        info!(topic, retrieved = context.len(), "switched to new topic");
        Ok(state.with_new_topic(topic, context))
    }

    /// Open the new topic with a fresh question grounded in its context.
    #[instrument(skip(self, state), fields(topic = %state.current_sub_topic))]
    pub async fn new_question_generator(&self, state: InterviewState) -> Result<InterviewState> {
        let context = state.current_context.join("\n\n");
        let prompt = format!(
            "당신은 대학 입시 면접관입니다. 새로운 주제에 대한 첫 질문을 생성하세요.\n\n\
**면접 난이도**: {difficulty}\n\
**새로운 주제**: {topic}\n\n\
**관련 학생부 정보**:\n{context}\n\n\
**첫 질문 생성 지침**:\n\
1. 해당 주제와 관련된 개방형 질문을 생성하세요.\n\
2. 학생의 경험과 생각을 자유롭게 표현하게 유도하세요.\n\
3. 구체적인 사례를 요청하는 방식으로 질문하세요.\n\n\
주제 가이드라인: {guideline}\n\n\
JSON 형식으로만 응답하세요.",
            difficulty = state.difficulty,
            topic = state.current_sub_topic,
            guideline = topic_guideline(&state.current_sub_topic),
        );

        let call = ModelCall::new("new_topic_question", GenerateRequest::text(prompt));
        let generated: NextQuestion = self.gateway.generate_json(call).await?;
        Ok(state.with_interviewer_question(&generated.question))
    }

    /// Produce the closing remark and the final report.
    #[instrument(skip(self, state, total_time_s))]
    pub async fn wrap_up(
        &self,
        state: InterviewState,
        total_time_s: u32,
    ) -> Result<(InterviewState, WrapUpReport, String)> {
        let total_questions = state.answer_metadata.len();
        let avg_response_time = if total_questions == 0 {
            0
        } else {
            state
                .answer_metadata
                .iter()
                .map(|r| r.response_time_s as u64)
                .sum::<u64>()
                / total_questions as u64
        };

        let mut summary = String::new();
        for record in &state.answer_metadata {
            let mut answer = record.answer.clone();
            if answer.chars().count() > SUMMARY_ANSWER_CHARS {
                answer = answer.chars().take(SUMMARY_ANSWER_CHARS).collect::<String>() + "... (생략)";
            }
            summary.push_str(&format!(
                "Q: {}\nA: {} (소요시간: {}초)\n",
                record.question, answer, record.response_time_s
            ));
        }

        let prompt = format!(
            "당신은 대학 입시 면접관입니다. 면접 종료 후 종합 평가를 생성하세요.\n\n\
**면접 난이도**: {difficulty}\n\
**총 답변 수**: {total_questions}\n\
**평균 응답 시간**: {avg_response_time}초\n\n\
**전체 대화 내용** (답변은 {SUMMARY_ANSWER_CHARS}자로 요약됨):\n{summary}\n\
**점수 산정 기준**:\n\
- 전공적합성/인성/발전가능성/의사소통능력: 각 0~25점\n\
- 총점: 0~100점 (네 영역 합계)\n\n\
각 답변에 대해 질문 내용, 답변 시간, 평가(좋음/보통/나쁨), 개선 포인트, \
보완 필요 항목을 분석하세요.\n\n\
JSON 형식으로만 응답하세요.",
            difficulty = state.difficulty,
        );

        let call = ModelCall::new("wrap_up_report", GenerateRequest::text(prompt));
        let report: WrapUpReport = self.gateway.generate_json(call).await?;

        let elapsed = total_time_s.saturating_sub(state.remaining_time_s);
        let closing = format!(
            "면접을 종료합니다. 수고하셨습니다.\n\n\
📊 **면접 요약**\n\
- 총 질문 수: {total_questions}개\n\
- 소요 시간: {elapsed}초\n\n\
상세 분석 결과는 면접 종료 후 확인해주세요."
        );

        let mut state = state.with_interviewer_question(&closing);
        state.stage = Stage::WrapUp;
        state.next_action = NextAction::WrapUp;
        Ok((state, report, closing))
    }
}
