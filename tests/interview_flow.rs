//! Interview orchestrator scenarios: initialization, routing boundaries,
//! wrap-up, resume, audio, and turn serialization.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use susi::audio::FixedSpeechSynthesizer;
use susi::blob::ObjectStore;
use susi::error::CoreError;
use susi::interview::{
    InterviewNodes, InterviewOrchestrator, InterviewState, RoutingConfig, Stage,
};
use susi::model::{
    GenerateRequest, MockModelProvider, ModelGateway, ModelProvider, ProviderError,
};
use susi::types::{Category, Difficulty, SessionStatus};

use common::{test_env, TestEnv};

const ANALYSIS_55: &str = r#"{"score":55,"feedback":"답변이 추상적입니다.",
    "strength_tags":["성실한 태도"],"weakness_tags":["근거 부족"]}"#;
const ANALYSIS_85: &str = r#"{"score":85,"feedback":"구체적인 사례가 좋았습니다.",
    "strength_tags":["구체적 사례 제시"],"weakness_tags":[]}"#;
const ANALYSIS_90: &str = r#"{"score":90,"feedback":"논리적인 답변입니다.",
    "strength_tags":["논리적 구조"],"weakness_tags":[]}"#;
const FOLLOW_UP_Q: &str = r#"{"question":"그 판단의 근거를 구체적으로 말씀해 주시겠어요?"}"#;
const NEW_TOPIC_Q: &str = r#"{"question":"해당 활동에서 가장 기억에 남는 경험은 무엇인가요?"}"#;
const WRAP_REPORT: &str = r#"{
    "scores": {"전공적합성": 20, "인성": 18, "발전가능성": 21, "의사소통능력": 16, "총점": 75},
    "strength_tags": ["구체적 사례 제시"],
    "weakness_tags": ["결론이 불명확함"],
    "detailed_analysis": [{
        "question": "자기소개 부탁드립니다.",
        "response_time": 40,
        "evaluation": "좋음",
        "improvement_point": "결론을 먼저 말하기",
        "supplement_needed": "전공 연결 1줄 추가"
    }]
}"#;

fn orchestrator(env: &TestEnv) -> InterviewOrchestrator {
    orchestrator_with_gateway(env, env.gateway.clone())
}

fn orchestrator_with_gateway(env: &TestEnv, gateway: ModelGateway) -> InterviewOrchestrator {
    let routing = RoutingConfig {
        wrap_up_threshold_s: env.settings.interview_wrap_up_threshold_s,
        max_follow_ups: env.settings.interview_max_follow_ups,
        max_topics: env.settings.interview_max_topics,
    };
    InterviewOrchestrator::new(
        env.records.clone(),
        env.sessions.clone(),
        env.checkpoints.clone(),
        InterviewNodes::new(gateway.clone(), env.chunks.clone(), routing),
        gateway,
        env.blobs.clone(),
        Arc::new(FixedSpeechSynthesizer),
        env.settings.interview_total_time_s,
    )
}

/// Open a session directly and seed a crafted checkpoint for it.
async fn seed_thread(env: &TestEnv, thread_id: &str, record_id: i64, state: InterviewState) {
    env.sessions
        .create(thread_id, 1, record_id, Difficulty::Normal)
        .await
        .unwrap();
    env.checkpoints.save(thread_id, &state).await.unwrap();
}

fn mid_interview_state(record_id: i64, session_id: i64) -> InterviewState {
    let mut state = InterviewState::new(record_id, session_id, Difficulty::Normal, 600);
    state.remaining_time_s = 500;
    state.stage = Stage::Main;
    state.current_sub_topic = "리더십".into();
    state.current_context = vec!["동아리 회장으로서 갈등을 중재함.".into()];
    state = state.with_interviewer_question("리더십을 발휘한 경험을 말씀해 주세요.");
    state
}

#[tokio::test]
async fn initialize_runs_the_opening_turn() {
    let env = test_env().await;
    let record_id = env
        .ready_record(&[Category::Attendance, Category::Grades, Category::Reading])
        .await;
    env.provider.push_generation(ANALYSIS_85);
    env.provider.push_generation(NEW_TOPIC_Q);

    let outcome = orchestrator(&env)
        .initialize(record_id, 1, Difficulty::Normal, "안녕하세요. 저는...", 40)
        .await
        .unwrap();

    assert!(outcome.thread_id.starts_with(&format!("interview_{record_id}_")));
    assert!(!outcome.is_finished);
    assert_eq!(
        outcome.next_question,
        "해당 활동에서 가장 기억에 남는 경험은 무엇인가요?"
    );
    assert_eq!(outcome.analysis.as_ref().unwrap().score, 85);

    // Intro answer is recorded with an empty sub-topic, so no axis moved.
    assert_eq!(outcome.state.answer_metadata.len(), 1);
    assert_eq!(outcome.state.answer_metadata[0].sub_topic, "");
    assert!(outcome.state.scores.is_empty());

    // First unused topic in pool order.
    assert_eq!(outcome.state.current_sub_topic, "출결");
    assert_eq!(outcome.state.remaining_time_s, 560);

    // initialize + analyzer + retrieve + generator each committed one
    // checkpoint.
    let ids = env.checkpoints.history(&outcome.thread_id).await.unwrap();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let session = env.sessions.get_by_thread(&outcome.thread_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);
}

#[tokio::test]
async fn low_score_triggers_a_follow_up() {
    let env = test_env().await;
    let record_id = env.ready_record(&[Category::Grades]).await;
    let session_id = 1;
    seed_thread(
        &env,
        "t-follow",
        record_id,
        mid_interview_state(record_id, session_id),
    )
    .await;

    env.provider.push_generation(ANALYSIS_55);
    env.provider.push_generation(FOLLOW_UP_Q);

    let outcome = orchestrator(&env)
        .chat_turn("t-follow", "그냥 열심히 했습니다.", 30)
        .await
        .unwrap();

    assert!(!outcome.is_finished);
    assert_eq!(outcome.state.follow_up_count, 1);
    assert_eq!(outcome.state.current_sub_topic, "리더십");
    assert_eq!(
        outcome.next_question,
        "그 판단의 근거를 구체적으로 말씀해 주시겠어요?"
    );
    // 리더십 maps to the character axis.
    assert_eq!(
        outcome.state.scores.values().copied().sum::<u32>(),
        55
    );
}

#[tokio::test]
async fn high_score_with_seven_topics_switches_topic() {
    let env = test_env().await;
    let record_id = env.ready_record(&[Category::Career, Category::Reading]).await;
    let mut state = mid_interview_state(record_id, 1);
    for topic in ["출결", "성적", "동아리", "인성/태도", "진로/자율", "독서", "리더십"] {
        state.asked_sub_topics.insert(topic.to_string());
    }
    seed_thread(&env, "t-switch", record_id, state).await;

    env.provider.push_generation(ANALYSIS_90);
    env.provider.push_generation(NEW_TOPIC_Q);

    let outcome = orchestrator(&env)
        .chat_turn("t-switch", "동아리에서 기획을 맡아 축제를 준비했습니다.", 25)
        .await
        .unwrap();

    assert!(!outcome.is_finished);
    // The only topic neither asked nor active is 봉사.
    assert_eq!(outcome.state.current_sub_topic, "봉사");
    assert_eq!(outcome.state.follow_up_count, 0);
    assert!(outcome.state.asked_sub_topics.contains("리더십"));
}

#[tokio::test]
async fn low_time_forces_wrap_up_and_completes_the_session() {
    let env = test_env().await;
    let record_id = env.ready_record(&[Category::Grades]).await;
    let mut state = mid_interview_state(record_id, 1);
    state.remaining_time_s = 40; // 40 - 20s answer = 20 < 30 threshold
    seed_thread(&env, "t-wrap", record_id, state).await;

    env.provider.push_generation(ANALYSIS_85);
    env.provider.push_generation(WRAP_REPORT);

    let outcome = orchestrator(&env)
        .chat_turn("t-wrap", "마지막으로 하고 싶은 말입니다.", 20)
        .await
        .unwrap();

    assert!(outcome.is_finished);
    assert_eq!(outcome.state.stage, Stage::WrapUp);
    assert!(outcome.next_question.contains("면접을 종료합니다"));

    let session = env.sessions.get_by_thread("t-wrap").await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.total_questions, Some(1));
    let report = session.final_report.unwrap();
    assert_eq!(report["scores"]["총점"], 75);

    // The registry reconstructs the answer log from the latest checkpoint.
    let logs = env.sessions.get_logs(session.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].sub_topic, "리더십");
}

#[tokio::test]
async fn replaying_a_turn_grows_metadata_by_exactly_one() {
    let env = test_env().await;
    let record_id = env.ready_record(&[Category::Grades]).await;
    seed_thread(&env, "t-replay", record_id, mid_interview_state(record_id, 1)).await;
    let orchestrator = orchestrator(&env);

    env.provider.push_generation(ANALYSIS_55);
    env.provider.push_generation(FOLLOW_UP_Q);
    let before = orchestrator.latest_state("t-replay").await.unwrap();
    let outcome = orchestrator.chat_turn("t-replay", "답변입니다.", 30).await.unwrap();
    assert_eq!(
        outcome.state.answer_metadata.len(),
        before.answer_metadata.len() + 1
    );

    // Resume after a disconnect: the latest checkpoint carries the turn.
    let restored = orchestrator.latest_state("t-replay").await.unwrap();
    assert_eq!(restored.answer_metadata.len(), outcome.state.answer_metadata.len());
    assert_eq!(restored.remaining_time_s, 470);

    env.provider.push_generation(ANALYSIS_55);
    env.provider.push_generation(FOLLOW_UP_Q);
    let outcome = orchestrator.chat_turn("t-replay", "답변입니다.", 30).await.unwrap();
    assert_eq!(outcome.state.answer_metadata.len(), restored.answer_metadata.len() + 1);
    assert_eq!(outcome.state.follow_up_count, 2);
}

#[tokio::test]
async fn unknown_thread_is_session_not_found() {
    let env = test_env().await;
    let err = orchestrator(&env)
        .chat_turn("ghost-thread", "답변", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::SessionNotFound { .. }));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn audio_turn_transcribes_and_renders_the_next_question() {
    let env = test_env().await;
    let record_id = env.ready_record(&[Category::Grades]).await;
    seed_thread(&env, "t-audio", record_id, mid_interview_state(record_id, 1)).await;

    env.provider.push_generation(ANALYSIS_55);
    env.provider.push_generation(FOLLOW_UP_Q);

    let outcome = orchestrator(&env)
        .chat_turn_audio("t-audio", b"webm-bytes", "audio/webm", 33)
        .await
        .unwrap();

    // The mock transcription fed the normal turn pipeline.
    assert_eq!(outcome.turn.state.last_answer(), Some("모의 전사 결과입니다."));
    let key = outcome.audio_key.unwrap();
    assert_eq!(key, "tts/t-audio/1.mp3");
    assert!(!env.blobs.get_blob(&key).await.unwrap().is_empty());
}

/// Provider wrapper that stalls generations so a turn stays in flight.
struct SlowProvider {
    inner: MockModelProvider,
    delay: Duration,
}

#[async_trait]
impl ModelProvider for SlowProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate(request).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.inner.embed(text).await
    }

    async fn transcribe(&self, audio: &[u8], mime: &str) -> Result<String, ProviderError> {
        self.inner.transcribe(audio, mime).await
    }
}

#[tokio::test]
async fn concurrent_turn_on_one_thread_is_rejected() {
    let env = test_env().await;
    let record_id = env.ready_record(&[Category::Grades]).await;
    seed_thread(&env, "t-race", record_id, mid_interview_state(record_id, 1)).await;

    env.provider.push_generation(ANALYSIS_55);
    env.provider.push_generation(FOLLOW_UP_Q);
    let slow_gateway = ModelGateway::new(
        Arc::new(SlowProvider {
            inner: env.provider.clone(),
            delay: Duration::from_millis(300),
        }),
        &env.settings,
    );
    let orchestrator = orchestrator_with_gateway(&env, slow_gateway);

    let racer = orchestrator.clone();
    let first = tokio::spawn(async move { racer.chat_turn("t-race", "첫 답변", 10).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = orchestrator
        .chat_turn("t-race", "두 번째 답변", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TurnInFlight { .. }));
    assert_eq!(err.status_code(), 409);

    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.state.follow_up_count, 1);
}
