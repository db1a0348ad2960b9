//! Interview state: the checkpointed record threaded through every node.
//!
//! The state is an immutable-by-convention serde record; nodes consume a
//! state and return the next one, and the orchestrator persists each result
//! as a checkpoint. Routing is a pure function over the state so decisions
//! replay deterministically from any restored snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::types::Difficulty;

/// The fixed opening question every interview starts with.
pub const OPENING_QUESTION: &str = "자기소개 부탁드립니다.";

/// Conversational sub-topics, in selection order.
pub const SUB_TOPICS: [&str; 8] = [
    "출결",
    "성적",
    "동아리",
    "리더십",
    "인성/태도",
    "진로/자율",
    "독서",
    "봉사",
];

/// Answers scoring below this threshold invite a follow-up probe.
pub const FOLLOW_UP_SCORE_THRESHOLD: u32 = 60;

/// Per-topic guideline folded into the new-question prompt.
pub fn topic_guideline(topic: &str) -> &'static str {
    match topic {
        "출결" => "지각/결석 패턴과 사유, 성실성",
        "성적" => "전공 과목 성적 추이와 변화 이유",
        "동아리" => "프로젝트 내 역할과 기술적 해결 과정",
        "리더십" => "갈등 상황에서의 해결 메커니즘",
        "인성/태도" => "행특 기록 기반 본인의 대표 특성",
        "진로/자율" => "지원 전공 관심 계기와 활동 연결",
        "독서" => "도서가 가치관 및 탐구에 미친 영향",
        "봉사" => "활동의 지속성과 배운 점",
        _ => "관련 경험과 배운 점",
    }
}

/// Evaluation axis accumulated across the interview.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "전공적합성")]
    MajorFit,
    #[serde(rename = "인성")]
    Character,
    #[serde(rename = "발전가능성")]
    Growth,
    #[serde(rename = "의사소통")]
    Communication,
}

/// Fixed sub-topic → axis mapping. Topics outside the mapping (e.g. the
/// empty intro topic) contribute to no axis.
pub fn axis_for_topic(topic: &str) -> Option<Axis> {
    match topic {
        "성적" | "동아리" => Some(Axis::MajorFit),
        "리더십" | "인성/태도" | "봉사" => Some(Axis::Character),
        "진로/자율" | "독서" => Some(Axis::Growth),
        "출결" => Some(Axis::Communication),
        _ => None,
    }
}

/// Interview phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "INTRO")]
    Intro,
    #[serde(rename = "MAIN")]
    Main,
    #[serde(rename = "WRAP_UP")]
    WrapUp,
}

/// Closed routing decision made after each analyzed answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    FollowUp,
    NewTopic,
    WrapUp,
}

/// Qualitative grade derived from the numeric score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "좋음")]
    Good,
    #[serde(rename = "보통")]
    Average,
    #[serde(rename = "개선")]
    NeedsWork,
}

impl Grade {
    /// 좋음 ≥ 80, 보통 60..=79, 개선 < 60.
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => Grade::Good,
            60..=79 => Grade::Average,
            _ => Grade::NeedsWork,
        }
    }
}

/// Scored evaluation of one answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: u32,
    pub grade: Grade,
    pub feedback: String,
    pub strength_tags: Vec<String>,
    pub weakness_tags: Vec<String>,
}

/// One analyzed question/answer exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub response_time_s: u32,
    pub sub_topic: String,
    pub evaluation: Evaluation,
    /// Chunk bodies that grounded the question.
    pub context_used: Vec<String>,
}

/// Thresholds steering the analyzer's routing decision.
#[derive(Clone, Copy, Debug)]
pub struct RoutingConfig {
    pub wrap_up_threshold_s: u32,
    pub max_follow_ups: u32,
    pub max_topics: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            wrap_up_threshold_s: 30,
            max_follow_ups: 3,
            max_topics: 8,
        }
    }
}

/// The full checkpointed interview state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterviewState {
    pub record_id: i64,
    pub session_id: i64,
    pub difficulty: Difficulty,
    pub remaining_time_s: u32,
    pub stage: Stage,
    pub conversation_history: Vec<Message>,
    pub current_context: Vec<String>,
    pub current_sub_topic: String,
    pub asked_sub_topics: BTreeSet<String>,
    pub answer_metadata: Vec<AnswerRecord>,
    pub scores: BTreeMap<Axis, u32>,
    pub next_action: NextAction,
    pub follow_up_count: u32,
}

impl InterviewState {
    /// Fresh state seeded with the fixed opening question.
    pub fn new(record_id: i64, session_id: i64, difficulty: Difficulty, total_time_s: u32) -> Self {
        Self {
            record_id,
            session_id,
            difficulty,
            remaining_time_s: total_time_s,
            stage: Stage::Intro,
            conversation_history: vec![Message::interviewer(OPENING_QUESTION)],
            current_context: Vec::new(),
            current_sub_topic: String::new(),
            asked_sub_topics: BTreeSet::new(),
            answer_metadata: Vec::new(),
            scores: BTreeMap::new(),
            next_action: NextAction::NewTopic,
            follow_up_count: 0,
        }
    }

    /// Latest interviewer question, if any.
    pub fn last_question(&self) -> Option<&str> {
        self.conversation_history
            .iter()
            .rev()
            .find(|m| m.has_role(Message::INTERVIEWER))
            .map(|m| m.content.as_str())
    }

    /// Latest candidate answer, if any.
    pub fn last_answer(&self) -> Option<&str> {
        self.conversation_history
            .iter()
            .rev()
            .find(|m| m.has_role(Message::CANDIDATE))
            .map(|m| m.content.as_str())
    }

    /// Number of committed candidate turns.
    pub fn candidate_turns(&self) -> usize {
        self.conversation_history
            .iter()
            .filter(|m| m.has_role(Message::CANDIDATE))
            .count()
    }

    /// Transition: absorb a candidate answer, charging its response time
    /// against the clock (clamped at zero).
    #[must_use]
    pub fn with_candidate_answer(mut self, answer: &str, response_time_s: u32) -> Self {
        self.conversation_history.push(Message::candidate(answer));
        self.remaining_time_s = self.remaining_time_s.saturating_sub(response_time_s);
        self
    }

    /// Transition: append the next interviewer question.
    #[must_use]
    pub fn with_interviewer_question(mut self, question: &str) -> Self {
        self.conversation_history
            .push(Message::interviewer(question));
        self
    }

    /// Transition: record an analyzed answer and accumulate its score onto
    /// the mapped axis. Scores only ever grow.
    #[must_use]
    pub fn with_answer_record(mut self, record: AnswerRecord) -> Self {
        if let Some(axis) = axis_for_topic(&record.sub_topic) {
            *self.scores.entry(axis).or_insert(0) += record.evaluation.score;
        }
        self.answer_metadata.push(record);
        self
    }

    /// Transition: switch to a new sub-topic with freshly retrieved context.
    /// The previous topic (if any) is marked as covered and the follow-up
    /// counter resets.
    #[must_use]
    pub fn with_new_topic(mut self, topic: &str, context: Vec<String>) -> Self {
        if !self.current_sub_topic.is_empty() {
            self.asked_sub_topics.insert(self.current_sub_topic.clone());
        }
        self.current_sub_topic = topic.to_string();
        self.current_context = context;
        self.follow_up_count = 0;
        self.stage = Stage::Main;
        self
    }

    /// Sub-topics not yet covered and not currently active, in pool order.
    pub fn remaining_topics(&self) -> Vec<&'static str> {
        SUB_TOPICS
            .iter()
            .copied()
            .filter(|t| !self.asked_sub_topics.contains(*t) && self.current_sub_topic != *t)
            .collect()
    }

    /// The routing table, evaluated in order; first match wins.
    pub fn decide_next_action(&self, latest_score: u32, config: &RoutingConfig) -> NextAction {
        if self.remaining_time_s < config.wrap_up_threshold_s {
            NextAction::WrapUp
        } else if latest_score < FOLLOW_UP_SCORE_THRESHOLD
            && self.follow_up_count < config.max_follow_ups
        {
            NextAction::FollowUp
        } else if self.asked_sub_topics.len() >= config.max_topics {
            NextAction::WrapUp
        } else {
            NextAction::NewTopic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> InterviewState {
        InterviewState::new(1, 1, Difficulty::Normal, 600)
    }

    fn evaluation(score: u32) -> Evaluation {
        Evaluation {
            score,
            grade: Grade::from_score(score),
            feedback: "피드백".into(),
            strength_tags: vec![],
            weakness_tags: vec![],
        }
    }

    fn record(sub_topic: &str, score: u32) -> AnswerRecord {
        AnswerRecord {
            question: "질문".into(),
            answer: "답변".into(),
            response_time_s: 30,
            sub_topic: sub_topic.into(),
            evaluation: evaluation(score),
            context_used: vec![],
        }
    }

    #[test]
    fn grades_follow_score_bands() {
        assert_eq!(Grade::from_score(100), Grade::Good);
        assert_eq!(Grade::from_score(80), Grade::Good);
        assert_eq!(Grade::from_score(79), Grade::Average);
        assert_eq!(Grade::from_score(60), Grade::Average);
        assert_eq!(Grade::from_score(59), Grade::NeedsWork);
        assert_eq!(Grade::from_score(0), Grade::NeedsWork);
    }

    #[test]
    fn low_score_routes_to_follow_up() {
        let mut s = state();
        s.remaining_time_s = 500;
        s.current_sub_topic = "리더십".into();
        assert_eq!(
            s.decide_next_action(55, &RoutingConfig::default()),
            NextAction::FollowUp
        );
    }

    #[test]
    fn time_boundary_forces_wrap_up() {
        let mut s = state();
        s.remaining_time_s = 29;
        // Even a failing score cannot outrank the clock.
        assert_eq!(
            s.decide_next_action(10, &RoutingConfig::default()),
            NextAction::WrapUp
        );
        s.remaining_time_s = 30;
        assert_eq!(
            s.decide_next_action(10, &RoutingConfig::default()),
            NextAction::FollowUp
        );
    }

    #[test]
    fn exhausted_follow_ups_route_to_new_topic() {
        let mut s = state();
        s.remaining_time_s = 500;
        s.follow_up_count = 3;
        assert_eq!(
            s.decide_next_action(40, &RoutingConfig::default()),
            NextAction::NewTopic
        );
    }

    #[test]
    fn topic_budget_forces_wrap_up() {
        let mut s = state();
        s.remaining_time_s = 500;
        for topic in SUB_TOPICS {
            s.asked_sub_topics.insert(topic.to_string());
        }
        assert_eq!(
            s.decide_next_action(90, &RoutingConfig::default()),
            NextAction::WrapUp
        );
    }

    #[test]
    fn seven_topics_still_continue() {
        let mut s = state();
        s.remaining_time_s = 500;
        s.current_sub_topic = "리더십".into();
        for topic in SUB_TOPICS.iter().take(7) {
            s.asked_sub_topics.insert(topic.to_string());
        }
        assert_eq!(
            s.decide_next_action(90, &RoutingConfig::default()),
            NextAction::NewTopic
        );
    }

    #[test]
    fn scores_accumulate_per_axis() {
        let s = state()
            .with_answer_record(record("리더십", 70))
            .with_answer_record(record("봉사", 20))
            .with_answer_record(record("출결", 55))
            .with_answer_record(record("", 99)); // intro: no axis
        assert_eq!(s.scores.get(&Axis::Character), Some(&90));
        assert_eq!(s.scores.get(&Axis::Communication), Some(&55));
        assert_eq!(s.scores.get(&Axis::MajorFit), None);
        assert_eq!(s.answer_metadata.len(), 4);
    }

    #[test]
    fn clock_clamps_at_zero() {
        let s = state().with_candidate_answer("답", 700);
        assert_eq!(s.remaining_time_s, 0);
    }

    #[test]
    fn topic_switch_tracks_prior_topic() {
        let s = state().with_new_topic("리더십", vec!["동아리 회장 역임".into()]);
        assert!(s.asked_sub_topics.is_empty());
        assert_eq!(s.current_sub_topic, "리더십");
        assert_eq!(s.stage, Stage::Main);

        let s = s.with_new_topic("독서", vec![]);
        assert!(s.asked_sub_topics.contains("리더십"));
        assert_eq!(s.follow_up_count, 0);
        assert!(!s.remaining_topics().contains(&"리더십"));
        assert!(!s.remaining_topics().contains(&"독서"));
    }

    #[test]
    fn state_serialization_round_trips() {
        let s = state()
            .with_candidate_answer("안녕하세요", 40)
            .with_answer_record(record("성적", 80))
            .with_new_topic("성적", vec!["수학 1등급".into()]);
        let json = serde_json::to_string(&s).unwrap();
        let back: InterviewState = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn topic_axis_mapping_is_total_over_pool() {
        // Every pool topic except none maps; unknown topics map to nothing.
        assert_eq!(axis_for_topic("성적"), Some(Axis::MajorFit));
        assert_eq!(axis_for_topic("동아리"), Some(Axis::MajorFit));
        assert_eq!(axis_for_topic("리더십"), Some(Axis::Character));
        assert_eq!(axis_for_topic("인성/태도"), Some(Axis::Character));
        assert_eq!(axis_for_topic("봉사"), Some(Axis::Character));
        assert_eq!(axis_for_topic("진로/자율"), Some(Axis::Growth));
        assert_eq!(axis_for_topic("독서"), Some(Axis::Growth));
        assert_eq!(axis_for_topic("출결"), Some(Axis::Communication));
        assert_eq!(axis_for_topic("자기소개"), None);
    }
}
