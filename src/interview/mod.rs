//! The real-time interview subsystem: checkpointed state, graph nodes, and
//! the per-thread orchestrator.

pub mod nodes;
pub mod orchestrator;
pub mod state;

pub use nodes::InterviewNodes;
pub use orchestrator::{AudioTurnOutcome, InterviewOrchestrator, TurnOutcome};
pub use state::{
    axis_for_topic, topic_guideline, AnswerRecord, Axis, Evaluation, Grade, InterviewState,
    NextAction, RoutingConfig, Stage, OPENING_QUESTION, SUB_TOPICS,
};
