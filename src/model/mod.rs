//! Model gateway: structured LLM calls, embeddings, and speech-to-text
//! behind one policy layer.

pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod provider;
pub mod schemas;

pub use gateway::{ModelCall, ModelError, ModelGateway};
pub use gemini::GeminiProvider;
pub use mock::{FlakyProvider, MockModelProvider};
pub use provider::{GenerateRequest, MediaPart, ModelProvider, ProviderError};
pub use schemas::{
    AnswerAnalysis, AnswerReview, ExtractedChunk, GeneratedQuestion, NextQuestion, PageExtraction,
    QuestionBatch, ReportScores, SchemaPayload, WrapUpReport, MAX_QUESTIONS_PER_CATEGORY,
    MAX_QUESTION_CHARS,
};
