//! ```text
//! ObjectStore ──► IngestPipeline ──► ChunkStore ◄── QuestionGenPipeline
//!                     │                  ▲                 │
//!                     ▼                  │                 ▼
//!               ProgressStream    InterviewOrchestrator  QuestionStore
//!                                        │
//!                                        ├─► ModelGateway (LLM / embed / STT)
//!                                        └─► CheckpointStore + SessionRegistry
//! ```
//!
//! A personalized mock-interview service for Korean university-admission
//! candidates: a student's life-record PDF is ingested into a categorized
//! vector store, curated question sets are generated per category, and a
//! checkpointed state machine conducts the real-time interview itself —
//! scoring answers, probing deeper or switching topics, and producing a
//! final report. Long-running flows stream their progress as SSE-encodable
//! events.

pub mod audio;
pub mod blob;
pub mod config;
pub mod control;
pub mod error;
pub mod ingest;
pub mod interview;
pub mod message;
pub mod model;
pub mod progress;
pub mod qgen;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;

pub use config::Settings;
pub use error::{CoreError, Result};
pub use service::Service;
