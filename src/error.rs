//! The crate-wide error ladder.
//!
//! Every public operation surfaces one of these variants. Each variant maps
//! to a fixed HTTP status via [`CoreError::status_code`] so routing glue can
//! translate failures mechanically: 400 for malformed input, 404 for missing
//! records/sessions, 409 for precondition failures, 500 for everything
//! internal.

use miette::Diagnostic;
use thiserror::Error;

use crate::model::ModelError;

/// Unified error type for the core subsystems.
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    /// Missing or ill-typed input. Not retried.
    #[error("invalid request: {0}")]
    #[diagnostic(code(susi::invalid_request))]
    InvalidRequest(String),

    /// A referenced record does not exist.
    #[error("record {record_id} not found")]
    #[diagnostic(code(susi::record_not_found))]
    RecordNotFound { record_id: i64 },

    /// No checkpoint history exists for the given interview thread.
    #[error("session not found for thread {thread_id}")]
    #[diagnostic(code(susi::session_not_found))]
    SessionNotFound { thread_id: String },

    /// An operation required a READY record but found another status.
    #[error("record {record_id} is not ready (status: {status})")]
    #[diagnostic(
        code(susi::record_not_ready),
        help("Run ingestion to completion before generating questions or interviewing.")
    )]
    RecordNotReady { record_id: i64, status: String },

    /// A second turn arrived while one was already in flight for the thread.
    #[error("a turn is already in flight for thread {thread_id}")]
    #[diagnostic(code(susi::turn_in_flight))]
    TurnInFlight { thread_id: String },

    /// Model produced output that failed schema validation after retries.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    /// Relational store failure.
    #[error("storage error: {0}")]
    #[diagnostic(code(susi::storage))]
    Storage(#[from] sqlx::Error),

    /// Schema migration failure at startup.
    #[error("migration error: {0}")]
    #[diagnostic(code(susi::migrate))]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Persisted state could not be encoded or decoded.
    #[error("state serialization error: {0}")]
    #[diagnostic(code(susi::state_codec))]
    StateCodec(#[from] serde_json::Error),

    /// Object-storage failure (fetch or put).
    #[error(transparent)]
    #[diagnostic(code(susi::blob))]
    Blob(#[from] crate::blob::BlobError),

    /// PDF page rasterization failure.
    #[error(transparent)]
    #[diagnostic(code(susi::raster))]
    Raster(#[from] crate::ingest::raster::RasterError),

    /// A background worker task failed to join.
    #[error("background task failed: {0}")]
    #[diagnostic(code(susi::task))]
    Task(String),

    /// Speech synthesis failure.
    #[error(transparent)]
    #[diagnostic(code(susi::speech))]
    Speech(#[from] crate::audio::SpeechError),

    /// The task observed its cooperative cancellation signal.
    #[error("operation cancelled")]
    #[diagnostic(code(susi::cancelled))]
    Cancelled,
}

impl CoreError {
    /// Fixed HTTP status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::InvalidRequest(_) => 400,
            CoreError::RecordNotFound { .. } | CoreError::SessionNotFound { .. } => 404,
            CoreError::RecordNotReady { .. } | CoreError::TurnInFlight { .. } => 409,
            _ => 500,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
