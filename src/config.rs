//! Environment-driven configuration for the interview service.
//!
//! All knobs are read from the process environment (with `.env` support via
//! `dotenvy`) and fall back to the documented defaults. The settings struct
//! is cheap to clone and threaded through the pipelines and the orchestrator
//! at construction time.

use std::time::Duration;

/// Runtime settings shared by the pipelines, the model gateway, and the
/// interview orchestrator.
#[derive(Clone, Debug)]
pub struct Settings {
    /// SQLite connection URL, e.g. `sqlite://susi.db`.
    pub database_url: String,
    /// Fixed dimensionality of embedding vectors.
    pub embedding_dim: usize,
    /// Pages per OCR batch during ingestion.
    pub ingest_batch_pages: usize,
    /// Worker-pool width for per-chunk embedding during ingestion.
    pub ingest_parallelism: usize,
    /// Worker-pool width for per-category question generation.
    pub qgen_parallelism: usize,
    /// Per-call deadline for generative/embedding/STT requests.
    pub model_call_timeout: Duration,
    /// Bounded retries for transient transport failures and schema re-asks.
    pub model_max_retries: u32,
    /// Base delay for exponential backoff.
    pub backoff_base: Duration,
    /// Cap applied to the backoff delay before jitter.
    pub backoff_max: Duration,
    /// Total interview time budget in seconds.
    pub interview_total_time_s: u32,
    /// Remaining-time threshold below which the interview wraps up.
    pub interview_wrap_up_threshold_s: u32,
    /// Maximum number of sub-topics covered before wrapping up.
    pub interview_max_topics: usize,
    /// Maximum consecutive follow-up probes on one sub-topic.
    pub interview_max_follow_ups: u32,
    /// Google API key for the production providers.
    pub google_api_key: String,
    /// Generative model identifier.
    pub generative_model: String,
    /// Embedding model identifier.
    pub embedding_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://susi.db".to_string(),
            embedding_dim: 768,
            ingest_batch_pages: 3,
            ingest_parallelism: 4,
            qgen_parallelism: 4,
            model_call_timeout: Duration::from_millis(60_000),
            model_max_retries: 3,
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_millis(8_000),
            interview_total_time_s: 600,
            interview_wrap_up_threshold_s: 30,
            interview_max_topics: 8,
            interview_max_follow_ups: 3,
            google_api_key: String::new(),
            generative_model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults for any
    /// unset variable. A `.env` file in the working directory is honored.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let d = Self::default();
        Self {
            database_url: env_string("DATABASE_URL", d.database_url),
            embedding_dim: env_parse("EMBEDDING_DIM", d.embedding_dim),
            ingest_batch_pages: env_parse("INGEST_BATCH_PAGES", d.ingest_batch_pages).max(1),
            ingest_parallelism: env_parse("INGEST_PARALLELISM", d.ingest_parallelism).max(1),
            qgen_parallelism: env_parse("QGEN_PARALLELISM", d.qgen_parallelism).max(1),
            model_call_timeout: Duration::from_millis(env_parse(
                "MODEL_CALL_TIMEOUT_MS",
                d.model_call_timeout.as_millis() as u64,
            )),
            model_max_retries: env_parse("MODEL_MAX_RETRIES", d.model_max_retries),
            backoff_base: Duration::from_millis(env_parse(
                "BACKOFF_BASE_MS",
                d.backoff_base.as_millis() as u64,
            )),
            backoff_max: Duration::from_millis(env_parse(
                "BACKOFF_MAX_MS",
                d.backoff_max.as_millis() as u64,
            )),
            interview_total_time_s: env_parse("INTERVIEW_TOTAL_TIME_S", d.interview_total_time_s),
            interview_wrap_up_threshold_s: env_parse(
                "INTERVIEW_WRAP_UP_THRESHOLD_S",
                d.interview_wrap_up_threshold_s,
            ),
            interview_max_topics: env_parse("INTERVIEW_MAX_TOPICS", d.interview_max_topics),
            interview_max_follow_ups: env_parse(
                "INTERVIEW_MAX_FOLLOW_UPS",
                d.interview_max_follow_ups,
            ),
            google_api_key: env_string("GOOGLE_API_KEY", d.google_api_key),
            generative_model: env_string("GENERATIVE_MODEL", d.generative_model),
            embedding_model: env_string("EMBEDDING_MODEL", d.embedding_model),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
