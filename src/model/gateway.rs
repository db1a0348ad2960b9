//! The model gateway: structured generation, embeddings, and transcription
//! with a uniform retry, timeout, and concurrency discipline.
//!
//! Policy lives here, not in providers:
//!
//! - every provider call runs under a per-call deadline and a global
//!   concurrency cap (one semaphore across all pipelines);
//! - retryable transport failures back off exponentially with full jitter,
//!   capped at the configured maximum;
//! - structured outputs are decoded into a typed payload and value-checked;
//!   a violation re-asks with a deterministic reformat suffix up to the
//!   retry bound, then surfaces [`ModelError::Schema`] with the offending
//!   payload logged;
//! - a failed call never leaks partial text to callers.

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use rand::Rng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{instrument, warn};

use crate::config::Settings;

use super::provider::{GenerateRequest, ModelProvider, ProviderError};
use super::schemas::SchemaPayload;

/// Suffix appended to the prompt when a response violated its schema.
const REFORMAT_SUFFIX: &str = "\n\n직전 응답이 요구한 JSON 스키마와 일치하지 않았습니다. \
추가 설명 없이, 스키마의 필수 필드를 모두 채운 JSON 객체만 다시 출력하세요.";

/// Gateway-level failures after policy has been applied.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    /// Structured output stayed invalid through every re-ask.
    #[error("model output for `{label}` failed schema validation: {reason}")]
    #[diagnostic(
        code(susi::model::schema),
        help("The offending payload is logged at error level; inspect the call-site schema.")
    )]
    Schema {
        label: &'static str,
        reason: String,
        payload: String,
    },

    /// Transport kept failing through every retry.
    #[error("model call `{label}` failed after {attempts} attempts: {last}")]
    #[diagnostic(code(susi::model::exhausted))]
    Exhausted {
        label: &'static str,
        attempts: u32,
        last: String,
    },

    /// Non-retryable provider failure.
    #[error("model call `{label}` failed: {source}")]
    #[diagnostic(code(susi::model::provider))]
    Provider {
        label: &'static str,
        source: ProviderError,
    },

    /// The embedding model returned a vector of the wrong dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(code(susi::model::dimension))]
    Dimension { expected: usize, actual: usize },
}

/// A labeled structured-generation call.
#[derive(Clone, Debug)]
pub struct ModelCall {
    /// Call-site label used in logs and errors (e.g. `"ocr_batch"`).
    pub label: &'static str,
    pub request: GenerateRequest,
}

impl ModelCall {
    pub fn new(label: &'static str, request: GenerateRequest) -> Self {
        Self { label, request }
    }
}

/// Shared wrapper around the external models.
///
/// Cheap to clone; all clones share the provider and the global concurrency
/// cap.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    embedding_dim: usize,
}

impl ModelGateway {
    /// Global cap on concurrent provider calls across the process.
    pub const MAX_CONCURRENT_CALLS: usize = 8;

    pub fn new(provider: Arc<dyn ModelProvider>, settings: &Settings) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(Self::MAX_CONCURRENT_CALLS)),
            call_timeout: settings.model_call_timeout,
            max_retries: settings.model_max_retries,
            backoff_base: settings.backoff_base,
            backoff_max: settings.backoff_max,
            embedding_dim: settings.embedding_dim,
        }
    }

    /// The fixed embedding dimension, constant for the process lifetime.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Full-jitter backoff delay for the given (0-based) attempt.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_base
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.backoff_max);
        let cap = exp.as_millis() as u64;
        if cap == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
    }

    /// Run one provider call under the deadline and concurrency cap,
    /// retrying retryable failures with backoff.
    async fn call_with_retry<T, F, Fut>(
        &self,
        label: &'static str,
        mut call: F,
    ) -> Result<T, ModelError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = {
                // Permit scope covers only the in-flight call, never the
                // backoff sleep.
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| ModelError::Exhausted {
                        label,
                        attempts: attempt,
                        last: "gateway semaphore closed".into(),
                    })?;
                match timeout(self.call_timeout, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Transport(format!(
                        "call exceeded {}ms deadline",
                        self.call_timeout.as_millis()
                    ))),
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(label, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying model call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(ModelError::Exhausted {
                        label,
                        attempts: attempt + 1,
                        last: err.to_string(),
                    });
                }
                Err(err) => return Err(ModelError::Provider { label, source: err }),
            }
        }
    }

    /// Issue a structured generation and decode it into the call-site
    /// payload type. Schema violations re-ask up to the retry bound.
    #[instrument(skip(self, call), fields(label = call.label))]
    pub async fn generate_json<T: SchemaPayload>(&self, call: ModelCall) -> Result<T, ModelError> {
        let label = call.label;
        let mut request = call.request.with_schema(T::schema());
        let mut schema_attempts = 0u32;

        loop {
            let text = self
                .call_with_retry(label, || {
                    let request = request.clone();
                    let provider = Arc::clone(&self.provider);
                    async move { provider.generate(&request).await }
                })
                .await?;

            match decode_payload::<T>(&text) {
                Ok(payload) => return Ok(payload),
                Err(reason) if schema_attempts < self.max_retries => {
                    warn!(label, %reason, "schema violation, re-asking with reformat prompt");
                    schema_attempts += 1;
                    if !request.prompt.ends_with(REFORMAT_SUFFIX) {
                        request.prompt.push_str(REFORMAT_SUFFIX);
                    }
                }
                Err(reason) => {
                    tracing::error!(label, %reason, payload = %text, "structured output invalid after retries");
                    return Err(ModelError::Schema {
                        label,
                        reason,
                        payload: text,
                    });
                }
            }
        }
    }

    /// Embed a text into a dense vector of the declared dimension.
    #[instrument(skip(self, text))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let vector = self
            .call_with_retry("embed", || {
                let provider = Arc::clone(&self.provider);
                let text = text.to_string();
                async move { provider.embed(&text).await }
            })
            .await?;
        if vector.len() != self.embedding_dim {
            return Err(ModelError::Dimension {
                expected: self.embedding_dim,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Transcribe an audio clip to text.
    #[instrument(skip(self, audio))]
    pub async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ModelError> {
        self.call_with_retry("transcribe", || {
            let provider = Arc::clone(&self.provider);
            let audio = audio.to_vec();
            let mime_type = mime_type.to_string();
            async move { provider.transcribe(&audio, &mime_type).await }
        })
        .await
    }
}

fn decode_payload<T: SchemaPayload>(text: &str) -> Result<T, String> {
    let payload: T = serde_json::from_str(text).map_err(|err| err.to_string())?;
    payload.check()?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock::{FlakyProvider, MockModelProvider};
    use crate::model::schemas::NextQuestion;

    fn fast_settings() -> Settings {
        Settings {
            model_max_retries: 2,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
            model_call_timeout: Duration::from_millis(1_000),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn generate_json_decodes_valid_payload() {
        let provider = MockModelProvider::new().with_generation(r#"{"question":"왜 그렇게 생각했나요?"}"#);
        let gateway = ModelGateway::new(Arc::new(provider), &fast_settings());

        let call = ModelCall::new("next_question", GenerateRequest::text("질문을 생성하세요."));
        let payload: NextQuestion = gateway.generate_json(call).await.unwrap();
        assert_eq!(payload.question, "왜 그렇게 생각했나요?");
    }

    #[tokio::test]
    async fn schema_violation_reasks_then_succeeds() {
        let provider = MockModelProvider::new()
            .with_generation("이건 JSON이 아닙니다")
            .with_generation(r#"{"question":"구체적인 사례가 있나요?"}"#);
        let gateway = ModelGateway::new(Arc::new(provider), &fast_settings());

        let call = ModelCall::new("next_question", GenerateRequest::text("질문"));
        let payload: NextQuestion = gateway.generate_json(call).await.unwrap();
        assert_eq!(payload.question, "구체적인 사례가 있나요?");
    }

    #[tokio::test]
    async fn schema_violation_exhausts_into_schema_error() {
        let provider = MockModelProvider::new()
            .with_generation("bad")
            .with_generation("still bad")
            .with_generation("forever bad");
        let gateway = ModelGateway::new(Arc::new(provider), &fast_settings());

        let call = ModelCall::new("next_question", GenerateRequest::text("질문"));
        let err = gateway.generate_json::<NextQuestion>(call).await.unwrap_err();
        match err {
            ModelError::Schema { label, payload, .. } => {
                assert_eq!(label, "next_question");
                assert_eq!(payload, "forever bad");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_with_backoff() {
        let inner = MockModelProvider::new().with_generation(r#"{"question":"성공"}"#);
        let provider = FlakyProvider::new(inner, 2);
        let gateway = ModelGateway::new(Arc::new(provider), &fast_settings());

        let call = ModelCall::new("next_question", GenerateRequest::text("질문"));
        let payload: NextQuestion = gateway.generate_json(call).await.unwrap();
        assert_eq!(payload.question, "성공");
    }

    #[tokio::test]
    async fn transient_failures_exhaust() {
        let inner = MockModelProvider::new().with_generation(r#"{"question":"도달 불가"}"#);
        let provider = FlakyProvider::new(inner, 10);
        let gateway = ModelGateway::new(Arc::new(provider), &fast_settings());

        let call = ModelCall::new("next_question", GenerateRequest::text("질문"));
        let err = gateway.generate_json::<NextQuestion>(call).await.unwrap_err();
        assert!(matches!(err, ModelError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn embed_checks_dimension() {
        let provider = MockModelProvider::new().with_embedding_dim(32);
        let mut settings = fast_settings();
        settings.embedding_dim = 32;
        let gateway = ModelGateway::new(Arc::new(provider.clone()), &settings);
        let vector = gateway.embed("출결 상황").await.unwrap();
        assert_eq!(vector.len(), 32);

        settings.embedding_dim = 64;
        let gateway = ModelGateway::new(Arc::new(provider), &settings);
        let err = gateway.embed("출결 상황").await.unwrap_err();
        assert!(matches!(
            err,
            ModelError::Dimension {
                expected: 64,
                actual: 32
            }
        ));
    }

    #[test]
    fn backoff_is_capped() {
        let settings = Settings {
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(300),
            ..Settings::default()
        };
        let gateway = ModelGateway::new(Arc::new(MockModelProvider::new()), &settings);
        for attempt in 0..12 {
            assert!(gateway.backoff_delay(attempt) <= Duration::from_millis(300));
        }
    }
}
