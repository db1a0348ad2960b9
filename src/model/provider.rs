//! Provider seam for the external generative, embedding, and speech models.
//!
//! The gateway talks to providers exclusively through [`ModelProvider`], an
//! object-safe async trait. Production deployments use the Gemini
//! implementation in [`crate::model::gemini`]; tests use the deterministic
//! mock in [`crate::model::mock`].

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Binary attachment sent alongside a prompt (page images, audio clips).
#[derive(Clone, Debug)]
pub struct MediaPart {
    /// MIME type, e.g. `image/png` or `audio/webm`.
    pub mime_type: String,
    /// Raw bytes; providers encode these as required by their wire format.
    pub data: Vec<u8>,
}

/// A structured generation request.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Binary parts appended after the prompt.
    pub media: Vec<MediaPart>,
    /// Response schema the provider must honor (provider-native JSON shape).
    /// `None` requests plain text.
    pub schema: Option<Value>,
    /// Sampling temperature; `None` uses the provider default.
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: Vec<MediaPart>) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Transport-level failures reported by a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the provider.
    #[error("provider returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// The response envelope could not be read (missing candidates, bad
    /// encoding). Distinct from schema violations, which the gateway owns.
    #[error("malformed provider response: {0}")]
    Envelope(String),
}

impl ProviderError {
    /// Whether the gateway should retry this failure with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Status { code, .. } => *code == 429 || *code >= 500,
            ProviderError::Envelope(_) => false,
        }
    }
}

/// External model capabilities behind one object-safe seam.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Issue a generation request and return the raw response text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError>;

    /// Embed a text into a dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Transcribe an audio clip to text.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_status_class() {
        assert!(ProviderError::Transport("timeout".into()).is_retryable());
        assert!(ProviderError::Status {
            code: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(ProviderError::Status {
            code: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::Status {
            code: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::Envelope("no candidates".into()).is_retryable());
    }
}
