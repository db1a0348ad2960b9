//! Gemini-backed [`ModelProvider`] implementation.
//!
//! Talks to the Generative Language API over HTTPS: `generateContent` for
//! structured generation and STT (audio parts), `embedContent` for
//! embeddings. Responses are unwrapped down to the raw candidate text; retry
//! and schema policy live in the gateway, not here.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};

use async_trait::async_trait;

use super::provider::{GenerateRequest, MediaPart, ModelProvider, ProviderError};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Production provider over the Gemini REST API.
#[derive(Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    generative_model: String,
    embedding_model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        generative_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            generative_model: generative_model.into(),
            embedding_model: embedding_model.into(),
        }
    }

    fn generate_url(&self) -> String {
        format!(
            "{API_BASE}/models/{}:generateContent?key={}",
            self.generative_model, self.api_key
        )
    }

    fn embed_url(&self) -> String {
        format!(
            "{API_BASE}/models/{}:embedContent?key={}",
            self.embedding_model, self.api_key
        )
    }

    fn build_parts(prompt: &str, media: &[MediaPart]) -> Vec<Value> {
        let mut parts = vec![json!({ "text": prompt })];
        for part in media {
            parts.push(json!({
                "inline_data": {
                    "mime_type": part.mime_type,
                    "data": BASE64.encode(&part.data),
                }
            }));
        }
        parts
    }

    async fn post_generate(&self, body: Value) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let envelope: GenerateEnvelope = response
            .json()
            .await
            .map_err(|err| ProviderError::Envelope(err.to_string()))?;
        envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderError::Envelope("response carried no candidates".into()))
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        let mut generation_config = serde_json::Map::new();
        if let Some(schema) = &request.schema {
            generation_config.insert("response_mime_type".into(), json!("application/json"));
            generation_config.insert("response_schema".into(), schema.clone());
        }
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".into(), json!(temperature));
        }

        let body = json!({
            "contents": [{ "parts": Self::build_parts(&request.prompt, &request.media) }],
            "generationConfig": Value::Object(generation_config),
        });
        self.post_generate(body).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_DOCUMENT",
        });
        let response = self
            .http
            .post(self.embed_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let envelope: EmbedEnvelope = response
            .json()
            .await
            .map_err(|err| ProviderError::Envelope(err.to_string()))?;
        Ok(envelope.embedding.values)
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ProviderError> {
        // STT runs as a temperature-0 generation over the raw audio part.
        let request = GenerateRequest::text(
            "이 오디오는 면접 답변입니다. 내용을 그대로 텍스트로 변환해주세요.",
        )
        .with_media(vec![MediaPart {
            mime_type: mime_type.to_string(),
            data: audio.to_vec(),
        }])
        .with_temperature(0.0);

        let body = json!({
            "contents": [{ "parts": Self::build_parts(&request.prompt, &request.media) }],
            "generationConfig": { "temperature": 0.0 },
        });
        let text = self.post_generate(body).await?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateEnvelope {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedEnvelope {
    embedding: EmbedValues,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_carry_inline_media() {
        let parts = GeminiProvider::build_parts(
            "페이지를 추출하세요.",
            &[MediaPart {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
            }],
        );
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "페이지를 추출하세요.");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], BASE64.encode([1u8, 2, 3]));
    }

    #[test]
    fn envelope_unwraps_first_candidate() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "{\"question\":\"왜요?\"}" } ] } }
            ]
        }"#;
        let envelope: GenerateEnvelope = serde_json::from_str(raw).unwrap();
        let text = envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap();
        assert!(text.contains("왜요?"));
    }
}
