//! Text-to-speech seam for the audio interview variant.
//!
//! The orchestrator renders each produced question to MP3 through this trait
//! and stores the bytes at `tts/{thread_id}/{turn}.mp3`. The production
//! binding lives outside the core; tests use [`FixedSpeechSynthesizer`].

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

/// Speech synthesis failures.
#[derive(Debug, Error, Diagnostic)]
pub enum SpeechError {
    #[error("speech backend error: {0}")]
    #[diagnostic(code(susi::speech::backend))]
    Backend(String),
}

/// Narrow interface to the external TTS service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` to MP3 bytes in the given language (e.g. `ko-KR`).
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SpeechError>;
}

/// Test synthesizer that returns a constant payload.
#[derive(Clone, Default)]
pub struct FixedSpeechSynthesizer;

#[async_trait]
impl SpeechSynthesizer for FixedSpeechSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>, SpeechError> {
        // Length-prefixed echo keeps the payload deterministic but
        // text-dependent, which is enough for pipeline assertions.
        let mut bytes = (text.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(text.as_bytes());
        Ok(bytes)
    }
}
