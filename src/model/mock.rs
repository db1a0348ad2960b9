//! Deterministic providers for tests and offline runs.
//!
//! [`MockModelProvider`] replays a scripted queue of generations, produces
//! hash-derived embeddings (identical text → identical vector), and returns
//! a fixed transcription. [`FlakyProvider`] wraps another provider and fails
//! a configured number of calls first, for exercising the gateway's retry
//! policy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::provider::{GenerateRequest, ModelProvider, ProviderError};

/// Scripted provider: generations come from a FIFO queue.
#[derive(Clone)]
pub struct MockModelProvider {
    generations: Arc<Mutex<VecDeque<String>>>,
    transcription: String,
    embedding_dim: usize,
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self {
            generations: Arc::new(Mutex::new(VecDeque::new())),
            transcription: "모의 전사 결과입니다.".to_string(),
            embedding_dim: 768,
        }
    }

    /// Queue a canned generation response.
    #[must_use]
    pub fn with_generation(self, response: impl Into<String>) -> Self {
        self.generations
            .lock()
            .expect("generation queue poisoned")
            .push_back(response.into());
        self
    }

    /// Set the dimension of produced embeddings.
    #[must_use]
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Set the fixed transcription result.
    #[must_use]
    pub fn with_transcription(mut self, text: impl Into<String>) -> Self {
        self.transcription = text.into();
        self
    }

    /// Queue a canned generation on a shared handle (clones share the queue).
    pub fn push_generation(&self, response: impl Into<String>) {
        self.generations
            .lock()
            .expect("generation queue poisoned")
            .push_back(response.into());
    }

    /// Number of scripted generations not yet consumed.
    pub fn remaining_generations(&self) -> usize {
        self.generations
            .lock()
            .expect("generation queue poisoned")
            .len()
    }

    /// Deterministic pseudo-embedding: an FNV-style hash of the text seeds a
    /// simple linear-congruential sequence, normalized to unit length.
    pub fn embedding_for(text: &str, dim: usize) -> Vec<f32> {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut state = hash | 1;
        let mut vector = Vec::with_capacity(dim);
        for _ in 0..dim {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            // Map the top bits into [-1.0, 1.0).
            let unit = ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0;
            vector.push(unit);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String, ProviderError> {
        self.generations
            .lock()
            .expect("generation queue poisoned")
            .pop_front()
            .ok_or_else(|| ProviderError::Envelope("mock generation queue exhausted".into()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(Self::embedding_for(text, self.embedding_dim))
    }

    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String, ProviderError> {
        Ok(self.transcription.clone())
    }
}

/// Wrapper that fails the first `failures` calls with a retryable transport
/// error, then delegates.
pub struct FlakyProvider<P> {
    inner: P,
    remaining_failures: AtomicU32,
}

impl<P> FlakyProvider<P> {
    pub fn new(inner: P, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
        }
    }

    fn should_fail(&self) -> bool {
        self.remaining_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<P: ModelProvider> ModelProvider for FlakyProvider<P> {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, ProviderError> {
        if self.should_fail() {
            return Err(ProviderError::Transport("injected failure".into()));
        }
        self.inner.generate(request).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if self.should_fail() {
            return Err(ProviderError::Transport("injected failure".into()));
        }
        self.inner.embed(text).await
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, ProviderError> {
        if self.should_fail() {
            return Err(ProviderError::Transport("injected failure".into()));
        }
        self.inner.transcribe(audio, mime_type).await
    }
}
