//! Object-storage seam and key layout.
//!
//! The core never talks to S3 directly; it sees this trait. Keys follow the
//! upload convention `users/{user_id}/records/{uuid}_{file}.pdf` for source
//! PDFs and `tts/{thread_id}/{turn}.mp3` for rendered question audio.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

/// Object-storage failures.
#[derive(Debug, Error, Diagnostic)]
pub enum BlobError {
    /// The key does not exist or access was denied. Not retried.
    #[error("blob not found: {key}")]
    #[diagnostic(code(susi::blob::not_found))]
    NotFound { key: String },

    /// Backend I/O failure.
    #[error("blob backend error: {0}")]
    #[diagnostic(code(susi::blob::backend))]
    Backend(String),
}

/// Narrow interface to the external object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_blob(&self, key: &str) -> Result<Vec<u8>, BlobError>;
    async fn put_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError>;
}

/// Key for an uploaded life-record PDF.
pub fn record_key(user_id: i64, file_name: &str) -> String {
    format!(
        "users/{user_id}/records/{}_{file_name}",
        Uuid::new_v4().simple()
    )
}

/// Key for a rendered question audio clip.
pub fn tts_key(thread_id: &str, turn: usize) -> String {
    format!("tts/{thread_id}/{turn}.mp3")
}

/// In-memory store for tests and offline runs.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob ahead of a test run.
    pub fn with_blob(self, key: &str, bytes: Vec<u8>) -> Self {
        self.blobs
            .lock()
            .expect("blob map poisoned")
            .insert(key.to_string(), bytes);
        self
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .lock()
            .expect("blob map poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_blob(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .expect("blob map poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .expect("blob map poisoned")
            .insert(key.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let key = record_key(7, "생활기록부.pdf");
        assert!(key.starts_with("users/7/records/"));
        assert!(key.ends_with("_생활기록부.pdf"));
        assert_eq!(tts_key("thread-9", 3), "tts/thread-9/3.mp3");
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryObjectStore::new();
        store.put_blob("a/b", vec![1, 2]).await.unwrap();
        assert_eq!(store.get_blob("a/b").await.unwrap(), vec![1, 2]);
        assert!(matches!(
            store.get_blob("missing").await.unwrap_err(),
            BlobError::NotFound { .. }
        ));
    }
}
