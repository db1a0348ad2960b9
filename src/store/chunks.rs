//! The vector store: categorized chunk persistence and similarity lookup.
//!
//! Chunks are scoped to a record; searches never cross record boundaries.
//! Embeddings are stored as JSON arrays and ranked by cosine similarity
//! computed in-process — a record holds at most a few dozen chunks, so the
//! full scan stays cheap and the tie-break is exact: descending score, then
//! ascending `chunk_index`.

use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::error::{CoreError, Result};
use crate::types::Category;

/// A chunk ready for insertion.
#[derive(Clone, Debug)]
pub struct NewChunk {
    pub chunk_index: i64,
    pub text: String,
    pub category: Category,
    pub embedding: Vec<f32>,
}

/// A persisted chunk.
#[derive(Clone, Debug)]
pub struct StoredChunk {
    pub id: i64,
    pub record_id: i64,
    pub chunk_index: i64,
    pub text: String,
    pub category: Category,
    pub embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct ChunkStore {
    pool: SqlitePool,
}

impl ChunkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bulk-insert chunks for a record, all-or-none.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn put_chunks(&self, record_id: i64, chunks: &[NewChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            let embedding_json = serde_json::to_string(&chunk.embedding)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (record_id, chunk_index, text, category, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(record_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.category.as_str())
            .bind(&embedding_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All chunks of one category, ordered by `chunk_index`.
    pub async fn get_by_category(
        &self,
        record_id: i64,
        category: Category,
    ) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, record_id, chunk_index, text, category, embedding
            FROM chunks
            WHERE record_id = ?1 AND category = ?2
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(record_id)
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_chunk).collect()
    }

    /// Every chunk of the record, ordered by `chunk_index`.
    pub async fn get_all(&self, record_id: i64) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, record_id, chunk_index, text, category, embedding
            FROM chunks
            WHERE record_id = ?1
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_chunk).collect()
    }

    /// Categories present for the record, in the fixed declaration order.
    pub async fn categories(&self, record_id: i64) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT DISTINCT category FROM chunks WHERE record_id = ?1")
            .bind(record_id)
            .fetch_all(&self.pool)
            .await?;
        let mut present: Vec<Category> = Vec::new();
        for row in &rows {
            let raw: String = row.get("category");
            if let Some(category) = Category::parse(&raw) {
                present.push(category);
            }
        }
        let mut ordered: Vec<Category> = Category::ALL
            .iter()
            .copied()
            .filter(|c| present.contains(c))
            .collect();
        ordered.dedup();
        Ok(ordered)
    }

    /// Cosine-similarity search within one record, optionally filtered to a
    /// category. Returns up to `k` `(chunk, score)` pairs, best first; ties
    /// break by ascending `chunk_index`.
    #[instrument(skip(self, query_vec))]
    pub async fn search(
        &self,
        record_id: i64,
        query_vec: &[f32],
        k: usize,
        category: Option<Category>,
    ) -> Result<Vec<(StoredChunk, f32)>> {
        let candidates = match category {
            Some(category) => self.get_by_category(record_id, category).await?,
            None => self.get_all(record_id).await?,
        };

        let mut scored: Vec<(StoredChunk, f32)> = candidates
            .into_iter()
            .map(|chunk| {
                let score = cosine_similarity(query_vec, &chunk.embedding);
                (chunk, score)
            })
            .collect();
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa).then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Remove every chunk of the record. Returns the number deleted.
    #[instrument(skip(self))]
    pub async fn delete_by_record(&self, record_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE record_id = ?1")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of chunks stored for the record.
    pub async fn count(&self, record_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE record_id = ?1")
            .bind(record_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<StoredChunk> {
    let category_raw: String = row.get("category");
    let category = Category::parse(&category_raw).ok_or_else(|| {
        CoreError::Storage(sqlx::Error::Decode(
            format!("unknown chunk category '{category_raw}'").into(),
        ))
    })?;
    let embedding_json: String = row.get("embedding");
    let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
    Ok(StoredChunk {
        id: row.get("id"),
        record_id: row.get("record_id"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        category,
        embedding,
    })
}

/// Cosine similarity in [-1, 1]; zero-magnitude inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
