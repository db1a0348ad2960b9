//! Per-thread checkpoint history for interview state.
//!
//! Every node execution appends one snapshot; ids are allocated inside the
//! insert transaction so they are strictly monotonically increasing per
//! thread. Any snapshot can be restored, and the latest one is authoritative
//! after a crash or cancelled turn.

use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::error::{CoreError, Result};
use crate::interview::state::InterviewState;

/// A restored snapshot.
#[derive(Clone, Debug)]
pub struct CheckpointRow {
    pub thread_id: String,
    pub checkpoint_id: i64,
    pub state: InterviewState,
}

#[derive(Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
}

impl CheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a snapshot; returns the allocated checkpoint id.
    #[instrument(skip(self, state))]
    pub async fn save(&self, thread_id: &str, state: &InterviewState) -> Result<i64> {
        let blob = serde_json::to_string(state)?;
        let mut tx = self.pool.begin().await?;
        let next_id: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(checkpoint_id), 0) + 1 FROM checkpoints WHERE thread_id = ?1",
        )
        .bind(thread_id)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO checkpoints (thread_id, checkpoint_id, state_blob) VALUES (?1, ?2, ?3)",
        )
        .bind(thread_id)
        .bind(next_id)
        .bind(&blob)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(next_id)
    }

    /// Latest snapshot for the thread; `SessionNotFound` if none exists.
    pub async fn load_latest(&self, thread_id: &str) -> Result<CheckpointRow> {
        let row = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, state_blob
            FROM checkpoints
            WHERE thread_id = ?1
            ORDER BY checkpoint_id DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::SessionNotFound {
            thread_id: thread_id.to_string(),
        })?;
        row_to_checkpoint(&row)
    }

    /// A specific snapshot, for rollback and replay.
    pub async fn load(&self, thread_id: &str, checkpoint_id: i64) -> Result<CheckpointRow> {
        let row = sqlx::query(
            r#"
            SELECT thread_id, checkpoint_id, state_blob
            FROM checkpoints
            WHERE thread_id = ?1 AND checkpoint_id = ?2
            "#,
        )
        .bind(thread_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::SessionNotFound {
            thread_id: thread_id.to_string(),
        })?;
        row_to_checkpoint(&row)
    }

    /// Checkpoint ids for the thread, ascending.
    pub async fn history(&self, thread_id: &str) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT checkpoint_id FROM checkpoints WHERE thread_id = ?1 ORDER BY checkpoint_id ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("checkpoint_id")).collect())
    }
}

fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<CheckpointRow> {
    let blob: String = row.get("state_blob");
    let state: InterviewState = serde_json::from_str(&blob)?;
    Ok(CheckpointRow {
        thread_id: row.get("thread_id"),
        checkpoint_id: row.get("checkpoint_id"),
        state,
    })
}
