//! Life-record registry: lifecycle status and ownership.

use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::error::{CoreError, Result};
use crate::types::RecordStatus;

/// One stored life record.
#[derive(Clone, Debug)]
pub struct RecordRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub blob_key: String,
    pub target_school: Option<String>,
    pub target_major: Option<String>,
    pub interview_type: Option<String>,
    pub status: RecordStatus,
}

/// New record reported by a client after an upload.
#[derive(Clone, Debug)]
pub struct NewRecord {
    pub user_id: i64,
    pub title: String,
    pub blob_key: String,
    pub target_school: Option<String>,
    pub target_major: Option<String>,
    pub interview_type: Option<String>,
}

#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a freshly uploaded record in PENDING state.
    #[instrument(skip(self, record))]
    pub async fn create(&self, record: NewRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO records (user_id, title, blob_key, target_school, target_major, interview_type, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING')
            "#,
        )
        .bind(record.user_id)
        .bind(&record.title)
        .bind(&record.blob_key)
        .bind(&record.target_school)
        .bind(&record.target_major)
        .bind(&record.interview_type)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Fetch a record or fail with 404 semantics.
    pub async fn get(&self, record_id: i64) -> Result<RecordRow> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, blob_key, target_school, target_major, interview_type, status
            FROM records WHERE id = ?1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::RecordNotFound { record_id })?;

        let status_raw: String = row.get("status");
        let status = RecordStatus::parse(&status_raw).ok_or_else(|| {
            CoreError::Storage(sqlx::Error::Decode(
                format!("unknown record status '{status_raw}'").into(),
            ))
        })?;

        Ok(RecordRow {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            blob_key: row.get("blob_key"),
            target_school: row.get("target_school"),
            target_major: row.get("target_major"),
            interview_type: row.get("interview_type"),
            status,
        })
    }

    /// Move a record to a new lifecycle status. READY also stamps `ready_at`.
    #[instrument(skip(self))]
    pub async fn set_status(&self, record_id: i64, status: RecordStatus) -> Result<()> {
        let result = if status == RecordStatus::Ready {
            sqlx::query("UPDATE records SET status = ?1, ready_at = ?2 WHERE id = ?3")
                .bind(status.as_str())
                .bind(chrono::Utc::now().to_rfc3339())
                .bind(record_id)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query("UPDATE records SET status = ?1 WHERE id = ?2")
                .bind(status.as_str())
                .bind(record_id)
                .execute(&self.pool)
                .await?
        };
        if result.rows_affected() == 0 {
            return Err(CoreError::RecordNotFound { record_id });
        }
        Ok(())
    }

    /// Records owned by a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM records WHERE user_id = ?1 ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Delete a record; chunks, question sets, and sessions cascade.
    #[instrument(skip(self))]
    pub async fn delete(&self, record_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM records WHERE id = ?1")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::RecordNotFound { record_id });
        }
        Ok(())
    }
}
