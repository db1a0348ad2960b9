//! Session registry: identity, status, aggregate statistics, and the final
//! report of every interview session.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::error::{CoreError, Result};
use crate::interview::state::AnswerRecord;
use crate::store::checkpoints::CheckpointStore;
use crate::types::{Difficulty, SessionStatus};

/// One interview session row.
#[derive(Clone, Debug)]
pub struct SessionRow {
    pub id: i64,
    pub thread_id: String,
    pub user_id: i64,
    pub record_id: i64,
    pub difficulty: Difficulty,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub avg_response_time: Option<f64>,
    pub total_questions: Option<i64>,
    pub total_duration: Option<i64>,
    pub final_report: Option<serde_json::Value>,
}

/// Aggregate statistics written at completion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionStats {
    pub total_questions: i64,
    pub avg_response_time: f64,
}

#[derive(Clone)]
pub struct SessionRegistry {
    pool: SqlitePool,
}

impl SessionRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a session in IN_PROGRESS; returns the session id.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        thread_id: &str,
        user_id: i64,
        record_id: i64,
        difficulty: Difficulty,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (thread_id, user_id, record_id, difficulty, status, started_at)
            VALUES (?1, ?2, ?3, ?4, 'IN_PROGRESS', ?5)
            "#,
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(record_id)
        .bind(difficulty.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Complete a session with its stats and final report.
    /// `total_duration` is derived as completed − started, in whole seconds.
    #[instrument(skip(self, stats, report))]
    pub async fn complete(
        &self,
        session_id: i64,
        stats: SessionStats,
        report: &serde_json::Value,
    ) -> Result<()> {
        let session = self.get(session_id).await?;
        let completed_at = Utc::now();
        let total_duration = (completed_at - session.started_at).num_seconds().max(0);
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'COMPLETED',
                completed_at = ?1,
                avg_response_time = ?2,
                total_questions = ?3,
                total_duration = ?4,
                final_report = ?5
            WHERE id = ?6
            "#,
        )
        .bind(completed_at.to_rfc3339())
        .bind(stats.avg_response_time)
        .bind(stats.total_questions)
        .bind(total_duration)
        .bind(report.to_string())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::SessionNotFound {
                thread_id: format!("session:{session_id}"),
            });
        }
        Ok(())
    }

    /// Mark a session abandoned.
    #[instrument(skip(self))]
    pub async fn abandon(&self, session_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'ABANDONED', completed_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::SessionNotFound {
                thread_id: format!("session:{session_id}"),
            });
        }
        Ok(())
    }

    /// Fetch one session by id.
    pub async fn get(&self, session_id: i64) -> Result<SessionRow> {
        let row = sqlx::query(SELECT_SESSION)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound {
                thread_id: format!("session:{session_id}"),
            })?;
        row_to_session(&row)
    }

    /// Fetch one session by its externally visible thread id.
    pub async fn get_by_thread(&self, thread_id: &str) -> Result<SessionRow> {
        let row = sqlx::query(
            r#"
            SELECT id, thread_id, user_id, record_id, difficulty, status, started_at,
                   completed_at, avg_response_time, total_questions, total_duration, final_report
            FROM sessions WHERE thread_id = ?1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::SessionNotFound {
            thread_id: thread_id.to_string(),
        })?;
        row_to_session(&row)
    }

    /// Sessions owned by a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, thread_id, user_id, record_id, difficulty, status, started_at,
                   completed_at, avg_response_time, total_questions, total_duration, final_report
            FROM sessions WHERE user_id = ?1 ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_session).collect()
    }

    /// Ordered answer log of a session, reconstructed from the latest
    /// checkpoint of its thread.
    pub async fn get_logs(&self, session_id: i64) -> Result<Vec<AnswerRecord>> {
        let session = self.get(session_id).await?;
        let checkpoint = CheckpointStore::new(self.pool.clone())
            .load_latest(&session.thread_id)
            .await?;
        Ok(checkpoint.state.answer_metadata)
    }
}

const SELECT_SESSION: &str = r#"
SELECT id, thread_id, user_id, record_id, difficulty, status, started_at,
       completed_at, avg_response_time, total_questions, total_duration, final_report
FROM sessions WHERE id = ?1
"#;

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRow> {
    let difficulty_raw: String = row.get("difficulty");
    let difficulty = Difficulty::parse(&difficulty_raw).ok_or_else(|| {
        CoreError::Storage(sqlx::Error::Decode(
            format!("unknown session difficulty '{difficulty_raw}'").into(),
        ))
    })?;
    let status_raw: String = row.get("status");
    let status = SessionStatus::parse(&status_raw).ok_or_else(|| {
        CoreError::Storage(sqlx::Error::Decode(
            format!("unknown session status '{status_raw}'").into(),
        ))
    })?;
    let started_raw: String = row.get("started_at");
    let started_at = parse_timestamp(&started_raw)?;
    let completed_at = row
        .get::<Option<String>, _>("completed_at")
        .map(|raw| parse_timestamp(&raw))
        .transpose()?;
    let final_report = row
        .get::<Option<String>, _>("final_report")
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;
    Ok(SessionRow {
        id: row.get("id"),
        thread_id: row.get("thread_id"),
        user_id: row.get("user_id"),
        record_id: row.get("record_id"),
        difficulty,
        status,
        started_at,
        completed_at,
        avg_response_time: row.get("avg_response_time"),
        total_questions: row.get("total_questions"),
        total_duration: row.get("total_duration"),
        final_report,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            CoreError::Storage(sqlx::Error::Decode(
                format!("bad timestamp '{raw}': {err}").into(),
            ))
        })
}
