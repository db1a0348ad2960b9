//! Question sets produced by the bulk generation pipeline.
//!
//! A set and its questions are written in one transaction and are immutable
//! afterwards.

use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::error::{CoreError, Result};
use crate::types::{Category, QuestionDifficulty};

/// Metadata of a question set.
#[derive(Clone, Debug)]
pub struct QuestionSetRow {
    pub id: i64,
    pub record_id: i64,
    pub target_school: String,
    pub target_major: String,
    pub interview_type: String,
    pub title: String,
}

/// One curated question belonging to a set.
#[derive(Clone, Debug)]
pub struct QuestionRow {
    pub id: i64,
    pub set_id: i64,
    pub category: Category,
    pub body: String,
    pub difficulty: QuestionDifficulty,
    pub model_answer: Option<String>,
    pub purpose: Option<String>,
}

/// A question pending insertion.
#[derive(Clone, Debug)]
pub struct NewQuestion {
    pub category: Category,
    pub body: String,
    pub difficulty: QuestionDifficulty,
    pub model_answer: Option<String>,
    pub purpose: Option<String>,
}

/// Set metadata pending insertion.
#[derive(Clone, Debug)]
pub struct NewQuestionSet {
    pub record_id: i64,
    pub target_school: String,
    pub target_major: String,
    pub interview_type: String,
    pub title: String,
}

#[derive(Clone)]
pub struct QuestionStore {
    pool: SqlitePool,
}

impl QuestionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the set and all of its questions atomically; returns the set id.
    #[instrument(skip(self, set, questions), fields(count = questions.len()))]
    pub async fn insert_set(&self, set: NewQuestionSet, questions: &[NewQuestion]) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO question_sets (record_id, target_school, target_major, interview_type, title)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(set.record_id)
        .bind(&set.target_school)
        .bind(&set.target_major)
        .bind(&set.interview_type)
        .bind(&set.title)
        .execute(&mut *tx)
        .await?;
        let set_id = result.last_insert_rowid();

        for question in questions {
            sqlx::query(
                r#"
                INSERT INTO questions (set_id, category, body, difficulty, model_answer, purpose)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(set_id)
            .bind(question.category.as_str())
            .bind(&question.body)
            .bind(question.difficulty.as_str())
            .bind(&question.model_answer)
            .bind(&question.purpose)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(set_id)
    }

    /// Fetch set metadata.
    pub async fn get_set(&self, set_id: i64) -> Result<Option<QuestionSetRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, record_id, target_school, target_major, interview_type, title
            FROM question_sets WHERE id = ?1
            "#,
        )
        .bind(set_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| QuestionSetRow {
            id: row.get("id"),
            record_id: row.get("record_id"),
            target_school: row.get("target_school"),
            target_major: row.get("target_major"),
            interview_type: row.get("interview_type"),
            title: row.get("title"),
        }))
    }

    /// All questions of a set, grouped by category declaration order and then
    /// insertion order.
    pub async fn list_questions(&self, set_id: i64) -> Result<Vec<QuestionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, set_id, category, body, difficulty, model_answer, purpose
            FROM questions WHERE set_id = ?1 ORDER BY id ASC
            "#,
        )
        .bind(set_id)
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            questions.push(row_to_question(row)?);
        }
        questions.sort_by_key(|q| {
            Category::ALL
                .iter()
                .position(|c| *c == q.category)
                .unwrap_or(Category::ALL.len())
        });
        Ok(questions)
    }

    /// Count of questions per category in a set.
    pub async fn count_by_category(&self, set_id: i64, category: Category) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE set_id = ?1 AND category = ?2")
                .bind(set_id)
                .bind(category.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}

fn row_to_question(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionRow> {
    let category_raw: String = row.get("category");
    let category = Category::parse(&category_raw).ok_or_else(|| {
        CoreError::Storage(sqlx::Error::Decode(
            format!("unknown question category '{category_raw}'").into(),
        ))
    })?;
    let difficulty_raw: String = row.get("difficulty");
    let difficulty = QuestionDifficulty::parse(&difficulty_raw).ok_or_else(|| {
        CoreError::Storage(sqlx::Error::Decode(
            format!("unknown question difficulty '{difficulty_raw}'").into(),
        ))
    })?;
    Ok(QuestionRow {
        id: row.get("id"),
        set_id: row.get("set_id"),
        category,
        body: row.get("body"),
        difficulty,
        model_answer: row.get("model_answer"),
        purpose: row.get("purpose"),
    })
}
