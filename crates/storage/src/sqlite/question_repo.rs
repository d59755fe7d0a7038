use sqlx::Row;

use quiz_core::model::{AssessmentId, Question};

use super::SqliteRepository;
use super::mapping::{id_i64, map_question_row, options_to_json, ser};
use crate::repository::{QuestionRepository, StorageError};

fn correct_option_i64(index: usize) -> Result<i64, StorageError> {
    i64::try_from(index).map_err(|_| StorageError::Serialization("correct_option overflow".into()))
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (
                id, assessment_id, prompt, options, correct_option,
                category, explanation, difficulty, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id, assessment_id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                prompt = excluded.prompt,
                options = excluded.options,
                correct_option = excluded.correct_option,
                category = excluded.category,
                explanation = excluded.explanation,
                difficulty = excluded.difficulty
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(id_i64("assessment_id", question.assessment_id().value())?)
        .bind(question.prompt().to_owned())
        .bind(options_to_json(question.options())?)
        .bind(correct_option_i64(question.correct_option())?)
        .bind(question.category().map(str::to_owned))
        .bind(question.explanation().map(str::to_owned))
        .bind(question.difficulty().map(str::to_owned))
        .bind(question.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_questions(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, assessment_id, prompt, options, correct_option,
                category, explanation, difficulty, created_at
            FROM questions
            WHERE assessment_id = ?1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(id_i64("assessment_id", assessment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut pool = Vec::with_capacity(rows.len());
        for row in rows {
            pool.push(map_question_row(&row)?);
        }
        Ok(pool)
    }

    async fn count_questions(&self, assessment_id: AssessmentId) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM questions WHERE assessment_id = ?1")
            .bind(id_i64("assessment_id", assessment_id.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let count: i64 = row.try_get("n").map_err(ser)?;
        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }
}
