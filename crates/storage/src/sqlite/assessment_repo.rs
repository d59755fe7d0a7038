use quiz_core::model::{Assessment, AssessmentId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_assessment_row};
use crate::repository::{AssessmentRepository, StorageError};

#[async_trait::async_trait]
impl AssessmentRepository for SqliteRepository {
    async fn upsert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let settings = assessment.settings();
        sqlx::query(
            r"
            INSERT INTO assessments (
                id, title, description, created_at,
                question_count, pass_mark_percent, allow_answer_change, time_limit_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                title = excluded.title,
                description = excluded.description,
                question_count = excluded.question_count,
                pass_mark_percent = excluded.pass_mark_percent,
                allow_answer_change = excluded.allow_answer_change,
                time_limit_secs = excluded.time_limit_secs
            ",
        )
        .bind(id_i64("assessment_id", assessment.id().value())?)
        .bind(assessment.title().to_owned())
        .bind(assessment.description().map(str::to_owned))
        .bind(assessment.created_at())
        .bind(i64::from(settings.question_count()))
        .bind(i64::from(settings.pass_mark_percent()))
        .bind(i64::from(settings.allow_answer_change()))
        .bind(settings.time_limit_secs().map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, title, description, created_at,
                question_count, pass_mark_percent, allow_answer_change, time_limit_secs
            FROM assessments
            WHERE id = ?1
            ",
        )
        .bind(id_i64("assessment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_assessment_row).transpose()
    }
}
