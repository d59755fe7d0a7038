use chrono::{DateTime, Utc};

use quiz_core::model::{AssessmentId, SessionResult, UserId};

use super::SqliteRepository;
use super::mapping::{breakdown_to_json, id_i64, map_result_row};
use crate::repository::{ResultRepository, ResultRow, StorageError};

const RESULT_COLUMNS: &str = r"
    id, session_id, assessment_id, user_id, started_at, completed_at,
    total_questions, correct_answers, percentage, finish_reason, breakdown
";

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(
        &self,
        user_id: UserId,
        result: &SessionResult,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO session_results (
                session_id, assessment_id, user_id, started_at, completed_at,
                total_questions, correct_answers, percentage, finish_reason, breakdown
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(result.session_id().to_string())
        .bind(id_i64("assessment_id", result.assessment_id().value())?)
        .bind(user_id.to_string())
        .bind(result.started_at())
        .bind(result.completed_at())
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_answers()))
        .bind(i64::from(result.percentage()))
        .bind(result.finish_reason().as_str())
        .bind(breakdown_to_json(result.breakdown())?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            // a session finishes exactly once; a second insert for the same
            // session id is a caller bug
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => StorageError::Connection(other.to_string()),
        })?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: i64) -> Result<ResultRow, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM session_results WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn list_results(
        &self,
        assessment_id: AssessmentId,
        completed_from: Option<DateTime<Utc>>,
        completed_until: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let mut sql =
            format!("SELECT {RESULT_COLUMNS} FROM session_results WHERE assessment_id = ?1");

        let mut bind_index = 2;
        if completed_from.is_some() {
            sql.push_str(" AND completed_at >= ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        if completed_until.is_some() {
            sql.push_str(" AND completed_at <= ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        sql.push_str(" ORDER BY completed_at DESC, id DESC");
        sql.push_str(" LIMIT ?");
        sql.push_str(&bind_index.to_string());

        let mut query = sqlx::query(&sql).bind(id_i64("assessment_id", assessment_id.value())?);
        if let Some(from) = completed_from {
            query = query.bind(from);
        }
        if let Some(until) = completed_until {
            query = query.bind(until);
        }
        query = query.bind(i64::from(limit));

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }

        Ok(out)
    }

    async fn list_results_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let sql = format!(
            r"
            SELECT {RESULT_COLUMNS} FROM session_results
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT ?2
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }

        Ok(out)
    }
}
