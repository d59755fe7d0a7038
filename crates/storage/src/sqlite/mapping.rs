use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use quiz_core::model::{
    Assessment, AssessmentId, AssessmentSettings, CategoryScore, FinishReason, Question,
    QuestionId, SessionId, SessionResult, UserId,
};

use crate::repository::{ResultRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn assessment_id_from_i64(v: i64) -> Result<AssessmentId, StorageError> {
    Ok(AssessmentId::new(i64_to_u64("assessment_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn uuid_from_str(field: &'static str, s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|_| StorageError::Serialization(format!("invalid {field}: {s}")))
}

// Option lists and category breakdowns live in JSON columns; these are their
// storage shapes, kept independent of the domain types.

pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

pub(crate) fn options_from_json(json: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(json).map_err(ser)
}

#[derive(Serialize, Deserialize)]
struct CategoryScoreJson {
    category: String,
    correct: u32,
    total: u32,
}

pub(crate) fn breakdown_to_json(breakdown: &[CategoryScore]) -> Result<String, StorageError> {
    let rows: Vec<CategoryScoreJson> = breakdown
        .iter()
        .map(|c| CategoryScoreJson {
            category: c.category.clone(),
            correct: c.correct,
            total: c.total,
        })
        .collect();
    serde_json::to_string(&rows).map_err(ser)
}

pub(crate) fn breakdown_from_json(json: &str) -> Result<Vec<CategoryScore>, StorageError> {
    let rows: Vec<CategoryScoreJson> = serde_json::from_str(json).map_err(ser)?;
    Ok(rows
        .into_iter()
        .map(|c| CategoryScore {
            category: c.category,
            correct: c.correct,
            total: c.total,
        })
        .collect())
}

pub(crate) fn map_assessment_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Assessment, StorageError> {
    let settings = AssessmentSettings::new(
        u32_from_i64(
            "question_count",
            row.try_get::<i64, _>("question_count").map_err(ser)?,
        )?,
        u8::try_from(row.try_get::<i64, _>("pass_mark_percent").map_err(ser)?)
            .map_err(|_| StorageError::Serialization("invalid pass_mark_percent".into()))?,
        row.try_get::<i64, _>("allow_answer_change").map_err(ser)? != 0,
        row.try_get::<Option<i64>, _>("time_limit_secs")
            .map_err(ser)?
            .map(|v| u32_from_i64("time_limit_secs", v))
            .transpose()?,
    )
    .map_err(ser)?;

    Assessment::new(
        assessment_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        settings,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options = options_from_json(&row.try_get::<String, _>("options").map_err(ser)?)?;

    Question::from_persisted(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        assessment_id_from_i64(row.try_get::<i64, _>("assessment_id").map_err(ser)?)?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        options,
        usize_from_i64(
            "correct_option",
            row.try_get::<i64, _>("correct_option").map_err(ser)?,
        )?,
        row.try_get::<Option<String>, _>("category").map_err(ser)?,
        row.try_get::<Option<String>, _>("explanation").map_err(ser)?,
        row.try_get::<Option<String>, _>("difficulty").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ResultRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;

    let session_str: String = row.try_get("session_id").map_err(ser)?;
    let session_id = SessionId::from_uuid(uuid_from_str("session_id", &session_str)?);

    let user_str: String = row.try_get("user_id").map_err(ser)?;
    let user_id = UserId::from_uuid(uuid_from_str("user_id", &user_str)?);

    let reason_str: String = row.try_get("finish_reason").map_err(ser)?;
    let finish_reason = FinishReason::parse(&reason_str)
        .ok_or_else(|| StorageError::Serialization(format!("invalid finish_reason: {reason_str}")))?;

    let breakdown = breakdown_from_json(&row.try_get::<String, _>("breakdown").map_err(ser)?)?;

    let result = SessionResult::from_persisted(
        session_id,
        assessment_id_from_i64(row.try_get::<i64, _>("assessment_id").map_err(ser)?)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        u8::try_from(row.try_get::<i64, _>("percentage").map_err(ser)?)
            .map_err(|_| StorageError::Serialization("invalid percentage".into()))?,
        finish_reason,
        breakdown,
    )
    .map_err(ser)?;

    Ok(ResultRow::new(id, user_id, result))
}
