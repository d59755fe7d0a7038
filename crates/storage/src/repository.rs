use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{Assessment, AssessmentId, Question, QuestionId, SessionResult, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted result together with its row id and owning user.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub id: i64,
    pub user_id: UserId,
    pub result: SessionResult,
}

impl ResultRow {
    #[must_use]
    pub fn new(id: i64, user_id: UserId, result: SessionResult) -> Self {
        Self {
            id,
            user_id,
            result,
        }
    }
}

/// Repository contract for assessments.
#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Persist or update an assessment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assessment cannot be stored.
    async fn upsert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError>;

    /// Fetch an assessment by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing assessment is `Ok(None)`.
    async fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, StorageError>;
}

/// Repository contract for question pools.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// List the full question pool for an assessment, ordered by creation then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_questions(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<Question>, StorageError>;

    /// Count the questions in an assessment's pool.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn count_questions(&self, assessment_id: AssessmentId) -> Result<u64, StorageError>;
}

/// Repository contract for finished session results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Append a finished result for a user, returning the new row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_result(
        &self,
        user_id: UserId,
        result: &SessionResult,
    ) -> Result<i64, StorageError>;

    /// Fetch a persisted result by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: i64) -> Result<ResultRow, StorageError>;

    /// List results for an assessment, newest completion first, within an
    /// optional completion-time range.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_results(
        &self,
        assessment_id: AssessmentId,
        completed_from: Option<DateTime<Utc>>,
        completed_until: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError>;

    /// List a user's results across assessments, newest completion first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_results_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    assessments: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
    questions: Arc<Mutex<HashMap<(AssessmentId, QuestionId), Question>>>,
    results: Arc<Mutex<Vec<ResultRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssessmentRepository for InMemoryRepository {
    async fn upsert_assessment(&self, assessment: &Assessment) -> Result<(), StorageError> {
        let mut guard = self
            .assessments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(assessment.id(), assessment.clone());
        Ok(())
    }

    async fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, StorageError> {
        let guard = self
            .assessments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((question.assessment_id(), question.id()), question.clone());
        Ok(())
    }

    async fn list_questions(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut pool: Vec<Question> = guard
            .values()
            .filter(|q| q.assessment_id() == assessment_id)
            .cloned()
            .collect();
        pool.sort_by_key(|q| (q.created_at(), q.id()));
        Ok(pool)
    }

    async fn count_questions(&self, assessment_id: AssessmentId) -> Result<u64, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let count = guard
            .keys()
            .filter(|(aid, _)| *aid == assessment_id)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(
        &self,
        user_id: UserId,
        result: &SessionResult,
    ) -> Result<i64, StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = guard.len() as i64 + 1;
        guard.push(ResultRow::new(id, user_id, result.clone()));
        Ok(id)
    }

    async fn get_result(&self, id: i64) -> Result<ResultRow, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_results(
        &self,
        assessment_id: AssessmentId,
        completed_from: Option<DateTime<Utc>>,
        completed_until: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<ResultRow> = guard
            .iter()
            .filter(|row| row.result.assessment_id() == assessment_id)
            .filter(|row| completed_from.is_none_or(|from| row.result.completed_at() >= from))
            .filter(|row| completed_until.is_none_or(|until| row.result.completed_at() <= until))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .completed_at()
                .cmp(&a.result.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn list_results_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<ResultRow> = guard
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .completed_at()
                .cmp(&a.result.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub assessments: Arc<dyn AssessmentRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let assessments: Arc<dyn AssessmentRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self {
            assessments,
            questions,
            results,
        }
    }
}
