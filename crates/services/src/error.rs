//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::SessionResultError;
use storage::repository::StorageError;

/// Errors emitted by session services.
///
/// Every variant leaves the session unchanged; callers are free to absorb
/// contract violations (for example by disabling the offending control).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    EmptyPool,
    #[error("session already completed")]
    Completed,
    #[error("session is not completed")]
    NotCompleted,
    #[error("question index {index} is out of range for {len} questions")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("option {option} is out of range for {len} options")]
    OptionOutOfRange { option: usize, len: usize },
    #[error("answer for question {index} is locked")]
    AnswerLocked { index: usize },
    #[error(transparent)]
    Result(#[from] SessionResultError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RemoteResultsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteResultsError {
    #[error("remote results endpoint is not configured")]
    Disabled,
    #[error("remote results request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
