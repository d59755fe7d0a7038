use thiserror::Error;

use crate::model::{AssessmentError, QuestionError, SessionResultError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Result(#[from] SessionResultError),
}
