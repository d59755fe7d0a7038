use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{AssessmentId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("a question needs at least 2 options, got {len}")]
    TooFewOptions { len: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct option {index} is out of range for {len} options")]
    CorrectOptionOutOfRange { index: usize, len: usize },

    #[error("category label cannot be blank")]
    BlankCategory,

    #[error("difficulty label cannot be blank")]
    BlankDifficulty,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question, immutable once loaded.
///
/// Options keep their authored order; `correct_option` indexes into them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    assessment_id: AssessmentId,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
    category: Option<String>,
    explanation: Option<String>,
    difficulty: Option<String>,
    created_at: DateTime<Utc>,
}

impl Question {
    /// Create a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, fewer than two options
    /// are given, any option is blank, or `correct_option` is out of range.
    pub fn new(
        id: QuestionId,
        assessment_id: AssessmentId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions { len: options.len() });
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if correct_option >= options.len() {
            return Err(QuestionError::CorrectOptionOutOfRange {
                index: correct_option,
                len: options.len(),
            });
        }

        Ok(Self {
            id,
            assessment_id,
            prompt,
            options,
            correct_option,
            category: None,
            explanation: None,
            difficulty: None,
            created_at,
        })
    }

    /// Rehydrate a question from persisted storage, re-running validation.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` under the same rules as [`Question::new`],
    /// plus blank-label checks for category and difficulty.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuestionId,
        assessment_id: AssessmentId,
        prompt: String,
        options: Vec<String>,
        correct_option: usize,
        category: Option<String>,
        explanation: Option<String>,
        difficulty: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        let mut question = Self::new(
            id,
            assessment_id,
            prompt,
            options,
            correct_option,
            created_at,
        )?;
        if let Some(category) = category {
            question = question.with_category(category)?;
        }
        question.explanation = explanation.filter(|e| !e.trim().is_empty());
        if let Some(difficulty) = difficulty {
            question = question.with_difficulty(difficulty)?;
        }
        Ok(question)
    }

    /// Attach a category label used for score breakdowns.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::BlankCategory` for whitespace-only labels.
    pub fn with_category(mut self, category: impl Into<String>) -> Result<Self, QuestionError> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(QuestionError::BlankCategory);
        }
        self.category = Some(category);
        Ok(self)
    }

    /// Attach an explanation shown during review.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Attach a difficulty label.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::BlankDifficulty` for whitespace-only labels.
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Result<Self, QuestionError> {
        let difficulty = difficulty.into();
        if difficulty.trim().is_empty() {
            return Err(QuestionError::BlankDifficulty);
        }
        self.difficulty = Some(difficulty);
        Ok(self)
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    /// Returns true when `option` is the correct answer index.
    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
