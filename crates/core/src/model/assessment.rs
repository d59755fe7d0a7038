use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::AssessmentId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment title cannot be empty")]
    EmptyTitle,

    #[error("question count must be > 0")]
    InvalidQuestionCount,

    #[error("pass mark must be between 0 and 100")]
    InvalidPassMark,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Configuration settings for an assessment.
///
/// Controls how many questions a session draws, the pass mark applied to
/// finished results, and whether recorded answers may be changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentSettings {
    question_count: u32,
    pass_mark_percent: u8,
    allow_answer_change: bool,
    time_limit_secs: Option<u32>,
}

impl AssessmentSettings {
    /// Creates the conventional unit-quiz settings.
    ///
    /// - 10 questions per session
    /// - 70% pass mark
    /// - answers may be revised before finishing
    /// - no time limit
    #[must_use]
    pub fn default_unit_quiz() -> Self {
        Self {
            question_count: 10,
            pass_mark_percent: 70,
            allow_answer_change: true,
            time_limit_secs: None,
        }
    }

    /// Creates validated settings.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if any bound is violated.
    pub fn new(
        question_count: u32,
        pass_mark_percent: u8,
        allow_answer_change: bool,
        time_limit_secs: Option<u32>,
    ) -> Result<Self, AssessmentError> {
        if question_count == 0 {
            return Err(AssessmentError::InvalidQuestionCount);
        }
        if pass_mark_percent > 100 {
            return Err(AssessmentError::InvalidPassMark);
        }
        if let Some(limit) = time_limit_secs {
            if limit == 0 {
                return Err(AssessmentError::InvalidTimeLimit);
            }
        }

        Ok(Self {
            question_count,
            pass_mark_percent,
            allow_answer_change,
            time_limit_secs,
        })
    }

    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    #[must_use]
    pub fn pass_mark_percent(&self) -> u8 {
        self.pass_mark_percent
    }

    #[must_use]
    pub fn allow_answer_change(&self) -> bool {
        self.allow_answer_change
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }
}

//
// ─── ASSESSMENT ────────────────────────────────────────────────────────────────
//

/// A named question pool with the settings sessions are started under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    id: AssessmentId,
    title: String,
    description: Option<String>,
    settings: AssessmentSettings,
    created_at: DateTime<Utc>,
}

impl Assessment {
    /// Create a validated assessment.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::EmptyTitle` for a blank title.
    pub fn new(
        id: AssessmentId,
        title: impl Into<String>,
        description: Option<String>,
        settings: AssessmentSettings,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AssessmentError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(AssessmentError::EmptyTitle);
        }

        Ok(Self {
            id,
            title,
            description: description.filter(|d| !d.trim().is_empty()),
            settings,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
