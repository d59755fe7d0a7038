use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::ids::{AssessmentId, SessionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionResultError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("stored percentage ({stored}) does not match computed ({computed})")]
    PercentageMismatch { stored: u8, computed: u8 },

    #[error("breakdown totals ({breakdown_total}/{breakdown_correct}) do not match counts ({total}/{correct})")]
    BreakdownMismatch {
        breakdown_total: u32,
        breakdown_correct: u32,
        total: u32,
        correct: u32,
    },
}

//
// ─── FINISH REASON ─────────────────────────────────────────────────────────────
//

/// Why a session transitioned into its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Explicit user submit.
    Submitted,
    /// The user confirmed the last question's finish action.
    LastQuestion,
    /// An external time-limit signal delivered by the caller.
    TimeExpired,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Submitted => "submitted",
            FinishReason::LastQuestion => "last_question",
            FinishReason::TimeExpired => "time_expired",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(FinishReason::Submitted),
            "last_question" => Some(FinishReason::LastQuestion),
            "time_expired" => Some(FinishReason::TimeExpired),
            _ => None,
        }
    }
}

//
// ─── CATEGORY SCORE ────────────────────────────────────────────────────────────
//

/// Per-category slice of a finished session's score.
///
/// Questions without a category are grouped under [`CategoryScore::UNCATEGORIZED`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: String,
    pub correct: u32,
    pub total: u32,
}

impl CategoryScore {
    pub const UNCATEGORIZED: &'static str = "uncategorized";
}

//
// ─── SESSION RESULT ────────────────────────────────────────────────────────────
//

/// Immutable terminal record of one finished session.
///
/// The score is derived from the answer map at completion time; this record
/// never exists for a session that is still in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    session_id: SessionId,
    assessment_id: AssessmentId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_questions: u32,
    correct_answers: u32,
    percentage: u8,
    finish_reason: FinishReason,
    breakdown: Vec<CategoryScore>,
}

impl SessionResult {
    /// Percentage as `round(100 * correct / total)`, half-up.
    ///
    /// An empty session scores 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn percentage_for(correct: u32, total: u32) -> u8 {
        if total == 0 {
            return 0;
        }
        let correct = u64::from(correct.min(total));
        let total = u64::from(total);
        ((200 * correct + total) / (2 * total)) as u8
    }

    /// Rehydrate a result from persisted storage, checking internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `SessionResultError` if the time range is inverted, counts
    /// disagree, the stored percentage does not match the counts, or the
    /// breakdown does not sum to the counts.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session_id: SessionId,
        assessment_id: AssessmentId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        correct_answers: u32,
        percentage: u8,
        finish_reason: FinishReason,
        breakdown: Vec<CategoryScore>,
    ) -> Result<Self, SessionResultError> {
        if completed_at < started_at {
            return Err(SessionResultError::InvalidTimeRange);
        }
        if correct_answers > total_questions {
            return Err(SessionResultError::CountMismatch {
                correct: correct_answers,
                total: total_questions,
            });
        }
        let computed = Self::percentage_for(correct_answers, total_questions);
        if computed != percentage {
            return Err(SessionResultError::PercentageMismatch {
                stored: percentage,
                computed,
            });
        }

        let breakdown_total: u32 = breakdown.iter().map(|c| c.total).sum();
        let breakdown_correct: u32 = breakdown.iter().map(|c| c.correct).sum();
        if breakdown_total != total_questions || breakdown_correct != correct_answers {
            return Err(SessionResultError::BreakdownMismatch {
                breakdown_total,
                breakdown_correct,
                total: total_questions,
                correct: correct_answers,
            });
        }

        Ok(Self {
            session_id,
            assessment_id,
            started_at,
            completed_at,
            total_questions,
            correct_answers,
            percentage,
            finish_reason,
            breakdown,
        })
    }

    /// Build a result from counted answers, computing the percentage.
    ///
    /// # Errors
    ///
    /// Same consistency rules as [`SessionResult::from_persisted`].
    #[allow(clippy::too_many_arguments)]
    pub fn from_counts(
        session_id: SessionId,
        assessment_id: AssessmentId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        correct_answers: u32,
        finish_reason: FinishReason,
        breakdown: Vec<CategoryScore>,
    ) -> Result<Self, SessionResultError> {
        let percentage = Self::percentage_for(correct_answers, total_questions);
        Self::from_persisted(
            session_id,
            assessment_id,
            started_at,
            completed_at,
            total_questions,
            correct_answers,
            percentage,
            finish_reason,
            breakdown,
        )
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[must_use]
    pub fn finish_reason(&self) -> FinishReason {
        self.finish_reason
    }

    #[must_use]
    pub fn breakdown(&self) -> &[CategoryScore] {
        &self.breakdown
    }

    /// Wall-clock time between session start and completion.
    #[must_use]
    pub fn time_spent(&self) -> Duration {
        self.completed_at - self.started_at
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> i64 {
        self.time_spent().num_seconds()
    }

    /// Whether the result meets the caller-supplied pass threshold.
    #[must_use]
    pub fn is_pass(&self, threshold_percent: u8) -> bool {
        self.percentage >= threshold_percent
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn breakdown(entries: &[(&str, u32, u32)]) -> Vec<CategoryScore> {
        entries
            .iter()
            .map(|(category, correct, total)| CategoryScore {
                category: (*category).to_string(),
                correct: *correct,
                total: *total,
            })
            .collect()
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(SessionResult::percentage_for(7, 10), 70);
        assert_eq!(SessionResult::percentage_for(1, 3), 33);
        assert_eq!(SessionResult::percentage_for(2, 3), 67);
        assert_eq!(SessionResult::percentage_for(1, 8), 13);
        assert_eq!(SessionResult::percentage_for(0, 10), 0);
        assert_eq!(SessionResult::percentage_for(10, 10), 100);
        assert_eq!(SessionResult::percentage_for(0, 0), 0);
    }

    #[test]
    fn from_counts_builds_consistent_record() {
        let now = fixed_now();
        let result = SessionResult::from_counts(
            SessionId::generate(),
            AssessmentId::new(1),
            now,
            now + Duration::minutes(5),
            10,
            7,
            FinishReason::Submitted,
            breakdown(&[("Wiring", 4, 5), ("uncategorized", 3, 5)]),
        )
        .unwrap();

        assert_eq!(result.percentage(), 70);
        assert_eq!(result.time_spent_secs(), 300);
        assert!(result.is_pass(70));
        assert!(!result.is_pass(71));
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        let now = fixed_now();
        let err = SessionResult::from_counts(
            SessionId::generate(),
            AssessmentId::new(1),
            now,
            now - Duration::seconds(1),
            1,
            0,
            FinishReason::Submitted,
            breakdown(&[("uncategorized", 0, 1)]),
        )
        .unwrap_err();

        assert_eq!(err, SessionResultError::InvalidTimeRange);
    }

    #[test]
    fn stored_percentage_must_match_counts() {
        let now = fixed_now();
        let err = SessionResult::from_persisted(
            SessionId::generate(),
            AssessmentId::new(1),
            now,
            now,
            10,
            7,
            75,
            FinishReason::Submitted,
            breakdown(&[("uncategorized", 7, 10)]),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SessionResultError::PercentageMismatch {
                stored: 75,
                computed: 70
            }
        );
    }

    #[test]
    fn breakdown_must_sum_to_counts() {
        let now = fixed_now();
        let err = SessionResult::from_counts(
            SessionId::generate(),
            AssessmentId::new(1),
            now,
            now,
            10,
            7,
            FinishReason::Submitted,
            breakdown(&[("Wiring", 4, 5)]),
        )
        .unwrap_err();

        assert!(matches!(err, SessionResultError::BreakdownMismatch { .. }));
    }

    #[test]
    fn finish_reason_string_roundtrip() {
        for reason in [
            FinishReason::Submitted,
            FinishReason::LastQuestion,
            FinishReason::TimeExpired,
        ] {
            assert_eq!(FinishReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(FinishReason::parse("abandoned"), None);
    }
}
