use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

use quiz_core::model::{
    Assessment, AssessmentId, AssessmentSettings, FinishReason, Question, SessionId, SessionResult,
};

use super::progress::SessionProgress;
use super::scoring::{self, Score};
use super::selector::draw_questions;
use crate::error::SessionError;

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// One recorded answer: the chosen option and its correctness at record time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    pub selected: usize,
    pub is_correct: bool,
}

/// A question paired with its recorded answer, for the post-session review.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionReview<'a> {
    pub index: usize,
    pub question: &'a Question,
    pub answer: Option<AnswerRecord>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory session over a fixed question sequence.
///
/// The sequence is drawn once at construction and never changes. The session
/// moves `InProgress → Completed` exactly once via [`SessionService::finish`];
/// every answer slot is frozen from that point on. A retry is a brand-new
/// session with a fresh draw, never a reopened one.
pub struct SessionService {
    session_id: SessionId,
    assessment_id: AssessmentId,
    settings: AssessmentSettings,
    questions: Vec<Question>,
    answers: Vec<Option<AnswerRecord>>,
    current: usize,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<SessionResult>,
    result_row_id: Option<i64>,
}

impl SessionService {
    /// Create a session over an already-drawn question sequence.
    ///
    /// `started_at` should come from the services layer clock to keep time
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPool` if the sequence is empty.
    pub fn new(
        assessment: &Assessment,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptyPool);
        }

        let answers = vec![None; questions.len()];
        Ok(Self {
            session_id: SessionId::generate(),
            assessment_id: assessment.id(),
            settings: assessment.settings().clone(),
            questions,
            answers,
            current: 0,
            started_at,
            completed_at: None,
            result: None,
            result_row_id: None,
        })
    }

    /// Draw `question_count` questions from a pool and start a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPool` if the pool is empty.
    pub fn start<R: Rng + ?Sized>(
        assessment: &Assessment,
        pool: &[Question],
        rng: &mut R,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let drawn = draw_questions(pool, assessment.settings().question_count(), rng);
        Self::new(assessment, drawn, started_at)
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
    pub fn settings(&self) -> &AssessmentSettings {
        &self.settings
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Row id assigned by the local result store, once persisted.
    #[must_use]
    pub fn result_row_id(&self) -> Option<i64> {
        self.result_row_id
    }

    /// The terminal result, present only after [`SessionService::finish`].
    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    /// Total number of questions in this session.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Number of questions that have a recorded answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().flatten().count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Index of the question the cursor is on.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The question the cursor is on. The cursor is always in range.
    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn answer_at(&self, index: usize) -> Option<AnswerRecord> {
        self.answers.get(index).copied().flatten()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.total_questions();
        let answered = self.answered_count();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            current: self.current,
            is_complete: self.is_complete(),
        }
    }

    /// Live score, recomputed from the answer map on every call.
    #[must_use]
    pub fn score(&self) -> Score {
        scoring::score_answers(&self.questions, &self.answers)
    }

    /// Per-question review payload in sequence order.
    #[must_use]
    pub fn review(&self) -> Vec<QuestionReview<'_>> {
        self.questions
            .iter()
            .zip(&self.answers)
            .enumerate()
            .map(|(index, (question, answer))| QuestionReview {
                index,
                question,
                answer: *answer,
            })
            .collect()
    }

    /// Record an answer for the question at `question_index`.
    ///
    /// Correctness is evaluated against the question's correct option at
    /// record time. Whether an existing answer may be replaced is governed by
    /// the assessment's `allow_answer_change` setting.
    ///
    /// # Errors
    ///
    /// All errors leave the session untouched:
    /// `Completed` once the session is terminal, `QuestionOutOfRange` /
    /// `OptionOutOfRange` for contract violations, and `AnswerLocked` when
    /// answers may not be changed and the slot is already filled.
    pub fn select_answer(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<AnswerRecord, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        let len = self.questions.len();
        let Some(question) = self.questions.get(question_index) else {
            return Err(SessionError::QuestionOutOfRange {
                index: question_index,
                len,
            });
        };
        if option_index >= question.options().len() {
            return Err(SessionError::OptionOutOfRange {
                option: option_index,
                len: question.options().len(),
            });
        }
        if self.answers[question_index].is_some() && !self.settings.allow_answer_change() {
            return Err(SessionError::AnswerLocked {
                index: question_index,
            });
        }

        let record = AnswerRecord {
            selected: option_index,
            is_correct: question.is_correct(option_index),
        };
        self.answers[question_index] = Some(record);
        Ok(record)
    }

    /// Move the current-question cursor without touching recorded answers.
    ///
    /// # Errors
    ///
    /// Returns `QuestionOutOfRange` and leaves the cursor in place if
    /// `target_index` is outside `[0, len)`. Navigation is allowed on a
    /// completed session so the review can be stepped through.
    pub fn navigate(&mut self, target_index: usize) -> Result<(), SessionError> {
        if target_index >= self.questions.len() {
            return Err(SessionError::QuestionOutOfRange {
                index: target_index,
                len: self.questions.len(),
            });
        }
        self.current = target_index;
        Ok(())
    }

    /// Finish the session, making it terminal.
    ///
    /// The first call stamps `completed_at`, computes the score and category
    /// breakdown from the answer map, and caches the resulting record. Later
    /// calls are idempotent: they return the cached record unchanged and
    /// ignore the new timestamp and reason.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Result` if `completed_at` precedes the session
    /// start (a caller clock bug); the session stays in progress.
    pub fn finish(
        &mut self,
        completed_at: DateTime<Utc>,
        reason: FinishReason,
    ) -> Result<&SessionResult, SessionError> {
        if self.result.is_none() {
            let score = self.score();
            let breakdown = scoring::category_breakdown(&self.questions, &self.answers);
            let result = SessionResult::from_counts(
                self.session_id,
                self.assessment_id,
                self.started_at,
                completed_at,
                score.total,
                score.correct,
                reason,
                breakdown,
            )?;

            self.completed_at = Some(completed_at);
            self.result = Some(result);
        }

        self.result.as_ref().ok_or(SessionError::NotCompleted)
    }

    pub(crate) fn set_result_row_id(&mut self, id: i64) {
        self.result_row_id = Some(id);
    }
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("session_id", &self.session_id)
            .field("assessment_id", &self.assessment_id)
            .field("questions_len", &self.questions.len())
            .field("answered", &self.answered_count())
            .field("current", &self.current)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("result_row_id", &self.result_row_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{AssessmentSettings, QuestionId};
    use quiz_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn build_question(id: u64) -> Question {
        // correct answer is always option 0
        Question::new(
            QuestionId::new(id),
            AssessmentId::new(1),
            format!("Q{id}"),
            vec!["Right".into(), "Wrong".into(), "Also wrong".into()],
            0,
            fixed_now(),
        )
        .unwrap()
    }

    fn build_assessment(settings: AssessmentSettings) -> Assessment {
        Assessment::new(AssessmentId::new(1), "Test", None, settings, fixed_now()).unwrap()
    }

    fn build_session(question_count: usize) -> SessionService {
        let assessment = build_assessment(AssessmentSettings::default_unit_quiz());
        let questions = (1..=question_count as u64).map(build_question).collect();
        SessionService::new(&assessment, questions, fixed_now()).unwrap()
    }

    #[test]
    fn empty_sequence_is_not_startable() {
        let assessment = build_assessment(AssessmentSettings::default_unit_quiz());
        let err = SessionService::new(&assessment, Vec::new(), fixed_now()).unwrap_err();
        assert!(matches!(err, SessionError::EmptyPool));
    }

    #[test]
    fn start_draws_min_of_count_and_pool() {
        let assessment = build_assessment(AssessmentSettings::default_unit_quiz());
        let pool: Vec<Question> = (1..=12).map(build_question).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let session = SessionService::start(&assessment, &pool, &mut rng, fixed_now()).unwrap();
        assert_eq!(session.total_questions(), 10);

        let small_pool: Vec<Question> = (1..=4).map(build_question).collect();
        let session =
            SessionService::start(&assessment, &small_pool, &mut rng, fixed_now()).unwrap();
        assert_eq!(session.total_questions(), 4);
    }

    #[test]
    fn navigation_preserves_answers() {
        let mut session = build_session(3);

        let record = session.select_answer(0, 0).unwrap();
        assert!(record.is_correct);

        session.navigate(2).unwrap();
        session.navigate(0).unwrap();

        let restored = session.answer_at(0).unwrap();
        assert_eq!(restored, record);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn navigation_does_not_affect_score() {
        let mut session = build_session(3);
        session.select_answer(0, 0).unwrap();
        let before = session.score();

        session.navigate(1).unwrap();
        session.navigate(2).unwrap();
        session.navigate(0).unwrap();

        assert_eq!(session.score(), before);
    }

    #[test]
    fn out_of_range_navigation_is_rejected_without_state_change() {
        let mut session = build_session(3);
        session.navigate(1).unwrap();

        let err = session.navigate(3).unwrap_err();
        assert!(matches!(
            err,
            SessionError::QuestionOutOfRange { index: 3, len: 3 }
        ));
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn out_of_range_option_is_rejected() {
        let mut session = build_session(2);
        let err = session.select_answer(0, 3).unwrap_err();
        assert!(matches!(
            err,
            SessionError::OptionOutOfRange { option: 3, len: 3 }
        ));
        assert_eq!(session.answered_count(), 0);
    }

    #[test]
    fn answer_change_allowed_by_default_unit_quiz() {
        let mut session = build_session(2);
        session.select_answer(0, 1).unwrap();
        let record = session.select_answer(0, 0).unwrap();

        assert!(record.is_correct);
        assert_eq!(session.answer_at(0).unwrap().selected, 0);
    }

    #[test]
    fn answer_change_locked_when_disallowed() {
        let assessment =
            build_assessment(AssessmentSettings::new(10, 70, false, None).unwrap());
        let questions = (1..=2).map(build_question).collect();
        let mut session = SessionService::new(&assessment, questions, fixed_now()).unwrap();

        session.select_answer(0, 1).unwrap();
        let err = session.select_answer(0, 0).unwrap_err();
        assert!(matches!(err, SessionError::AnswerLocked { index: 0 }));
        assert_eq!(session.answer_at(0).unwrap().selected, 1);
    }

    #[test]
    fn finish_freezes_the_answer_map() {
        let mut session = build_session(2);
        session.select_answer(0, 0).unwrap();
        session
            .finish(fixed_now() + Duration::minutes(1), FinishReason::Submitted)
            .unwrap();

        let err = session.select_answer(1, 0).unwrap_err();
        assert!(matches!(err, SessionError::Completed));
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn finish_is_idempotent_and_bit_identical() {
        let mut session = build_session(2);
        session.select_answer(0, 0).unwrap();

        let first = session
            .finish(fixed_now() + Duration::minutes(1), FinishReason::Submitted)
            .unwrap()
            .clone();
        let second = session
            .finish(fixed_now() + Duration::minutes(30), FinishReason::TimeExpired)
            .unwrap()
            .clone();

        assert_eq!(first, second);
        assert_eq!(second.finish_reason(), FinishReason::Submitted);
        assert_eq!(session.completed_at(), Some(fixed_now() + Duration::minutes(1)));
    }

    #[test]
    fn finish_rejects_clock_running_backwards() {
        let mut session = build_session(2);
        let err = session
            .finish(fixed_now() - Duration::seconds(1), FinishReason::Submitted)
            .unwrap_err();
        assert!(matches!(err, SessionError::Result(_)));
        assert!(!session.is_complete());
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let mut session = build_session(3);
        let result = session
            .finish(fixed_now(), FinishReason::TimeExpired)
            .unwrap();

        assert_eq!(result.correct_answers(), 0);
        assert_eq!(result.percentage(), 0);
    }

    #[test]
    fn all_correct_scores_one_hundred() {
        let mut session = build_session(3);
        for index in 0..3 {
            session.select_answer(index, 0).unwrap();
        }
        let result = session
            .finish(fixed_now(), FinishReason::LastQuestion)
            .unwrap();

        assert_eq!(result.percentage(), 100);
    }

    #[test]
    fn worked_example_seven_of_ten_is_a_pass_at_seventy() {
        let assessment = build_assessment(AssessmentSettings::default_unit_quiz());
        let pool: Vec<Question> = (1..=12).map(build_question).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let mut session =
            SessionService::start(&assessment, &pool, &mut rng, fixed_now()).unwrap();
        assert_eq!(session.total_questions(), 10);

        for index in 0..10 {
            // 7 correct, 3 incorrect
            let option = usize::from(index >= 7);
            session.select_answer(index, option).unwrap();
        }

        let result = session
            .finish(fixed_now() + Duration::minutes(12), FinishReason::Submitted)
            .unwrap();
        assert_eq!(result.correct_answers(), 7);
        assert_eq!(result.total_questions(), 10);
        assert_eq!(result.percentage(), 70);
        assert!(result.is_pass(assessment.settings().pass_mark_percent()));
    }

    #[test]
    fn review_pairs_questions_with_answers() {
        let mut session = build_session(2);
        session.select_answer(1, 2).unwrap();

        let review = session.review();
        assert_eq!(review.len(), 2);
        assert_eq!(review[0].answer, None);
        assert_eq!(
            review[1].answer,
            Some(AnswerRecord {
                selected: 2,
                is_correct: false
            })
        );
    }

    #[test]
    fn progress_tracks_answers_and_cursor() {
        let mut session = build_session(3);
        session.select_answer(0, 0).unwrap();
        session.navigate(1).unwrap();

        let progress = session.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 2);
        assert_eq!(progress.current, 1);
        assert!(!progress.is_complete);
    }
}
