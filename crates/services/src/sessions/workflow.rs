use std::sync::Arc;

use rand::Rng;

use quiz_core::model::{AssessmentId, FinishReason, SessionResult, UserId};
use storage::repository::{
    AssessmentRepository, QuestionRepository, ResultRepository, Storage, StorageError,
};

use super::session::SessionService;
use crate::Clock;
use crate::error::SessionError;
use crate::remote_results::RemoteResultsService;

/// Outcome of finishing a session, including where the result landed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFinishOutcome {
    pub result: SessionResult,
    /// Local store row id, when the append succeeded.
    pub result_row_id: Option<i64>,
    /// Whether the remote submission went through.
    pub remote_submitted: bool,
}

/// Orchestrates session start and result persistence.
///
/// Persistence on finish is best effort: the caller always gets the computed
/// result back, and storage or network failures are logged and swallowed.
/// [`SessionLoopService::retry_persist`] covers the recovery path.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    assessments: Arc<dyn AssessmentRepository>,
    questions: Arc<dyn QuestionRepository>,
    results: Arc<dyn ResultRepository>,
    remote: RemoteResultsService,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        assessments: Arc<dyn AssessmentRepository>,
        questions: Arc<dyn QuestionRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            assessments,
            questions,
            results,
            remote: RemoteResultsService::new(None),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.results),
        )
    }

    #[must_use]
    pub fn with_remote(mut self, remote: RemoteResultsService) -> Self {
        self.remote = remote;
        self
    }

    /// Start a new session for the given assessment.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` when the assessment is missing or a
    /// repository call fails, and `SessionError::EmptyPool` when the
    /// assessment has no questions.
    pub async fn start_session(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<SessionService, SessionError> {
        self.start_session_with_rng(assessment_id, &mut rand::rng())
            .await
    }

    /// Start a new session drawing questions with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// Same as [`SessionLoopService::start_session`].
    pub async fn start_session_with_rng<R: Rng + ?Sized>(
        &self,
        assessment_id: AssessmentId,
        rng: &mut R,
    ) -> Result<SessionService, SessionError> {
        let assessment = self
            .assessments
            .get_assessment(assessment_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let pool = self.questions.list_questions(assessment_id).await?;

        SessionService::start(&assessment, &pool, rng, self.clock.now())
    }

    /// Finish a session and persist its result, best effort.
    ///
    /// The session becomes terminal and the computed result is always
    /// returned. The local append and the remote submission each run after
    /// that point; their failures are logged at warn level and never
    /// propagated. Calling this again on an already-finished session returns
    /// the cached result and retries only the persistence that is still
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Result` only when `finish` itself fails, which
    /// means the finishing timestamp precedes the session start.
    pub async fn finish_session(
        &self,
        session: &mut SessionService,
        user_id: UserId,
        reason: FinishReason,
    ) -> Result<SessionFinishOutcome, SessionError> {
        let now = self.clock.now();
        let result = session.finish(now, reason)?.clone();

        let result_row_id = match session.result_row_id() {
            Some(id) => Some(id),
            None => match self.results.append_result(user_id, &result).await {
                Ok(id) => {
                    session.set_result_row_id(id);
                    Some(id)
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %result.session_id(),
                        error = %err,
                        "failed to persist session result locally"
                    );
                    None
                }
            },
        };

        let remote_submitted = if self.remote.enabled() {
            match self.remote.submit(user_id, &result).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        session_id = %result.session_id(),
                        error = %err,
                        "failed to submit session result remotely"
                    );
                    false
                }
            }
        } else {
            false
        };

        Ok(SessionFinishOutcome {
            result,
            result_row_id,
            remote_submitted,
        })
    }

    /// Finish a session whose time limit ran out.
    ///
    /// # Errors
    ///
    /// Same as [`SessionLoopService::finish_session`].
    pub async fn expire_session(
        &self,
        session: &mut SessionService,
        user_id: UserId,
    ) -> Result<SessionFinishOutcome, SessionError> {
        self.finish_session(session, user_id, FinishReason::TimeExpired)
            .await
    }

    /// Retry the local append after a completed session.
    ///
    /// This is useful when the append in `finish_session` failed (e.g. a
    /// transient storage error).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` if the session has not finished,
    /// and `SessionError::Storage` if persistence fails again.
    pub async fn retry_persist(
        &self,
        session: &mut SessionService,
        user_id: UserId,
    ) -> Result<i64, SessionError> {
        if let Some(id) = session.result_row_id() {
            return Ok(id);
        }

        let result = session.result().ok_or(SessionError::NotCompleted)?.clone();
        let id = self.results.append_result(user_id, &result).await?;
        session.set_result_row_id(id);
        Ok(id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use quiz_core::model::{Assessment, AssessmentSettings, Question, QuestionId};
    use quiz_core::time::{fixed_clock, fixed_now};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use storage::repository::{ResultRow, StorageError};
    use uuid::Uuid;

    fn user() -> UserId {
        UserId::from_uuid(Uuid::new_v4())
    }

    async fn seeded_storage(question_count: u64) -> Storage {
        let storage = Storage::in_memory();
        let assessment = Assessment::new(
            AssessmentId::new(1),
            "Unit quiz",
            None,
            AssessmentSettings::default_unit_quiz(),
            fixed_now(),
        )
        .unwrap();
        storage
            .assessments
            .upsert_assessment(&assessment)
            .await
            .unwrap();
        for id in 1..=question_count {
            let question = Question::new(
                QuestionId::new(id),
                AssessmentId::new(1),
                format!("Q{id}"),
                vec!["Right".into(), "Wrong".into()],
                0,
                fixed_now(),
            )
            .unwrap();
            storage.questions.upsert_question(&question).await.unwrap();
        }
        storage
    }

    struct FailingResultRepository;

    #[async_trait]
    impl ResultRepository for FailingResultRepository {
        async fn append_result(
            &self,
            _user_id: UserId,
            _result: &SessionResult,
        ) -> Result<i64, StorageError> {
            Err(StorageError::Connection("disk unplugged".into()))
        }

        async fn get_result(&self, _id: i64) -> Result<ResultRow, StorageError> {
            Err(StorageError::NotFound)
        }

        async fn list_results(
            &self,
            _assessment_id: AssessmentId,
            _completed_from: Option<chrono::DateTime<chrono::Utc>>,
            _completed_until: Option<chrono::DateTime<chrono::Utc>>,
            _limit: u32,
        ) -> Result<Vec<ResultRow>, StorageError> {
            Ok(Vec::new())
        }

        async fn list_results_for_user(
            &self,
            _user_id: UserId,
            _limit: u32,
        ) -> Result<Vec<ResultRow>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn start_session_draws_from_storage() {
        let storage = seeded_storage(12).await;
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);
        let mut rng = StdRng::seed_from_u64(5);

        let session = service
            .start_session_with_rng(AssessmentId::new(1), &mut rng)
            .await
            .unwrap();
        assert_eq!(session.total_questions(), 10);
        assert_eq!(session.started_at(), fixed_now());
    }

    #[tokio::test]
    async fn start_session_for_missing_assessment_fails() {
        let storage = Storage::in_memory();
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);

        let err = service.start_session(AssessmentId::new(404)).await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn start_session_with_no_questions_fails() {
        let storage = seeded_storage(0).await;
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);

        let err = service.start_session(AssessmentId::new(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyPool));
    }

    #[tokio::test]
    async fn finish_session_persists_the_result() {
        let storage = seeded_storage(12).await;
        let mut clock = fixed_clock();
        let service = SessionLoopService::from_storage(clock, &storage);
        let mut rng = StdRng::seed_from_u64(5);
        let user_id = user();

        let mut session = service
            .start_session_with_rng(AssessmentId::new(1), &mut rng)
            .await
            .unwrap();
        for index in 0..session.total_questions() {
            session.select_answer(index, 0).unwrap();
        }
        clock.advance(Duration::minutes(5));
        let service = SessionLoopService::from_storage(clock, &storage);

        let outcome = service
            .finish_session(&mut session, user_id, FinishReason::Submitted)
            .await
            .unwrap();

        assert_eq!(outcome.result.percentage(), 100);
        assert!(!outcome.remote_submitted);
        let row_id = outcome.result_row_id.unwrap();

        let stored = storage.results.get_result(row_id).await.unwrap();
        assert_eq!(stored.user_id, user_id);
        assert_eq!(stored.result, outcome.result);
    }

    #[tokio::test]
    async fn finish_survives_persistence_failure() {
        let storage = seeded_storage(4).await;
        let service = SessionLoopService::new(
            fixed_clock(),
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.questions),
            Arc::new(FailingResultRepository),
        );
        let mut rng = StdRng::seed_from_u64(2);

        let mut session = service
            .start_session_with_rng(AssessmentId::new(1), &mut rng)
            .await
            .unwrap();
        let outcome = service
            .finish_session(&mut session, user(), FinishReason::Submitted)
            .await
            .unwrap();

        assert!(outcome.result_row_id.is_none());
        assert!(session.is_complete());
        assert_eq!(outcome.result.total_questions(), 4);
    }

    #[tokio::test]
    async fn retry_persist_recovers_a_missed_append() {
        let storage = seeded_storage(4).await;
        let failing = SessionLoopService::new(
            fixed_clock(),
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.questions),
            Arc::new(FailingResultRepository),
        );
        let mut rng = StdRng::seed_from_u64(2);
        let user_id = user();

        let mut session = failing
            .start_session_with_rng(AssessmentId::new(1), &mut rng)
            .await
            .unwrap();
        failing
            .finish_session(&mut session, user_id, FinishReason::LastQuestion)
            .await
            .unwrap();
        assert!(session.result_row_id().is_none());

        let healthy = SessionLoopService::from_storage(fixed_clock(), &storage);
        let id = healthy.retry_persist(&mut session, user_id).await.unwrap();
        assert_eq!(session.result_row_id(), Some(id));

        // a second retry is a no-op returning the same row
        let again = healthy.retry_persist(&mut session, user_id).await.unwrap();
        assert_eq!(again, id);
    }

    #[tokio::test]
    async fn retry_persist_requires_a_finished_session() {
        let storage = seeded_storage(4).await;
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);
        let mut rng = StdRng::seed_from_u64(2);

        let mut session = service
            .start_session_with_rng(AssessmentId::new(1), &mut rng)
            .await
            .unwrap();
        let err = service.retry_persist(&mut session, user()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotCompleted));
    }

    #[tokio::test]
    async fn double_finish_does_not_append_twice() {
        let storage = seeded_storage(4).await;
        let service = SessionLoopService::from_storage(fixed_clock(), &storage);
        let mut rng = StdRng::seed_from_u64(2);
        let user_id = user();

        let mut session = service
            .start_session_with_rng(AssessmentId::new(1), &mut rng)
            .await
            .unwrap();
        let first = service
            .finish_session(&mut session, user_id, FinishReason::Submitted)
            .await
            .unwrap();
        let second = service
            .finish_session(&mut session, user_id, FinishReason::TimeExpired)
            .await
            .unwrap();

        assert_eq!(first.result, second.result);
        assert_eq!(first.result_row_id, second.result_row_id);
        let rows = storage
            .results
            .list_results_for_user(user_id, 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
