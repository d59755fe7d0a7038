use std::env;

use reqwest::Client;
use serde::Serialize;

use quiz_core::model::{SessionResult, UserId};

use crate::error::RemoteResultsError;

#[derive(Clone, Debug)]
pub struct RemoteResultsConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RemoteResultsConfig {
    /// Build the config from `QUIZ_RESULTS_BASE_URL` and `QUIZ_RESULTS_API_KEY`.
    ///
    /// Returns `None` unless both are set and non-blank; the service then runs
    /// with remote submission disabled.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_parts(
            env::var("QUIZ_RESULTS_API_KEY").ok(),
            env::var("QUIZ_RESULTS_BASE_URL").ok(),
        )
    }

    fn from_parts(api_key: Option<String>, base_url: Option<String>) -> Option<Self> {
        let api_key = api_key?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = base_url?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url, api_key })
    }
}

/// Pushes finished session results to a remote collection endpoint.
#[derive(Clone)]
pub struct RemoteResultsService {
    client: Client,
    config: Option<RemoteResultsConfig>,
}

impl RemoteResultsService {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(RemoteResultsConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<RemoteResultsConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Submit one finished result.
    ///
    /// # Errors
    ///
    /// Returns `RemoteResultsError` when the service is disabled or the
    /// request fails.
    pub async fn submit(
        &self,
        user_id: UserId,
        result: &SessionResult,
    ) -> Result<(), RemoteResultsError> {
        let config = self.config.as_ref().ok_or(RemoteResultsError::Disabled)?;

        let url = format!("{}/results", config.base_url.trim_end_matches('/'));
        let payload = ResultPayload::new(user_id, result);

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteResultsError::HttpStatus(response.status()));
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ResultPayload {
    user_id: String,
    session_id: String,
    assessment_id: u64,
    total_questions: u32,
    correct_answers: u32,
    score: u8,
    finish_reason: &'static str,
    started_at: String,
    completed_at: String,
    time_spent_secs: i64,
    category_breakdown: Vec<CategoryPayload>,
}

impl ResultPayload {
    fn new(user_id: UserId, result: &SessionResult) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: result.session_id().to_string(),
            assessment_id: result.assessment_id().value(),
            total_questions: result.total_questions(),
            correct_answers: result.correct_answers(),
            score: result.percentage(),
            finish_reason: result.finish_reason().as_str(),
            started_at: result.started_at().to_rfc3339(),
            completed_at: result.completed_at().to_rfc3339(),
            time_spent_secs: result.time_spent_secs(),
            category_breakdown: result
                .breakdown()
                .iter()
                .map(|score| CategoryPayload {
                    category: score.category.clone(),
                    correct: score.correct,
                    total: score.total,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CategoryPayload {
    category: String,
    correct: u32,
    total: u32,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
