use std::time::Duration;

use thiserror::Error;
use tracing::info;

use super::models::{InterviewReport, InterviewSetup, StartInterviewResponse};
use crate::config::BackendConfig;
use crate::session::SessionId;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("backend did not return a session id")]
    MissingSessionId,
}

/// REST client for the interview backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /interview/start`: create a session and return its id
    pub async fn start_interview(&self, setup: &InterviewSetup) -> Result<SessionId, ApiError> {
        let url = format!("{}/interview/start", self.base_url);
        info!("Starting interview ({} / {})", setup.role, setup.interview_type);

        let response = self.client.post(&url).json(setup).send().await?;
        let response = check_status(response).await?;

        let body: StartInterviewResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        let session_id = body
            .session_id
            .as_deref()
            .ok_or(ApiError::MissingSessionId)
            .and_then(|raw| SessionId::parse(raw).map_err(|_| ApiError::MissingSessionId))?;

        info!("Interview session created: {}", session_id);
        Ok(session_id)
    }

    /// `GET /interview/report/{session_id}`
    pub async fn fetch_report(&self, session_id: &SessionId) -> Result<InterviewReport, ApiError> {
        let url = format!("{}/interview/report/{}", self.base_url, session_id);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON parse error: {}", e)))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(ApiError::Server {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}
