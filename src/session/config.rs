use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::SessionError;
use crate::config::Config;

/// Opaque interview session identifier assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Validate a raw identifier; blank input is a [`SessionError::MissingSession`]
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, SessionError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SessionError::MissingSession);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for one live session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session identifier as received from the backend (validated on spawn)
    pub session_id: String,

    /// Audio duration per transmitted chunk
    /// Default: 1 second
    pub chunk_interval: Duration,

    /// Answer text sent with `user_answer_finished`
    pub answer_placeholder: String,
}

impl SessionConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &Config, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chunk_interval: Duration::from_millis(config.audio.chunk_interval_ms.max(1)),
            answer_placeholder: config.answer_placeholder.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            chunk_interval: Duration::from_secs(1),
            answer_placeholder: "[audio answer submitted]".to_string(),
        }
    }
}
