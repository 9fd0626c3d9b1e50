use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::SessionId;
use super::state::SessionState;

/// Live delivery metrics reported by the backend (0-100 each)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub clarity: Option<f64>,
    pub confidence: Option<f64>,
}

impl Analysis {
    /// Overwrite only the fields that are present; the rest keep their value
    pub fn merge(&mut self, clarity: Option<f64>, confidence: Option<f64>) {
        if let Some(value) = clarity.and_then(normalize) {
            self.clarity = Some(value);
        }
        if let Some(value) = confidence.and_then(normalize) {
            self.confidence = Some(value);
        }
    }
}

fn normalize(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

/// Point-in-time view of a live session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,

    pub state: SessionState,

    /// Latest question text from the backend
    pub current_question: Option<String>,

    /// Latest processing status text; cleared by the next question
    pub status_text: Option<String>,

    /// Seconds recorded in the current (or last) answer
    pub elapsed_seconds: u64,

    pub analysis: Analysis,

    /// Audio chunks handed to the transport
    pub chunks_sent: u64,

    /// Answers submitted with `user_answer_finished`
    pub answers_submitted: u64,

    /// Why the session failed, if it did
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// Whether the presentation layer should offer "start recording"
    pub fn can_record(&self) -> bool {
        self.state == SessionState::Active
    }
}
