use serde::{Deserialize, Serialize};

/// Interview setup submitted before a live session starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSetup {
    pub role: String,
    pub experience: String,
    pub interview_type: String,
    pub question_count: u32,
    #[serde(default)]
    pub resume_context: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for InterviewSetup {
    fn default() -> Self {
        Self {
            role: "Software Engineer".to_string(),
            experience: "0-1 years".to_string(),
            interview_type: "Technical".to_string(),
            question_count: 8,
            resume_context: None,
            user_id: None,
        }
    }
}

/// Response to `POST /interview/start`
///
/// Questions arrive over the live transport; anything else in the body is
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StartInterviewResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Finished interview report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewReport {
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
    /// The full report as returned by the backend
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
