use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Message received from the interview backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Next interview question, read aloud when it arrives
    Question { content: String },

    /// Processing status shown while the backend evaluates an answer
    Status { content: String },

    /// Live delivery metrics (0-100). Absent fields keep their previous value.
    Analysis {
        #[serde(default)]
        clarity: Option<f64>,
        #[serde(default)]
        confidence: Option<f64>,
    },

    /// Interview finished, report is available
    End,
}

/// Message sent to the interview backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One captured chunk of audio
    AudioChunk {
        /// Base64-encoded chunk bytes
        data: String,
    },

    /// The candidate finished answering the current question
    UserAnswerFinished { content: String },
}

impl OutboundMessage {
    pub fn audio_chunk(bytes: &[u8]) -> Self {
        Self::AudioChunk {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn answer_finished(content: impl Into<String>) -> Self {
        Self::UserAnswerFinished {
            content: content.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AudioChunk { .. } => "audio_chunk",
            Self::UserAnswerFinished { .. } => "user_answer_finished",
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Decode a text frame from the backend.
///
/// Unknown `type` values and malformed payloads yield `None`; the caller drops them.
pub fn decode_inbound(text: &str) -> Option<InboundMessage> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Dropping unrecognized inbound message: {} ({})", truncate(text, 120), e);
            None
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
