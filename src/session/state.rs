use serde::Serialize;
use std::fmt;

use super::config::SessionId;
use super::error::SessionError;

/// Turn-taking state of a live session
///
/// `Connecting -> Active -> Recording -> Processing -> Active ... -> Ended`,
/// with `Errored` reachable from anywhere. `Ended` and `Errored` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Recording,
    Processing,
    Ended,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Errored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Recording => "recording",
            SessionState::Processing => "processing",
            SessionState::Ended => "ended",
            SessionState::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Out-of-band signal for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The interview is over; show the report for this session
    ShowReport { session_id: SessionId },
    /// The session failed and has released its resources
    Failed(SessionError),
    /// A recording attempt was refused; the session is still usable
    RecordingRejected(SessionError),
}
