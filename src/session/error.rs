use thiserror::Error;

use super::state::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session id was supplied; nothing was connected
    #[error("a session id is required before connecting")]
    MissingSession,

    /// Microphone access refused; the session stays active and may retry
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// Capture could not start for a reason other than permission
    #[error("media capture failed: {0}")]
    Capture(String),

    #[error("cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("a microphone access request is already pending")]
    AccessPending,

    /// Connect failure or unexpected close; the session is over
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("session has been disposed")]
    Disposed,
}

impl SessionError {
    /// Fatal errors end the session; the rest leave it usable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::MissingSession | SessionError::Transport(_)
        )
    }
}
