//! Live interview session management
//!
//! This module provides the `LiveSessionController` that manages:
//! - The transport connection to the interview backend
//! - Microphone access and chunked audio capture while answering
//! - The turn-taking state machine (question, record, submit, next question)
//! - Teardown of every acquired resource when the session ends

mod config;
mod controller;
mod error;
pub mod machine;
mod state;
mod stats;

pub use config::{SessionConfig, SessionId};
pub use controller::LiveSessionController;
pub use error::SessionError;
pub use machine::{Effect, Event, SessionMachine};
pub use state::{SessionNotice, SessionState};
pub use stats::{Analysis, SessionSnapshot};
