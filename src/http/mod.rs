//! HTTP API for the presentation layer
//!
//! This module provides a REST API for driving live sessions:
//! - POST /sessions - Create a session (or adopt an existing backend id)
//! - GET /sessions - List sessions
//! - GET /sessions/:id - Current snapshot
//! - POST /sessions/:id/recording/start - Start answering
//! - POST /sessions/:id/recording/stop - Submit the answer
//! - DELETE /sessions/:id - Dispose a session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{CreateSessionRequest, ErrorResponse};
pub use routes::create_router;
pub use state::{AppState, TransportFactoryFn};
