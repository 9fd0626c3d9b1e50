//! Backend REST calls around a live session: creating it and fetching its report

mod client;
mod models;

pub use client::{ApiError, BackendClient};
pub use models::{InterviewReport, InterviewSetup, StartInterviewResponse};
