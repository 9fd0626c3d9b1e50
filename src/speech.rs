//! Question read-aloud
//!
//! Speech is best-effort: failures are logged and never reach the session.

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`; returns when playback has finished
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Prints questions to stdout (terminal sessions)
pub struct ConsoleSpeech;

#[async_trait]
impl SpeechSynthesizer for ConsoleSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\nInterviewer: {}", text)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Discards everything (headless sessions driven over HTTP)
pub struct SilentSpeech;

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    async fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
