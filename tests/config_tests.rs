// Integration tests for configuration loading

use anyhow::Result;
use interview_live::{Config, SessionConfig, TransportKind};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_missing_file_uses_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("absent");

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.service.name, "interview-live");
    assert_eq!(cfg.http_addr(), "127.0.0.1:7860");
    assert_eq!(cfg.backend.ws_base, "ws://localhost:8000");
    assert_eq!(cfg.transport.kind, TransportKind::WebSocket);
    assert_eq!(cfg.audio.chunk_interval_ms, 1000);
    Ok(())
}

#[test]
fn test_file_overrides_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("interview-live.toml");
    std::fs::write(
        &path,
        r#"
answer_placeholder = "[spoken answer]"

[backend]
api_base = "https://interviews.example.com/api"
ws_base = "wss://interviews.example.com"

[transport]
kind = "nats"

[audio]
chunk_interval_ms = 250
"#,
    )?;

    let cfg = Config::load(path.with_extension("").to_str().unwrap())?;

    assert_eq!(cfg.backend.api_base, "https://interviews.example.com/api");
    assert_eq!(cfg.backend.timeout_secs, 30, "Unset keys keep their default");
    assert_eq!(cfg.transport.kind, TransportKind::Nats);
    assert_eq!(cfg.audio.sample_rate, 16000);

    let session = SessionConfig::from_config(&cfg, "s1");
    assert_eq!(session.session_id, "s1");
    assert_eq!(session.chunk_interval, Duration::from_millis(250));
    assert_eq!(session.answer_placeholder, "[spoken answer]");
    Ok(())
}

#[test]
fn test_ws_alias_for_websocket_transport() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("alias.toml");
    std::fs::write(&path, "[transport]\nkind = \"ws\"\n")?;

    let cfg = Config::load(path.to_str().unwrap())?;
    assert_eq!(cfg.transport.kind, TransportKind::WebSocket);
    Ok(())
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/interview-live");
    let cfg = Config::load(path)?;

    assert_eq!(cfg.audio.channels, 1);
    assert!(!cfg.answer_placeholder.is_empty());
    Ok(())
}
