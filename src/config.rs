use anyhow::Result;
use serde::Deserialize;

use crate::transport::TransportKind;

/// Environment prefix for overrides, e.g. `INTERVIEW_LIVE__BACKEND__API_BASE`
const ENV_PREFIX: &str = "INTERVIEW_LIVE";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub transport: TransportConfig,
    pub audio: AudioConfig,
    /// Text sent as the answer body when a recording stops
    pub answer_placeholder: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// REST base, e.g. http://localhost:8000/api
    pub api_base: String,
    /// WebSocket base, e.g. ws://localhost:8000
    pub ws_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub nats_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub chunk_interval_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Config {
    /// Load from `path` (any format the `config` crate detects), layered over
    /// [`Config::default`] and under `INTERVIEW_LIVE__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let defaults = Config::default();

        let settings = config::Config::builder()
            .set_default("service.name", defaults.service.name)?
            .set_default("service.http.bind", defaults.service.http.bind)?
            .set_default("service.http.port", defaults.service.http.port as i64)?
            .set_default("backend.api_base", defaults.backend.api_base)?
            .set_default("backend.ws_base", defaults.backend.ws_base)?
            .set_default("backend.timeout_secs", defaults.backend.timeout_secs as i64)?
            .set_default("transport.kind", defaults.transport.kind.as_str())?
            .set_default("transport.nats_url", defaults.transport.nats_url)?
            .set_default("audio.chunk_interval_ms", defaults.audio.chunk_interval_ms as i64)?
            .set_default("audio.sample_rate", defaults.audio.sample_rate as i64)?
            .set_default("audio.channels", defaults.audio.channels as i64)?
            .set_default("answer_placeholder", defaults.answer_placeholder)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "interview-live".to_string(),
                http: HttpConfig {
                    bind: "127.0.0.1".to_string(),
                    port: 7860,
                },
            },
            backend: BackendConfig {
                api_base: "http://localhost:8000/api".to_string(),
                ws_base: "ws://localhost:8000".to_string(),
                timeout_secs: 30,
            },
            transport: TransportConfig {
                kind: TransportKind::WebSocket,
                nats_url: "nats://localhost:4222".to_string(),
            },
            audio: AudioConfig {
                chunk_interval_ms: 1000, // one chunk per second
                sample_rate: 16000,
                channels: 1,
            },
            answer_placeholder: "[audio answer submitted]".to_string(),
        }
    }
}
