use crate::api::BackendClient;
use crate::audio::MediaCaptor;
use crate::config::Config;
use crate::session::{LiveSessionController, SessionId};
use crate::speech::{SilentSpeech, SpeechSynthesizer};
use crate::transport::{Transport, TransportFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds a fresh transport for each new session
pub type TransportFactoryFn = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Backend used to create sessions when the caller has no id yet
    pub backend: BackendClient,

    /// Live sessions (session_id → controller)
    pub sessions: Arc<RwLock<HashMap<SessionId, Arc<LiveSessionController>>>>,

    pub transports: TransportFactoryFn,

    pub captor: Arc<dyn MediaCaptor>,

    pub speech: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    pub fn new(config: Config, backend: BackendClient, captor: Arc<dyn MediaCaptor>) -> Self {
        let config = Arc::new(config);
        let transport_config = Arc::clone(&config);

        Self {
            config,
            backend,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            transports: Arc::new(move || TransportFactory::create(&transport_config)),
            captor,
            speech: Arc::new(SilentSpeech),
        }
    }

    pub fn with_transports(mut self, transports: TransportFactoryFn) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = speech;
        self
    }

    /// Dispose every live session (server shutdown)
    pub async fn dispose_all(&self) {
        let sessions: Vec<_> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in sessions {
            session.dispose().await;
        }
    }
}
