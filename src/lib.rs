pub mod api;
pub mod audio;
pub mod config;
pub mod http;
pub mod session;
pub mod speech;
pub mod transport;

pub use api::{ApiError, BackendClient, InterviewReport, InterviewSetup};
pub use audio::{
    AudioChunk, AudioFile, AudioFrame, CaptureError, ChunkConfig, ChunkEncoder, ChunkStream,
    FileCaptor, MediaCaptor, MediaStream, MediaTrack, TrackKind,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{
    Analysis, LiveSessionController, SessionConfig, SessionError, SessionId, SessionNotice,
    SessionSnapshot, SessionState,
};
pub use speech::{ConsoleSpeech, SilentSpeech, SpeechSynthesizer};
pub use transport::{
    InboundMessage, NatsTransport, OutboundMessage, Transport, TransportError, TransportEvent,
    TransportFactory, TransportKind, WebSocketTransport,
};
