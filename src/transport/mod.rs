//! Duplex message channel between a live session and the interview backend
//!
//! A transport is connected exactly once per session and never reused:
//! - `connect` opens the channel and hands back a receiver of [`TransportEvent`]s
//! - `send` writes one [`OutboundMessage`]
//! - `close` shuts the channel down (safe to call after the peer went away)

mod error;
pub mod messages;
pub mod nats;
pub mod websocket;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::session::SessionId;

pub use error::TransportError;
pub use messages::{decode_inbound, InboundMessage, OutboundMessage};
pub use nats::NatsTransport;
pub use websocket::WebSocketTransport;

/// Capacity of the inbound event channel handed to the session
pub const EVENT_BUFFER: usize = 64;

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text payload from the backend (undecoded)
    Message(String),
    /// The peer closed the channel
    Closed { reason: Option<String> },
    /// The channel failed
    Error(String),
}

#[async_trait]
pub trait Transport: Send {
    /// Open the channel for `session_id`
    ///
    /// Returns a receiver of inbound events. The receiver ending without a
    /// `Closed` event is treated as an unexpected close.
    async fn connect(
        &mut self,
        session_id: &SessionId,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Send one message to the backend
    async fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Close the channel
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

/// Which transport carries interview events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[serde(alias = "ws")]
    WebSocket,
    Nats,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Nats => "nats",
        }
    }
}

/// Transport factory
pub struct TransportFactory;

impl TransportFactory {
    /// Create a fresh, unconnected transport from configuration
    pub fn create(config: &Config) -> Box<dyn Transport> {
        match config.transport.kind {
            TransportKind::WebSocket => Box::new(WebSocketTransport::new(&config.backend.ws_base)),
            TransportKind::Nats => Box::new(NatsTransport::new(&config.transport.nats_url)),
        }
    }
}
