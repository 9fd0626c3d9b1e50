use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {endpoint} failed: {message}")]
    Connect { endpoint: String, message: String },
    #[error("transport is not connected")]
    NotConnected,
    #[error("send failed: {message}")]
    Send { message: String },
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    pub fn connect(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn send(message: impl ToString) -> Self {
        Self::Send {
            message: message.to_string(),
        }
    }
}
