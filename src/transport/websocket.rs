use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{OutboundMessage, Transport, TransportError, TransportEvent, EVENT_BUFFER};
use crate::session::SessionId;

/// How long `close` waits for the writer to flush the close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket transport (`{base}/ws/interview/{session_id}`, JSON text frames)
pub struct WebSocketTransport {
    base_url: String,
    outbound: Option<mpsc::Sender<Message>>,
    writer_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            outbound: None,
            writer_task: None,
            reader_task: None,
        }
    }

    /// Endpoint scoped to one session
    pub fn endpoint(&self, session_id: &SessionId) -> String {
        format!("{}/ws/interview/{}", self.base_url, session_id)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(
        &mut self,
        session_id: &SessionId,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        if self.outbound.is_some() {
            return Err(TransportError::connect(
                self.endpoint(session_id),
                "already connected",
            ));
        }

        let url = self.endpoint(session_id);
        info!("Connecting WebSocket to {}", url);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::connect(&url, e))?;

        info!("WebSocket connected: {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(EVENT_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        // Writer: session -> backend
        let writer_task = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                if let Err(e) = ws_sender.send(message).await {
                    warn!("WebSocket send failed: {}", e);
                    return;
                }
            }

            // Sender dropped: say goodbye
            if let Err(e) = ws_sender.send(Message::Close(None)).await {
                debug!("WebSocket close frame not delivered: {}", e);
            }
        });

        // Reader: backend -> session
        let reader_task = tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.to_string()),
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                        let _ = event_tx.send(TransportEvent::Closed { reason }).await;
                        return;
                    }
                    Ok(_) => continue, // binary/ping/pong are not part of the protocol
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    return; // session gone
                }
            }

            let _ = event_tx.send(TransportEvent::Closed { reason: None }).await;
        });

        self.outbound = Some(out_tx);
        self.writer_task = Some(writer_task);
        self.reader_task = Some(reader_task);

        Ok(event_rx)
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        let json = message.encode()?;

        outbound
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| TransportError::send("WebSocket writer has stopped"))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the sender lets the writer emit a close frame and exit
        let had_connection = self.outbound.take().is_some();

        if let Some(writer) = self.writer_task.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, writer).await.is_err() {
                warn!("WebSocket writer did not finish within {:?}", CLOSE_TIMEOUT);
            }
        }

        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }

        if had_connection {
            info!("WebSocket connection closed");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }
    }
}
