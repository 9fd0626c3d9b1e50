use std::time::Duration;

use anyhow::Context;
use async_nats::{Client, ConnectOptions, Event};
use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{OutboundMessage, Transport, TransportError, TransportEvent, EVENT_BUFFER};
use crate::session::SessionId;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// NATS transport
///
/// Client events are published on `interview.{session_id}.client`, backend
/// events are received on `interview.{session_id}.server`.
pub struct NatsTransport {
    url: String,
    client: Option<Client>,
    publish_subject: String,
    reader_task: Option<JoinHandle<()>>,
}

impl NatsTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: None,
            publish_subject: String::new(),
            reader_task: None,
        }
    }

    pub fn client_subject(session_id: &SessionId) -> String {
        format!("interview.{}.client", session_id)
    }

    pub fn server_subject(session_id: &SessionId) -> String {
        format!("interview.{}.server", session_id)
    }

    /// Map a client connection event to a transport event
    ///
    /// The client reconnects on its own, but messages published while it is
    /// away are lost, so a dropped connection fails the session.
    pub fn connection_event(event: &Event) -> Option<TransportEvent> {
        match event {
            Event::Disconnected => Some(TransportEvent::Error("NATS connection lost".to_string())),
            Event::ClientError(e) => Some(TransportEvent::Error(format!("NATS client error: {}", e))),
            _ => None,
        }
    }

    async fn open(
        &self,
        session_id: &SessionId,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> anyhow::Result<(Client, async_nats::Subscriber)> {
        let client = ConnectOptions::new()
            .event_callback(move |event| {
                let event_tx = event_tx.clone();
                async move {
                    if let Some(transport_event) = NatsTransport::connection_event(&event) {
                        warn!("NATS connection event: {}", event);
                        let _ = event_tx.send(transport_event).await;
                    }
                }
            })
            .connect(self.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        let subject = Self::server_subject(session_id);
        let subscriber = client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        Ok((client, subscriber))
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn connect(
        &mut self,
        session_id: &SessionId,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        if self.client.is_some() {
            return Err(TransportError::connect(&self.url, "already connected"));
        }

        info!("Connecting to NATS at {}", self.url);

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (client, mut subscriber) = self
            .open(session_id, event_tx.clone())
            .await
            .map_err(|e| TransportError::connect(&self.url, format!("{:#}", e)))?;

        info!("Subscribed to {}", Self::server_subject(session_id));

        let reader_task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let text = match String::from_utf8(msg.payload.to_vec()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping non-UTF-8 NATS payload on {}: {}", msg.subject, e);
                        continue;
                    }
                };

                if event_tx.send(TransportEvent::Message(text)).await.is_err() {
                    return;
                }
            }

            let _ = event_tx
                .send(TransportEvent::Closed {
                    reason: Some("NATS subscription ended".to_string()),
                })
                .await;
        });

        self.publish_subject = Self::client_subject(session_id);
        self.client = Some(client);
        self.reader_task = Some(reader_task);

        Ok(event_rx)
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        let payload = serde_json::to_vec(message)?;

        client
            .publish(self.publish_subject.clone(), payload.into())
            .await
            .map_err(|e| TransportError::send(e))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }

        if let Some(client) = self.client.take() {
            info!("Closing NATS connection");
            match tokio::time::timeout(CLOSE_TIMEOUT, client.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to flush NATS client: {}", e),
                Err(_) => warn!("NATS flush did not finish within {:?}", CLOSE_TIMEOUT),
            }
            // async-nats handles cleanup on drop
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}

impl Drop for NatsTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }
    }
}
