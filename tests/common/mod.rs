// Test doubles shared by the session integration tests
//
// Every double is split into the part handed to the controller and a handle
// the test keeps to script and inspect it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use interview_live::transport::EVENT_BUFFER;
use interview_live::{
    AudioChunk, CaptureError, ChunkStream, LiveSessionController, MediaCaptor, MediaStream,
    MediaTrack, OutboundMessage, SessionConfig, SessionId, SessionNotice, SessionSnapshot,
    SessionState, SpeechSynthesizer, TrackKind, Transport, TransportError, TransportEvent,
};
use tokio::sync::{mpsc, oneshot, Notify};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Transport
// ============================================================================

#[derive(Default)]
struct TransportShared {
    sent: Mutex<Vec<OutboundMessage>>,
    inbound: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    connected_ids: Mutex<Vec<String>>,
    closes: AtomicUsize,
    fail_connect: AtomicBool,
    fail_sends: AtomicBool,
    connect_gate: Mutex<Option<Arc<Notify>>>,
}

pub struct MockTransport {
    shared: Arc<TransportShared>,
}

#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<TransportShared>,
}

impl MockTransport {
    pub fn new() -> (Self, TransportHandle) {
        let shared = Arc::new(TransportShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            TransportHandle { shared },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &mut self,
        session_id: &SessionId,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        self.shared
            .connected_ids
            .lock()
            .unwrap()
            .push(session_id.to_string());

        let gate = self.shared.connect_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.shared.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::connect("mock://backend", "connection refused"));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *self.shared.inbound.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::send("broken pipe"));
        }
        self.shared.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl TransportHandle {
    pub fn fail_connect(&self) {
        self.shared.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_sends(&self) {
        self.shared.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Hold `connect` until [`TransportHandle::release_connect`]
    pub fn hold_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.shared.connect_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.connected_ids.lock().unwrap().len()
    }

    pub fn connected_ids(&self) -> Vec<String> {
        self.shared.connected_ids.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub fn audio_chunks_sent(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, OutboundMessage::AudioChunk { .. }))
            .count()
    }

    pub fn answers_sent(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::UserAnswerFinished { content } => Some(content),
                _ => None,
            })
            .collect()
    }

    /// Deliver a raw text frame from the "backend"
    pub async fn push(&self, text: &str) {
        self.emit(TransportEvent::Message(text.to_string())).await;
    }

    pub async fn server_close(&self, reason: &str) {
        self.emit(TransportEvent::Closed {
            reason: Some(reason.to_string()),
        })
        .await;
    }

    /// Report a dropped connection the way a transport's client does
    pub async fn connection_lost(&self, error: &str) {
        self.emit(TransportEvent::Error(error.to_string())).await;
    }

    async fn emit(&self, event: TransportEvent) {
        let deadline = tokio::time::Instant::now() + WAIT;
        let sender = loop {
            if let Some(sender) = self.shared.inbound.lock().unwrap().clone() {
                break sender;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "transport never connected"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        // The session may already be gone; that is part of some tests
        let _ = sender.send(event).await;
    }
}

// ============================================================================
// Media capture
// ============================================================================

#[derive(Default)]
struct CaptorShared {
    requests: AtomicUsize,
    captures: AtomicUsize,
    released: AtomicUsize,
    next_index: AtomicU64,
    deny: Mutex<Option<CaptureError>>,
    access_gate: Mutex<Option<Arc<Notify>>>,
    chunks: Mutex<Option<mpsc::Sender<AudioChunk>>>,
}

pub struct MockCaptor {
    shared: Arc<CaptorShared>,
}

#[derive(Clone)]
pub struct CaptorHandle {
    shared: Arc<CaptorShared>,
}

impl MockCaptor {
    pub fn new() -> (Self, CaptorHandle) {
        let shared = Arc::new(CaptorShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            CaptorHandle { shared },
        )
    }
}

struct MockTrack {
    shared: Arc<CaptorShared>,
}

impl MediaTrack for MockTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> &str {
        "mock microphone"
    }

    fn stop(&mut self) {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaCaptor for MockCaptor {
    async fn request_access(&self) -> Result<MediaStream, CaptureError> {
        self.shared.requests.fetch_add(1, Ordering::SeqCst);

        let gate = self.shared.access_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(error) = self.shared.deny.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(MediaStream::new(vec![Box::new(MockTrack {
            shared: Arc::clone(&self.shared),
        })]))
    }

    async fn start_chunked_capture(
        &self,
        _stream: &MediaStream,
        _interval: Duration,
    ) -> Result<ChunkStream, CaptureError> {
        self.shared.captures.fetch_add(1, Ordering::SeqCst);

        let (chunk_tx, chunk_rx) = mpsc::channel(16);
        let (stop_tx, _stop_rx) = oneshot::channel();
        *self.shared.chunks.lock().unwrap() = Some(chunk_tx);
        Ok(ChunkStream::new(chunk_rx, stop_tx))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl CaptorHandle {
    pub fn deny(&self, error: CaptureError) {
        *self.shared.deny.lock().unwrap() = Some(error);
    }

    pub fn allow(&self) {
        *self.shared.deny.lock().unwrap() = None;
    }

    /// Hold `request_access` (an open permission prompt) until notified
    pub fn hold_access(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.shared.access_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn requests(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.shared.captures.load(Ordering::SeqCst)
    }

    /// Tracks stopped so far
    pub fn released(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Whether the most recent capture is still being consumed
    pub fn capture_running(&self) -> bool {
        self.shared
            .chunks
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Emit one chunk from the running capture; `false` if it was stopped
    pub async fn push_chunk(&self, data: &[u8]) -> bool {
        let Some(sender) = self.shared.chunks.lock().unwrap().clone() else {
            return false;
        };
        let index = self.shared.next_index.fetch_add(1, Ordering::SeqCst);
        sender
            .send(AudioChunk {
                index,
                data: data.to_vec(),
                started_ms: index * 1000,
                duration_ms: 1000,
            })
            .await
            .is_ok()
    }
}

// ============================================================================
// Speech
// ============================================================================

#[derive(Clone, Default)]
pub struct RecordingSpeech {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: Arc<LiveSessionController>,
    pub transport: TransportHandle,
    pub captor: CaptorHandle,
    pub speech: RecordingSpeech,
}

pub struct Doubles {
    pub transport: MockTransport,
    pub transport_handle: TransportHandle,
    pub captor: MockCaptor,
    pub captor_handle: CaptorHandle,
}

pub fn doubles() -> Doubles {
    let (transport, transport_handle) = MockTransport::new();
    let (captor, captor_handle) = MockCaptor::new();
    Doubles {
        transport,
        transport_handle,
        captor,
        captor_handle,
    }
}

impl Doubles {
    pub fn spawn(self, session_id: &str) -> Harness {
        let speech = RecordingSpeech::default();
        let controller = LiveSessionController::spawn(
            SessionConfig::new(session_id),
            Box::new(self.transport),
            Arc::new(self.captor),
            Arc::new(speech.clone()),
        )
        .expect("session should spawn");

        Harness {
            controller: Arc::new(controller),
            transport: self.transport_handle,
            captor: self.captor_handle,
            speech,
        }
    }
}

/// Spawn a session and wait until it is `Active`
pub async fn active_session(session_id: &str) -> Harness {
    let harness = doubles().spawn(session_id);
    harness.wait_for_state(SessionState::Active).await;
    harness
}

/// Spawn a session and take it to `Recording`
pub async fn recording_session(session_id: &str) -> Harness {
    let harness = active_session(session_id).await;
    harness
        .transport
        .push(r#"{"type":"question","content":"Tell me about yourself"}"#)
        .await;
    harness
        .wait_until(|s| s.current_question.is_some())
        .await;
    harness
        .controller
        .start_recording()
        .await
        .expect("recording should start");
    assert_eq!(harness.controller.state(), SessionState::Recording);
    harness
}

impl Harness {
    pub async fn wait_for_state(&self, state: SessionState) -> SessionSnapshot {
        self.wait_until(|s| s.state == state).await
    }

    pub async fn wait_until(
        &self,
        condition: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut snapshots = self.controller.subscribe();
        let result = tokio::time::timeout(WAIT, snapshots.wait_for(condition))
            .await
            .expect("timed out waiting for session snapshot")
            .map(|s| s.clone());
        result.expect("session snapshots closed")
    }

    pub async fn next_notice(&self) -> SessionNotice {
        tokio::time::timeout(WAIT, self.controller.next_notice())
            .await
            .expect("timed out waiting for a notice")
            .expect("notice channel closed")
    }
}

/// Poll `check` until it holds
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
