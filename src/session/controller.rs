use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, error, info, warn};

use super::config::{SessionConfig, SessionId};
use super::error::SessionError;
use super::machine::{Effect, Event, SessionMachine};
use super::state::{SessionNotice, SessionState};
use super::stats::SessionSnapshot;
use crate::audio::{AudioChunk, CaptureError, ChunkStream, MediaCaptor, MediaStream};
use crate::speech::SpeechSynthesizer;
use crate::transport::{decode_inbound, Transport, TransportError, TransportEvent};

/// Elapsed-time resolution while recording
const TICK: Duration = Duration::from_secs(1);

type StartReply = oneshot::Sender<Result<(), SessionError>>;

enum Command {
    StartRecording { reply: StartReply },
    StopRecording { reply: oneshot::Sender<()> },
    Dispose { reply: oneshot::Sender<()> },
}

/// Drives one live interview session
///
/// All state lives in a single driver task; this handle only sends commands
/// and reads snapshots. Dropping the handle disposes the session.
pub struct LiveSessionController {
    session_id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notices: Mutex<mpsc::UnboundedReceiver<SessionNotice>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSessionController {
    /// Validate the session id and start connecting
    ///
    /// Fails with [`SessionError::MissingSession`] before touching the
    /// transport when the id is blank. Connection failures are reported
    /// asynchronously: the session moves to `Errored` and a
    /// [`SessionNotice::Failed`] is emitted.
    pub fn spawn(
        config: SessionConfig,
        transport: Box<dyn Transport>,
        captor: Arc<dyn MediaCaptor>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self, SessionError> {
        let session_id = SessionId::parse(&config.session_id).inspect_err(|_| {
            error!("Refusing to start a live session without a session id");
        })?;

        let machine = SessionMachine::new(session_id.clone(), config.answer_placeholder.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (acquired_tx, acquired_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            transport,
            transport_open: false,
            captor,
            speech,
            chunk_interval: config.chunk_interval,
            commands: command_rx,
            snapshots: snapshot_tx,
            notices: notice_tx,
            acquired_tx,
            acquired_rx,
            attempt: 0,
            pending_attempt: None,
            pending_start: None,
            granted: None,
            capture: None,
            timer: None,
            speech_task: None,
        };

        info!(session_id = %session_id, "Live session created");
        let handle = tokio::spawn(driver.run());

        Ok(Self {
            session_id,
            commands: command_tx,
            snapshots: snapshot_rx,
            notices: Mutex::new(notice_rx),
            driver: Mutex::new(Some(handle)),
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.snapshots.borrow().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the next notice; `None` once the session is gone and drained
    pub async fn next_notice(&self) -> Option<SessionNotice> {
        self.notices.lock().await.recv().await
    }

    pub async fn try_next_notice(&self) -> Option<SessionNotice> {
        self.notices.lock().await.try_recv().ok()
    }

    /// Resolve once the session reaches `Ended` or `Errored`
    pub async fn wait_finished(&self) -> SessionSnapshot {
        let mut rx = self.snapshots.clone();
        let result = rx.wait_for(|s| s.state.is_terminal()).await.map(|s| s.clone());
        result.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Start recording an answer
    ///
    /// Resolves once capture is running. Permission denial leaves the
    /// session `Active` so the caller can retry.
    pub async fn start_recording(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::StartRecording { reply }).is_err() {
            return Err(self.closed_error("start recording"));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(self.closed_error("start recording")),
        }
    }

    /// Stop recording and submit the answer; a no-op unless recording
    pub async fn stop_recording(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::StopRecording { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Tear the session down; safe to call any number of times
    pub async fn dispose(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Dispose { reply }).is_ok() {
            let _ = rx.await;
        }

        let handle = self.driver.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(session_id = %self.session_id, "Session driver panicked: {}", e);
            }
        }
    }

    fn closed_error(&self, action: &'static str) -> SessionError {
        let state = self.state();
        if state.is_terminal() {
            SessionError::InvalidState { action, state }
        } else {
            SessionError::Disposed
        }
    }
}

/// Microphone stream plus the capture running on it
struct Granted {
    stream: MediaStream,
    chunks: ChunkStream,
}

struct ActiveCapture {
    stream: MediaStream,
    chunks: ChunkStream,
    exhausted: bool,
}

struct Acquisition {
    attempt: u64,
    result: Result<Granted, CaptureError>,
}

enum Connect {
    Done(Result<mpsc::Receiver<TransportEvent>, TransportError>),
    Disposed(Option<oneshot::Sender<()>>),
}

struct Driver {
    machine: SessionMachine,
    transport: Box<dyn Transport>,
    transport_open: bool,
    captor: Arc<dyn MediaCaptor>,
    speech: Arc<dyn SpeechSynthesizer>,
    chunk_interval: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    notices: mpsc::UnboundedSender<SessionNotice>,
    acquired_tx: mpsc::UnboundedSender<Acquisition>,
    acquired_rx: mpsc::UnboundedReceiver<Acquisition>,
    attempt: u64,
    pending_attempt: Option<u64>,
    pending_start: Option<StartReply>,
    granted: Option<Granted>,
    capture: Option<ActiveCapture>,
    timer: Option<Interval>,
    speech_task: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self) {
        let session_id = self.machine.session_id().clone();

        let Some(mut inbound) = self.connect(&session_id).await else {
            self.shutdown().await;
            return;
        };

        while !self.machine.state().is_terminal() {
            tokio::select! {
                command = self.commands.recv() => self.on_command(command).await,
                event = inbound.recv() => {
                    let event = event.unwrap_or(TransportEvent::Closed { reason: None });
                    self.on_transport_event(event).await;
                }
                Some(acquisition) = self.acquired_rx.recv() => self.on_acquisition(acquisition).await,
                chunk = next_chunk(&mut self.capture) => match chunk {
                    Some(chunk) => self.on_chunk(chunk).await,
                    None => {
                        if let Some(capture) = self.capture.as_mut() {
                            capture.exhausted = true;
                        }
                        info!(session_id = %session_id, "Capture source ended");
                    }
                },
                _ = next_tick(&mut self.timer) => {
                    let effects = self.machine.handle(Event::Tick);
                    self.apply(effects, None).await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Connect the transport, still answering commands while it is in flight
    async fn connect(&mut self, session_id: &SessionId) -> Option<mpsc::Receiver<TransportEvent>> {
        info!(
            session_id = %session_id,
            transport = self.transport.name(),
            "Connecting live session"
        );

        let outcome = {
            let connect = self.transport.connect(session_id);
            tokio::pin!(connect);

            loop {
                tokio::select! {
                    result = &mut connect => break Connect::Done(result),
                    command = self.commands.recv() => match command {
                        Some(Command::StartRecording { reply }) => {
                            let _ = reply.send(Err(SessionError::InvalidState {
                                action: "start recording",
                                state: SessionState::Connecting,
                            }));
                        }
                        Some(Command::StopRecording { reply }) => {
                            let _ = reply.send(());
                        }
                        Some(Command::Dispose { reply }) => break Connect::Disposed(Some(reply)),
                        None => break Connect::Disposed(None),
                    },
                }
            }
        };

        match outcome {
            Connect::Done(Ok(inbound)) => {
                self.transport_open = true;
                info!(session_id = %session_id, "Live session connected");
                let effects = self.machine.handle(Event::Opened);
                self.apply(effects, None).await;
                Some(inbound)
            }
            Connect::Done(Err(e)) => {
                error!(session_id = %session_id, "Failed to connect live session: {}", e);
                let effects = self.machine.handle(Event::TransportFailed(e.to_string()));
                self.apply(effects, None).await;
                None
            }
            Connect::Disposed(reply) => {
                info!(session_id = %session_id, "Live session disposed while connecting");
                let effects = self.machine.handle(Event::Disposed);
                self.apply(effects, None).await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                None
            }
        }
    }

    async fn on_command(&mut self, command: Option<Command>) {
        match command {
            Some(Command::StartRecording { reply }) => {
                let effects = self.machine.handle(Event::StartRequested);
                self.apply(effects, Some(reply)).await;
            }
            Some(Command::StopRecording { reply }) => {
                let effects = self.machine.handle(Event::StopRequested);
                self.apply(effects, None).await;
                let _ = reply.send(());
            }
            Some(Command::Dispose { reply }) => {
                let effects = self.machine.handle(Event::Disposed);
                self.apply(effects, None).await;
                let _ = reply.send(());
            }
            None => {
                // Every handle is gone
                let effects = self.machine.handle(Event::Disposed);
                self.apply(effects, None).await;
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        let event = match event {
            TransportEvent::Message(text) => match decode_inbound(&text) {
                Some(message) => {
                    debug!(session_id = %self.machine.session_id(), "Inbound {:?}", message);
                    Event::Inbound(message)
                }
                None => return,
            },
            TransportEvent::Closed { reason } => {
                let reason = match reason {
                    Some(reason) => format!("connection closed unexpectedly: {}", reason),
                    None => "connection closed unexpectedly".to_string(),
                };
                error!(session_id = %self.machine.session_id(), "{}", reason);
                Event::TransportFailed(reason)
            }
            TransportEvent::Error(e) => {
                error!(session_id = %self.machine.session_id(), "Transport error: {}", e);
                Event::TransportFailed(e)
            }
        };

        let effects = self.machine.handle(event);
        self.apply(effects, None).await;
    }

    async fn on_acquisition(&mut self, acquisition: Acquisition) {
        if self.pending_attempt != Some(acquisition.attempt) {
            debug!("Ignoring stale access result #{}", acquisition.attempt);
            return; // dropping it releases the stream
        }
        self.pending_attempt = None;

        let event = match acquisition.result {
            Ok(granted) => {
                self.granted = Some(granted);
                Event::AccessGranted
            }
            Err(CaptureError::PermissionDenied(message)) => {
                warn!(session_id = %self.machine.session_id(), "Microphone access denied: {}", message);
                Event::AccessDenied(SessionError::PermissionDenied(message))
            }
            Err(e) => {
                warn!(session_id = %self.machine.session_id(), "Failed to start capture: {}", e);
                Event::AccessDenied(SessionError::Capture(e.to_string()))
            }
        };

        let effects = self.machine.handle(event);
        self.apply(effects, None).await;

        // Anything granted but not activated goes back
        self.discard_access();
    }

    async fn on_chunk(&mut self, chunk: AudioChunk) {
        debug!(
            session_id = %self.machine.session_id(),
            "Captured chunk {} ({} bytes)",
            chunk.index,
            chunk.data.len()
        );
        let effects = self.machine.handle(Event::ChunkCaptured(chunk));
        self.apply(effects, None).await;
    }

    async fn apply(&mut self, effects: Vec<Effect>, mut reply: Option<StartReply>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Speak(text) => self.speak(text),
                Effect::RequestAccess => self.request_access(reply.take()),
                Effect::RejectStart(e) => {
                    if let Some(reply) = reply.take() {
                        let _ = reply.send(Err(e));
                    }
                }
                Effect::StartCompleted(result) => {
                    if let Some(pending) = self.pending_start.take() {
                        let _ = pending.send(result);
                    }
                }
                Effect::ActivateCapture => self.activate_capture(),
                Effect::DiscardAccess => self.discard_access(),
                Effect::EndCapture => self.end_capture(),
                Effect::Send(message) => {
                    if !self.transport_open {
                        continue;
                    }
                    if let Err(e) = self.transport.send(&message).await {
                        error!(
                            session_id = %self.machine.session_id(),
                            "Failed to send {}: {}",
                            message.kind(),
                            e
                        );
                        queue.extend(self.machine.handle(Event::TransportFailed(e.to_string())));
                    }
                }
                Effect::CloseTransport => self.close_transport().await,
                Effect::ReleaseMedia => self.release_media(),
                Effect::CancelSpeech => self.cancel_speech(),
                Effect::Notify(notice) => {
                    let _ = self.notices.send(notice);
                }
            }
        }

        self.publish();
    }

    fn request_access(&mut self, reply: Option<StartReply>) {
        self.attempt += 1;
        let attempt = self.attempt;
        self.pending_attempt = Some(attempt);
        self.pending_start = reply;

        let captor = Arc::clone(&self.captor);
        let results = self.acquired_tx.clone();
        let interval = self.chunk_interval;

        info!(
            session_id = %self.machine.session_id(),
            captor = captor.name(),
            "Requesting microphone access"
        );

        tokio::spawn(async move {
            let result = match captor.request_access().await {
                Ok(stream) => {
                    if results.is_closed() {
                        // Session went away while the prompt was open
                        debug!("Access granted after session teardown; releasing");
                        return;
                    }
                    match captor.start_chunked_capture(&stream, interval).await {
                        Ok(chunks) => Ok(Granted { stream, chunks }),
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };

            let _ = results.send(Acquisition { attempt, result });
        });
    }

    fn activate_capture(&mut self) {
        let Some(Granted { stream, chunks }) = self.granted.take() else {
            return;
        };

        info!(
            session_id = %self.machine.session_id(),
            stream = stream.id(),
            "Recording started"
        );

        self.capture = Some(ActiveCapture {
            stream,
            chunks,
            exhausted: false,
        });
        self.timer = Some(tokio::time::interval_at(Instant::now() + TICK, TICK));
    }

    fn discard_access(&mut self) {
        if let Some(Granted { stream, mut chunks }) = self.granted.take() {
            chunks.stop();
            stream.release();
        }
    }

    fn end_capture(&mut self) {
        self.timer = None;

        if let Some(ActiveCapture {
            stream, mut chunks, ..
        }) = self.capture.take()
        {
            chunks.stop();
            stream.release();
            info!(session_id = %self.machine.session_id(), "Recording stopped");
        }
    }

    fn release_media(&mut self) {
        self.end_capture();
        self.discard_access();
    }

    async fn close_transport(&mut self) {
        if !self.transport_open {
            return;
        }
        self.transport_open = false;

        if let Err(e) = self.transport.close().await {
            warn!(session_id = %self.machine.session_id(), "Failed to close transport: {}", e);
        }
    }

    fn speak(&mut self, text: String) {
        self.cancel_speech();

        let speech = Arc::clone(&self.speech);
        self.speech_task = Some(tokio::spawn(async move {
            if let Err(e) = speech.speak(&text).await {
                debug!("Speech synthesis failed: {:#}", e);
            }
        }));
    }

    fn cancel_speech(&mut self) {
        if let Some(task) = self.speech_task.take() {
            task.abort();
        }
    }

    fn publish(&self) {
        let snapshot = self.machine.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Final teardown; idempotent with whatever the machine already released
    async fn shutdown(&mut self) {
        self.release_media();
        self.cancel_speech();
        self.close_transport().await;

        if let Some(pending) = self.pending_start.take() {
            let _ = pending.send(Err(SessionError::Disposed));
        }

        self.publish();

        let snapshot = self.machine.snapshot();
        info!(
            session_id = %snapshot.session_id,
            state = %snapshot.state,
            answers = snapshot.answers_submitted,
            chunks = snapshot.chunks_sent,
            "Live session finished"
        );
    }
}

async fn next_chunk(capture: &mut Option<ActiveCapture>) -> Option<AudioChunk> {
    match capture {
        Some(capture) if !capture.exhausted => capture.chunks.next().await,
        _ => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
