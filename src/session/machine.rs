//! Turn-taking state machine for one interview session
//!
//! The machine performs no IO. It consumes [`Event`]s and returns the
//! [`Effect`]s the controller must carry out, in order.

use chrono::Utc;

use super::config::SessionId;
use super::error::SessionError;
use super::state::{SessionNotice, SessionState};
use super::stats::{Analysis, SessionSnapshot};
use crate::audio::AudioChunk;
use crate::transport::{InboundMessage, OutboundMessage};

/// Everything that can happen to a session
#[derive(Debug, Clone)]
pub enum Event {
    /// The transport connected
    Opened,
    /// A decoded message from the backend
    Inbound(InboundMessage),
    /// Connect failure, transport error, or unexpected close
    TransportFailed(String),
    /// The user asked to start recording
    StartRequested,
    /// Microphone access was granted and capture is ready
    AccessGranted,
    /// Microphone access (or capture start) failed
    AccessDenied(SessionError),
    /// The captor produced a chunk
    ChunkCaptured(AudioChunk),
    /// One second of recording elapsed
    Tick,
    /// The user asked to stop recording
    StopRequested,
    /// The session is being torn down
    Disposed,
}

/// Work the controller performs on behalf of the machine
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read a question aloud (best-effort)
    Speak(String),
    /// Ask the captor for microphone access and start capture
    RequestAccess,
    /// Reply to the pending start request
    StartCompleted(Result<(), SessionError>),
    /// Reply to the start request being handled right now
    RejectStart(SessionError),
    /// Begin forwarding the granted capture and start the 1 Hz timer
    ActivateCapture,
    /// Access arrived when the session could no longer use it; release it
    DiscardAccess,
    /// Stop capture and the timer, release the microphone
    EndCapture,
    Send(OutboundMessage),
    CloseTransport,
    /// Release every media track still held
    ReleaseMedia,
    CancelSpeech,
    Notify(SessionNotice),
}

pub struct SessionMachine {
    session_id: SessionId,
    state: SessionState,
    current_question: Option<String>,
    status_text: Option<String>,
    elapsed_seconds: u64,
    analysis: Analysis,
    chunks_sent: u64,
    answers_submitted: u64,
    error: Option<String>,
    started_at: chrono::DateTime<Utc>,
    ended_at: Option<chrono::DateTime<Utc>>,
    access_pending: bool,
    answer_placeholder: String,
}

impl SessionMachine {
    pub fn new(session_id: SessionId, answer_placeholder: impl Into<String>) -> Self {
        Self {
            session_id,
            state: SessionState::Connecting,
            current_question: None,
            status_text: None,
            elapsed_seconds: 0,
            analysis: Analysis::default(),
            chunks_sent: 0,
            answers_submitted: 0,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
            access_pending: false,
            answer_placeholder: answer_placeholder.into(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn access_pending(&self) -> bool {
        self.access_pending
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            current_question: self.current_question.clone(),
            status_text: self.status_text.clone(),
            elapsed_seconds: self.elapsed_seconds,
            analysis: self.analysis,
            chunks_sent: self.chunks_sent,
            answers_submitted: self.answers_submitted,
            error: self.error.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.state.is_terminal() {
            return match event {
                // Hardware granted too late must still be given back
                Event::AccessGranted => vec![Effect::DiscardAccess],
                Event::StartRequested => vec![Effect::RejectStart(self.invalid("start recording"))],
                _ => Vec::new(),
            };
        }

        match event {
            Event::Opened => self.on_opened(),
            Event::Inbound(message) => self.on_inbound(message),
            Event::TransportFailed(reason) => self.on_transport_failed(reason),
            Event::StartRequested => self.on_start_requested(),
            Event::AccessGranted => self.on_access_granted(),
            Event::AccessDenied(error) => self.on_access_denied(error),
            Event::ChunkCaptured(chunk) => self.on_chunk(chunk),
            Event::Tick => {
                if self.state == SessionState::Recording {
                    self.elapsed_seconds += 1;
                }
                Vec::new()
            }
            Event::StopRequested => self.on_stop_requested(),
            Event::Disposed => self.finish(SessionState::Ended, None),
        }
    }

    fn on_opened(&mut self) -> Vec<Effect> {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Active;
        }
        Vec::new()
    }

    fn on_inbound(&mut self, message: InboundMessage) -> Vec<Effect> {
        match message {
            InboundMessage::End => {
                let notice = SessionNotice::ShowReport {
                    session_id: self.session_id.clone(),
                };
                self.finish(SessionState::Ended, Some(notice))
            }
            // Before the session is live only `end` counts
            _ if self.state == SessionState::Connecting => Vec::new(),
            InboundMessage::Question { content } => {
                self.status_text = None;
                self.current_question = Some(content.clone());

                match self.state {
                    SessionState::Active | SessionState::Processing => {
                        self.state = SessionState::Active;
                        vec![Effect::Speak(content)]
                    }
                    // Don't talk over the candidate
                    _ => Vec::new(),
                }
            }
            InboundMessage::Status { content } => {
                self.status_text = Some(content);
                if self.state == SessionState::Active {
                    self.state = SessionState::Processing;
                }
                Vec::new()
            }
            InboundMessage::Analysis {
                clarity,
                confidence,
            } => {
                self.analysis.merge(clarity, confidence);
                Vec::new()
            }
        }
    }

    fn on_transport_failed(&mut self, reason: String) -> Vec<Effect> {
        self.error = Some(reason.clone());
        let notice = SessionNotice::Failed(SessionError::Transport(reason));
        self.finish(SessionState::Errored, Some(notice))
    }

    fn on_start_requested(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Active {
            return vec![Effect::RejectStart(self.invalid("start recording"))];
        }
        if self.access_pending {
            return vec![Effect::RejectStart(SessionError::AccessPending)];
        }

        self.access_pending = true;
        vec![Effect::RequestAccess]
    }

    fn on_access_granted(&mut self) -> Vec<Effect> {
        let was_pending = std::mem::replace(&mut self.access_pending, false);

        if !was_pending || self.state != SessionState::Active {
            return vec![
                Effect::DiscardAccess,
                Effect::StartCompleted(Err(self.invalid("start recording"))),
            ];
        }

        self.state = SessionState::Recording;
        self.elapsed_seconds = 0;
        vec![Effect::ActivateCapture, Effect::StartCompleted(Ok(()))]
    }

    fn on_access_denied(&mut self, error: SessionError) -> Vec<Effect> {
        self.access_pending = false;
        vec![
            Effect::StartCompleted(Err(error.clone())),
            Effect::Notify(SessionNotice::RecordingRejected(error)),
        ]
    }

    fn on_chunk(&mut self, chunk: AudioChunk) -> Vec<Effect> {
        if self.state != SessionState::Recording {
            return Vec::new();
        }

        self.chunks_sent += 1;
        vec![Effect::Send(OutboundMessage::audio_chunk(&chunk.data))]
    }

    fn on_stop_requested(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Recording {
            return Vec::new();
        }

        self.state = SessionState::Processing;
        self.answers_submitted += 1;
        vec![
            Effect::EndCapture,
            Effect::Send(OutboundMessage::answer_finished(
                self.answer_placeholder.clone(),
            )),
        ]
    }

    /// Move to a final state, tearing everything down
    fn finish(&mut self, state: SessionState, notice: Option<SessionNotice>) -> Vec<Effect> {
        self.state = state;
        self.ended_at = Some(Utc::now());

        let mut effects = vec![
            Effect::EndCapture,
            Effect::CancelSpeech,
            Effect::CloseTransport,
            Effect::ReleaseMedia,
        ];

        if std::mem::replace(&mut self.access_pending, false) {
            effects.push(Effect::StartCompleted(Err(self.invalid("start recording"))));
        }

        effects.extend(notice.map(Effect::Notify));
        effects
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state,
        }
    }
}
