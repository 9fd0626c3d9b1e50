// Unit tests for the session state machine
//
// The machine is pure, so these feed it events directly and check the
// resulting state and effects.

use interview_live::session::{Effect, Event, SessionMachine};
use interview_live::{
    AudioChunk, InboundMessage, OutboundMessage, SessionError, SessionId, SessionNotice,
    SessionState,
};

fn machine() -> SessionMachine {
    SessionMachine::new(SessionId::parse("s1").unwrap(), "[answer]")
}

fn active() -> SessionMachine {
    let mut m = machine();
    m.handle(Event::Opened);
    m
}

fn recording() -> SessionMachine {
    let mut m = active();
    assert_eq!(m.handle(Event::StartRequested), vec![Effect::RequestAccess]);
    m.handle(Event::AccessGranted);
    assert_eq!(m.state(), SessionState::Recording);
    m
}

fn question(content: &str) -> Event {
    Event::Inbound(InboundMessage::Question {
        content: content.to_string(),
    })
}

fn chunk(data: &[u8]) -> Event {
    Event::ChunkCaptured(AudioChunk {
        index: 0,
        data: data.to_vec(),
        started_ms: 0,
        duration_ms: 1000,
    })
}

fn teardown_effects() -> Vec<Effect> {
    vec![
        Effect::EndCapture,
        Effect::CancelSpeech,
        Effect::CloseTransport,
        Effect::ReleaseMedia,
    ]
}

#[test]
fn test_starts_connecting_and_opens_to_active() {
    let mut m = machine();
    assert_eq!(m.state(), SessionState::Connecting);

    assert!(m.handle(Event::Opened).is_empty());
    assert_eq!(m.state(), SessionState::Active);
}

#[test]
fn test_messages_before_open_are_ignored_except_end() {
    let mut m = machine();

    assert!(m.handle(question("Early")).is_empty());
    assert_eq!(m.state(), SessionState::Connecting);
    assert_eq!(m.snapshot().current_question, None);

    let effects = m.handle(Event::Inbound(InboundMessage::End));
    assert_eq!(m.state(), SessionState::Ended);
    assert!(effects.contains(&Effect::CloseTransport));
}

#[test]
fn test_question_speaks_when_active() {
    let mut m = active();

    let effects = m.handle(question("Tell me about yourself"));

    assert_eq!(effects, vec![Effect::Speak("Tell me about yourself".into())]);
    assert_eq!(
        m.snapshot().current_question.as_deref(),
        Some("Tell me about yourself")
    );
}

#[test]
fn test_status_then_question_cycles_processing_and_active() {
    let mut m = active();

    m.handle(Event::Inbound(InboundMessage::Status {
        content: "Evaluating".into(),
    }));
    assert_eq!(m.state(), SessionState::Processing);
    assert_eq!(m.snapshot().status_text.as_deref(), Some("Evaluating"));

    let effects = m.handle(question("Next"));
    assert_eq!(effects, vec![Effect::Speak("Next".into())]);
    assert_eq!(m.state(), SessionState::Active);
    assert_eq!(m.snapshot().status_text, None);
}

#[test]
fn test_status_while_recording_only_updates_text() {
    let mut m = recording();

    m.handle(Event::Inbound(InboundMessage::Status {
        content: "Listening".into(),
    }));

    assert_eq!(m.state(), SessionState::Recording);
    assert_eq!(m.snapshot().status_text.as_deref(), Some("Listening"));
}

#[test]
fn test_question_while_recording_is_silent() {
    let mut m = recording();

    assert!(m.handle(question("Follow-up")).is_empty());
    assert_eq!(m.state(), SessionState::Recording);
    assert_eq!(m.snapshot().current_question.as_deref(), Some("Follow-up"));
}

#[test]
fn test_analysis_merges_and_clamps() {
    let mut m = active();

    m.handle(Event::Inbound(InboundMessage::Analysis {
        clarity: Some(80.0),
        confidence: Some(65.0),
    }));
    m.handle(Event::Inbound(InboundMessage::Analysis {
        clarity: None,
        confidence: Some(70.0),
    }));
    let analysis = m.snapshot().analysis;
    assert_eq!(analysis.clarity, Some(80.0));
    assert_eq!(analysis.confidence, Some(70.0));

    m.handle(Event::Inbound(InboundMessage::Analysis {
        clarity: Some(140.0),
        confidence: Some(f64::NAN),
    }));
    let analysis = m.snapshot().analysis;
    assert_eq!(analysis.clarity, Some(100.0));
    assert_eq!(analysis.confidence, Some(70.0), "Non-finite values are ignored");
}

#[test]
fn test_start_outside_active_is_rejected() {
    let mut m = machine();
    assert_eq!(
        m.handle(Event::StartRequested),
        vec![Effect::RejectStart(SessionError::InvalidState {
            action: "start recording",
            state: SessionState::Connecting,
        })]
    );

    let mut m = recording();
    assert!(matches!(
        m.handle(Event::StartRequested).as_slice(),
        [Effect::RejectStart(SessionError::InvalidState { .. })]
    ));
}

#[test]
fn test_start_while_pending_is_rejected() {
    let mut m = active();

    assert_eq!(m.handle(Event::StartRequested), vec![Effect::RequestAccess]);
    assert!(m.access_pending());

    assert_eq!(
        m.handle(Event::StartRequested),
        vec![Effect::RejectStart(SessionError::AccessPending)]
    );
}

#[test]
fn test_access_granted_starts_recording() {
    let mut m = active();
    m.handle(Event::StartRequested);

    let effects = m.handle(Event::AccessGranted);

    assert_eq!(
        effects,
        vec![Effect::ActivateCapture, Effect::StartCompleted(Ok(()))]
    );
    assert_eq!(m.state(), SessionState::Recording);
    assert_eq!(m.snapshot().elapsed_seconds, 0);
    assert!(!m.access_pending());
}

#[test]
fn test_access_denied_stays_active() {
    let mut m = active();
    m.handle(Event::StartRequested);

    let error = SessionError::PermissionDenied("blocked".into());
    let effects = m.handle(Event::AccessDenied(error.clone()));

    assert_eq!(
        effects,
        vec![
            Effect::StartCompleted(Err(error.clone())),
            Effect::Notify(SessionNotice::RecordingRejected(error)),
        ]
    );
    assert_eq!(m.state(), SessionState::Active);
    assert!(!m.access_pending());
}

#[test]
fn test_access_granted_without_request_is_discarded() {
    let mut m = active();

    let effects = m.handle(Event::AccessGranted);

    assert_eq!(effects.first(), Some(&Effect::DiscardAccess));
    assert_eq!(m.state(), SessionState::Active);
}

#[test]
fn test_chunks_are_sent_only_while_recording() {
    let mut m = active();
    assert!(m.handle(chunk(b"late")).is_empty());

    let mut m = recording();
    let effects = m.handle(chunk(b"abc"));

    assert_eq!(effects, vec![Effect::Send(OutboundMessage::audio_chunk(b"abc"))]);
    assert_eq!(m.snapshot().chunks_sent, 1);
}

#[test]
fn test_ticks_count_only_while_recording() {
    let mut m = active();
    m.handle(Event::Tick);
    assert_eq!(m.snapshot().elapsed_seconds, 0);

    let mut m = recording();
    m.handle(Event::Tick);
    m.handle(Event::Tick);
    assert_eq!(m.snapshot().elapsed_seconds, 2);
}

#[test]
fn test_stop_sends_answer_once() {
    let mut m = recording();

    let effects = m.handle(Event::StopRequested);
    assert_eq!(
        effects,
        vec![
            Effect::EndCapture,
            Effect::Send(OutboundMessage::answer_finished("[answer]")),
        ]
    );
    assert_eq!(m.state(), SessionState::Processing);
    assert_eq!(m.snapshot().answers_submitted, 1);

    assert!(m.handle(Event::StopRequested).is_empty());
    assert_eq!(m.snapshot().answers_submitted, 1);
}

#[test]
fn test_end_tears_down_and_requests_report() {
    let mut m = recording();

    let effects = m.handle(Event::Inbound(InboundMessage::End));

    let mut expected = teardown_effects();
    expected.push(Effect::Notify(SessionNotice::ShowReport {
        session_id: SessionId::parse("s1").unwrap(),
    }));
    assert_eq!(effects, expected);
    assert_eq!(m.state(), SessionState::Ended);
    assert!(m.snapshot().ended_at.is_some());
}

#[test]
fn test_transport_failure_errors_with_reason() {
    let mut m = active();

    let effects = m.handle(Event::TransportFailed("reset by peer".into()));

    assert_eq!(m.state(), SessionState::Errored);
    assert_eq!(m.snapshot().error.as_deref(), Some("reset by peer"));
    assert_eq!(
        effects.last(),
        Some(&Effect::Notify(SessionNotice::Failed(SessionError::Transport(
            "reset by peer".into()
        ))))
    );
}

#[test]
fn test_teardown_fails_pending_start() {
    let mut m = active();
    m.handle(Event::StartRequested);

    let effects = m.handle(Event::Disposed);

    assert!(effects.contains(&Effect::StartCompleted(Err(SessionError::InvalidState {
        action: "start recording",
        state: SessionState::Ended,
    }))));
    assert!(!m.access_pending());
}

#[test]
fn test_terminal_state_is_final() {
    let mut m = recording();
    m.handle(Event::Disposed);
    assert_eq!(m.state(), SessionState::Ended);

    assert!(m.handle(question("Again?")).is_empty());
    assert!(m.handle(Event::Opened).is_empty());
    assert!(m.handle(Event::Tick).is_empty());
    assert!(m.handle(Event::StopRequested).is_empty());
    assert!(m.handle(Event::TransportFailed("late".into())).is_empty());
    assert!(m.handle(Event::Disposed).is_empty());
    assert_eq!(m.state(), SessionState::Ended);

    // Hardware that shows up now is handed straight back
    assert_eq!(m.handle(Event::AccessGranted), vec![Effect::DiscardAccess]);
}
