use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// One bounded unit of captured audio, ready to transmit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Chunk number within the recording (0-indexed)
    pub index: u64,
    /// Encoded chunk bytes (a self-contained WAV file)
    pub data: Vec<u8>,
    /// Start offset in milliseconds since capture started
    pub started_ms: u64,
    /// Audio duration covered by this chunk
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("media access denied: {0}")]
    PermissionDenied(String),
    #[error("media device unavailable: {0}")]
    Unavailable(String),
    #[error("capture failed: {0}")]
    Capture(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A hardware track (microphone, camera) held by a [`MediaStream`]
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    fn label(&self) -> &str;

    /// Release the underlying hardware. Called at most once per track.
    fn stop(&mut self);
}

/// Granted access to capture hardware
///
/// Tracks are stopped exactly once: by [`MediaStream::release`], or on drop
/// if the stream was never released explicitly.
pub struct MediaStream {
    id: String,
    tracks: Vec<Box<dyn MediaTrack>>,
    released: bool,
}

impl MediaStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind() == kind)
    }

    /// Stop every track and give the hardware back
    pub fn release(mut self) {
        self.stop_tracks();
    }

    fn stop_tracks(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for track in &mut self.tracks {
            debug!("Stopping {:?} track '{}'", track.kind(), track.label());
            track.stop();
        }

        info!("Media stream {} released ({} tracks)", self.id, self.tracks.len());
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.released)
            .finish()
    }
}

/// Chunks produced by a running capture
///
/// Dropping the stream (or calling [`ChunkStream::stop`]) stops the capture.
#[derive(Debug)]
pub struct ChunkStream {
    chunks: mpsc::Receiver<AudioChunk>,
    stop: Option<oneshot::Sender<()>>,
}

impl ChunkStream {
    pub fn new(chunks: mpsc::Receiver<AudioChunk>, stop: oneshot::Sender<()>) -> Self {
        Self {
            chunks,
            stop: Some(stop),
        }
    }

    /// Next captured chunk; `None` once the capture has ended
    pub async fn next(&mut self) -> Option<AudioChunk> {
        self.chunks.recv().await
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.chunks.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_none()
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Microphone access and chunked recording
///
/// Implementations:
/// - [`super::FileCaptor`]: plays a WAV file as if it were a microphone
/// - test doubles in `tests/`
#[async_trait::async_trait]
pub trait MediaCaptor: Send + Sync {
    /// Ask for microphone access
    ///
    /// Fails with [`CaptureError::PermissionDenied`] when access is refused.
    async fn request_access(&self) -> Result<MediaStream, CaptureError>;

    /// Start recording from `stream`, emitting one chunk per `interval`
    async fn start_chunked_capture(
        &self,
        stream: &MediaStream,
        interval: Duration,
    ) -> Result<ChunkStream, CaptureError>;

    /// Captor name for logging
    fn name(&self) -> &str;
}
