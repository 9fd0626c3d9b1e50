use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::backend::{
    AudioFrame, CaptureError, ChunkStream, MediaCaptor, MediaStream, MediaTrack, TrackKind,
};
use super::chunk::{ChunkConfig, ChunkEncoder};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Samples converted to `target` channels
    ///
    /// Only stereo -> mono downmixing (averaging left and right) is supported;
    /// any other combination returns the samples unchanged.
    pub fn to_channels(&self, target: u16) -> (Vec<i16>, u16) {
        if self.channels == target || !(self.channels == 2 && target == 1) {
            return (self.samples.clone(), self.channels);
        }

        let mono = self
            .samples
            .chunks_exact(2)
            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
            .collect();

        (mono, 1)
    }
}

/// Linearly resample interleaved `samples` from `from` Hz to `to` Hz
pub fn resample(samples: &[i16], channels: u16, from: u32, to: u32) -> Vec<i16> {
    let channels = channels.max(1) as usize;
    if from == to || from == 0 || to == 0 || samples.len() < channels {
        return samples.to_vec();
    }

    let frames = samples.len() / channels;
    let out_frames = (frames as u64 * to as u64 / from as u64) as usize;
    let step = from as f64 / to as f64;

    let mut out = Vec::with_capacity(out_frames * channels);
    for n in 0..out_frames {
        let pos = n as f64 * step;
        let idx = (pos.floor() as usize).min(frames - 1);
        let next = (idx + 1).min(frames - 1);
        let frac = pos - idx as f64;
        for ch in 0..channels {
            let a = samples[idx * channels + ch] as f64;
            let b = samples[next * channels + ch] as f64;
            out.push((a + (b - a) * frac).round() as i16);
        }
    }
    out
}

/// Plays a WAV file through the capture pipeline as if it were a microphone
///
/// Frames are paced in real time, so a 5 second file yields five 1 second
/// chunks over five seconds. Capture ends early when stopped and on its own
/// at the end of the file.
pub struct FileCaptor {
    path: PathBuf,
    target_channels: u16,
    target_rate: Option<u32>,
    frame_duration: Duration,
}

impl FileCaptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            target_channels: 1,
            target_rate: None,
            frame_duration: Duration::from_millis(100),
        }
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.target_channels = channels.max(1);
        self
    }

    /// Resample the file to `sample_rate` before chunking
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.target_rate = Some(sample_rate).filter(|&rate| rate > 0);
        self
    }

    pub fn with_frame_duration(mut self, frame_duration: Duration) -> Self {
        self.frame_duration = frame_duration.max(Duration::from_millis(1));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl MediaCaptor for FileCaptor {
    async fn request_access(&self) -> Result<MediaStream, CaptureError> {
        match tokio::fs::File::open(&self.path).await {
            Ok(_) => {
                info!("Access granted to {}", self.path.display());
                Ok(MediaStream::new(vec![Box::new(FileTrack::new(&self.path))]))
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
                CaptureError::PermissionDenied(format!("{}: {}", self.path.display(), e)),
            ),
            Err(e) => Err(CaptureError::Unavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn start_chunked_capture(
        &self,
        stream: &MediaStream,
        interval: Duration,
    ) -> Result<ChunkStream, CaptureError> {
        if !stream.has_track(TrackKind::Audio) {
            return Err(CaptureError::Capture(format!(
                "stream {} has no audio track",
                stream.id()
            )));
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| CaptureError::Capture(format!("file reader panicked: {}", e)))?
            .map_err(|e| CaptureError::Unavailable(format!("{:#}", e)))?;

        let (mut samples, channels) = audio.to_channels(self.target_channels);
        let mut sample_rate = audio.sample_rate;
        if let Some(target) = self.target_rate.filter(|&rate| rate != sample_rate) {
            debug!("Resampling {} from {}Hz to {}Hz", audio.path, sample_rate, target);
            samples = resample(&samples, channels, sample_rate, target);
            sample_rate = target;
        }
        let frame_ms = self.frame_duration.as_millis().max(1) as u64;
        let samples_per_frame =
            ((sample_rate as u64 * frame_ms / 1000) as usize).max(1) * channels as usize;

        let (chunk_tx, chunk_rx) = mpsc::channel(8);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let frame_duration = self.frame_duration;
        let label = audio.path.clone();

        info!(
            "Starting file capture: {} ({}Hz, {} channels, {:?} chunks)",
            label, sample_rate, channels, interval
        );

        tokio::spawn(async move {
            let mut encoder = ChunkEncoder::new(ChunkConfig {
                interval,
                sample_rate,
                channels,
            });
            let mut ticker = tokio::time::interval(frame_duration);

            for (i, frame_samples) in samples.chunks(samples_per_frame).enumerate() {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("File capture stopped: {}", label);
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let frame = AudioFrame {
                    samples: frame_samples.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms: i as u64 * frame_ms,
                };

                match encoder.push(&frame) {
                    Ok(chunks) => {
                        for chunk in chunks {
                            if chunk_tx.send(chunk).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to encode audio chunk: {:#}", e);
                        return;
                    }
                }
            }

            match encoder.flush() {
                Ok(Some(chunk)) => {
                    let _ = chunk_tx.send(chunk).await;
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to encode final audio chunk: {:#}", e),
            }

            info!(
                "File capture reached end of {} ({} chunks)",
                label,
                encoder.chunks_emitted()
            );
        });

        Ok(ChunkStream::new(chunk_rx, stop_tx))
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// The "hardware" behind a [`FileCaptor`] stream
struct FileTrack {
    label: String,
    stopped: bool,
}

impl FileTrack {
    fn new(path: &Path) -> Self {
        Self {
            label: format!("file:{}", path.display()),
            stopped: false,
        }
    }
}

impl MediaTrack for FileTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            debug!("Released {}", self.label);
        }
    }
}
