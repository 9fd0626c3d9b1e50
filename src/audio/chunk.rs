use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

use super::backend::{AudioChunk, AudioFrame};

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Audio duration per chunk (default: 1 second)
    pub interval: Duration,
    /// Sample rate of incoming frames
    pub sample_rate: u32,
    /// Channel count of incoming frames
    pub channels: u16,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            sample_rate: 16000,
            channels: 1,
        }
    }
}

impl ChunkConfig {
    /// Interleaved samples that make up one full chunk
    pub fn samples_per_chunk(&self) -> usize {
        let frames = self.sample_rate as u128 * self.interval.as_millis() / 1000;
        (frames as usize).max(1) * self.channels as usize
    }
}

/// Groups incoming frames into fixed-duration chunks and encodes each one as WAV
///
/// Frames are split at chunk boundaries, so every chunk except the last
/// covers exactly `interval` of audio.
pub struct ChunkEncoder {
    config: ChunkConfig,
    pending: Vec<i16>,
    next_index: u64,
    emitted_samples: u64,
}

impl ChunkEncoder {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            pending: Vec::with_capacity(config.samples_per_chunk()),
            config,
            next_index: 0,
            emitted_samples: 0,
        }
    }

    /// Add a frame; returns every chunk that became complete
    pub fn push(&mut self, frame: &AudioFrame) -> Result<Vec<AudioChunk>> {
        self.pending.extend_from_slice(&frame.samples);

        let per_chunk = self.config.samples_per_chunk();
        let mut chunks = Vec::new();

        while self.pending.len() >= per_chunk {
            let samples: Vec<i16> = self.pending.drain(..per_chunk).collect();
            chunks.push(self.encode(&samples)?);
        }

        Ok(chunks)
    }

    /// Encode whatever is left as a final (short) chunk
    pub fn flush(&mut self) -> Result<Option<AudioChunk>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let samples = std::mem::take(&mut self.pending);
        self.encode(&samples).map(Some)
    }

    pub fn chunks_emitted(&self) -> u64 {
        self.next_index
    }

    fn encode(&mut self, samples: &[i16]) -> Result<AudioChunk> {
        let channels = self.config.channels.max(1) as u64;
        let rate = self.config.sample_rate.max(1) as u64;

        let started_ms = self.emitted_samples / channels * 1000 / rate;
        let duration_ms = samples.len() as u64 / channels * 1000 / rate;

        let data = encode_wav(samples, self.config.sample_rate, self.config.channels)?;

        let chunk = AudioChunk {
            index: self.next_index,
            data,
            started_ms,
            duration_ms,
        };

        debug!(
            "Chunk {} encoded: {:.1}s + {}ms ({} samples)",
            chunk.index,
            started_ms as f64 / 1000.0,
            duration_ms,
            samples.len()
        );

        self.next_index += 1;
        self.emitted_samples += samples.len() as u64;

        Ok(chunk)
    }
}

/// Encode PCM samples as an in-memory 16-bit WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV chunk")?;
    }

    Ok(cursor.into_inner())
}
