pub mod backend;
pub mod chunk;
pub mod file;

pub use backend::{
    AudioChunk, AudioFrame, CaptureError, ChunkStream, MediaCaptor, MediaStream, MediaTrack,
    TrackKind,
};
pub use chunk::{encode_wav, ChunkConfig, ChunkEncoder};
pub use file::{resample, AudioFile, FileCaptor};
