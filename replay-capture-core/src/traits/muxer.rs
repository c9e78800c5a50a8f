use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::media::{AudioFormat, Frame};

/// Mixed audio handed to the muxer, both in memory and as a WAV file in the
/// session's temporary directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub format: AudioFormat,
    pub samples: Vec<u8>,
    pub wav_path: PathBuf,
}

/// Everything the muxer needs to produce one clip.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    /// Frames oldest to newest: look-back followed by look-forward.
    pub frames: &'a [Frame],
    /// `None` produces a silent clip.
    pub audio: Option<&'a AudioTrack>,
    pub fps: u32,
    pub output_path: &'a Path,
}

/// External encoder that turns an ordered frame sequence and an optional
/// audio track into a single container file.
pub trait Muxer: Send + Sync {
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), CaptureError>;
}
