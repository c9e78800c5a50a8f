use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }

    /// Name of this layout as understood by ffmpeg's `-pix_fmt`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Bgra8 => "bgra",
            Self::Rgba8 => "rgba",
            Self::Rgb8 => "rgb24",
        }
    }
}

/// One captured screen image. Owned by whichever buffer slot or session
/// sequence currently holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: Instant,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            timestamp: Instant::now(),
            pixels,
            width,
            height,
            format,
        }
    }

    /// Byte length a tightly packed frame of this size must have.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == self.expected_len()
    }
}

/// PCM layout shared by every audio chunk in a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl AudioFormat {
    pub fn bytes_per_sample(&self) -> usize {
        (self.bit_depth as usize / 8).max(1)
    }

    /// Bytes per interleaved frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels.max(1) as usize
    }

    pub fn byte_rate(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Duration in seconds of `len` bytes of PCM in this format.
    pub fn duration_secs(&self, len: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (len / self.block_align()) as f64 / self.sample_rate as f64
    }
}

/// Stable index of an audio source inside its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// One block of interleaved little-endian PCM from a single source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub timestamp: Instant,
    pub samples: Vec<u8>,
    pub source_id: SourceId,
    pub format: AudioFormat,
}

impl AudioChunk {
    pub fn new(source_id: SourceId, format: AudioFormat, samples: Vec<u8>) -> Self {
        Self {
            timestamp: Instant::now(),
            samples,
            source_id,
            format,
        }
    }
}

/// What kind of device backs an audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceKind {
    Microphone,
    SystemLoopback,
}

/// Descriptive information about an audio source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSourceInfo {
    pub name: String,
    pub kind: AudioSourceKind,
}
