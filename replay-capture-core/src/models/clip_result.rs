use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::AudioFormat;

/// Result returned when a save session produced a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: ClipMetadata,
    pub checksum: String,
}

impl ClipResult {
    pub fn frame_count(&self) -> usize {
        self.metadata.look_back_frames + self.metadata.look_forward_frames
    }
}

/// Metadata written as a JSON sidecar next to each clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub checksum: String,
    pub duration_secs: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub look_back_frames: usize,
    pub look_forward_frames: usize,
    /// Format of the mixed track, absent when the clip is silent.
    pub audio_format: Option<AudioFormat>,
    /// Length of the mixed track. Can fall short of `duration_secs` when
    /// every source dropped out early.
    #[serde(default)]
    pub audio_duration_secs: Option<f64>,
    /// Sources whose data went into the mixed track.
    pub mixed_sources: Vec<String>,
    /// Sources that failed to open and were recorded as silence.
    pub muted_sources: Vec<String>,
}

impl ClipMetadata {
    pub fn new(fps: u32, width: u32, height: u32, look_back_frames: usize, look_forward_frames: usize) -> Self {
        let frames = look_back_frames + look_forward_frames;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: String::new(),
            checksum: String::new(),
            duration_secs: frames as f64 / fps.max(1) as f64,
            fps,
            width,
            height,
            look_back_frames,
            look_forward_frames,
            audio_format: None,
            audio_duration_secs: None,
            mixed_sources: Vec::new(),
            muted_sources: Vec::new(),
        }
    }
}
