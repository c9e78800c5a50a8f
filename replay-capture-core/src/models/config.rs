use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::media::AudioFormat;

/// Configuration for a capture controller.
///
/// Read-only to the engine: it is injected at construction and never mutated
/// afterwards. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfiguration {
    /// Target screen capture rate (default: 15).
    pub video_fps: u32,

    /// Length of the look-back window in seconds (default: 60).
    pub buffer_seconds: u32,

    /// Length of the look-forward capture after a trigger (default: 30).
    pub extra_record_seconds: u32,

    /// Audio sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Audio channel count (default: 1).
    pub channels: u16,

    /// PCM bit depth (default: 16). Valid values: 8, 16, 24, 32.
    pub bit_depth: u16,

    /// Frames per audio chunk delivered by a source (default: 1024).
    pub chunk_size: u32,

    /// Index into the monitor list resolved by the frontend (default: 0).
    pub monitor_selector: usize,

    /// Directory where finished clips are written (default: `recordings`).
    pub output_directory: PathBuf,

    /// Container extension handed to the muxer (default: `mp4`).
    pub container_extension: String,
}

impl Default for ReplayConfiguration {
    fn default() -> Self {
        Self {
            video_fps: 15,
            buffer_seconds: 60,
            extra_record_seconds: 30,
            sample_rate: 44100,
            channels: 1,
            bit_depth: 16,
            chunk_size: 1024,
            monitor_selector: 0,
            output_directory: PathBuf::from("recordings"),
            container_extension: "mp4".into(),
        }
    }
}

impl ReplayConfiguration {
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid configuration: {}", e)))
    }

    /// Load a configuration file and replace invalid values by defaults.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::from_json_str(&json)?.sanitized())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.video_fps == 0 {
            return Err("video_fps must be positive".into());
        }
        if self.buffer_seconds == 0 {
            return Err("buffer_seconds must be positive".into());
        }
        if self.sample_rate == 0 {
            return Err("sample_rate must be positive".into());
        }
        if self.chunk_size == 0 {
            return Err("chunk_size must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if ![8, 16, 24, 32].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if self.container_extension.is_empty() {
            return Err("container_extension must not be empty".into());
        }
        Ok(())
    }

    /// Copy of this configuration with every invalid field reset to its
    /// default, logging each replacement.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut fixed = self.clone();

        if fixed.video_fps == 0 {
            log::warn!("video_fps=0 is invalid, using {}", defaults.video_fps);
            fixed.video_fps = defaults.video_fps;
        }
        if fixed.buffer_seconds == 0 {
            log::warn!("buffer_seconds=0 is invalid, using {}", defaults.buffer_seconds);
            fixed.buffer_seconds = defaults.buffer_seconds;
        }
        if fixed.sample_rate == 0 {
            log::warn!("sample_rate=0 is invalid, using {}", defaults.sample_rate);
            fixed.sample_rate = defaults.sample_rate;
        }
        if fixed.chunk_size == 0 {
            log::warn!("chunk_size=0 is invalid, using {}", defaults.chunk_size);
            fixed.chunk_size = defaults.chunk_size;
        }
        if ![1, 2].contains(&fixed.channels) {
            log::warn!("channels={} is unsupported, using {}", fixed.channels, defaults.channels);
            fixed.channels = defaults.channels;
        }
        if ![8, 16, 24, 32].contains(&fixed.bit_depth) {
            log::warn!("bit_depth={} is unsupported, using {}", fixed.bit_depth, defaults.bit_depth);
            fixed.bit_depth = defaults.bit_depth;
        }
        if fixed.container_extension.is_empty() {
            log::warn!("container_extension is empty, using {}", defaults.container_extension);
            fixed.container_extension = defaults.container_extension;
        }
        fixed
    }

    /// Number of frames that make up the look-back window.
    pub fn buffer_capacity_frames(&self) -> usize {
        (self.video_fps as usize * self.buffer_seconds as usize).max(1)
    }

    /// Number of audio chunks that make up the look-back window.
    pub fn audio_capacity_chunks(&self) -> usize {
        let chunks_per_second = self.sample_rate as f64 / self.chunk_size.max(1) as f64;
        ((chunks_per_second * self.buffer_seconds as f64) as usize).max(1)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.video_fps.max(1) as f64)
    }

    pub fn look_forward(&self) -> Duration {
        Duration::from_secs(self.extra_record_seconds as u64)
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.bit_depth,
        }
    }

    /// Pick the configured monitor out of `available`, falling back to the
    /// first one when the selector is out of range.
    pub fn resolve_monitor(&self, available: usize) -> usize {
        if self.monitor_selector < available {
            return self.monitor_selector;
        }
        log::warn!(
            "monitor_selector={} is out of range ({} monitors), using monitor 0",
            self.monitor_selector,
            available
        );
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacities_match_window() {
        let config = ReplayConfiguration::default();
        assert_eq!(config.buffer_capacity_frames(), 15 * 60);
        // 44100 / 1024 = 43.07 chunks per second
        assert_eq!(config.audio_capacity_chunks(), 2583);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = ReplayConfiguration::from_json_str(r#"{"video_fps": 30}"#).unwrap();
        assert_eq!(config.video_fps, 30);
        assert_eq!(config.buffer_seconds, 60);
        assert_eq!(config.output_directory, PathBuf::from("recordings"));
    }

    #[test]
    fn sanitized_replaces_invalid_values() {
        let config = ReplayConfiguration {
            video_fps: 0,
            bit_depth: 12,
            channels: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let fixed = config.sanitized();
        assert_eq!(fixed.video_fps, 15);
        assert_eq!(fixed.bit_depth, 16);
        assert_eq!(fixed.channels, 1);
        assert!(fixed.validate().is_ok());
    }

    /// Collects warnings from every test in the binary.
    struct WarningLog(std::sync::Mutex<Vec<String>>);

    impl log::Log for WarningLog {
        fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record<'_>) {
            if !self.enabled(record.metadata()) {
                return;
            }
            if let Ok(mut lines) = self.0.lock() {
                lines.push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static WARNINGS: WarningLog = WarningLog(std::sync::Mutex::new(Vec::new()));

    #[test]
    fn empty_extension_is_replaced_with_a_warning() {
        if log::set_logger(&WARNINGS).is_ok() {
            log::set_max_level(log::LevelFilter::Warn);
        }
        let config = ReplayConfiguration {
            container_extension: String::new(),
            ..Default::default()
        };

        assert_eq!(config.sanitized().container_extension, "mp4");
        assert!(WARNINGS
            .0
            .lock()
            .unwrap()
            .iter()
            .any(|line| line == "container_extension is empty, using mp4"));
    }

    #[test]
    fn out_of_range_monitor_falls_back_to_first() {
        let config = ReplayConfiguration {
            monitor_selector: 3,
            ..Default::default()
        };
        assert_eq!(config.resolve_monitor(2), 0);
        assert_eq!(config.resolve_monitor(4), 3);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = ReplayConfiguration::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }
}
