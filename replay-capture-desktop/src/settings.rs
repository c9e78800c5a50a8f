//! Settings file for the desktop frontend.
//!
//! One JSON document holding the engine's `ReplayConfiguration` fields at the
//! top level plus the device selection the desktop backends need:
//!
//! ```json
//! {
//!   "video_fps": 15,
//!   "buffer_seconds": 60,
//!   "monitors": [{ "x": 0, "y": 0, "width": 1920, "height": 1080 }],
//!   "microphone": "USB Audio Device",
//!   "record_loopback": false,
//!   "ffmpeg_path": "/usr/local/bin/ffmpeg"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use replay_capture_core::models::config::ReplayConfiguration;
use replay_capture_core::models::error::CaptureError;

/// Screen rectangle in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for MonitorRegion {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopSettings {
    #[serde(flatten)]
    pub replay: ReplayConfiguration,

    /// Monitors `monitor_selector` indexes into.
    pub monitors: Vec<MonitorRegion>,

    /// Display the grabber reads from. Platform default when absent.
    pub display: Option<String>,

    /// Microphone device name. `None` uses the default input device.
    pub microphone: Option<String>,

    /// Loopback device name. `None` uses the default output device.
    pub loopback: Option<String>,

    pub record_microphone: bool,
    pub record_loopback: bool,

    /// FFmpeg executable used for both grabbing and muxing.
    pub ffmpeg_path: PathBuf,
}

impl Default for DesktopSettings {
    fn default() -> Self {
        Self {
            replay: ReplayConfiguration::default(),
            monitors: vec![MonitorRegion::default()],
            display: None,
            microphone: None,
            loopback: None,
            record_microphone: true,
            record_loopback: true,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl DesktopSettings {
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let mut settings: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid settings: {}", e)))?;
        settings.replay = settings.replay.sanitized();
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Region picked by `monitor_selector`, falling back to the first
    /// monitor when out of range.
    pub fn selected_monitor(&self) -> MonitorRegion {
        if self.monitors.is_empty() {
            log::warn!("No monitors configured, grabbing {:?}", MonitorRegion::default());
            return MonitorRegion::default();
        }
        self.monitors[self.replay.resolve_monitor(self.monitors.len())]
    }

    pub fn display_or_default(&self) -> String {
        self.display.clone().unwrap_or_else(default_display)
    }
}

#[cfg(target_os = "linux")]
fn default_display() -> String {
    std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".into())
}

#[cfg(target_os = "macos")]
fn default_display() -> String {
    "Capture screen 0".into()
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn default_display() -> String {
    "desktop".into()
}
