//! # replay-capture-desktop
//!
//! Desktop backends for replay-capture-core.
//!
//! Provides:
//! - `CpalAudioSource`: Microphone and system loopback capture via CPAL
//! - `FfmpegScreenGrab`: Monitor region capture via an FFmpeg grab device
//! - `FfmpegMuxer`: H.264/AAC clip encoding via the FFmpeg CLI
//! - `DesktopSettings`: JSON settings for the `replayd` binary
//!
//! ## Runtime Requirements
//! - An `ffmpeg` build with `libx264` and the platform grab device
//!   (`x11grab` on Linux, `gdigrab` on Windows, `avfoundation` on macOS)
//!
//! ## Usage
//! ```ignore
//! use replay_capture_core::CaptureController;
//! use replay_capture_desktop::{CpalAudioSource, DesktopSettings, FfmpegMuxer, FfmpegScreenGrab};
//!
//! let settings = DesktopSettings::default();
//! let format = settings.replay.audio_format();
//! let grab = FfmpegScreenGrab::new(&settings.ffmpeg_path, settings.selected_monitor(), 15, settings.display_or_default());
//! let mic = CpalAudioSource::microphone(None, format, settings.replay.chunk_size);
//! let mut controller = CaptureController::new(settings.replay.clone(), grab, vec![Box::new(mic)]);
//! let trigger = controller.trigger_coordinator(std::sync::Arc::new(FfmpegMuxer::new(&settings.ffmpeg_path)));
//! controller.start()?;
//! let _ = trigger.on_trigger();
//! ```

pub mod cpal_source;
pub mod ffmpeg_grab;
pub mod ffmpeg_muxer;
pub mod settings;

pub use cpal_source::CpalAudioSource;
pub use ffmpeg_grab::FfmpegScreenGrab;
pub use ffmpeg_muxer::FfmpegMuxer;
pub use settings::{DesktopSettings, MonitorRegion};
