//! # replay-capture-core
//!
//! Platform-agnostic instant-replay engine.
//!
//! Keeps a rolling window of recent screen frames and audio chunks in memory.
//! On a trigger, freezes that window, records a little longer, mixes the audio
//! sources and hands everything to a `Muxer` that writes one clip. Platform
//! backends implement `FrameSource` and `AudioSource` and plug into the
//! generic `CaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! replay-capture-core (this crate)
//! ├── traits/       ← FrameSource, AudioSource, Muxer, ReplayDelegate
//! ├── models/       ← CaptureError, CaptureState, ReplayConfiguration, Frame, AudioChunk, ClipResult
//! ├── processing/   ← RingBuffer, AudioMixer, WAV header generation
//! ├── session/      ← CaptureController, TriggerCoordinator, SaveSession
//! └── storage/      ← WavFileWriter, checksums, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::clip_result::{ClipMetadata, ClipResult};
pub use models::config::ReplayConfiguration;
pub use models::error::CaptureError;
pub use models::media::{AudioChunk, AudioFormat, AudioSourceInfo, AudioSourceKind, Frame, PixelFormat, SourceId};
pub use models::state::CaptureState;
pub use processing::audio_mixer::AudioMixer;
pub use processing::ring_buffer::RingBuffer;
pub use session::controller::CaptureController;
pub use session::trigger::{SaveHandle, TriggerCoordinator, TriggerOutcome};
pub use storage::wav_writer::WavFileWriter;
pub use traits::audio_source::{AudioChunkCallback, AudioSource};
pub use traits::frame_source::FrameSource;
pub use traits::muxer::{AudioTrack, EncodeRequest, Muxer};
pub use traits::replay_delegate::ReplayDelegate;
