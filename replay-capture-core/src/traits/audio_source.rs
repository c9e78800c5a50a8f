use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::media::{AudioChunk, AudioSourceInfo};

/// Callback invoked with every chunk a source produces.
///
/// Runs on the device's audio thread: it only enqueues and returns.
pub type AudioChunkCallback = Arc<dyn Fn(AudioChunk) + Send + Sync + 'static>;

/// An audio input device (microphone or system loopback).
pub trait AudioSource: Send {
    /// Start delivering chunks to `callback`.
    ///
    /// A failure leaves the source muted; it never stops the controller.
    fn start(&mut self, callback: AudioChunkCallback) -> Result<(), CaptureError>;

    /// Stop delivering chunks and release the device.
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn info(&self) -> AudioSourceInfo;
}
