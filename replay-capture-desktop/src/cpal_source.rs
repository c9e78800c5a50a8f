//! CPAL audio capture for microphones and system loopback.
//!
//! Opens the device at the controller's sample rate and channel count and
//! repacks whatever sample type the driver delivers into little-endian PCM
//! chunks of `chunk_size` frames at the controller's bit depth.
//!
//! `cpal::Stream` is not `Send`, so each source owns a dedicated thread that
//! builds the stream, reports whether it opened, and holds it until `stop`.

use std::sync::mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, SizedSample, StreamConfig};

use replay_capture_core::models::error::CaptureError;
use replay_capture_core::models::media::{AudioChunk, AudioFormat, AudioSourceInfo, AudioSourceKind, SourceId};
use replay_capture_core::traits::audio_source::{AudioChunkCallback, AudioSource};

/// Accumulates normalized samples into fixed-size PCM chunks.
pub struct ChunkAssembler {
    format: AudioFormat,
    chunk_bytes: usize,
    pending: Vec<u8>,
}

impl ChunkAssembler {
    pub fn new(format: AudioFormat, chunk_size: u32) -> Self {
        let chunk_bytes = chunk_size.max(1) as usize * format.block_align();
        Self {
            format,
            chunk_bytes,
            pending: Vec::with_capacity(chunk_bytes),
        }
    }

    /// Append one interleaved sample in `-1.0..=1.0`. Returns a chunk once
    /// `chunk_size` frames have been collected.
    pub fn push(&mut self, sample: f32) -> Option<Vec<u8>> {
        encode_sample(sample, self.format.bit_depth, &mut self.pending);
        if self.pending.len() < self.chunk_bytes {
            return None;
        }
        Some(std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_bytes)))
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}

/// Encode `sample` as little-endian PCM of `bit_depth` bits. 8-bit is
/// unsigned, every other depth signed.
pub fn encode_sample(sample: f32, bit_depth: u16, out: &mut Vec<u8>) {
    let s = sample.clamp(-1.0, 1.0) as f64;
    match bit_depth {
        8 => out.push((s * 127.0 + 128.0).round() as u8),
        24 => {
            let v = (s * 8_388_607.0).round() as i32;
            out.extend_from_slice(&v.to_le_bytes()[..3]);
        }
        32 => out.extend_from_slice(&((s * 2_147_483_647.0).round() as i32).to_le_bytes()),
        _ => out.extend_from_slice(&((s * 32_767.0).round() as i16).to_le_bytes()),
    }
}

/// Conversion of a driver sample to `-1.0..=1.0`.
trait UnitSample: SizedSample {
    fn to_unit(self) -> f32;
}

impl UnitSample for f32 {
    fn to_unit(self) -> f32 {
        self
    }
}

impl UnitSample for i16 {
    fn to_unit(self) -> f32 {
        self as f32 / 32_768.0
    }
}

impl UnitSample for u16 {
    fn to_unit(self) -> f32 {
        (self as f32 - 32_768.0) / 32_768.0
    }
}

struct Worker {
    stop: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// A microphone or loopback device opened through the default CPAL host.
pub struct CpalAudioSource {
    kind: AudioSourceKind,
    device_name: Option<String>,
    format: AudioFormat,
    chunk_size: u32,
    worker: Option<Worker>,
}

impl CpalAudioSource {
    /// Input device named `device_name`, or the default input device.
    pub fn microphone(device_name: Option<String>, format: AudioFormat, chunk_size: u32) -> Self {
        Self::new(AudioSourceKind::Microphone, device_name, format, chunk_size)
    }

    /// Loopback device named `device_name`, or the default output device.
    ///
    /// Hosts that cannot capture an output device expose loopback as a named
    /// input (a PulseAudio "Monitor of ..." source, for instance).
    pub fn loopback(device_name: Option<String>, format: AudioFormat, chunk_size: u32) -> Self {
        Self::new(AudioSourceKind::SystemLoopback, device_name, format, chunk_size)
    }

    fn new(kind: AudioSourceKind, device_name: Option<String>, format: AudioFormat, chunk_size: u32) -> Self {
        Self {
            kind,
            device_name,
            format,
            chunk_size,
            worker: None,
        }
    }

    /// Names of the input devices on the default host.
    pub fn input_device_names() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to list input devices: {}", e)))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self, callback: AudioChunkCallback) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::InvalidState(format!("{} is already running", self.info().name)));
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let kind = self.kind;
        let device_name = self.device_name.clone();
        let format = self.format;
        let chunk_size = self.chunk_size;

        let handle = thread::Builder::new()
            .name(format!("replay-audio-{}", kind_label(kind)))
            .spawn(move || {
                let stream = match open_stream(kind, device_name.as_deref(), format, chunk_size, callback) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Returns on stop or when the source is dropped.
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    log::debug!("Failed to pause audio stream: {}", e);
                }
            })
            .map_err(|e| CaptureError::DeviceUnavailable(format!("failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker { stop: stop_tx, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::DeviceUnavailable(
                    "audio thread exited before opening the device".into(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let _ = worker.stop.send(());
        worker
            .handle
            .join()
            .map_err(|_| CaptureError::DeviceUnavailable(format!("{} audio thread panicked", self.info().name)))
    }

    fn info(&self) -> AudioSourceInfo {
        let name = self.device_name.clone().unwrap_or_else(|| match self.kind {
            AudioSourceKind::Microphone => "default microphone".into(),
            AudioSourceKind::SystemLoopback => "system audio".into(),
        });
        AudioSourceInfo { name, kind: self.kind }
    }
}

impl Drop for CpalAudioSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn kind_label(kind: AudioSourceKind) -> &'static str {
    match kind {
        AudioSourceKind::Microphone => "mic",
        AudioSourceKind::SystemLoopback => "loopback",
    }
}

fn named_device(mut devices: impl Iterator<Item = cpal::Device>, name: &str) -> Option<cpal::Device> {
    devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
}

fn find_device(kind: AudioSourceKind, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match (kind, name) {
        (_, Some(wanted)) => {
            if let Some(device) = host.input_devices().ok().and_then(|d| named_device(d, wanted)) {
                return Ok(device);
            }
            if kind == AudioSourceKind::SystemLoopback {
                if let Some(device) = host.output_devices().ok().and_then(|d| named_device(d, wanted)) {
                    return Ok(device);
                }
            }
            Err(CaptureError::DeviceUnavailable(format!("no audio device named '{}'", wanted)))
        }
        (AudioSourceKind::Microphone, None) => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".into())),
        (AudioSourceKind::SystemLoopback, None) => host
            .default_output_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default output device".into())),
    }
}

fn open_stream(
    kind: AudioSourceKind,
    name: Option<&str>,
    format: AudioFormat,
    chunk_size: u32,
    callback: AudioChunkCallback,
) -> Result<cpal::Stream, CaptureError> {
    let device = find_device(kind, name)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown audio device".into());

    // Loopback on an output device reports its format through the output config.
    let native = device
        .default_input_config()
        .or_else(|_| device.default_output_config())
        .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: no usable stream format: {}", device_name, e)))?;
    let config = StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.sample_rate),
        buffer_size: BufferSize::Default,
    };
    log::debug!(
        "Opening {} ({:?}) as {:?} at {} Hz, {} channels",
        device_name,
        native.sample_format(),
        kind,
        format.sample_rate,
        format.channels
    );

    let stream = match native.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, format, chunk_size, callback),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, format, chunk_size, callback),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, format, chunk_size, callback),
        other => {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{}: unsupported sample format {:?}",
                device_name, other
            )))
        }
    }
    .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: {}", device_name, e)))?;

    stream
        .play()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("{}: failed to start stream: {}", device_name, e)))?;
    log::info!("Recording audio from {}", device_name);
    Ok(stream)
}

fn build_stream<T: UnitSample>(
    device: &cpal::Device,
    config: &StreamConfig,
    format: AudioFormat,
    chunk_size: u32,
    callback: AudioChunkCallback,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let mut assembler = ChunkAssembler::new(format, chunk_size);
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for sample in data {
                if let Some(samples) = assembler.push(sample.to_unit()) {
                    // The controller assigns the real source id.
                    callback(AudioChunk::new(SourceId(0), format, samples));
                }
            }
        },
        |err| log::warn!("Audio stream error: {}", err),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono16() -> AudioFormat {
        AudioFormat {
            sample_rate: 8000,
            channels: 1,
            bit_depth: 16,
        }
    }

    #[test]
    fn assembler_emits_full_chunks_only() {
        let mut assembler = ChunkAssembler::new(mono16(), 4);
        for _ in 0..3 {
            assert!(assembler.push(0.5).is_none());
        }
        let chunk = assembler.push(0.5).unwrap();
        assert_eq!(chunk.len(), 8);
        assert_eq!(i16::from_le_bytes([chunk[0], chunk[1]]), 16_384);
        assert_eq!(assembler.pending_bytes(), 0);
    }

    #[test]
    fn stereo_chunk_counts_frames_not_samples() {
        let format = AudioFormat { channels: 2, ..mono16() };
        let mut assembler = ChunkAssembler::new(format, 2);
        let chunks: Vec<_> = (0..8).filter_map(|_| assembler.push(0.0)).collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 8));
    }

    #[test]
    fn encoding_per_bit_depth() {
        let mut out = Vec::new();
        encode_sample(1.0, 8, &mut out);
        encode_sample(-1.0, 8, &mut out);
        encode_sample(0.0, 8, &mut out);
        assert_eq!(out, vec![255, 1, 128]);

        out.clear();
        encode_sample(-1.0, 24, &mut out);
        assert_eq!(out, (-8_388_607i32).to_le_bytes()[..3].to_vec());

        out.clear();
        encode_sample(2.0, 32, &mut out);
        assert_eq!(out, i32::MAX.to_le_bytes().to_vec());
    }

    #[test]
    fn driver_samples_normalize() {
        assert_eq!(i16::MIN.to_unit(), -1.0);
        assert_eq!(0u16.to_unit(), -1.0);
        assert_eq!(32_768u16.to_unit(), 0.0);
    }

    #[test]
    fn info_names_default_devices() {
        let mic = CpalAudioSource::microphone(None, mono16(), 1024);
        let loopback = CpalAudioSource::loopback(Some("Monitor of Speakers".into()), mono16(), 1024);
        assert_eq!(mic.info().name, "default microphone");
        assert_eq!(loopback.info().name, "Monitor of Speakers");
        assert_eq!(loopback.info().kind, AudioSourceKind::SystemLoopback);
    }
}
