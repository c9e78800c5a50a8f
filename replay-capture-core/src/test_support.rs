//! Deterministic sources, muxer and delegate used by the session tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::clip_result::ClipResult;
use crate::models::config::ReplayConfiguration;
use crate::models::error::CaptureError;
use crate::models::media::{AudioChunk, AudioFormat, AudioSourceInfo, AudioSourceKind, Frame, PixelFormat, SourceId};
use crate::models::state::CaptureState;
use crate::traits::audio_source::{AudioChunkCallback, AudioSource};
use crate::traits::frame_source::FrameSource;
use crate::traits::muxer::{AudioTrack, EncodeRequest, Muxer};
use crate::traits::replay_delegate::ReplayDelegate;

/// 20 fps, 1 s windows, 8 kHz mono audio in 100 ms chunks.
pub fn fast_config(dir: &Path) -> ReplayConfiguration {
    ReplayConfiguration {
        video_fps: 20,
        buffer_seconds: 1,
        extra_record_seconds: 1,
        sample_rate: 8000,
        channels: 1,
        bit_depth: 16,
        chunk_size: 800,
        monitor_selector: 0,
        output_directory: dir.join("recordings"),
        container_extension: "mp4".into(),
    }
}

pub fn fast_format() -> AudioFormat {
    AudioFormat {
        sample_rate: 8000,
        channels: 1,
        bit_depth: 16,
    }
}

/// Sequence number stamped into the first eight bytes of a scripted frame.
pub fn frame_sequence(frame: &Frame) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&frame.pixels[..8]);
    u64::from_le_bytes(bytes)
}

#[derive(Default)]
struct Counters {
    starts: AtomicU64,
    stops: AtomicU64,
    reads: AtomicU64,
}

/// Shared view of a test source's lifecycle counters.
#[derive(Clone, Default)]
pub struct Lifecycle(Arc<Counters>);

impl Lifecycle {
    pub fn starts(&self) -> u64 {
        self.0.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.0.stops.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.0.reads.load(Ordering::SeqCst)
    }
}

/// 2x2 BGRA frames numbered from 0.
pub struct ScriptedFrameSource {
    lifecycle: Lifecycle,
    next_sequence: u64,
    fail_start: bool,
    fail_every: Option<u64>,
    short_every: Option<u64>,
}

impl ScriptedFrameSource {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::default(),
            next_sequence: 0,
            fail_start: false,
            fail_every: None,
            short_every: None,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Every `n`th read reports a capture gap.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Every `n`th read returns a frame whose buffer is half the size its
    /// dimensions call for.
    pub fn short_every(mut self, n: u64) -> Self {
        self.short_every = Some(n.max(1));
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }
}

impl FrameSource for ScriptedFrameSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::DeviceUnavailable("scripted display is unplugged".into()));
        }
        self.lifecycle.0.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.lifecycle.0.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn read_next(&mut self) -> Result<Option<Frame>, CaptureError> {
        let reads = self.lifecycle.0.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every.is_some_and(|n| reads % n == 0) {
            return Err(CaptureError::CaptureGap(format!("scripted gap on read {}", reads)));
        }
        let mut len = 2 * 2 * PixelFormat::Bgra8.bytes_per_pixel();
        if self.short_every.is_some_and(|n| reads % n == 0) {
            len /= 2;
        }
        let mut pixels = vec![0u8; len];
        pixels[..8].copy_from_slice(&self.next_sequence.to_le_bytes());
        self.next_sequence += 1;
        Ok(Some(Frame::new(pixels, 2, 2, PixelFormat::Bgra8)))
    }

    fn describe(&self) -> String {
        "scripted display".into()
    }
}

/// Emits a 100 ms chunk of one constant sample value every 100 ms.
pub struct TimedAudioSource {
    info: AudioSourceInfo,
    value: i16,
    lifecycle: Lifecycle,
    fail_start: bool,
    chunk_limit: Option<usize>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TimedAudioSource {
    pub fn microphone(value: i16) -> Self {
        Self::with_info("test-mic", AudioSourceKind::Microphone, value)
    }

    pub fn loopback(value: i16) -> Self {
        Self::with_info("test-loopback", AudioSourceKind::SystemLoopback, value)
    }

    fn with_info(name: &str, kind: AudioSourceKind, value: i16) -> Self {
        Self {
            info: AudioSourceInfo {
                name: name.into(),
                kind,
            },
            value,
            lifecycle: Lifecycle::default(),
            fail_start: false,
            chunk_limit: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Deliver `n` chunks, then go quiet as a device that dropped out would.
    pub fn stopping_after(mut self, n: usize) -> Self {
        self.chunk_limit = Some(n);
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }
}

impl AudioSource for TimedAudioSource {
    fn start(&mut self, callback: AudioChunkCallback) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::DeviceUnavailable(format!("{} is busy", self.info.name)));
        }
        self.lifecycle.0.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let limit = self.chunk_limit.unwrap_or(usize::MAX);
        let samples: Vec<u8> = std::iter::repeat(self.value.to_le_bytes()).take(800).flatten().collect();
        self.worker = Some(thread::spawn(move || {
            let mut delivered = 0;
            while running.load(Ordering::SeqCst) {
                if delivered < limit {
                    callback(AudioChunk::new(SourceId(u32::MAX), fast_format(), samples.clone()));
                    delivered += 1;
                }
                thread::sleep(Duration::from_millis(100));
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.lifecycle.0.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn info(&self) -> AudioSourceInfo {
        self.info.clone()
    }
}

/// What one `encode` call received.
#[derive(Debug, Clone)]
pub struct MuxRecord {
    pub frame_count: usize,
    pub sequence: Vec<u64>,
    /// Frames whose buffer length disagrees with their dimensions.
    pub malformed: usize,
    pub fps: u32,
    pub audio: Option<AudioTrack>,
    pub output_path: PathBuf,
}

#[derive(Clone, Copy, PartialEq)]
enum MuxBehavior {
    Succeed,
    Fail,
    Panic,
}

/// Muxer that records its inputs and writes a placeholder clip.
pub struct RecordingMuxer {
    behavior: MuxBehavior,
    records: Mutex<Vec<MuxRecord>>,
}

impl RecordingMuxer {
    pub fn new() -> Self {
        Self::with_behavior(MuxBehavior::Succeed)
    }

    pub fn failing() -> Self {
        Self::with_behavior(MuxBehavior::Fail)
    }

    pub fn panicking() -> Self {
        Self::with_behavior(MuxBehavior::Panic)
    }

    fn with_behavior(behavior: MuxBehavior) -> Self {
        Self {
            behavior,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.records.lock().len()
    }

    pub fn last(&self) -> Option<MuxRecord> {
        self.records.lock().last().cloned()
    }
}

impl Muxer for RecordingMuxer {
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), CaptureError> {
        if let Some(audio) = request.audio {
            assert!(audio.wav_path.is_file(), "mixed track was not written before encode");
        }
        self.records.lock().push(MuxRecord {
            frame_count: request.frames.len(),
            sequence: request.frames.iter().map(frame_sequence).collect(),
            malformed: request.frames.iter().filter(|f| !f.is_well_formed()).count(),
            fps: request.fps,
            audio: request.audio.cloned(),
            output_path: request.output_path.to_path_buf(),
        });

        match self.behavior {
            MuxBehavior::Succeed => std::fs::write(request.output_path, b"clip")
                .map_err(|e| CaptureError::StorageError(e.to_string())),
            MuxBehavior::Fail => Err(CaptureError::EncodingFailed("encoder exited with status 1".into())),
            MuxBehavior::Panic => panic!("encoder crashed"),
        }
    }
}

/// Delegate that counts every callback.
#[derive(Default)]
pub struct EventLog {
    states: Mutex<Vec<CaptureState>>,
    started: AtomicU64,
    saved: AtomicU64,
    failures: AtomicU64,
}

impl EventLog {
    pub fn states(&self) -> Vec<CaptureState> {
        self.states.lock().clone()
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }
}

impl ReplayDelegate for EventLog {
    fn on_state_changed(&self, state: CaptureState) {
        self.states.lock().push(state);
    }

    fn on_save_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_clip_saved(&self, _result: &ClipResult) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }

    fn on_save_failed(&self, _error: &CaptureError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}
