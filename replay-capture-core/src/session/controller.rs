use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::models::config::ReplayConfiguration;
use crate::models::error::CaptureError;
use crate::models::media::{AudioChunk, AudioSourceInfo, Frame, SourceId};
use crate::models::state::{AtomicCaptureState, CaptureState};
use crate::processing::audio_mixer::AudioMixer;
use crate::session::feed::CaptureFeed;
use crate::session::save_gate::SaveGate;
use crate::session::trigger::TriggerCoordinator;
use crate::traits::audio_source::{AudioChunkCallback, AudioSource};
use crate::traits::frame_source::FrameSource;
use crate::traits::muxer::Muxer;
use crate::traits::replay_delegate::ReplayDelegate;

/// Buffer and flags of one audio source.
pub(crate) struct AudioFeed {
    pub id: SourceId,
    pub info: AudioSourceInfo,
    pub feed: CaptureFeed<AudioChunk>,
    pub muted: AtomicBool,
}

/// State shared between the controller, its producers and save sessions.
pub(crate) struct ControllerShared {
    pub config: ReplayConfiguration,
    pub state: AtomicCaptureState,
    pub frames: CaptureFeed<Frame>,
    pub audio: Vec<AudioFeed>,
    pub save_gate: Arc<SaveGate>,
    delegate: RwLock<Option<Arc<dyn ReplayDelegate>>>,
}

impl ControllerShared {
    pub fn delegate(&self) -> Option<Arc<dyn ReplayDelegate>> {
        self.delegate.read().clone()
    }

    fn notify_state(&self, state: CaptureState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn ingest_audio(&self, index: usize, mut chunk: AudioChunk) {
        let Some(audio) = self.audio.get(index) else {
            return;
        };
        chunk.source_id = audio.id;
        audio.feed.ingest(&self.state, chunk);
    }

    /// Open look-forward sequences on every feed.
    pub fn open_look_forward(&self) {
        self.frames.open_look_forward();
        for audio in &self.audio {
            audio.feed.open_look_forward();
        }
    }

    /// Freeze the ring buffers. Capturing → Saving.
    pub fn pause(&self) -> Result<(), CaptureError> {
        self.state
            .transition(CaptureState::Capturing, CaptureState::Saving)
            .map_err(|found| CaptureError::InvalidState(format!("cannot save while {:?}", found)))?;
        self.notify_state(CaptureState::Saving);
        Ok(())
    }

    /// Clear every buffer and resume ingestion. Saving → Capturing.
    pub fn resume(&self) {
        self.clear_buffers();
        match self.state.transition(CaptureState::Saving, CaptureState::Capturing) {
            Ok(()) => {
                log::info!("Ready to capture again.");
                self.notify_state(CaptureState::Capturing);
            }
            Err(found) => log::warn!("resume skipped, controller is {:?}", found),
        }
    }

    fn clear_buffers(&self) {
        self.frames.clear();
        for audio in &self.audio {
            audio.feed.clear();
        }
    }
}

/// Owns the capture devices and the look-back buffers.
///
/// Generic over the screen backend; audio backends are boxed so a controller
/// can mix microphone and loopback implementations.
///
/// ```text
/// [FrameSource] → replay-frames thread → [frame ring] ─┐
/// [AudioSource 0] → callback → [audio ring 0] ──────────┼→ SaveSession → Muxer
/// [AudioSource n] → callback → [audio ring n] ──────────┘
/// ```
pub struct CaptureController<F: FrameSource> {
    shared: Arc<ControllerShared>,
    frame_source: Option<F>,
    frame_started: bool,
    audio_sources: Vec<Box<dyn AudioSource>>,
    audio_started: Vec<bool>,
    running: Arc<AtomicBool>,
    producer: Option<thread::JoinHandle<Option<F>>>,
}

impl<F: FrameSource> CaptureController<F> {
    pub fn new(config: ReplayConfiguration, frame_source: F, audio_sources: Vec<Box<dyn AudioSource>>) -> Self {
        let config = config.sanitized();
        let audio_capacity = config.audio_capacity_chunks();
        let audio = audio_sources
            .iter()
            .enumerate()
            .map(|(index, source)| AudioFeed {
                id: SourceId(index as u32),
                info: source.info(),
                feed: CaptureFeed::new(audio_capacity),
                muted: AtomicBool::new(false),
            })
            .collect();

        let shared = ControllerShared {
            frames: CaptureFeed::new(config.buffer_capacity_frames()),
            config,
            state: AtomicCaptureState::new(CaptureState::Idle),
            audio,
            save_gate: Arc::new(SaveGate::default()),
            delegate: RwLock::new(None),
        };

        Self {
            shared: Arc::new(shared),
            frame_source: Some(frame_source),
            frame_started: false,
            audio_started: vec![false; audio_sources.len()],
            audio_sources,
            running: Arc::new(AtomicBool::new(false)),
            producer: None,
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn ReplayDelegate>) {
        *self.shared.delegate.write() = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state.load()
    }

    pub fn config(&self) -> &ReplayConfiguration {
        &self.shared.config
    }

    /// Frames currently held in the look-back buffer.
    pub fn buffered_frames(&self) -> usize {
        self.shared.frames.len()
    }

    pub fn frame_capacity(&self) -> usize {
        self.shared.frames.capacity()
    }

    /// Chunks currently held for `source`, or 0 for an unknown id.
    pub fn buffered_chunks(&self, source: SourceId) -> usize {
        self.shared
            .audio
            .iter()
            .find(|audio| audio.id == source)
            .map(|audio| audio.feed.len())
            .unwrap_or(0)
    }

    /// Sources that failed to start and are recorded as silence.
    pub fn muted_sources(&self) -> Vec<AudioSourceInfo> {
        self.shared
            .audio
            .iter()
            .filter(|audio| audio.muted.load(Ordering::Acquire))
            .map(|audio| audio.info.clone())
            .collect()
    }

    /// Peak level (0.0 to 1.0) of each source's most recent chunk.
    pub fn audio_levels(&self) -> Vec<(AudioSourceInfo, f32)> {
        let mixer = AudioMixer::new(self.shared.config.audio_format());
        self.shared
            .audio
            .iter()
            .map(|audio| {
                let level = audio.feed.with_newest(|chunk| mixer.peak_level(&chunk.samples));
                (audio.info.clone(), level.unwrap_or(0.0))
            })
            .collect()
    }

    /// Coordinator that turns triggers into save sessions on this controller.
    pub fn trigger_coordinator(&self, muxer: Arc<dyn Muxer>) -> TriggerCoordinator {
        TriggerCoordinator::new(Arc::clone(&self.shared), muxer)
    }

    /// Open every device and begin filling the buffers. Idle → Capturing.
    ///
    /// Only a frame source failure is fatal; failed audio sources are muted.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if !self.state().is_idle() {
            return Err(CaptureError::InvalidState("can only start from idle state".into()));
        }
        let mut source = self
            .frame_source
            .take()
            .ok_or_else(|| CaptureError::InvalidState("frame source was lost by a previous run".into()))?;

        if let Err(e) = source.start() {
            log::error!("Failed to open frame source {}: {}", source.describe(), e);
            self.frame_source = Some(source);
            return Err(match e {
                CaptureError::DeviceUnavailable(_) => e,
                other => CaptureError::DeviceUnavailable(other.to_string()),
            });
        }
        self.frame_started = true;
        let description = source.describe();

        self.shared.state.store(CaptureState::Capturing);
        self.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        match launch_producer(source, shared, running, |builder, body| builder.spawn(body)) {
            Ok(handle) => self.producer = Some(handle),
            Err((source, e)) => {
                self.running.store(false, Ordering::Release);
                self.shared.state.store(CaptureState::Idle);
                if let Some(mut source) = source {
                    source.stop();
                    self.frame_source = Some(source);
                }
                self.frame_started = false;
                return Err(CaptureError::DeviceUnavailable(format!(
                    "failed to spawn frame producer: {}",
                    e
                )));
            }
        }

        for (index, source) in self.audio_sources.iter_mut().enumerate() {
            let shared = Arc::clone(&self.shared);
            let callback: AudioChunkCallback = Arc::new(move |chunk| shared.ingest_audio(index, chunk));
            let feed = &self.shared.audio[index];
            match source.start(callback) {
                Ok(()) => {
                    self.audio_started[index] = true;
                    feed.muted.store(false, Ordering::Release);
                    log::info!("Audio source '{}' started", feed.info.name);
                }
                Err(e) => {
                    feed.muted.store(true, Ordering::Release);
                    log::warn!("Audio source '{}' unavailable, recording silence: {}", feed.info.name, e);
                }
            }
        }

        log::info!(
            "Capture started on {} ({} frame look-back, {} audio sources)",
            description,
            self.shared.frames.capacity(),
            self.audio_sources.len()
        );
        self.shared.notify_state(CaptureState::Capturing);
        Ok(())
    }

    /// Stop every producer and release every device. Any state → Idle.
    ///
    /// Waits for an in-flight save to finish first, then joins the frame
    /// producer without a timeout.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        loop {
            self.shared.save_gate.wait_idle();
            match self
                .shared
                .state
                .transition(CaptureState::Capturing, CaptureState::Idle)
            {
                Ok(()) | Err(CaptureState::Idle) => break,
                Err(_) => continue,
            }
        }

        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.producer.take() {
            match handle.join() {
                Ok(Some(source)) => self.frame_source = Some(source),
                Ok(None) => self.frame_started = false,
                Err(_) => {
                    log::error!("Frame producer panicked; its device was released during unwind");
                    self.frame_started = false;
                }
            }
        }

        let mut first_error = None;
        for (index, source) in self.audio_sources.iter_mut().enumerate() {
            if !std::mem::take(&mut self.audio_started[index]) {
                continue;
            }
            if let Err(e) = source.stop() {
                log::warn!("Failed to stop audio source '{}': {}", self.shared.audio[index].info.name, e);
                first_error.get_or_insert(e);
            }
        }

        if std::mem::take(&mut self.frame_started) {
            if let Some(source) = self.frame_source.as_mut() {
                source.stop();
            }
        }

        self.shared.clear_buffers();
        self.shared.notify_state(CaptureState::Idle);
        log::info!("Capture stopped");
        first_error.map_or(Ok(()), Err)
    }
}

impl<F: FrameSource> Drop for CaptureController<F> {
    fn drop(&mut self) {
        if self.producer.is_some() || self.audio_started.iter().any(|s| *s) {
            let _ = self.stop();
        }
    }
}

type ProducerBody<F> = Box<dyn FnOnce() -> Option<F> + Send>;

/// Spawn the frame producer through `spawn`. The source waits in a slot the
/// thread empties on startup, so a failed spawn hands it back to the caller.
fn launch_producer<F, S>(
    source: F,
    shared: Arc<ControllerShared>,
    running: Arc<AtomicBool>,
    spawn: S,
) -> Result<thread::JoinHandle<Option<F>>, (Option<F>, io::Error)>
where
    F: FrameSource,
    S: FnOnce(thread::Builder, ProducerBody<F>) -> io::Result<thread::JoinHandle<Option<F>>>,
{
    let slot = Arc::new(Mutex::new(Some(source)));
    let thread_slot = Arc::clone(&slot);
    let body: ProducerBody<F> = Box::new(move || {
        let source = thread_slot.lock().take()?;
        Some(run_frame_producer(source, shared, running))
    });

    spawn(thread::Builder::new().name("replay-frames".into()), body).map_err(|e| (slot.lock().take(), e))
}

/// Periodic frame grab, paced on the monotonic clock at `1 / video_fps`.
///
/// A late tick is caught up immediately; once the loop is more than one
/// interval behind, the schedule restarts from now and the missed ticks are
/// skipped. Frames whose buffer does not match their dimensions are dropped
/// as capture gaps. Returns the source so the controller can close it.
fn run_frame_producer<F: FrameSource>(mut source: F, shared: Arc<ControllerShared>, running: Arc<AtomicBool>) -> F {
    let interval = shared.config.frame_interval();
    let mut next_tick = Instant::now();
    let mut gaps: u64 = 0;

    while running.load(Ordering::Acquire) {
        match source.read_next() {
            Ok(Some(frame)) if frame.is_well_formed() => shared.frames.ingest(&shared.state, frame),
            Ok(Some(frame)) => {
                gaps += 1;
                log::warn!(
                    "Dropped malformed {}x{} frame from {} ({} bytes, expected {})",
                    frame.width,
                    frame.height,
                    source.describe(),
                    frame.pixels.len(),
                    frame.expected_len()
                );
            }
            Ok(None) => {}
            Err(e) if e.is_gap() => {
                gaps += 1;
                log::warn!("Video capture error on {}: {}", source.describe(), e);
            }
            Err(e) => {
                gaps += 1;
                log::error!("Frame source {} failed: {}", source.describe(), e);
            }
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else if now - next_tick > interval {
            next_tick = now;
        }
    }

    log::debug!("Frame producer exiting after {} capture gaps", gaps);
    source
}
