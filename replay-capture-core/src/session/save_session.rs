use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Local};

use crate::models::clip_result::{ClipMetadata, ClipResult};
use crate::models::error::CaptureError;
use crate::models::media::{AudioChunk, AudioFormat};
use crate::processing::audio_mixer::AudioMixer;
use crate::session::controller::ControllerShared;
use crate::storage::metadata::write_metadata;
use crate::storage::wav_writer::{sha256_file, write_wav};
use crate::traits::muxer::{AudioTrack, EncodeRequest, Muxer};

/// Resumes the controller when the session ends, however it ends.
struct ResumeOnDrop<'a>(&'a ControllerShared);

impl Drop for ResumeOnDrop<'_> {
    fn drop(&mut self) {
        self.0.resume();
    }
}

/// One source's audio for the whole clip.
struct SourceTrack {
    name: String,
    samples: Vec<u8>,
}

/// Finalization of one trigger: freeze the look-back, capture the
/// look-forward, mix, encode, clean up and resume.
pub struct SaveSession {
    shared: Arc<ControllerShared>,
    muxer: Arc<dyn Muxer>,
}

impl SaveSession {
    pub(crate) fn new(shared: Arc<ControllerShared>, muxer: Arc<dyn Muxer>) -> Self {
        Self { shared, muxer }
    }

    /// Run the session to completion. Never leaves the controller in
    /// `Saving`: buffers are cleared and capture resumes on every path.
    pub fn run(self) -> Result<ClipResult, CaptureError> {
        let shared = &*self.shared;
        shared.open_look_forward();
        if let Err(e) = shared.pause() {
            shared.frames.take_look_forward();
            for audio in &shared.audio {
                audio.feed.take_look_forward();
            }
            log::warn!("Save aborted before it started: {}", e);
            return Err(e);
        }

        let resume = ResumeOnDrop(shared);
        if let Some(delegate) = shared.delegate() {
            delegate.on_save_started();
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.capture_and_encode())).unwrap_or_else(|payload| {
            Err(CaptureError::EncodingFailed(format!(
                "save panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
        drop(resume);

        match &result {
            Ok(clip) => {
                if let Some(delegate) = shared.delegate() {
                    delegate.on_clip_saved(clip);
                }
            }
            Err(e) => {
                log::error!("Failed to save video: {:?}", e);
                if let Some(delegate) = shared.delegate() {
                    delegate.on_save_failed(e);
                }
            }
        }
        result
    }

    fn capture_and_encode(&self) -> Result<ClipResult, CaptureError> {
        let shared = &*self.shared;
        let config = &shared.config;

        let mut frames = shared.frames.drain();
        let look_back_frames = frames.len();
        let mut chunks: Vec<Vec<AudioChunk>> = shared.audio.iter().map(|audio| audio.feed.drain()).collect();

        log::info!(
            "Save command received with {} buffered frames. Capturing final {} seconds.",
            look_back_frames,
            config.extra_record_seconds
        );
        thread::sleep(config.look_forward());

        frames.extend(shared.frames.take_look_forward());
        for (index, audio) in shared.audio.iter().enumerate() {
            chunks[index].extend(audio.feed.take_look_forward());
        }
        let look_forward_frames = frames.len() - look_back_frames;
        log::info!("Finished recording. Now processing and saving the clip...");

        let first = frames
            .first()
            .ok_or_else(|| CaptureError::EncodingFailed("no frames captured".into()))?;
        let (width, height) = (first.width, first.height);
        let mismatched = frames.iter().filter(|f| f.width != width || f.height != height).count();
        if mismatched > 0 {
            return Err(CaptureError::EncodingFailed(format!(
                "{} frames do not match the {}x{} clip resolution",
                mismatched, width, height
            )));
        }

        let format = config.audio_format();
        let tracks: Vec<SourceTrack> = shared
            .audio
            .iter()
            .zip(chunks)
            .filter_map(|(audio, chunks)| {
                let samples = concat_matching(&audio.info.name, chunks, format);
                (!samples.is_empty()).then(|| SourceTrack {
                    name: audio.info.name.clone(),
                    samples,
                })
            })
            .collect();

        let mut metadata = ClipMetadata::new(config.video_fps, width, height, look_back_frames, look_forward_frames);
        metadata.mixed_sources = tracks.iter().map(|t| t.name.clone()).collect();
        metadata.muted_sources = shared
            .audio
            .iter()
            .filter(|audio| audio.muted.load(std::sync::atomic::Ordering::Acquire))
            .map(|audio| audio.info.name.clone())
            .collect();

        let mixed = mix_tracks(AudioMixer::new(format), tracks);

        let session_dir = tempfile::Builder::new()
            .prefix("replay-session-")
            .tempdir()
            .map_err(|e| CaptureError::StorageError(format!("failed to create session directory: {}", e)))?;

        let audio = match mixed {
            Some(samples) => {
                let wav_path = session_dir.path().join("mixed_audio.wav");
                write_wav(&wav_path, format, &samples)?;
                metadata.audio_format = Some(format);
                metadata.audio_duration_secs = Some(format.duration_secs(samples.len()));
                Some(AudioTrack {
                    format,
                    samples,
                    wav_path,
                })
            }
            None => None,
        };

        fs::create_dir_all(&config.output_directory)
            .map_err(|e| CaptureError::StorageError(format!("failed to create output directory: {}", e)))?;
        let output_path = clip_path(&config.output_directory, &config.container_extension, Local::now());

        self.muxer.encode(&EncodeRequest {
            frames: &frames,
            audio: audio.as_ref(),
            fps: config.video_fps,
            output_path: &output_path,
        })?;
        drop(frames);

        if !output_path.is_file() {
            return Err(CaptureError::EncodingFailed(format!(
                "muxer reported success but {} does not exist",
                output_path.display()
            )));
        }

        let checksum = sha256_file(&output_path)?;
        metadata.file_path = output_path.to_string_lossy().into_owned();
        metadata.checksum = checksum.clone();
        if let Err(e) = write_metadata(&metadata, &output_path) {
            log::warn!("Clip saved without metadata sidecar: {}", e);
        }

        if let Err(e) = session_dir.close() {
            log::warn!("Failed to remove session directory: {}", e);
        }

        log::info!("Video saved as {}", output_path.display());
        Ok(ClipResult {
            file_path: output_path,
            duration_secs: metadata.duration_secs,
            metadata,
            checksum,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Concatenate one source's chunks, skipping any whose format differs from
/// the controller's.
fn concat_matching(name: &str, chunks: Vec<AudioChunk>, format: AudioFormat) -> Vec<u8> {
    let mut samples = Vec::with_capacity(chunks.iter().map(|c| c.samples.len()).sum());
    let mut skipped = 0usize;
    for chunk in chunks {
        if chunk.format == format {
            samples.extend_from_slice(&chunk.samples);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        log::warn!("Dropped {} chunks from '{}' with a foreign audio format", skipped, name);
    }
    samples
}

/// Overlay every track with data. One track passes through untouched;
/// no track means a silent clip.
fn mix_tracks(mixer: AudioMixer, tracks: Vec<SourceTrack>) -> Option<Vec<u8>> {
    match tracks.len() {
        0 => None,
        1 => tracks.into_iter().next().map(|t| t.samples),
        _ => {
            let streams: Vec<&[u8]> = tracks.iter().map(|t| t.samples.as_slice()).collect();
            Some(mixer.mix(&streams))
        }
    }
}

/// `<dir>/recording_<YYYY-MM-DD_HH-MM-SS>.<ext>`, suffixed `_N` when taken.
fn clip_path(dir: &Path, extension: &str, now: DateTime<Local>) -> PathBuf {
    let stem = format!("recording_{}", now.format("%Y-%m-%d_%H-%M-%S"));
    let mut path = dir.join(format!("{}.{}", stem, extension));
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", stem, suffix, extension));
        suffix += 1;
    }
    path
}
