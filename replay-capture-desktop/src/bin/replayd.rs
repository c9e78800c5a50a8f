//! Instant-replay daemon.
//!
//! `replayd [settings.json]` captures the configured monitor and audio devices
//! and saves a clip every time a `save` line arrives on stdin. `quit` or EOF
//! stops capture and exits. `RUST_LOG` controls verbosity (default `info`).

use std::io::{self, BufRead};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use replay_capture_core::models::clip_result::ClipResult;
use replay_capture_core::models::error::CaptureError;
use replay_capture_core::models::state::CaptureState;
use replay_capture_core::traits::audio_source::AudioSource;
use replay_capture_core::traits::replay_delegate::ReplayDelegate;
use replay_capture_core::{CaptureController, TriggerOutcome};
use replay_capture_desktop::{CpalAudioSource, DesktopSettings, FfmpegMuxer, FfmpegScreenGrab};

/// Prints saved clip paths on stdout so scripts can pick them up.
struct ConsoleDelegate;

impl ReplayDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: CaptureState) {
        log::debug!("Controller is now {:?}", state);
    }

    fn on_save_started(&self) {
        log::info!("Saving clip...");
    }

    fn on_clip_saved(&self, result: &ClipResult) {
        println!("{}", result.file_path.display());
    }

    fn on_save_failed(&self, error: &CaptureError) {
        log::error!("Clip was not saved: {}", error);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CaptureError> {
    let settings = match std::env::args_os().nth(1) {
        Some(path) => DesktopSettings::load(Path::new(&path))?,
        None => DesktopSettings::default(),
    };
    let replay = &settings.replay;
    let format = replay.audio_format();

    let grab = FfmpegScreenGrab::new(
        &settings.ffmpeg_path,
        settings.selected_monitor(),
        replay.video_fps,
        settings.display_or_default(),
    );

    let mut audio: Vec<Box<dyn AudioSource>> = Vec::new();
    if settings.record_microphone {
        audio.push(Box::new(CpalAudioSource::microphone(
            settings.microphone.clone(),
            format,
            replay.chunk_size,
        )));
    }
    if settings.record_loopback {
        audio.push(Box::new(CpalAudioSource::loopback(
            settings.loopback.clone(),
            format,
            replay.chunk_size,
        )));
    }

    let mut controller = CaptureController::new(replay.clone(), grab, audio);
    controller.set_delegate(Arc::new(ConsoleDelegate));
    let trigger = controller.trigger_coordinator(Arc::new(FfmpegMuxer::new(&settings.ffmpeg_path)));
    controller.start()?;

    log::info!(
        "Recording. Type 'save' to keep the last {} seconds plus the next {}, 'quit' to exit.",
        replay.buffer_seconds,
        replay.extra_record_seconds
    );

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Failed to read stdin: {}", e);
                break;
            }
        };
        match line.trim() {
            "" => {}
            "save" | "s" => match trigger.on_trigger() {
                TriggerOutcome::Started(_) => {}
                TriggerOutcome::AlreadySaving => log::info!("Already in the process of saving a clip."),
                TriggerOutcome::NotCapturing => log::warn!("Capture is not running."),
                TriggerOutcome::DispatchFailed(e) => log::error!("{}", e),
            },
            "quit" | "q" | "exit" => break,
            other => log::warn!("Unknown command '{}'", other),
        }
    }

    log::info!("Stopping capture...");
    controller.stop()
}
