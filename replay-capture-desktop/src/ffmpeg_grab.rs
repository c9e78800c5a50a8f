//! Screen capture through a long-running FFmpeg grabber.
//!
//! FFmpeg reads the configured monitor region with the platform's grab
//! device (`x11grab`, `gdigrab`, `avfoundation`) and writes raw BGRA frames to
//! stdout. `read_next` pulls exactly one frame per call.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

use replay_capture_core::models::error::CaptureError;
use replay_capture_core::models::media::{Frame, PixelFormat};
use replay_capture_core::traits::frame_source::FrameSource;

use crate::settings::MonitorRegion;

const GRAB_FORMAT: PixelFormat = PixelFormat::Bgra8;

pub struct FfmpegScreenGrab {
    ffmpeg_path: PathBuf,
    region: MonitorRegion,
    fps: u32,
    display: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    /// First frame, read by `start` to prove the device works.
    pending: Option<Frame>,
}

impl FfmpegScreenGrab {
    pub fn new(ffmpeg_path: &Path, region: MonitorRegion, fps: u32, display: String) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_path_buf(),
            region,
            fps: fps.max(1),
            display,
            child: None,
            stdout: None,
            pending: None,
        }
    }

    fn frame_len(&self) -> usize {
        self.region.width as usize * self.region.height as usize * GRAB_FORMAT.bytes_per_pixel()
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostdin")
            .args(grab_input_args(&self.region, self.fps, &self.display))
            .arg("-pix_fmt")
            .arg(GRAB_FORMAT.ffmpeg_name())
            .arg("-f")
            .arg("rawvideo")
            .arg("-");
        cmd
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let len = self.frame_len();
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState("screen grabber is not running".into()))?;

        let mut pixels = vec![0u8; len];
        stdout.read_exact(&mut pixels).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => CaptureError::CaptureGap("screen grabber stream ended".into()),
            _ => CaptureError::CaptureGap(format!("failed to read frame: {}", e)),
        })?;
        Ok(Frame::new(pixels, self.region.width, self.region.height, GRAB_FORMAT))
    }

    fn shutdown(&mut self) {
        self.stdout = None;
        self.pending = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::debug!("Screen grabber already exited: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegScreenGrab {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.child.is_some() {
            return Err(CaptureError::InvalidState("screen grabber already running".into()));
        }
        if self.region.width == 0 || self.region.height == 0 {
            return Err(CaptureError::DeviceUnavailable(format!("empty monitor region {:?}", self.region)));
        }

        let mut child = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CaptureError::DeviceUnavailable(format!("failed to launch {}: {}", self.ffmpeg_path.display(), e))
            })?;

        if let Some(stderr) = child.stderr.take() {
            let _ = thread::Builder::new().name("replay-grab-log".into()).spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    log::warn!("ffmpeg grab: {}", line);
                }
            });
        }
        self.stdout = child.stdout.take();
        self.child = Some(child);

        match self.read_frame() {
            Ok(frame) => {
                self.pending = Some(frame);
                log::info!("Capturing screen region {}", self.describe());
                Ok(())
            }
            Err(e) => {
                self.shutdown();
                Err(CaptureError::DeviceUnavailable(format!("screen grabber produced no frame: {}", e)))
            }
        }
    }

    fn stop(&mut self) {
        self.shutdown();
    }

    fn read_next(&mut self) -> Result<Option<Frame>, CaptureError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        self.read_frame().map(Some)
    }

    fn describe(&self) -> String {
        format!(
            "{} {}x{}+{},{}",
            self.display, self.region.width, self.region.height, self.region.x, self.region.y
        )
    }
}

impl Drop for FfmpegScreenGrab {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(target_os = "linux")]
fn grab_input_args(region: &MonitorRegion, fps: u32, display: &str) -> Vec<OsString> {
    [
        "-f".to_string(),
        "x11grab".into(),
        "-framerate".into(),
        fps.to_string(),
        "-video_size".into(),
        format!("{}x{}", region.width, region.height),
        "-i".into(),
        format!("{}+{},{}", display, region.x, region.y),
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

#[cfg(target_os = "windows")]
fn grab_input_args(region: &MonitorRegion, fps: u32, display: &str) -> Vec<OsString> {
    [
        "-f".to_string(),
        "gdigrab".into(),
        "-framerate".into(),
        fps.to_string(),
        "-offset_x".into(),
        region.x.to_string(),
        "-offset_y".into(),
        region.y.to_string(),
        "-video_size".into(),
        format!("{}x{}", region.width, region.height),
        "-i".into(),
        display.to_string(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn grab_input_args(region: &MonitorRegion, fps: u32, display: &str) -> Vec<OsString> {
    [
        "-f".to_string(),
        "avfoundation".into(),
        "-capture_cursor".into(),
        "1".into(),
        "-framerate".into(),
        fps.to_string(),
        "-i".into(),
        format!("{}:none", display),
        "-vf".into(),
        format!("crop={}:{}:{}:{}", region.width, region.height, region.x, region.y),
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> MonitorRegion {
        MonitorRegion {
            x: 1920,
            y: 0,
            width: 1280,
            height: 720,
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn command_writes_raw_bgra_to_stdout() {
        let grab = FfmpegScreenGrab::new(Path::new("ffmpeg"), region(), 15, ":1".into());
        let args = args(&grab.command());

        assert_eq!(&args[args.len() - 5..], ["-pix_fmt", "bgra", "-f", "rawvideo", "-"]);
        assert!(args.windows(2).any(|w| w == ["-framerate", "15"]));
        assert_eq!(grab.frame_len(), 1280 * 720 * 4);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn x11_input_selects_region_offset() {
        let grab = FfmpegScreenGrab::new(Path::new("ffmpeg"), region(), 15, ":1".into());
        let args = args(&grab.command());

        assert!(args.windows(2).any(|w| w == ["-f", "x11grab"]));
        assert!(args.windows(2).any(|w| w == ["-video_size", "1280x720"]));
        assert!(args.windows(2).any(|w| w == ["-i", ":1+1920,0"]));
    }

    #[test]
    fn missing_executable_is_device_unavailable() {
        let mut grab = FfmpegScreenGrab::new(Path::new("/nonexistent/ffmpeg"), region(), 15, ":1".into());
        let err = grab.start().unwrap_err();

        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert!(grab.read_next().is_err());
    }

    #[test]
    fn empty_region_is_rejected() {
        let empty = MonitorRegion {
            width: 0,
            ..region()
        };
        let mut grab = FfmpegScreenGrab::new(Path::new("ffmpeg"), empty, 15, ":1".into());
        assert!(matches!(grab.start(), Err(CaptureError::DeviceUnavailable(_))));
    }
}
