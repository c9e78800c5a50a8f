//! Clip encoding through the FFmpeg command-line tool.
//!
//! Frames are streamed as raw video on stdin; the mixed track is read from the
//! WAV file the save session wrote. Output is H.264 video with AAC audio.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use replay_capture_core::models::error::CaptureError;
use replay_capture_core::traits::muxer::{EncodeRequest, Muxer};

pub struct FfmpegMuxer {
    ffmpeg_path: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg_path: &Path) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_path_buf(),
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
        }
    }

    pub fn with_codecs(mut self, video: &str, audio: &str) -> Self {
        self.video_codec = video.into();
        self.audio_codec = audio.into();
        self
    }

    /// Command for `request`. The caller validated that frames exist and share
    /// one resolution.
    pub fn command(&self, request: &EncodeRequest<'_>) -> Result<Command, CaptureError> {
        let first = request
            .frames
            .first()
            .ok_or_else(|| CaptureError::EncodingFailed("no frames to encode".into()))?;

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg(first.format.ffmpeg_name())
            .arg("-video_size")
            .arg(format!("{}x{}", first.width, first.height))
            .arg("-framerate")
            .arg(request.fps.max(1).to_string())
            .arg("-i")
            .arg("-");

        if let Some(audio) = request.audio {
            cmd.arg("-i").arg(&audio.wav_path);
        }

        // yuv420p needs even dimensions.
        cmd.arg("-vf")
            .arg("scale=trunc(iw/2)*2:trunc(ih/2)*2")
            .arg("-c:v")
            .arg(&self.video_codec)
            .arg("-pix_fmt")
            .arg("yuv420p");

        match request.audio {
            Some(_) => cmd.arg("-c:a").arg(&self.audio_codec),
            None => cmd.arg("-an"),
        };
        cmd.arg(request.output_path);
        Ok(cmd)
    }
}

impl Muxer for FfmpegMuxer {
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), CaptureError> {
        let mut child = self
            .command(request)?
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CaptureError::EncodingFailed(format!("failed to launch {}: {}", self.ffmpeg_path.display(), e))
            })?;

        let write_result = match child.stdin.take() {
            Some(stdin) => {
                let mut writer = BufWriter::new(stdin);
                request
                    .frames
                    .iter()
                    .try_for_each(|frame| writer.write_all(&frame.pixels))
                    .and_then(|()| writer.flush())
            }
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|e| CaptureError::EncodingFailed(format!("failed to wait for encoder: {}", e)))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("no output").trim();

        if !output.status.success() {
            return Err(CaptureError::EncodingFailed(format!(
                "encoder exited with {}: {}",
                output.status, detail
            )));
        }
        if let Err(e) = write_result {
            return Err(CaptureError::EncodingFailed(format!("failed to stream frames: {}", e)));
        }

        log::debug!(
            "Encoded {} frames{} into {}",
            request.frames.len(),
            if request.audio.is_some() { " with audio" } else { "" },
            request.output_path.display()
        );
        Ok(())
    }
}
