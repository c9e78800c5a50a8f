use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::media::AudioFormat;
use crate::processing::wav_format;

/// Streaming PCM WAV writer.
///
/// Writes a placeholder header on `open`, appends raw PCM on `write` and
/// patches the RIFF and data sizes on `close`.
pub struct WavFileWriter {
    file_path: PathBuf,
    format: AudioFormat,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf, format: AudioFormat) -> Self {
        Self {
            file_path,
            format,
            file: None,
            data_bytes: 0,
        }
    }

    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }
        let file = File::create(&self.file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create {}: {}", self.file_path.display(), e)))?;
        let mut file = BufWriter::new(file);
        file.write_all(&wav_format::wav_header(&self.format, 0))
            .map_err(|e| CaptureError::StorageError(format!("header write failed: {}", e)))?;
        self.file = Some(file);
        self.data_bytes = 0;
        Ok(())
    }

    pub fn write(&mut self, pcm: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open for writing".into()))?;
        file.write_all(pcm)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.data_bytes += pcm.len() as u64;
        Ok(())
    }

    /// Patch the header sizes and flush. Returns the number of PCM bytes.
    pub fn close(&mut self) -> Result<u64, CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        let data_size = u32::try_from(self.data_bytes)
            .map_err(|_| CaptureError::StorageError("audio track exceeds the 4 GiB WAV limit".into()))?;

        let header = wav_format::wav_header(&self.format, data_size);
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(&header))
            .and_then(|_| file.flush())
            .map_err(|e| CaptureError::StorageError(format!("failed to finalize WAV header: {}", e)))?;
        Ok(self.data_bytes)
    }
}

/// Write `pcm` as a complete WAV file in one go.
pub fn write_wav(path: &Path, format: AudioFormat, pcm: &[u8]) -> Result<(), CaptureError> {
    let mut writer = WavFileWriter::new(path.to_path_buf(), format);
    writer.open()?;
    writer.write(pcm)?;
    writer.close()?;
    Ok(())
}

/// SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: AudioFormat = AudioFormat {
        sample_rate: 8000,
        channels: 1,
        bit_depth: 16,
    };

    #[test]
    fn close_patches_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");

        let mut writer = WavFileWriter::new(path.clone(), FORMAT);
        writer.open().unwrap();
        writer.write(&[1, 0, 2, 0]).unwrap();
        writer.write(&[3, 0]).unwrap();
        assert_eq!(writer.close().unwrap(), 6);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), wav_format::WAV_HEADER_SIZE + 6);
        assert_eq!(wav_format::parse_wav_header(&bytes), Some((FORMAT, 6)));
        assert_eq!(&bytes[44..], &[1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn write_before_open_fails() {
        let mut writer = WavFileWriter::new(PathBuf::from("unused.wav"), FORMAT);
        assert!(matches!(writer.write(&[0, 0]), Err(CaptureError::StorageError(_))));
        assert!(writer.close().is_err());
    }

    #[test]
    fn checksum_is_stable_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, FORMAT, &[]).unwrap();

        let first = sha256_file(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, sha256_file(&path).unwrap());
        assert!(sha256_file(&dir.path().join("missing")).is_err());
    }
}
