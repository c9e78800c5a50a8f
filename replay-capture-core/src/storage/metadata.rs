use std::fs;
use std::path::{Path, PathBuf};

use crate::models::clip_result::ClipMetadata;
use crate::models::error::CaptureError;

/// Sidecar path for a clip: `recording_x.mp4` → `recording_x.metadata.json`.
pub fn metadata_path(clip_path: &Path) -> PathBuf {
    clip_path.with_extension("metadata.json")
}

/// Write clip metadata as a JSON sidecar alongside the clip.
pub fn write_metadata(metadata: &ClipMetadata, clip_path: &Path) -> Result<PathBuf, CaptureError> {
    let path = metadata_path(clip_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json).map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

pub fn read_metadata(clip_path: &Path) -> Result<ClipMetadata, CaptureError> {
    let json = fs::read_to_string(metadata_path(clip_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("recording_2024-01-01_00-00-00.mp4");
        let metadata = ClipMetadata::new(15, 640, 480, 10, 5);

        let written = write_metadata(&metadata, &clip).unwrap();
        assert_eq!(written.file_name().unwrap(), "recording_2024-01-01_00-00-00.metadata.json");
        assert_eq!(read_metadata(&clip).unwrap(), metadata);
    }
}
