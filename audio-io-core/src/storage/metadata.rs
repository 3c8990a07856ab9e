use std::fs;
use std::path::Path;

use crate::models::error::AudioIoError;
use crate::models::recording_result::RecordingMetadata;

/// Write recording metadata as `{recording_path}.metadata.json`.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), AudioIoError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| AudioIoError::Io(format!("failed to serialize metadata: {}", e)))?;
    fs::write(recording_path.with_extension("metadata.json"), json)
        .map_err(|e| AudioIoError::Io(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read the metadata sidecar of a recording.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, AudioIoError> {
    let json = fs::read_to_string(recording_path.with_extension("metadata.json"))
        .map_err(|e| AudioIoError::Io(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| AudioIoError::Io(format!("failed to parse metadata: {}", e)))
}
