use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_format::{AudioFormatOptions, InputResult};

/// Result of one recorded input session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata written as a JSON sidecar next to each recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub format: AudioFormatOptions,
    pub result: InputResult,
    pub chunk_count: u64,
}

impl RecordingMetadata {
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        format: AudioFormatOptions,
        result: InputResult,
        chunk_count: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            format,
            result,
            chunk_count,
        }
    }
}
