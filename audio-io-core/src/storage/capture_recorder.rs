use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_format::{AudioFormatOptions, InputResult};
use crate::models::error::AudioIoError;
use crate::models::event::AudioEvent;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::storage::metadata;
use crate::storage::wav_writer::WavFileWriter;
use crate::traits::audio_observer::AudioObserver;

struct ActiveRecording {
    writer: WavFileWriter,
    format: AudioFormatOptions,
    chunk_count: u64,
}

/// Observer decorator that records every input session to a WAV file.
///
/// On `input-started` a `capture_<uuid>.wav` file is opened in the output
/// directory; `input-data` chunks are appended; on `input-finished` the header
/// is patched, a SHA-256 checksum computed and a metadata sidecar written.
/// An `ABORTED` session asks for its audio to be thrown away, so its file is
/// deleted instead. Every event is then forwarded to the wrapped observer,
/// if any.
///
/// Recording failures are logged and never interrupt forwarding.
pub struct CaptureRecorder {
    output_directory: PathBuf,
    inner: Option<Arc<dyn AudioObserver>>,
    active: Mutex<Option<ActiveRecording>>,
    finished: Mutex<Vec<RecordingResult>>,
}

impl CaptureRecorder {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            inner: None,
            active: Mutex::new(None),
            finished: Mutex::new(Vec::new()),
        }
    }

    /// Forward events to `inner` after recording them.
    pub fn wrapping(output_directory: impl Into<PathBuf>, inner: Arc<dyn AudioObserver>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new(output_directory)
        }
    }

    /// Recordings completed so far, oldest first.
    pub fn recordings(&self) -> Vec<RecordingResult> {
        self.finished.lock().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    fn begin(&self, format: AudioFormatOptions) -> Result<(), AudioIoError> {
        let mut active = self.active.lock();
        if let Some(stale) = active.take() {
            log::warn!("discarding unfinished recording {}", stale.writer.file_path().display());
        }

        let file_path = self
            .output_directory
            .join(format!("capture_{}.wav", uuid::Uuid::new_v4()));
        let mut writer = WavFileWriter::new(file_path, format);
        writer.open()?;
        log::debug!("recording input to {}", writer.file_path().display());

        *active = Some(ActiveRecording {
            writer,
            format,
            chunk_count: 0,
        });
        Ok(())
    }

    fn append(&self, chunk: &[u8]) -> Result<(), AudioIoError> {
        let mut active = self.active.lock();
        let Some(recording) = active.as_mut() else {
            return Ok(());
        };
        recording.writer.write(chunk)?;
        recording.chunk_count += 1;
        Ok(())
    }

    fn finish(&self, result: InputResult) -> Result<(), AudioIoError> {
        let Some(mut recording) = self.active.lock().take() else {
            return Ok(());
        };

        if result == InputResult::Aborted {
            recording.writer.discard()?;
            log::info!(
                "discarded aborted recording {} ({} chunks)",
                recording.writer.file_path().display(),
                recording.chunk_count
            );
            return Ok(());
        }

        let checksum = recording.writer.close()?;
        let duration_secs = recording.format.duration_secs(recording.writer.data_bytes());
        let file_path = recording.writer.file_path().to_path_buf();

        let metadata = RecordingMetadata::new(
            duration_secs,
            &file_path.to_string_lossy(),
            &checksum,
            recording.format,
            result,
            recording.chunk_count,
        );
        metadata::write_metadata(&metadata, &file_path)?;
        log::info!(
            "recorded {:.2}s of input to {} ({:?})",
            duration_secs,
            file_path.display(),
            result
        );

        self.finished.lock().push(RecordingResult {
            file_path,
            duration_secs,
            metadata,
            checksum,
        });
        Ok(())
    }
}

impl AudioObserver for CaptureRecorder {
    fn on_event(&self, event: &AudioEvent) {
        let recorded = match event {
            AudioEvent::InputStarted { options } => self.begin(*options),
            AudioEvent::InputData { chunk } => self.append(chunk),
            AudioEvent::InputFinished { result } => self.finish(*result),
            _ => Ok(()),
        };
        if let Err(e) = recorded {
            log::error!("capture recorder failed on {}: {}", event.name(), e);
        }

        if let Some(inner) = &self.inner {
            inner.on_event(event);
        }
    }
}
