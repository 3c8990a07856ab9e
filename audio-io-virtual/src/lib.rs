//! # audio-io-virtual
//!
//! Virtual audio endpoint backend for audio-io.
//!
//! Provides:
//! - `VirtualCapabilities`: scripted microphone permission and format negotiation
//! - `VirtualAudioSession`: in-memory playback and capture endpoints with
//!   failure/latency injection and channel-exclusivity accounting
//! - `WavFileDecoder`: mono PCM WAV files as playback sources
//! - `EventLog`: an observer that records events and lets callers wait on them
//!
//! ## Usage
//! ```no_run
//! use std::sync::Arc;
//! use audio_io_core::{AudioIoConfiguration, AudioIoManager};
//! use audio_io_virtual::{EventLog, VirtualBackend};
//!
//! let backend = VirtualBackend::new();
//! let log = Arc::new(EventLog::new());
//! let manager = AudioIoManager::with_observer(AudioIoConfiguration::default(), backend.audio_backend(), &log)?;
//! manager.write_output("chime.wav");
//! # Ok::<(), audio_io_core::AudioIoError>(())
//! ```

pub mod capabilities;
pub mod decoder;
pub mod event_log;
pub mod session;

use std::sync::Arc;

use audio_io_core::AudioBackend;

pub use capabilities::VirtualCapabilities;
pub use decoder::{write_wav_file, WavFileDecoder};
pub use event_log::EventLog;
pub use session::{chunk_sequence, CaptureScript, PlayedOutput, VirtualAudioSession};

/// The three virtual collaborators, kept concrete so tests can steer them.
#[derive(Clone)]
pub struct VirtualBackend {
    pub capabilities: Arc<VirtualCapabilities>,
    pub decoder: Arc<WavFileDecoder>,
    pub session: Arc<VirtualAudioSession>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self {
            capabilities: Arc::new(VirtualCapabilities::new()),
            decoder: Arc::new(WavFileDecoder::default()),
            session: Arc::new(VirtualAudioSession::new()),
        }
    }

    pub fn audio_backend(&self) -> AudioBackend {
        AudioBackend {
            capabilities: self.capabilities.clone(),
            decoder: self.decoder.clone(),
            session: self.session.clone(),
        }
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}
