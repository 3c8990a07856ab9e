//! # audio-io-core
//!
//! Platform-agnostic audio I/O manager for a vehicle head unit.
//!
//! One physical audio channel is shared between queued file playback
//! (output) and microphone capture (input). Output always has priority:
//! capture is paused while files play and resumes once the queue drains.
//! Platform backends implement the collaborator traits and plug into
//! [`AudioIoManager`].
//!
//! ## Architecture
//!
//! ```text
//! audio-io-core (this crate)
//! ├── traits/       ← AudioObserver, DeviceCapabilityProvider, AudioFileDecoder, AudioSessionProvider
//! ├── models/       ← AudioIoError, AudioEvent, ChannelState, CaptureState, AudioFormatOptions, config
//! ├── processing/   ← WAV header generation and parsing
//! ├── session/      ← AudioIoManager (arbiter), output player, input capturer, event dispatch
//! └── storage/      ← CaptureRecorder, WAV writer, metadata sidecars
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_format::{AudioEncoding, AudioFormatOptions, BitsPerSample, InputResult, SampleRate};
pub use models::config::AudioIoConfiguration;
pub use models::error::AudioIoError;
pub use models::event::AudioEvent;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::{CaptureState, ChannelState, PlaybackStatus};
pub use session::manager::{AudioBackend, AudioIoManager, ManagerDiagnostics};
pub use storage::capture_recorder::CaptureRecorder;
pub use traits::audio_observer::AudioObserver;
pub use traits::capability_provider::DeviceCapabilityProvider;
pub use traits::file_decoder::{AudioFileDecoder, DecodedAudio};
pub use traits::session_provider::{AudioSessionProvider, CaptureSink, InputEndpoint, InputRequest, OutputEndpoint};
