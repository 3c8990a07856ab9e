use std::sync::Arc;

use crate::models::audio_format::{AudioFormatOptions, InputResult};
use crate::models::error::AudioIoError;

/// Everything a capture endpoint needs to start listening.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRequest {
    pub options: AudioFormatOptions,
    /// Spoken prompt the vehicle plays before listening.
    pub prompt: Option<String>,
    /// Text shown on the head unit while listening.
    pub text: Option<String>,
}

/// Where a capture endpoint delivers audio and platform-side terminations.
///
/// Both methods may be called from the endpoint's own capture thread.
pub trait CaptureSink: Send + Sync {
    /// One captured chunk, in capture order.
    fn on_chunk(&self, chunk: &[u8]);

    /// The platform ended the stream (user abort, retry request, rejection).
    fn on_finished(&self, result: InputResult);
}

/// An open playback endpoint.
pub trait OutputEndpoint: Send {
    /// Write PCM; blocks until the device accepted it.
    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioIoError>;

    /// Drain and release the endpoint.
    fn close(&mut self) -> Result<(), AudioIoError>;
}

/// An open capture endpoint. Delivery to its sink stops once `close` returns.
pub trait InputEndpoint: Send {
    fn close(&mut self) -> Result<(), AudioIoError>;
}

/// Platform audio session: opens endpoints on the single physical channel.
///
/// The manager never holds an output and an input endpoint open at the same
/// time.
pub trait AudioSessionProvider: Send + Sync {
    fn open_output(&self, format: &AudioFormatOptions) -> Result<Box<dyn OutputEndpoint>, AudioIoError>;

    fn open_input(
        &self,
        request: &InputRequest,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<Box<dyn InputEndpoint>, AudioIoError>;
}
