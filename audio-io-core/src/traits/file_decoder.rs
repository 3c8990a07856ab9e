use std::path::Path;

use crate::models::audio_format::AudioFormatOptions;
use crate::models::error::AudioIoError;

/// An opened, decodable audio file.
pub trait DecodedAudio: Send {
    /// Format of the PCM produced by [`next_buffer`](Self::next_buffer).
    fn format(&self) -> AudioFormatOptions;

    /// Next block of PCM bytes, or `None` at end of stream.
    fn next_buffer(&mut self) -> Result<Option<Vec<u8>>, AudioIoError>;
}

/// File decoding service used by the output player.
pub trait AudioFileDecoder: Send + Sync {
    /// Open `source` for decoding.
    ///
    /// Unreadable files fail with `Io`, malformed or unsupported ones with
    /// `Decode`.
    fn open(&self, source: &Path) -> Result<Box<dyn DecodedAudio>, AudioIoError>;
}
