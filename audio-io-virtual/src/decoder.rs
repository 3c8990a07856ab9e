use std::fs;
use std::path::Path;

use audio_io_core::processing::wav_format;
use audio_io_core::{AudioFileDecoder, AudioFormatOptions, AudioIoError, DecodedAudio};

/// Decodes mono PCM WAV files into fixed-size playback buffers.
pub struct WavFileDecoder {
    buffer_bytes: usize,
}

impl WavFileDecoder {
    pub fn new(buffer_bytes: usize) -> Self {
        Self {
            buffer_bytes: buffer_bytes.max(1),
        }
    }
}

impl Default for WavFileDecoder {
    /// 100 ms at 16 kHz 16-bit.
    fn default() -> Self {
        Self::new(3200)
    }
}

impl AudioFileDecoder for WavFileDecoder {
    fn open(&self, source: &Path) -> Result<Box<dyn DecodedAudio>, AudioIoError> {
        let bytes = fs::read(source).map_err(|e| AudioIoError::Io(format!("failed to read {}: {}", source.display(), e)))?;
        let layout = wav_format::parse_wav(&bytes)?;

        let end = layout.data_offset + layout.data_len;
        log::debug!("decoding {} ({}, {} bytes)", source.display(), layout.format, layout.data_len);
        Ok(Box::new(WavStream {
            pcm: bytes[layout.data_offset..end].to_vec(),
            position: 0,
            format: layout.format,
            buffer_bytes: self.buffer_bytes,
        }))
    }
}

struct WavStream {
    pcm: Vec<u8>,
    position: usize,
    format: AudioFormatOptions,
    buffer_bytes: usize,
}

impl DecodedAudio for WavStream {
    fn format(&self) -> AudioFormatOptions {
        self.format
    }

    fn next_buffer(&mut self) -> Result<Option<Vec<u8>>, AudioIoError> {
        if self.position >= self.pcm.len() {
            return Ok(None);
        }
        let end = (self.position + self.buffer_bytes).min(self.pcm.len());
        let buffer = self.pcm[self.position..end].to_vec();
        self.position = end;
        Ok(Some(buffer))
    }
}

/// Write `pcm` as a WAV file in `format`.
pub fn write_wav_file(path: &Path, format: &AudioFormatOptions, pcm: &[u8]) -> Result<(), AudioIoError> {
    let mut bytes = wav_format::generate_wav_header(format, pcm.len() as u32).to_vec();
    bytes.extend_from_slice(pcm);
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_io_core::{BitsPerSample, SampleRate};
    use std::path::PathBuf;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_io_virtual_{}_{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn splits_into_buffers() {
        let path = temp_file_path("tone.wav");
        let format = AudioFormatOptions::new(SampleRate::Khz8, BitsPerSample::Bits8);
        let pcm: Vec<u8> = (0..250u32).map(|i| i as u8).collect();
        write_wav_file(&path, &format, &pcm).unwrap();

        let mut decoded = WavFileDecoder::new(100).open(&path).unwrap();
        assert_eq!(decoded.format(), format);

        let mut sizes = Vec::new();
        let mut collected = Vec::new();
        while let Some(buffer) = decoded.next_buffer().unwrap() {
            sizes.push(buffer.len());
            collected.extend(buffer);
        }
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(collected, pcm);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = WavFileDecoder::default().open(&temp_file_path("missing.wav"));
        assert!(matches!(result, Err(AudioIoError::Io(_))));
    }

    #[test]
    fn garbage_is_decode_error() {
        let path = temp_file_path("garbage.wav");
        fs::write(&path, b"definitely not a wav file").unwrap();

        let result = WavFileDecoder::default().open(&path);
        assert!(matches!(result, Err(AudioIoError::Decode(_))));

        fs::remove_file(&path).ok();
    }
}
