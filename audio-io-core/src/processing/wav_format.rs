//! RIFF/WAVE helpers for mono PCM in the formats a vehicle endpoint speaks.
//!
//! Used by the capture recorder to write sessions to disk and by file
//! decoders to locate the PCM payload of a playback source.

use crate::models::audio_format::{AudioFormatOptions, BitsPerSample, SampleRate};
use crate::models::error::AudioIoError;

/// Size of the canonical WAV header written by [`generate_wav_header`].
pub const WAV_HEADER_SIZE: usize = 44;

const PCM_FORMAT_CODE: u16 = 1;

/// Generate a 44-byte PCM WAV header for `format`.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16
/// [20-21]  1 (PCM)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate
/// [32-33]  block_align
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &AudioFormatOptions, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let channels = AudioFormatOptions::CHANNELS;
    let bits = format.bits_per_sample.bits();
    let block_align = channels * bits / 8;

    let mut header = [0u8; WAV_HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_CODE.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.hz().to_le_bytes());
    header[28..32].copy_from_slice(&format.bytes_per_second().to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Patch the RIFF chunk size (offset 4) and data size (offset 40) once the
/// payload length is known.
pub fn patch_sizes(header: &mut [u8], data_size: u64) {
    let data_size = data_size.min(u32::MAX as u64 - 36) as u32;
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
}

/// Location and format of the PCM payload inside a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavLayout {
    pub format: AudioFormatOptions,
    pub data_offset: usize,
    pub data_len: usize,
}

/// Parse a WAV file image, walking chunks until `fmt ` and `data` are found.
///
/// Only mono PCM at a vehicle sample rate is accepted; anything else is a
/// `Decode` error since the manager performs no format conversion.
pub fn parse_wav(bytes: &[u8]) -> Result<WavLayout, AudioIoError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AudioIoError::Decode("not a RIFF/WAVE file".into()));
    }

    let mut format = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4) as usize;
        let body = pos + 8;

        match id {
            b"fmt " => {
                if size < 16 || body + 16 > bytes.len() {
                    return Err(AudioIoError::Decode("truncated fmt chunk".into()));
                }
                format = Some(parse_fmt(&bytes[body..body + 16])?);
            }
            b"data" => {
                let format = format.ok_or_else(|| AudioIoError::Decode("data chunk before fmt chunk".into()))?;
                // Streams written without a final size patch claim more than exists.
                let data_len = size.min(bytes.len() - body);
                return Ok(WavLayout {
                    format,
                    data_offset: body,
                    data_len,
                });
            }
            _ => {}
        }

        // Chunks are word aligned.
        pos = body + size + (size & 1);
    }

    Err(AudioIoError::Decode("missing data chunk".into()))
}

fn parse_fmt(fmt: &[u8]) -> Result<AudioFormatOptions, AudioIoError> {
    let code = read_u16(fmt, 0);
    let channels = read_u16(fmt, 2);
    let rate = read_u32(fmt, 4);
    let bits = read_u16(fmt, 14);

    if code != PCM_FORMAT_CODE {
        return Err(AudioIoError::Decode(format!("unsupported format code {}", code)));
    }
    if channels != AudioFormatOptions::CHANNELS {
        return Err(AudioIoError::Decode(format!("unsupported channel count {}", channels)));
    }
    let sample_rate =
        SampleRate::from_hz(rate).ok_or_else(|| AudioIoError::Decode(format!("unsupported sample rate {}", rate)))?;
    let bits_per_sample =
        BitsPerSample::from_bits(bits).ok_or_else(|| AudioIoError::Decode(format!("unsupported bit depth {}", bits)))?;

    Ok(AudioFormatOptions::new(sample_rate, bits_per_sample))
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format_16k() -> AudioFormatOptions {
        AudioFormatOptions::new(SampleRate::Khz16, BitsPerSample::Bits16)
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(&format_16k(), 0);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_16khz_mono_16bit() {
        let header = generate_wav_header(&format_16k(), 3200);

        assert_eq!(read_u16(&header, 20), 1);
        assert_eq!(read_u16(&header, 22), 1);
        assert_eq!(read_u32(&header, 24), 16000);
        assert_eq!(read_u32(&header, 28), 32000);
        assert_eq!(read_u16(&header, 32), 2);
        assert_eq!(read_u16(&header, 34), 16);
        assert_eq!(read_u32(&header, 40), 3200);
        assert_eq!(read_u32(&header, 4), 36 + 3200);
    }

    #[test]
    fn patch_sizes_updates_both_fields() {
        let mut header = generate_wav_header(&format_16k(), 0);
        patch_sizes(&mut header, 19200);
        assert_eq!(read_u32(&header, 40), 19200);
        assert_eq!(read_u32(&header, 4), 19200 + 36);
    }

    #[test]
    fn parses_generated_file() {
        let format = AudioFormatOptions::new(SampleRate::Khz22, BitsPerSample::Bits8);
        let mut file = generate_wav_header(&format, 4).to_vec();
        file.extend_from_slice(&[1, 2, 3, 4]);

        let layout = parse_wav(&file).unwrap();
        assert_eq!(layout.format, format);
        assert_eq!(layout.data_offset, WAV_HEADER_SIZE);
        assert_eq!(layout.data_len, 4);
    }

    #[test]
    fn skips_unknown_chunks() {
        let header = generate_wav_header(&format_16k(), 2);
        let mut file = header[..36].to_vec();
        file.extend_from_slice(b"LIST");
        file.extend_from_slice(&3u32.to_le_bytes());
        file.extend_from_slice(&[0, 0, 0, 0]); // 3 bytes + pad
        file.extend_from_slice(&header[36..]);
        file.extend_from_slice(&[7, 8]);

        let layout = parse_wav(&file).unwrap();
        assert_eq!(&file[layout.data_offset..layout.data_offset + layout.data_len], &[7, 8]);
    }

    #[test]
    fn clamps_unpatched_data_size() {
        let mut file = generate_wav_header(&format_16k(), 1000).to_vec();
        file.extend_from_slice(&[0; 10]);
        assert_eq!(parse_wav(&file).unwrap().data_len, 10);
    }

    #[test]
    fn rejects_garbage_and_stereo() {
        assert!(matches!(parse_wav(b"not audio at all"), Err(AudioIoError::Decode(_))));

        let mut header = generate_wav_header(&format_16k(), 0);
        header[22..24].copy_from_slice(&2u16.to_le_bytes());
        assert!(matches!(parse_wav(&header), Err(AudioIoError::Decode(_))));
    }

    #[test]
    fn rejects_unsupported_rate() {
        let mut header = generate_wav_header(&format_16k(), 0);
        header[24..28].copy_from_slice(&48000u32.to_le_bytes());
        let err = parse_wav(&header).unwrap_err();
        assert_eq!(err, AudioIoError::Decode("unsupported sample rate 48000".into()));
    }
}
