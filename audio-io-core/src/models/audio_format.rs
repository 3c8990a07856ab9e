use std::fmt;

use serde::{Deserialize, Serialize};

/// Sample encoding of an input or output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioEncoding {
    Pcm,
}

/// Sampling rates a vehicle capture endpoint can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    #[serde(rename = "8KHZ")]
    Khz8,
    #[serde(rename = "16KHZ")]
    Khz16,
    #[serde(rename = "22KHZ")]
    Khz22,
    #[serde(rename = "44KHZ")]
    Khz44,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Khz8 => 8_000,
            Self::Khz16 => 16_000,
            Self::Khz22 => 22_050,
            Self::Khz44 => 44_100,
        }
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8_000 => Some(Self::Khz8),
            16_000 => Some(Self::Khz16),
            22_050 => Some(Self::Khz22),
            44_100 => Some(Self::Khz44),
            _ => None,
        }
    }
}

/// Bits per sample of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitsPerSample {
    #[serde(rename = "8_BIT")]
    Bits8,
    #[serde(rename = "16_BIT")]
    Bits16,
}

impl BitsPerSample {
    pub fn bits(self) -> u16 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
        }
    }

    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::Bits8),
            16 => Some(Self::Bits16),
            _ => None,
        }
    }
}

/// Format options negotiated for a capture session (mono PCM).
///
/// Reported to the observer with `input-started` and reused unchanged when a
/// paused session resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormatOptions {
    pub encoding: AudioEncoding,
    pub sample_rate: SampleRate,
    pub bits_per_sample: BitsPerSample,
}

impl AudioFormatOptions {
    pub const CHANNELS: u16 = 1;

    pub fn new(sample_rate: SampleRate, bits_per_sample: BitsPerSample) -> Self {
        Self {
            encoding: AudioEncoding::Pcm,
            sample_rate,
            bits_per_sample,
        }
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate.hz() * Self::CHANNELS as u32 * self.bits_per_sample.bits() as u32 / 8
    }

    /// Playback length of `byte_count` bytes in this format.
    pub fn duration_secs(&self, byte_count: u64) -> f64 {
        byte_count as f64 / self.bytes_per_second() as f64
    }
}

impl Default for AudioFormatOptions {
    fn default() -> Self {
        Self::new(SampleRate::Khz16, BitsPerSample::Bits16)
    }
}

impl fmt::Display for AudioFormatOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} Hz {}-bit",
            self.encoding,
            self.sample_rate.hz(),
            self.bits_per_sample.bits()
        )
    }
}

/// Why an input session ended, as reported by `input-finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InputResult {
    /// The user or the app ended the stream.
    Success,
    /// The app has no permission to capture.
    Disallowed,
    /// The vehicle refused the stream, e.g. for another priority.
    Rejected,
    /// The user aborted; data from this session should be discarded.
    Aborted,
    /// The user asked the app to start a new input stream.
    Retry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn byte_rate_follows_format() {
        let options = AudioFormatOptions::new(SampleRate::Khz16, BitsPerSample::Bits16);
        assert_eq!(options.bytes_per_second(), 32_000);

        let options = AudioFormatOptions::new(SampleRate::Khz8, BitsPerSample::Bits8);
        assert_eq!(options.bytes_per_second(), 8_000);
    }

    #[test]
    fn duration_from_bytes() {
        let options = AudioFormatOptions::new(SampleRate::Khz22, BitsPerSample::Bits16);
        assert_relative_eq!(options.duration_secs(44_100), 1.0);
        assert_relative_eq!(options.duration_secs(0), 0.0);
    }

    #[test]
    fn rate_and_bits_round_trip_known_values() {
        for rate in [SampleRate::Khz8, SampleRate::Khz16, SampleRate::Khz22, SampleRate::Khz44] {
            assert_eq!(SampleRate::from_hz(rate.hz()), Some(rate));
        }
        assert_eq!(SampleRate::from_hz(48_000), None);
        assert_eq!(BitsPerSample::from_bits(24), None);
    }

    #[test]
    fn serializes_vehicle_names() {
        let json = serde_json::to_value(AudioFormatOptions::default()).unwrap();
        assert_eq!(json["encoding"], "PCM");
        assert_eq!(json["sample_rate"], "16KHZ");
        assert_eq!(json["bits_per_sample"], "16_BIT");
        assert_eq!(serde_json::to_value(InputResult::Retry).unwrap(), "RETRY");
    }
}
