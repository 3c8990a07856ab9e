use std::time::Duration;

use super::audio_format::AudioFormatOptions;

/// Configuration for an [`AudioIoManager`](crate::AudioIoManager).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioIoConfiguration {
    /// Format requested from the capture device (default: PCM 16 kHz 16-bit).
    /// The capability provider may negotiate a different one.
    pub input_format: AudioFormatOptions,

    /// Upper bound on a single device open (default: 5 s). Expiry is
    /// reported as `DeviceUnavailable`.
    pub device_open_timeout: Duration,

    /// Spoken prompt the vehicle plays when capture starts.
    pub input_prompt: Option<String>,

    /// Text the vehicle displays while capturing.
    pub input_text: Option<String>,
}

impl AudioIoConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.device_open_timeout.is_zero() {
            return Err("device open timeout must be positive".into());
        }
        if self.input_prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err("input prompt must not be blank".into());
        }
        if self.input_text.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err("input text must not be blank".into());
        }
        Ok(())
    }
}

impl Default for AudioIoConfiguration {
    fn default() -> Self {
        Self {
            input_format: AudioFormatOptions::default(),
            device_open_timeout: Duration::from_secs(5),
            input_prompt: None,
            input_text: None,
        }
    }
}
