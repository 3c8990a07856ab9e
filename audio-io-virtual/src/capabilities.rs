use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use audio_io_core::{AudioFormatOptions, AudioIoError, BitsPerSample, DeviceCapabilityProvider, SampleRate};

/// Capability provider with a permission toggle and a fixed format list.
pub struct VirtualCapabilities {
    permission: AtomicBool,
    supported: Mutex<Vec<AudioFormatOptions>>,
    negotiations: AtomicUsize,
}

impl VirtualCapabilities {
    /// Permission granted; every vehicle rate at 16-bit.
    pub fn new() -> Self {
        let supported = [SampleRate::Khz16, SampleRate::Khz8, SampleRate::Khz22, SampleRate::Khz44]
            .into_iter()
            .map(|rate| AudioFormatOptions::new(rate, BitsPerSample::Bits16))
            .collect();
        Self::with_supported(supported)
    }

    pub fn with_supported(supported: Vec<AudioFormatOptions>) -> Self {
        Self {
            permission: AtomicBool::new(true),
            supported: Mutex::new(supported),
            negotiations: AtomicUsize::new(0),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    pub fn set_supported(&self, supported: Vec<AudioFormatOptions>) {
        *self.supported.lock() = supported;
    }

    /// How many times a format was negotiated.
    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }
}

impl Default for VirtualCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCapabilityProvider for VirtualCapabilities {
    fn has_microphone_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    /// Exact match, else the same sample rate, else the first supported format.
    fn negotiate_format(&self, requested: &AudioFormatOptions) -> Result<AudioFormatOptions, AudioIoError> {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        let supported = self.supported.lock();

        if supported.contains(requested) {
            return Ok(*requested);
        }
        supported
            .iter()
            .find(|f| f.sample_rate == requested.sample_rate)
            .or_else(|| supported.first())
            .copied()
            .ok_or_else(|| AudioIoError::DeviceUnavailable("no capture formats supported".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let caps = VirtualCapabilities::new();
        let requested = AudioFormatOptions::new(SampleRate::Khz22, BitsPerSample::Bits16);
        assert_eq!(caps.negotiate_format(&requested).unwrap(), requested);
        assert_eq!(caps.negotiations(), 1);
    }

    #[test]
    fn falls_back_to_rate_then_first() {
        let caps = VirtualCapabilities::with_supported(vec![
            AudioFormatOptions::new(SampleRate::Khz16, BitsPerSample::Bits16),
            AudioFormatOptions::new(SampleRate::Khz8, BitsPerSample::Bits16),
        ]);

        let same_rate = caps
            .negotiate_format(&AudioFormatOptions::new(SampleRate::Khz8, BitsPerSample::Bits8))
            .unwrap();
        assert_eq!(same_rate, AudioFormatOptions::new(SampleRate::Khz8, BitsPerSample::Bits16));

        let first = caps
            .negotiate_format(&AudioFormatOptions::new(SampleRate::Khz44, BitsPerSample::Bits8))
            .unwrap();
        assert_eq!(first, AudioFormatOptions::new(SampleRate::Khz16, BitsPerSample::Bits16));
    }

    #[test]
    fn empty_list_is_unavailable() {
        let caps = VirtualCapabilities::with_supported(Vec::new());
        let err = caps.negotiate_format(&AudioFormatOptions::default()).unwrap_err();
        assert!(matches!(err, AudioIoError::DeviceUnavailable(_)));
    }

    #[test]
    fn permission_toggle() {
        let caps = VirtualCapabilities::new();
        assert!(caps.has_microphone_permission());
        caps.set_permission(false);
        assert!(!caps.has_microphone_permission());
    }
}
