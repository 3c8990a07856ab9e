use crate::models::audio_format::AudioFormatOptions;
use crate::models::error::AudioIoError;

/// Microphone authorization and capture-format negotiation.
///
/// Backed by the application/SDK layer that talks to the vehicle.
pub trait DeviceCapabilityProvider: Send + Sync {
    /// Whether the app may currently use the vehicle microphone.
    fn has_microphone_permission(&self) -> bool;

    /// Pick the capture format closest to `requested` that the device supports.
    ///
    /// May block; called off the manager's decision path.
    fn negotiate_format(&self, requested: &AudioFormatOptions) -> Result<AudioFormatOptions, AudioIoError>;
}
