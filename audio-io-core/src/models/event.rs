use std::path::PathBuf;

use serde::Serialize;

use super::audio_format::{AudioFormatOptions, InputResult};
use super::error::AudioIoError;

/// Notification delivered to the registered [`AudioObserver`].
///
/// Each logical event is delivered at most once, in the order the manager
/// produced it.
///
/// [`AudioObserver`]: crate::traits::audio_observer::AudioObserver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AudioEvent {
    /// The output queue went from empty to playing.
    OutputStarted,
    /// The output queue drained.
    OutputStopped,
    OutputItemFinished { source: PathBuf },
    OutputItemError { source: PathBuf, error: AudioIoError },
    /// The capture device is open; carries the negotiated format.
    InputStarted { options: AudioFormatOptions },
    InputData { chunk: Vec<u8> },
    InputFinished { result: InputResult },
}

impl AudioEvent {
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            Self::OutputStarted
                | Self::OutputStopped
                | Self::OutputItemFinished { .. }
                | Self::OutputItemError { .. }
        )
    }

    pub fn is_input(&self) -> bool {
        !self.is_output()
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OutputStarted => "output-started",
            Self::OutputStopped => "output-stopped",
            Self::OutputItemFinished { .. } => "output-item-finished",
            Self::OutputItemError { .. } => "output-item-error",
            Self::InputStarted { .. } => "input-started",
            Self::InputData { .. } => "input-data",
            Self::InputFinished { .. } => "input-finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let event = AudioEvent::OutputItemError {
            source: PathBuf::from("a.wav"),
            error: AudioIoError::Decode("truncated".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "output-item-error");
        assert_eq!(json["source"], "a.wav");
        assert_eq!(json["error"]["kind"], "decode");

        let json = serde_json::to_value(AudioEvent::InputFinished {
            result: InputResult::Disallowed,
        })
        .unwrap();
        assert_eq!(json["event"], "input-finished");
        assert_eq!(json["result"], "DISALLOWED");
    }

    #[test]
    fn names_match_serialized_tags() {
        let events = [
            AudioEvent::OutputStarted,
            AudioEvent::OutputStopped,
            AudioEvent::InputStarted { options: AudioFormatOptions::default() },
            AudioEvent::InputData { chunk: vec![1, 2] },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[test]
    fn output_and_input_partition() {
        assert!(AudioEvent::OutputStopped.is_output());
        assert!(AudioEvent::InputData { chunk: Vec::new() }.is_input());
    }
}
