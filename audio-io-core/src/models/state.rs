use serde::Serialize;

use super::audio_format::InputResult;

/// Which stream currently holds the physical audio channel.
///
/// ```text
///            write_output                start_input
///   None ───────────────→ OutputActive ─────────────→ OutputActiveInputPaused
///    │ ↑                     │    ↑                        │
///    │ └──── queue drained ──┘    └────── stop_input ──────┘
///    │                                                     │ queue drained
///    └── start_input ──→ InputActive ←─────────────────────┘
///                          │    ↑
///         write_output ────┘    └ (back to OutputActiveInputPaused)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    None,
    OutputActive,
    InputActive,
    OutputActiveInputPaused,
}

impl ChannelState {
    pub fn output_holds_channel(self) -> bool {
        matches!(self, Self::OutputActive | Self::OutputActiveInputPaused)
    }

    pub fn input_holds_channel(self) -> bool {
        matches!(self, Self::InputActive)
    }
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → starting → active ⇄ paused
///           ↓          ↓        ↓
///           └───────→ ended ←───┘
/// ```
/// `Idle` is a session accepted while output holds the channel; it starts
/// once the output queue drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Starting,
    Active,
    Paused,
    Ended(InputResult),
}

impl CaptureState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended(_))
    }

    /// Waiting for the channel: never opened yet, or preempted by output.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Idle | Self::Paused)
    }
}

/// Lifecycle of a queued playback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Queued,
    Playing,
    Finished,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ownership() {
        assert!(!ChannelState::None.output_holds_channel());
        assert!(!ChannelState::None.input_holds_channel());
        assert!(ChannelState::OutputActive.output_holds_channel());
        assert!(ChannelState::OutputActiveInputPaused.output_holds_channel());
        assert!(!ChannelState::OutputActiveInputPaused.input_holds_channel());
        assert!(ChannelState::InputActive.input_holds_channel());
    }

    #[test]
    fn capture_state_predicates() {
        assert!(CaptureState::Idle.is_waiting());
        assert!(CaptureState::Paused.is_waiting());
        assert!(!CaptureState::Starting.is_waiting());
        assert!(CaptureState::Active.is_active());
        assert!(CaptureState::Ended(InputResult::Aborted).is_terminal());
        assert!(!CaptureState::Paused.is_terminal());
    }
}
