use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crate::models::audio_format::{AudioFormatOptions, InputResult};
use crate::models::config::AudioIoConfiguration;
use crate::models::error::AudioIoError;
use crate::models::event::AudioEvent;
use crate::models::state::{CaptureState, ChannelState};
use crate::session::device_ops;
use crate::session::manager::{DeviceClaim, Shared};
use crate::traits::session_provider::{CaptureSink, InputEndpoint, InputRequest};

/// One input stream lifetime, from `start_input` to `input-finished`.
pub(crate) struct CaptureSession {
    pub(crate) id: Uuid,
    pub(crate) state: CaptureState,
    pub(crate) requested: AudioFormatOptions,
    /// Set by the first successful open; reused on resume.
    pub(crate) negotiated: Option<AudioFormatOptions>,
    /// Whether `input-started` has been emitted for this session.
    pub(crate) announced: bool,
    endpoint: Option<Box<dyn InputEndpoint>>,
}

/// Everything the open worker needs, captured under the state lock.
#[derive(Debug, Clone)]
pub(crate) struct OpenPlan {
    pub(crate) session_id: Uuid,
    pub(crate) request: InputRequest,
    pub(crate) negotiate: bool,
    pub(crate) timeout: Duration,
}

impl CaptureSession {
    pub(crate) fn new(requested: AudioFormatOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: CaptureState::Idle,
            requested,
            negotiated: None,
            announced: false,
            endpoint: None,
        }
    }

    /// Idle/Paused → Starting. Resuming reuses the negotiated format.
    pub(crate) fn begin_open(&mut self, config: &AudioIoConfiguration) -> OpenPlan {
        self.state = CaptureState::Starting;
        OpenPlan {
            session_id: self.id,
            request: InputRequest {
                options: self.negotiated.unwrap_or(self.requested),
                prompt: config.input_prompt.clone(),
                text: config.input_text.clone(),
            },
            negotiate: self.negotiated.is_none(),
            timeout: config.device_open_timeout,
        }
    }

    /// Starting → Active. Returns true on the session's first activation.
    pub(crate) fn activate(&mut self, options: AudioFormatOptions, endpoint: Box<dyn InputEndpoint>) -> bool {
        self.negotiated = Some(options);
        self.state = CaptureState::Active;
        self.endpoint = Some(endpoint);
        !std::mem::replace(&mut self.announced, true)
    }

    /// Yield the channel to output. Keeps the negotiated format; the caller
    /// closes the returned endpoint outside the state lock.
    pub(crate) fn pause(&mut self) -> Option<Box<dyn InputEndpoint>> {
        match self.state {
            CaptureState::Active | CaptureState::Starting => {
                self.state = CaptureState::Paused;
                self.endpoint.take()
            }
            _ => None,
        }
    }

    /// Terminal transition; returns the endpoint still to be closed.
    pub(crate) fn end(&mut self, result: InputResult) -> Option<Box<dyn InputEndpoint>> {
        self.state = CaptureState::Ended(result);
        self.endpoint.take()
    }
}

/// Negotiate (first open only) and open the capture endpoint off the
/// decision path, then report back to the arbiter.
///
/// The open waits for playback claims, including abandoned playback opens
/// still running, to be released first.
pub(crate) fn spawn_open(shared: &Arc<Shared>, plan: OpenPlan, claim: Arc<DeviceClaim>) {
    let worker = Arc::clone(shared);
    let session_id = plan.session_id;
    let spawned = thread::Builder::new()
        .name("audio-io-input-open".into())
        .spawn(move || {
            {
                let mut state = worker.state.lock();
                worker.wait_for_device(&mut state, |s| s.playback_opens > 0);
            }
            let outcome = open_capture(&worker, plan, &claim);
            worker.on_input_opened(session_id, outcome);
            drop(claim);
        });

    if let Err(e) = spawned {
        log::error!("failed to spawn capture open thread: {}", e);
        shared.on_input_opened(
            session_id,
            Err(AudioIoError::Io(format!("failed to spawn capture open thread: {}", e))),
        );
    }
}

fn open_capture(
    shared: &Arc<Shared>,
    plan: OpenPlan,
    claim: &Arc<DeviceClaim>,
) -> Result<(AudioFormatOptions, Box<dyn InputEndpoint>), AudioIoError> {
    let capabilities = Arc::clone(&shared.backend.capabilities);
    let session = Arc::clone(&shared.backend.session);
    let sink: Arc<dyn CaptureSink> = Arc::new(SessionSink {
        shared: Arc::downgrade(shared),
        session_id: plan.session_id,
    });

    let OpenPlan {
        mut request,
        negotiate,
        timeout,
        ..
    } = plan;
    log::debug!("opening capture endpoint ({})", request.options);
    let late_claim = Arc::clone(claim);

    device_ops::run_bounded(
        "input-open",
        timeout,
        move || {
            if negotiate {
                request.options = capabilities.negotiate_format(&request.options)?;
            }
            let endpoint = session.open_input(&request, sink)?;
            Ok((request.options, endpoint))
        },
        move |(_, late)| {
            device_ops::close_input(late);
            drop(late_claim);
        },
    )
}

/// Routes endpoint callbacks for one session back into the arbiter.
///
/// Holds the arbiter weakly: an endpoint outliving its manager delivers
/// nothing.
struct SessionSink {
    shared: Weak<Shared>,
    session_id: Uuid,
}

impl CaptureSink for SessionSink {
    fn on_chunk(&self, chunk: &[u8]) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut state = shared.state.lock();
        let live = state.channel == ChannelState::InputActive
            && state
                .input
                .as_ref()
                .is_some_and(|s| s.id == self.session_id && s.state.is_active());

        if live {
            state.diagnostics.chunks_delivered += 1;
            shared.events.send(AudioEvent::InputData { chunk: chunk.to_vec() });
        } else {
            // Paused or ended: live audio is not buffered for later.
            state.diagnostics.chunks_discarded += 1;
        }
    }

    fn on_finished(&self, result: InputResult) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut state = shared.state.lock();
        if !state.input.as_ref().is_some_and(|s| s.id == self.session_id) {
            return;
        }
        log::info!("capture endpoint ended the session: {:?}", result);
        let endpoint = shared.end_session(&mut state, result);
        drop(state);

        if let Some(endpoint) = endpoint {
            device_ops::close_input_detached(endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_format::{BitsPerSample, SampleRate};

    struct NullEndpoint;

    impl InputEndpoint for NullEndpoint {
        fn close(&mut self) -> Result<(), AudioIoError> {
            Ok(())
        }
    }

    #[test]
    fn first_open_negotiates_resume_does_not() {
        let config = AudioIoConfiguration::default();
        let mut session = CaptureSession::new(config.input_format);

        let plan = session.begin_open(&config);
        assert!(plan.negotiate);
        assert_eq!(session.state, CaptureState::Starting);

        let negotiated = AudioFormatOptions::new(SampleRate::Khz8, BitsPerSample::Bits8);
        assert!(session.activate(negotiated, Box::new(NullEndpoint)));
        assert!(session.pause().is_some());
        assert_eq!(session.state, CaptureState::Paused);

        let resumed = session.begin_open(&config);
        assert!(!resumed.negotiate);
        assert_eq!(resumed.request.options, negotiated);
        assert!(!session.activate(negotiated, Box::new(NullEndpoint)));
    }

    #[test]
    fn pause_while_starting_has_no_endpoint() {
        let config = AudioIoConfiguration {
            input_text: Some("Listening".into()),
            ..Default::default()
        };
        let mut session = CaptureSession::new(config.input_format);
        let plan = session.begin_open(&config);
        assert_eq!(plan.request.text.as_deref(), Some("Listening"));

        assert!(session.pause().is_none());
        assert!(session.state.is_paused());
        assert!(session.pause().is_none());
    }

    #[test]
    fn end_is_terminal() {
        let mut session = CaptureSession::new(AudioFormatOptions::default());
        session.begin_open(&AudioIoConfiguration::default());
        session.activate(AudioFormatOptions::default(), Box::new(NullEndpoint));

        assert!(session.end(InputResult::Retry).is_some());
        assert_eq!(session.state, CaptureState::Ended(InputResult::Retry));
        assert!(session.end(InputResult::Success).is_none());
    }
}
