use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::audio_format::{AudioFormatOptions, InputResult};
use crate::models::config::AudioIoConfiguration;
use crate::models::error::AudioIoError;
use crate::models::event::AudioEvent;
use crate::models::state::{CaptureState, ChannelState};
use crate::session::device_ops;
use crate::session::dispatcher::EventDispatcher;
use crate::session::input_capturer::{self, CaptureSession, OpenPlan};
use crate::session::output_player::{self, OutputQueue, PlaybackRequest};
use crate::traits::audio_observer::AudioObserver;
use crate::traits::capability_provider::DeviceCapabilityProvider;
use crate::traits::file_decoder::AudioFileDecoder;
use crate::traits::session_provider::{AudioSessionProvider, InputEndpoint};

/// Platform collaborators the manager drives.
#[derive(Clone)]
pub struct AudioBackend {
    pub capabilities: Arc<dyn DeviceCapabilityProvider>,
    pub decoder: Arc<dyn AudioFileDecoder>,
    pub session: Arc<dyn AudioSessionProvider>,
}

/// Counters for debugging channel arbitration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerDiagnostics {
    pub items_finished: u64,
    pub items_failed: u64,
    pub sessions_started: u64,
    pub sessions_ended: u64,
    pub preemptions: u64,
    pub chunks_delivered: u64,
    pub chunks_discarded: u64,
}

/// Arbiter state, only touched under `Shared::state`.
pub(crate) struct ArbiterState {
    pub(crate) channel: ChannelState,
    pub(crate) output: OutputQueue,
    pub(crate) input: Option<CaptureSession>,
    /// Capture opens not yet settled, including abandoned ones still running.
    pub(crate) capture_opens: usize,
    /// Playback items holding a claim, including abandoned opens still running.
    pub(crate) playback_opens: usize,
    pub(crate) config: AudioIoConfiguration,
    pub(crate) diagnostics: ManagerDiagnostics,
    pub(crate) shut_down: bool,
}

impl ArbiterState {
    /// The channel state agrees with who actually holds the device.
    fn channel_consistent(&self) -> bool {
        let session = self.input.as_ref().map(|s| s.state);
        match self.channel {
            ChannelState::None | ChannelState::OutputActive => session.is_none(),
            ChannelState::OutputActiveInputPaused => session.is_some_and(|s| s.is_waiting()),
            ChannelState::InputActive => {
                session.is_some_and(|s| matches!(s, CaptureState::Starting | CaptureState::Active))
            }
        }
    }

    fn opens_mut(&mut self, direction: OpenDirection) -> &mut usize {
        match direction {
            OpenDirection::Capture => &mut self.capture_opens,
            OpenDirection::Playback => &mut self.playback_opens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenDirection {
    Playback,
    Capture,
}

/// One counted device open in `direction`.
///
/// Shared between the caller and a bounded open's late handler; the count
/// drops when the last holder lets go, i.e. once every endpoint the open
/// produced has been attached or closed. Never drop it under the state lock.
pub(crate) struct DeviceClaim {
    shared: Arc<Shared>,
    direction: OpenDirection,
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        let opens = state.opens_mut(self.direction);
        *opens = opens.saturating_sub(1);
        self.shared.device_released.notify_all();
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<ArbiterState>,
    /// Signalled whenever a `DeviceClaim` is released.
    pub(crate) device_released: Condvar,
    pub(crate) backend: AudioBackend,
    pub(crate) events: EventDispatcher,
}

impl Shared {
    fn transition(&self, state: &mut ArbiterState, to: ChannelState) {
        if state.channel != to {
            log::debug!("channel {:?} -> {:?}", state.channel, to);
            state.channel = to;
        }
        debug_assert!(
            state.channel_consistent(),
            "channel {:?} with capture {:?}",
            state.channel,
            state.input.as_ref().map(|s| s.state)
        );
    }

    pub(crate) fn claim_device(self: &Arc<Self>, state: &mut ArbiterState, direction: OpenDirection) -> Arc<DeviceClaim> {
        *state.opens_mut(direction) += 1;
        Arc::new(DeviceClaim {
            shared: Arc::clone(self),
            direction,
        })
    }

    /// Block until `busy` no longer holds.
    pub(crate) fn wait_for_device(&self, state: &mut MutexGuard<'_, ArbiterState>, busy: impl Fn(&ArbiterState) -> bool) {
        while busy(&**state) {
            self.device_released.wait(state);
        }
    }

    /// Mark the session Starting and claim the device for the open about to run.
    fn plan_open(self: &Arc<Self>, state: &mut ArbiterState) -> Option<(OpenPlan, Arc<DeviceClaim>)> {
        let session = state.input.as_mut()?;
        let plan = session.begin_open(&state.config);
        let claim = self.claim_device(state, OpenDirection::Capture);
        Some((plan, claim))
    }

    /// End the current session, notify, and give the channel back.
    ///
    /// The returned endpoint must be closed once the lock is released.
    pub(crate) fn end_session(&self, state: &mut ArbiterState, result: InputResult) -> Option<Box<dyn InputEndpoint>> {
        let mut session = state.input.take()?;
        let endpoint = session.end(result);
        state.diagnostics.sessions_ended += 1;
        log::info!("input session {} ended: {:?}", session.id, result);
        self.events.send(AudioEvent::InputFinished { result });

        let next = match state.channel {
            ChannelState::OutputActiveInputPaused => ChannelState::OutputActive,
            ChannelState::InputActive => ChannelState::None,
            other => other,
        };
        self.transition(state, next);
        endpoint
    }

    /// Report the outcome of the playing request.
    pub(crate) fn complete_output(&self, state: &mut ArbiterState, outcome: Result<(), AudioIoError>) {
        let Some(request) = state.output.finish_current(outcome.is_ok()) else {
            log::error!("output completion without a playing request");
            return;
        };
        match outcome {
            Ok(()) => {
                state.diagnostics.items_finished += 1;
                log::info!("{:?} {} ({})", request.status, request.source.display(), request.id);
                self.events.send(AudioEvent::OutputItemFinished { source: request.source });
            }
            Err(error) => {
                state.diagnostics.items_failed += 1;
                log::warn!("{:?} {} ({}): {}", request.status, request.source.display(), request.id, error);
                self.events.send(AudioEvent::OutputItemError {
                    source: request.source,
                    error,
                });
            }
        }
    }

    /// The queue drained: stop the output stream and let waiting input resume.
    pub(crate) fn finish_output_run(self: &Arc<Self>, state: &mut ArbiterState) -> Option<(OpenPlan, Arc<DeviceClaim>)> {
        debug_assert!(state.output.is_empty());
        self.events.send(AudioEvent::OutputStopped);

        let waiting = state.input.as_ref().map(|s| s.state.is_waiting());
        match waiting {
            None => {
                self.transition(state, ChannelState::None);
                None
            }
            Some(waiting) => {
                let plan = if waiting { self.plan_open(state) } else { None };
                self.transition(state, ChannelState::InputActive);
                plan
            }
        }
    }

    /// Fail every queued request when no playback worker could be started.
    fn abandon_output_run(self: &Arc<Self>, error: AudioIoError) {
        let mut state = self.state.lock();
        while state.output.start_next().is_some() {
            self.complete_output(&mut state, Err(error.clone()));
        }
        let pending = self.finish_output_run(&mut state);
        drop(state);

        if let Some((plan, claim)) = pending {
            input_capturer::spawn_open(self, plan, claim);
        }
    }

    /// Settle a capture open started by `plan_open`. The caller still holds
    /// the open's claim and releases it after this returns.
    pub(crate) fn on_input_opened(
        &self,
        session_id: Uuid,
        outcome: Result<(AudioFormatOptions, Box<dyn InputEndpoint>), AudioIoError>,
    ) {
        let mut state = self.state.lock();
        let to_close = match outcome {
            Ok((options, endpoint)) => self.attach_endpoint(&mut state, session_id, options, endpoint),
            Err(error) => {
                if state.input.as_ref().is_some_and(|s| s.id == session_id) {
                    log::warn!("failed to open capture endpoint: {}", error);
                    let result = match error {
                        AudioIoError::PermissionDenied => InputResult::Disallowed,
                        _ => InputResult::Rejected,
                    };
                    self.end_session(&mut state, result)
                } else {
                    log::debug!("capture open for stale session failed: {}", error);
                    None
                }
            }
        };
        drop(state);

        if let Some(endpoint) = to_close {
            device_ops::close_input(endpoint);
        }
    }

    fn attach_endpoint(
        &self,
        state: &mut ArbiterState,
        session_id: Uuid,
        options: AudioFormatOptions,
        endpoint: Box<dyn InputEndpoint>,
    ) -> Option<Box<dyn InputEndpoint>> {
        let Some(session) = state.input.as_mut().filter(|s| s.id == session_id) else {
            log::debug!("capture session {} ended while opening", session_id);
            return Some(endpoint);
        };
        if session.state != CaptureState::Starting {
            // Preempted by output while opening; resume reopens with `options`.
            session.negotiated = Some(options);
            return Some(endpoint);
        }

        let first = session.activate(options, endpoint);
        log::info!("input session {} active ({})", session_id, options);
        if first {
            state.diagnostics.sessions_started += 1;
            self.events.send(AudioEvent::InputStarted { options });
        }
        None
    }
}

/// Arbitrates one physical audio channel between queued file playback and
/// microphone capture.
///
/// Output always wins: writing output while capturing pauses the capture
/// session, which resumes on its own once the output queue drains. All
/// notifications reach the observer through one ordered event thread.
///
/// ```ignore
/// let manager = AudioIoManager::with_observer(AudioIoConfiguration::default(), backend, &observer)?;
/// manager.start_input()?;
/// manager.write_output("/media/prompt.wav");
/// ```
pub struct AudioIoManager {
    shared: Arc<Shared>,
}

impl AudioIoManager {
    pub fn new(config: AudioIoConfiguration, backend: AudioBackend) -> Result<Self, AudioIoError> {
        config.validate().map_err(AudioIoError::ConfigurationFailed)?;

        let state = ArbiterState {
            channel: ChannelState::None,
            output: OutputQueue::default(),
            input: None,
            capture_opens: 0,
            playback_opens: 0,
            config,
            diagnostics: ManagerDiagnostics::default(),
            shut_down: false,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                device_released: Condvar::new(),
                backend,
                events: EventDispatcher::spawn()?,
            }),
        })
    }

    pub fn with_observer<O: AudioObserver + 'static>(
        config: AudioIoConfiguration,
        backend: AudioBackend,
        observer: &Arc<O>,
    ) -> Result<Self, AudioIoError> {
        let manager = Self::new(config, backend)?;
        manager.set_observer(observer);
        Ok(manager)
    }

    /// Register the observer. Only a weak reference is kept.
    pub fn set_observer<O: AudioObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn AudioObserver> = Arc::downgrade(observer) as Weak<dyn AudioObserver>;
        self.shared.events.set_observer(Some(weak));
    }

    pub fn clear_observer(&self) {
        self.shared.events.set_observer(None);
    }

    pub fn has_observer(&self) -> bool {
        self.shared.events.has_observer()
    }

    /// Queue `source` for playback; returns the request id.
    ///
    /// Never fails here: every request later yields exactly one
    /// `output-item-finished` or `output-item-error`.
    pub fn write_output(&self, source: impl Into<PathBuf>) -> Uuid {
        let request = PlaybackRequest::new(source.into());
        let id = request.id;

        let mut state = self.shared.state.lock();
        if state.shut_down {
            state.diagnostics.items_failed += 1;
            self.shared.events.send(AudioEvent::OutputItemError {
                source: request.source,
                error: shut_down_error(),
            });
            return id;
        }

        log::debug!("queued {} ({})", request.source.display(), id);
        state.output.enqueue(request);

        let mut paused = None;
        let start_run = match state.channel {
            ChannelState::None => {
                self.shared.transition(&mut state, ChannelState::OutputActive);
                true
            }
            ChannelState::InputActive => {
                if let Some(session) = state.input.as_mut() {
                    log::info!("pausing input session {} for output", session.id);
                    paused = session.pause();
                }
                state.diagnostics.preemptions += 1;
                self.shared.transition(&mut state, ChannelState::OutputActiveInputPaused);
                true
            }
            ChannelState::OutputActive | ChannelState::OutputActiveInputPaused => false,
        };
        if start_run {
            self.shared.events.send(AudioEvent::OutputStarted);
        }
        drop(state);

        // Release the microphone before the output worker can open playback.
        if let Some(endpoint) = paused {
            device_ops::close_input(endpoint);
        }
        if start_run {
            if let Err(e) = output_player::spawn_output_run(&self.shared) {
                log::error!("{}", e);
                self.shared.abandon_output_run(e);
            }
        }
        id
    }

    /// Start a capture session, or join the one already running.
    ///
    /// Without microphone permission this fails with `PermissionDenied` and
    /// the observer receives `input-finished(DISALLOWED)`. While output plays
    /// the session is accepted but only opens once the queue drains.
    pub fn start_input(&self) -> Result<(), AudioIoError> {
        if self.shared.state.lock().input.is_some() {
            return Ok(());
        }
        let permitted = self.shared.backend.capabilities.has_microphone_permission();

        let mut state = self.shared.state.lock();
        if state.shut_down {
            self.shared.events.send(AudioEvent::InputFinished {
                result: InputResult::Rejected,
            });
            return Err(shut_down_error());
        }
        if state.input.is_some() {
            return Ok(());
        }
        if !permitted {
            log::warn!("microphone permission denied");
            self.shared.events.send(AudioEvent::InputFinished {
                result: InputResult::Disallowed,
            });
            return Err(AudioIoError::PermissionDenied);
        }

        let session = CaptureSession::new(state.config.input_format);
        log::info!("input session {} requested", session.id);
        state.input = Some(session);

        let pending = match state.channel {
            ChannelState::OutputActive | ChannelState::OutputActiveInputPaused => {
                self.shared.transition(&mut state, ChannelState::OutputActiveInputPaused);
                None
            }
            ChannelState::None | ChannelState::InputActive => {
                let pending = self.shared.plan_open(&mut state);
                self.shared.transition(&mut state, ChannelState::InputActive);
                pending
            }
        };
        drop(state);

        if let Some((plan, claim)) = pending {
            input_capturer::spawn_open(&self.shared, plan, claim);
        }
        Ok(())
    }

    /// End the capture session with `SUCCESS`. A no-op without a session.
    pub fn stop_input(&self) {
        let mut state = self.shared.state.lock();
        if state.input.is_none() {
            log::debug!("stop_input without a session");
            return;
        }
        let endpoint = self.shared.end_session(&mut state, InputResult::Success);
        drop(state);

        if let Some(endpoint) = endpoint {
            device_ops::close_input(endpoint);
        }
    }

    /// Fail queued playback, abort capture, and refuse further requests.
    ///
    /// The item currently playing still completes. Called on drop.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        log::info!("shutting down audio manager");

        for request in state.output.drain_queued() {
            state.diagnostics.items_failed += 1;
            self.shared.events.send(AudioEvent::OutputItemError {
                source: request.source,
                error: shut_down_error(),
            });
        }
        let endpoint = self.shared.end_session(&mut state, InputResult::Aborted);
        drop(state);

        if let Some(endpoint) = endpoint {
            device_ops::close_input(endpoint);
        }
    }

    pub fn is_output_playing(&self) -> bool {
        self.shared.state.lock().channel.output_holds_channel()
    }

    /// Whether captured audio is currently flowing to the observer.
    pub fn is_input_playing(&self) -> bool {
        let state = self.shared.state.lock();
        state.channel.input_holds_channel() && state.input.as_ref().is_some_and(|s| s.state.is_active())
    }

    pub fn channel_state(&self) -> ChannelState {
        self.shared.state.lock().channel
    }

    /// Sources queued behind the one playing, in play order.
    pub fn pending_outputs(&self) -> Vec<PathBuf> {
        self.shared.state.lock().output.pending_sources()
    }

    pub fn current_output(&self) -> Option<PathBuf> {
        self.shared.state.lock().output.current().map(|r| r.source.clone())
    }

    pub fn input_state(&self) -> Option<CaptureState> {
        self.shared.state.lock().input.as_ref().map(|s| s.state)
    }

    /// Format negotiated for the current session, once it has been opened.
    pub fn input_format(&self) -> Option<AudioFormatOptions> {
        self.shared.state.lock().input.as_ref().and_then(|s| s.negotiated)
    }

    /// Prompt played by the vehicle on the next capture open.
    pub fn set_input_prompt(&self, prompt: Option<String>) {
        self.shared.state.lock().config.input_prompt = prompt;
    }

    /// Text displayed by the vehicle on the next capture open.
    pub fn set_input_text(&self, text: Option<String>) {
        self.shared.state.lock().config.input_text = text;
    }

    pub fn diagnostics(&self) -> ManagerDiagnostics {
        self.shared.state.lock().diagnostics.clone()
    }
}

impl Drop for AudioIoManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn shut_down_error() -> AudioIoError {
    AudioIoError::DeviceUnavailable("audio manager shut down".into())
}
