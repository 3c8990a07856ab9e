use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crate::models::error::AudioIoError;
use crate::models::state::PlaybackStatus;
use crate::session::device_ops;
use crate::session::manager::{AudioBackend, DeviceClaim, OpenDirection, Shared};
use crate::traits::file_decoder::DecodedAudio;
use crate::traits::session_provider::OutputEndpoint;

/// One `write_output` call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaybackRequest {
    pub(crate) id: Uuid,
    pub(crate) source: PathBuf,
    pub(crate) status: PlaybackStatus,
}

impl PlaybackRequest {
    pub(crate) fn new(source: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            status: PlaybackStatus::Queued,
        }
    }
}

/// FIFO of playback requests plus the one currently playing.
#[derive(Debug, Default)]
pub(crate) struct OutputQueue {
    queued: VecDeque<PlaybackRequest>,
    current: Option<PlaybackRequest>,
}

impl OutputQueue {
    pub(crate) fn enqueue(&mut self, request: PlaybackRequest) {
        self.queued.push_back(request);
    }

    /// Move the head of the queue to "playing" and return a copy of it.
    pub(crate) fn start_next(&mut self) -> Option<PlaybackRequest> {
        let mut request = self.queued.pop_front()?;
        request.status = PlaybackStatus::Playing;
        self.current = Some(request.clone());
        Some(request)
    }

    /// Retire the playing request.
    pub(crate) fn finish_current(&mut self, succeeded: bool) -> Option<PlaybackRequest> {
        let mut request = self.current.take()?;
        request.status = if succeeded {
            PlaybackStatus::Finished
        } else {
            PlaybackStatus::Failed
        };
        Some(request)
    }

    /// Remove every request that has not started yet.
    pub(crate) fn drain_queued(&mut self) -> Vec<PlaybackRequest> {
        self.queued
            .drain(..)
            .map(|mut request| {
                request.status = PlaybackStatus::Failed;
                request
            })
            .collect()
    }

    pub(crate) fn current(&self) -> Option<&PlaybackRequest> {
        self.current.as_ref()
    }

    pub(crate) fn pending_sources(&self) -> Vec<PathBuf> {
        self.queued.iter().map(|r| r.source.clone()).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.current.is_none()
    }
}

/// Start the playback worker for a freshly granted output run.
pub(crate) fn spawn_output_run(shared: &Arc<Shared>) -> Result<(), AudioIoError> {
    let worker = Arc::clone(shared);
    thread::Builder::new()
        .name("audio-io-output".into())
        .spawn(move || run_output(worker))
        .map(|_| ())
        .map_err(|e| AudioIoError::Io(format!("failed to spawn output thread: {}", e)))
}

/// Play queued requests until the queue is empty, then hand the channel back.
fn run_output(shared: Arc<Shared>) {
    loop {
        let (request, open_timeout, claim) = {
            let mut state = shared.state.lock();
            // Capture opens, and playback opens abandoned after a timeout, may
            // still be holding the device.
            shared.wait_for_device(&mut state, |s| s.capture_opens > 0 || s.playback_opens > 0);
            match state.output.start_next() {
                Some(request) => {
                    let claim = shared.claim_device(&mut state, OpenDirection::Playback);
                    (request, state.config.device_open_timeout, claim)
                }
                None => {
                    let pending = shared.finish_output_run(&mut state);
                    drop(state);
                    if let Some((plan, claim)) = pending {
                        crate::session::input_capturer::spawn_open(&shared, plan, claim);
                    }
                    return;
                }
            }
        };

        log::info!("playing {} ({})", request.source.display(), request.id);
        let outcome = play_item(&shared.backend, &request.source, open_timeout, &claim);
        drop(claim);

        let mut state = shared.state.lock();
        shared.complete_output(&mut state, outcome);
    }
}

/// Decode `source` and write it to a freshly opened playback endpoint.
///
/// A playback endpoint that opens after `open_timeout` keeps `claim` alive
/// until it has been closed.
pub(crate) fn play_item(
    backend: &AudioBackend,
    source: &Path,
    open_timeout: Duration,
    claim: &Arc<DeviceClaim>,
) -> Result<(), AudioIoError> {
    let mut decoded = backend.decoder.open(source)?;
    let format = decoded.format();

    let session = Arc::clone(&backend.session);
    let mut endpoint = device_ops::run_bounded(
        "output-open",
        open_timeout,
        move || session.open_output(&format),
        {
            let late_claim = Arc::clone(claim);
            move |late| {
                if let Err(e) = device_ops::close_output(late) {
                    log::warn!("failed to close late playback endpoint: {}", e);
                }
                drop(late_claim);
            }
        },
    )?;

    let written = write_all(decoded.as_mut(), endpoint.as_mut());
    let closed = device_ops::close_output(endpoint);
    written.and(closed)
}

fn write_all(decoded: &mut dyn DecodedAudio, endpoint: &mut dyn OutputEndpoint) -> Result<(), AudioIoError> {
    while let Some(buffer) = decoded.next_buffer()? {
        endpoint.write(&buffer)?;
    }
    Ok(())
}
