use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use audio_io_core::{
    AudioFormatOptions, AudioIoError, AudioSessionProvider, CaptureSink, InputEndpoint, InputRequest, InputResult,
    OutputEndpoint,
};

/// How a virtual capture endpoint produces audio.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureScript {
    /// Bytes per chunk; at least 8 so each chunk carries its sequence number.
    pub chunk_bytes: usize,
    /// Delay between chunks.
    pub interval: Duration,
    /// End the stream from the vehicle side after this many chunks.
    pub finish_after: Option<(u64, InputResult)>,
}

impl Default for CaptureScript {
    fn default() -> Self {
        Self {
            chunk_bytes: 320,
            interval: Duration::from_millis(5),
            finish_after: None,
        }
    }
}

/// Sequence number stamped into the first 8 bytes of a virtual chunk.
pub fn chunk_sequence(chunk: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = chunk.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// A playback endpoint that was opened, written and closed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayedOutput {
    pub format: AudioFormatOptions,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default)]
struct Faults {
    output_unavailable: bool,
    input_unavailable: bool,
    input_permission_revoked: bool,
    output_open_delay: Duration,
    input_open_delay: Duration,
    write_delay: Duration,
}

/// Counters shared with every endpoint the session hands out.
#[derive(Default)]
struct Ledger {
    open_outputs: AtomicUsize,
    open_inputs: AtomicUsize,
    overlaps: AtomicUsize,
    chunks_emitted: AtomicU64,
    played: Mutex<Vec<PlayedOutput>>,
}

/// In-memory audio session on one virtual channel.
///
/// Playback endpoints swallow PCM (optionally pacing each write); capture
/// endpoints stream [`CaptureScript`] chunks from their own thread. Opening
/// one direction while the other is open is counted as an overlap.
pub struct VirtualAudioSession {
    ledger: Arc<Ledger>,
    faults: Mutex<Faults>,
    script: Mutex<CaptureScript>,
    input_requests: Mutex<Vec<InputRequest>>,
}

impl VirtualAudioSession {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(Ledger::default()),
            faults: Mutex::new(Faults::default()),
            script: Mutex::new(CaptureScript::default()),
            input_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_output_unavailable(&self, unavailable: bool) {
        self.faults.lock().output_unavailable = unavailable;
    }

    pub fn set_input_unavailable(&self, unavailable: bool) {
        self.faults.lock().input_unavailable = unavailable;
    }

    /// Fail capture opens with `PermissionDenied`, as if revoked after the check.
    pub fn set_input_permission_revoked(&self, revoked: bool) {
        self.faults.lock().input_permission_revoked = revoked;
    }

    /// Latency added to every endpoint open.
    pub fn set_open_delay(&self, delay: Duration) {
        let mut faults = self.faults.lock();
        faults.output_open_delay = delay;
        faults.input_open_delay = delay;
    }

    pub fn set_output_open_delay(&self, delay: Duration) {
        self.faults.lock().output_open_delay = delay;
    }

    pub fn set_input_open_delay(&self, delay: Duration) {
        self.faults.lock().input_open_delay = delay;
    }

    /// Latency added to every playback write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.faults.lock().write_delay = delay;
    }

    pub fn set_capture_script(&self, script: CaptureScript) {
        *self.script.lock() = script;
    }

    /// Playback endpoints closed so far, in close order.
    pub fn played(&self) -> Vec<PlayedOutput> {
        self.ledger.played.lock().clone()
    }

    /// Requests passed to every capture open, in order.
    pub fn input_requests(&self) -> Vec<InputRequest> {
        self.input_requests.lock().clone()
    }

    pub fn open_outputs(&self) -> usize {
        self.ledger.open_outputs.load(Ordering::SeqCst)
    }

    pub fn open_inputs(&self) -> usize {
        self.ledger.open_inputs.load(Ordering::SeqCst)
    }

    /// Times an endpoint opened while the other direction was open.
    pub fn overlaps(&self) -> usize {
        self.ledger.overlaps.load(Ordering::SeqCst)
    }

    pub fn chunks_emitted(&self) -> u64 {
        self.ledger.chunks_emitted.load(Ordering::SeqCst)
    }
}

impl Default for VirtualAudioSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSessionProvider for VirtualAudioSession {
    fn open_output(&self, format: &AudioFormatOptions) -> Result<Box<dyn OutputEndpoint>, AudioIoError> {
        let faults = self.faults.lock().clone();
        thread::sleep(faults.output_open_delay);
        if faults.output_unavailable {
            return Err(AudioIoError::DeviceUnavailable("virtual playback endpoint disabled".into()));
        }

        if self.ledger.open_inputs.load(Ordering::SeqCst) > 0 {
            log::error!("playback opened while capture is open");
            self.ledger.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.ledger.open_outputs.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(VirtualOutputEndpoint {
            ledger: Arc::clone(&self.ledger),
            format: *format,
            bytes: 0,
            write_delay: faults.write_delay,
            closed: false,
        }))
    }

    fn open_input(&self, request: &InputRequest, sink: Arc<dyn CaptureSink>) -> Result<Box<dyn InputEndpoint>, AudioIoError> {
        let faults = self.faults.lock().clone();
        thread::sleep(faults.input_open_delay);
        if faults.input_permission_revoked {
            return Err(AudioIoError::PermissionDenied);
        }
        if faults.input_unavailable {
            return Err(AudioIoError::DeviceUnavailable("virtual capture endpoint busy".into()));
        }
        self.input_requests.lock().push(request.clone());

        if self.ledger.open_outputs.load(Ordering::SeqCst) > 0 {
            log::error!("capture opened while playback is open");
            self.ledger.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.ledger.open_inputs.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock().clone();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let ledger = Arc::clone(&self.ledger);

        let spawned = thread::Builder::new()
            .name("virtual-capture".into())
            .spawn(move || capture_loop(thread_running, script, sink, ledger));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.ledger.open_inputs.fetch_sub(1, Ordering::SeqCst);
                return Err(AudioIoError::Io(format!("failed to spawn capture thread: {}", e)));
            }
        };

        Ok(Box::new(VirtualInputEndpoint {
            ledger: Arc::clone(&self.ledger),
            running,
            handle: Some(handle),
            closed: false,
        }))
    }
}

fn capture_loop(running: Arc<AtomicBool>, script: CaptureScript, sink: Arc<dyn CaptureSink>, ledger: Arc<Ledger>) {
    let chunk_bytes = script.chunk_bytes.max(8);
    let mut sequence = 0u64;

    while running.load(Ordering::SeqCst) {
        thread::sleep(script.interval);
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let mut chunk = vec![0u8; chunk_bytes];
        chunk[..8].copy_from_slice(&sequence.to_le_bytes());
        sink.on_chunk(&chunk);
        ledger.chunks_emitted.fetch_add(1, Ordering::SeqCst);
        sequence += 1;

        if let Some((limit, result)) = script.finish_after {
            if sequence >= limit {
                sink.on_finished(result);
                break;
            }
        }
    }
}

struct VirtualOutputEndpoint {
    ledger: Arc<Ledger>,
    format: AudioFormatOptions,
    bytes: usize,
    write_delay: Duration,
    closed: bool,
}

impl OutputEndpoint for VirtualOutputEndpoint {
    fn write(&mut self, pcm: &[u8]) -> Result<(), AudioIoError> {
        if self.closed {
            return Err(AudioIoError::Io("playback endpoint is closed".into()));
        }
        thread::sleep(self.write_delay);
        self.bytes += pcm.len();
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioIoError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.ledger.played.lock().push(PlayedOutput {
            format: self.format,
            bytes: self.bytes,
        });
        self.ledger.open_outputs.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for VirtualOutputEndpoint {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct VirtualInputEndpoint {
    ledger: Arc<Ledger>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    closed: bool,
}

impl InputEndpoint for VirtualInputEndpoint {
    fn close(&mut self) -> Result<(), AudioIoError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // Never join from the capture thread itself.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::error!("virtual capture thread panicked");
            }
        }
        self.ledger.open_inputs.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for VirtualInputEndpoint {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Default)]
    struct CollectSink {
        chunks: Mutex<Vec<Vec<u8>>>,
        finished: Mutex<Option<InputResult>>,
    }

    impl CaptureSink for CollectSink {
        fn on_chunk(&self, chunk: &[u8]) {
            self.chunks.lock().push(chunk.to_vec());
        }

        fn on_finished(&self, result: InputResult) {
            *self.finished.lock() = Some(result);
        }
    }

    fn request() -> InputRequest {
        InputRequest {
            options: AudioFormatOptions::default(),
            prompt: None,
            text: Some("Speak now".into()),
        }
    }

    fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn capture_streams_numbered_chunks_until_closed() {
        let session = VirtualAudioSession::new();
        let sink = Arc::new(CollectSink::default());

        let mut endpoint = session.open_input(&request(), sink.clone()).unwrap();
        assert_eq!(session.open_inputs(), 1);
        assert!(wait_until(Duration::from_secs(2), || sink.chunks.lock().len() >= 5));

        endpoint.close().unwrap();
        assert_eq!(session.open_inputs(), 0);
        let delivered = sink.chunks.lock().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.chunks.lock().len(), delivered);

        let sequences: Vec<u64> = sink.chunks.lock().iter().filter_map(|c| chunk_sequence(c)).collect();
        assert_eq!(sequences, (0..delivered as u64).collect::<Vec<_>>());
        assert_eq!(session.input_requests()[0].text.as_deref(), Some("Speak now"));
    }

    #[test]
    fn script_can_finish_the_stream() {
        let session = VirtualAudioSession::new();
        session.set_capture_script(CaptureScript {
            finish_after: Some((3, InputResult::Aborted)),
            ..Default::default()
        });
        let sink = Arc::new(CollectSink::default());

        let mut endpoint = session.open_input(&request(), sink.clone()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || sink.finished.lock().is_some()));
        assert_eq!(*sink.finished.lock(), Some(InputResult::Aborted));
        assert_eq!(sink.chunks.lock().len(), 3);
        endpoint.close().unwrap();
    }

    #[test]
    fn overlapping_opens_are_counted() {
        let session = VirtualAudioSession::new();
        let mut output = session.open_output(&AudioFormatOptions::default()).unwrap();
        let mut input = session.open_input(&request(), Arc::new(CollectSink::default())).unwrap();
        assert_eq!(session.overlaps(), 1);

        input.close().unwrap();
        output.write(&[0; 64]).unwrap();
        output.close().unwrap();
        assert_eq!(session.played(), vec![PlayedOutput { format: AudioFormatOptions::default(), bytes: 64 }]);
        assert_eq!(session.open_outputs(), 0);
    }

    #[test]
    fn injected_faults() {
        let session = VirtualAudioSession::new();
        session.set_output_unavailable(true);
        assert!(matches!(
            session.open_output(&AudioFormatOptions::default()),
            Err(AudioIoError::DeviceUnavailable(_))
        ));

        session.set_input_permission_revoked(true);
        assert!(matches!(
            session.open_input(&request(), Arc::new(CollectSink::default())),
            Err(AudioIoError::PermissionDenied)
        ));
        assert!(session.input_requests().is_empty());
    }
}
