use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::AudioIoError;
use crate::traits::session_provider::{InputEndpoint, OutputEndpoint};

/// Run a device operation on its own thread and wait at most `timeout`.
///
/// On expiry the caller gets `DeviceUnavailable`; if the operation later
/// succeeds anyway, `on_late` receives the value so the device can be
/// released.
pub(crate) fn run_bounded<T, F, L>(what: &str, timeout: Duration, op: F, on_late: L) -> Result<T, AudioIoError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AudioIoError> + Send + 'static,
    L: FnOnce(T) + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let abandoned = Arc::new(Mutex::new(false));
    let worker_abandoned = Arc::clone(&abandoned);

    thread::Builder::new()
        .name(format!("audio-io-{}", what))
        .spawn(move || {
            let result = op();
            let abandoned = worker_abandoned.lock();
            if !*abandoned {
                let _ = tx.send(result);
                return;
            }
            drop(abandoned);
            if let Ok(value) = result {
                log::warn!("device operation finished after its deadline; releasing");
                on_late(value);
            }
        })
        .map_err(|e| AudioIoError::Io(format!("failed to spawn {} thread: {}", what, e)))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            let mut abandoned = abandoned.lock();
            // The worker may have sent between the timeout and taking the lock.
            if let Ok(result) = rx.try_recv() {
                return result;
            }
            *abandoned = true;
            Err(AudioIoError::DeviceUnavailable(format!("{} timed out after {:?}", what, timeout)))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(AudioIoError::DeviceUnavailable(format!("{} worker exited without a result", what)))
        }
    }
}

pub(crate) fn close_input(mut endpoint: Box<dyn InputEndpoint>) {
    if let Err(e) = endpoint.close() {
        log::warn!("failed to close capture endpoint: {}", e);
    }
}

/// Close a capture endpoint from a fresh thread.
///
/// Used when the request comes from the endpoint's own capture thread, which
/// `close` may join.
pub(crate) fn close_input_detached(endpoint: Box<dyn InputEndpoint>) {
    let spawned = thread::Builder::new()
        .name("audio-io-input-close".into())
        .spawn(move || close_input(endpoint));
    if let Err(e) = spawned {
        log::error!("failed to spawn capture close thread: {}", e);
    }
}

pub(crate) fn close_output(mut endpoint: Box<dyn OutputEndpoint>) -> Result<(), AudioIoError> {
    endpoint.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn returns_fast_results() {
        let value = run_bounded("test", Duration::from_secs(1), || Ok(7), |_: i32| {}).unwrap();
        assert_eq!(value, 7);

        let err = run_bounded::<i32, _, _>(
            "test",
            Duration::from_secs(1),
            || Err(AudioIoError::PermissionDenied),
            |_| {},
        )
        .unwrap_err();
        assert_eq!(err, AudioIoError::PermissionDenied);
    }

    #[test]
    fn times_out_and_releases_late_value() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);

        let err = run_bounded(
            "slow-open",
            Duration::from_millis(20),
            || {
                thread::sleep(Duration::from_millis(150));
                Ok(1u8)
            },
            move |_| flag.store(true, Ordering::SeqCst),
        )
        .unwrap_err();
        assert!(matches!(err, AudioIoError::DeviceUnavailable(_)));

        thread::sleep(Duration::from_millis(400));
        assert!(released.load(Ordering::SeqCst));
    }
}
