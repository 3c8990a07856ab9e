use crate::models::event::AudioEvent;

/// Receiver of manager notifications.
///
/// Called from the manager's single dispatch thread, never concurrently and
/// never while the manager's state lock is held, so an observer may call back
/// into the manager (for example `start_input()` after a `RETRY` result).
/// Implementations should marshal to a UI thread if needed.
pub trait AudioObserver: Send + Sync {
    fn on_event(&self, event: &AudioEvent);
}

impl<F> AudioObserver for F
where
    F: Fn(&AudioEvent) + Send + Sync,
{
    fn on_event(&self, event: &AudioEvent) {
        self(event)
    }
}
