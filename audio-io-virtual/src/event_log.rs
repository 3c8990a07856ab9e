use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use audio_io_core::{AudioEvent, AudioObserver};

/// Observer that records every event and lets callers block until a
/// condition over the recorded sequence holds.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<AudioEvent>>,
    changed: Condvar,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far, in delivery order.
    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().clone()
    }

    /// Wait until `condition` holds or `timeout` elapses. Returns whether it held.
    pub fn wait_until(&self, timeout: Duration, condition: impl Fn(&[AudioEvent]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while !condition(&events) {
            if self.changed.wait_until(&mut events, deadline).timed_out() {
                return condition(&events);
            }
        }
        true
    }

    /// Wait for the first event matching `predicate`.
    pub fn wait_for_event(&self, timeout: Duration, predicate: impl Fn(&AudioEvent) -> bool) -> bool {
        self.wait_until(timeout, |events| events.iter().any(&predicate))
    }

    pub fn count(&self, predicate: impl Fn(&AudioEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AudioObserver for EventLog {
    fn on_event(&self, event: &AudioEvent) {
        self.events.lock().push(event.clone());
        self.changed.notify_all();
    }
}
