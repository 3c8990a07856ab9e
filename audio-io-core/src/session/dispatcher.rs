use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::RwLock;

use crate::models::error::AudioIoError;
use crate::models::event::AudioEvent;
use crate::traits::audio_observer::AudioObserver;

type ObserverSlot = Arc<RwLock<Option<Weak<dyn AudioObserver>>>>;

/// Serializes observer notifications onto one dedicated thread.
///
/// Events are delivered in send order. The observer is held weakly; once it
/// is dropped, delivery becomes a no-op. The thread exits when the
/// dispatcher is dropped.
pub(crate) struct EventDispatcher {
    tx: mpsc::Sender<AudioEvent>,
    observer: ObserverSlot,
}

impl EventDispatcher {
    pub(crate) fn spawn() -> Result<Self, AudioIoError> {
        let (tx, rx) = mpsc::channel::<AudioEvent>();
        let observer: ObserverSlot = Arc::new(RwLock::new(None));
        let slot = Arc::clone(&observer);

        thread::Builder::new()
            .name("audio-io-events".into())
            .spawn(move || {
                for event in rx {
                    let target = slot.read().as_ref().and_then(Weak::upgrade);
                    match target {
                        Some(observer) => observer.on_event(&event),
                        None => log::trace!("no observer for {}", event.name()),
                    }
                }
                log::debug!("event dispatcher stopped");
            })
            .map_err(|e| AudioIoError::Io(format!("failed to spawn event thread: {}", e)))?;

        Ok(Self { tx, observer })
    }

    pub(crate) fn set_observer(&self, observer: Option<Weak<dyn AudioObserver>>) {
        *self.observer.write() = observer;
    }

    pub(crate) fn has_observer(&self) -> bool {
        self.observer
            .read()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    pub(crate) fn send(&self, event: AudioEvent) {
        log::debug!("event {}", event.name());
        if self.tx.send(event).is_err() {
            log::warn!("event dispatcher is gone; event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct Collect(Mutex<Vec<AudioEvent>>);

    impl AudioObserver for Collect {
        fn on_event(&self, event: &AudioEvent) {
            self.0.lock().push(event.clone());
        }
    }

    fn wait_for_len(observer: &Collect, len: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if observer.0.lock().len() >= len {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn delivers_in_order() {
        let dispatcher = EventDispatcher::spawn().unwrap();
        let observer = Arc::new(Collect(Mutex::new(Vec::new())));
        let weak: Weak<dyn AudioObserver> = Arc::downgrade(&observer) as Weak<dyn AudioObserver>;
        dispatcher.set_observer(Some(weak));
        assert!(dispatcher.has_observer());

        for i in 0..50u8 {
            dispatcher.send(AudioEvent::InputData { chunk: vec![i] });
        }

        assert!(wait_for_len(&observer, 50));
        let chunks: Vec<u8> = observer
            .0
            .lock()
            .iter()
            .map(|e| match e {
                AudioEvent::InputData { chunk } => chunk[0],
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(chunks, (0..50).collect::<Vec<u8>>());
    }

    #[test]
    fn dropped_observer_is_a_no_op() {
        let dispatcher = EventDispatcher::spawn().unwrap();
        let observer = Arc::new(Collect(Mutex::new(Vec::new())));
        let weak: Weak<dyn AudioObserver> = Arc::downgrade(&observer) as Weak<dyn AudioObserver>;
        dispatcher.set_observer(Some(weak));
        drop(observer);

        assert!(!dispatcher.has_observer());
        dispatcher.send(AudioEvent::OutputStarted);
        dispatcher.send(AudioEvent::OutputStopped);
    }
}
