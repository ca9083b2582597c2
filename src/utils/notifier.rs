use std::sync::{Arc, Mutex};
use std::task::{Wake, Waker};

use slab::Slab;

/// A waker which fans every wake-up out to all registered waiters.
///
/// A shared computation is polled with this waker instead of the waker of
/// whichever handle happens to drive it. That way progress is never tied to
/// a single waiter: if the driving handle goes away, the next wake-up still
/// reaches everyone else still waiting.
#[derive(Debug, Default)]
pub(crate) struct Notifier {
    wakers: Mutex<Slab<Option<Waker>>>,
}

impl Notifier {
    /// Create a new instance of `Notifier`.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store `waker` under `key`, allocating a slot on first use.
    pub(crate) fn register(&self, key: &mut Option<usize>, waker: &Waker) {
        let mut wakers = self.wakers.lock().unwrap();
        match key.and_then(|key| wakers.get_mut(key)) {
            Some(Some(current)) if current.will_wake(waker) => {}
            Some(slot) => *slot = Some(waker.clone()),
            None => *key = Some(wakers.insert(Some(waker.clone()))),
        }
    }

    /// Release the slot held under `key`.
    pub(crate) fn unregister(&self, key: usize) {
        let mut wakers = self.wakers.lock().unwrap();
        if wakers.contains(key) {
            wakers.remove(key);
        }
    }

    /// Number of waiters currently holding a slot.
    pub(crate) fn waiters(&self) -> usize {
        self.wakers.lock().unwrap().len()
    }

    /// Wake every registered waiter once.
    ///
    /// Slots stay allocated but are emptied; a waiter re-registers the next
    /// time it observes `Poll::Pending`.
    pub(crate) fn wake_all(&self) {
        let pending: Vec<Waker> = {
            let mut wakers = self.wakers.lock().unwrap();
            wakers.iter_mut().filter_map(|(_, slot)| slot.take()).collect()
        };
        // Wake outside of the lock so a waker which polls inline can't deadlock.
        for waker in pending {
            waker.wake();
        }
    }
}

impl Wake for Notifier {
    fn wake(self: Arc<Self>) {
        self.wake_all();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wake_all();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wakes_every_registered_waiter() {
        let notifier = Notifier::new();
        let a = Arc::new(CountingWaker::default());
        let b = Arc::new(CountingWaker::default());
        let (mut key_a, mut key_b) = (None, None);
        notifier.register(&mut key_a, &Waker::from(a.clone()));
        notifier.register(&mut key_b, &Waker::from(b.clone()));
        assert_eq!(notifier.waiters(), 2);

        Waker::from(notifier.clone()).wake();
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);

        // Slots were drained, a second wake-up reaches nobody.
        notifier.wake_all();
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistered_waiters_are_skipped() {
        let notifier = Notifier::new();
        let a = Arc::new(CountingWaker::default());
        let mut key = None;
        notifier.register(&mut key, &Waker::from(a.clone()));
        notifier.unregister(key.unwrap());
        assert_eq!(notifier.waiters(), 0);

        notifier.wake_all();
        assert_eq!(a.0.load(Ordering::SeqCst), 0);
    }
}
