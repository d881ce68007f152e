/// Callback invoked when an instance (or its entry choreography) completes.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// One-shot guard around a completion callback.
///
/// `fire` runs the callback the first time it is called and is a no-op on every
/// later call, so any number of internal triggers collapse into a single
/// outbound signal.
#[derive(Default)]
pub struct CompletionLatch {
    fired: bool,
    callback: Option<CompletionCallback>,
}

impl std::fmt::Debug for CompletionLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("fired", &self.fired)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: CompletionCallback) -> Self {
        Self {
            fired: false,
            callback: Some(callback),
        }
    }

    /// Install or replace the callback. Returns false (and drops the callback)
    /// once the latch has already fired.
    pub fn set_callback(&mut self, callback: CompletionCallback) -> bool {
        if self.fired {
            return false;
        }
        self.callback = Some(callback);
        true
    }

    /// Returns true only for the call that actually flipped the latch.
    pub fn fire(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        if let Some(callback) = self.callback.take() {
            callback();
        }
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Forget the callback without firing it (teardown).
    pub fn disarm(&mut self) {
        self.callback = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> CompletionCallback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fires_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut latch = CompletionLatch::with_callback(counting_callback(&counter));

        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(!latch.fire());

        assert!(latch.has_fired());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_rejected_after_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut latch = CompletionLatch::new();
        assert!(latch.fire());

        assert!(!latch.set_callback(counting_callback(&counter)));
        latch.fire();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disarmed_latch_stays_silent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut latch = CompletionLatch::with_callback(counting_callback(&counter));
        latch.disarm();
        latch.fire();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
