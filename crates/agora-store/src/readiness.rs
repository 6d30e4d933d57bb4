use parking_lot::Mutex;

/// And-gate over store-load completion signals.
///
/// Each durable source (append-only stores, protected store, resource
/// store) signals once when its read completes; the callback fires exactly
/// once, after the last signal.
pub struct ReadyLatch {
    remaining: Mutex<usize>,
    on_ready: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ReadyLatch {
    pub fn new(signals: usize, on_ready: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remaining: Mutex::new(signals),
            on_ready: Mutex::new(Some(Box::new(on_ready))),
        }
    }

    /// Records one completion signal; fires the callback when all have
    /// arrived. Extra signals are no-ops.
    pub fn signal(&self) {
        let fire = {
            let mut remaining = self.remaining.lock();
            if *remaining == 0 {
                return;
            }
            *remaining -= 1;
            *remaining == 0
        };
        if fire {
            if let Some(callback) = self.on_ready.lock().take() {
                callback();
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.remaining.lock() == 0
    }
}
