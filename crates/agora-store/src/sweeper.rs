use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::store::DataStore;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Periodic expiration sweep, started once the node is bootstrapped.
///
/// Runs [`DataStore::remove_expired_entries`] every configured interval
/// until shut down.
pub struct TtlSweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TtlSweeper {
    /// Spawns the sweep thread using the store's configured interval.
    pub fn start(store: Arc<DataStore>) -> Self {
        let interval = store.config().check_ttl_interval;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !sleep_interruptibly(&stop_flag, interval) {
                store.remove_expired_entries();
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the sweep thread and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TtlSweeper {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Sleeps for `interval` in short slices, polling the stop flag. Returns
/// true when stopped.
fn sleep_interruptibly(stop: &AtomicBool, interval: Duration) -> bool {
    let mut remaining = interval;
    while !remaining.is_zero() {
        if stop.load(Ordering::SeqCst) {
            return true;
        }
        let slice = remaining.min(STOP_POLL_INTERVAL);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    stop.load(Ordering::SeqCst)
}
