use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agora_codec::messages::{AddDataMessage, Envelope, GetDataResponse};
use agora_codec::{ProtectedStorageEntry, ResponsePriority};
use agora_core::{NodeAddress, TimestampMs};
use agora_net::Broadcaster;
use agora_store::DataStore;
use parking_lot::Mutex;

struct PendingRebroadcast {
    due_at: TimestampMs,
    entry: ProtectedStorageEntry,
    sender: NodeAddress,
}

/// Applies get-data responses to the local store.
///
/// Broadcast is suppressed during ingestion (we are only connected to the
/// seed, fan-out is pointless); high-priority entries are queued for a
/// delayed re-broadcast instead, for resilience.
pub struct ResponseIngest {
    store: Arc<DataStore>,
    broadcaster: Arc<dyn Broadcaster>,
    initial_request_applied: AtomicBool,
    pending_rebroadcasts: Mutex<Vec<PendingRebroadcast>>,
}

impl ResponseIngest {
    pub fn new(store: Arc<DataStore>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            store,
            broadcaster,
            initial_request_applied: AtomicBool::new(false),
            pending_rebroadcasts: Mutex::new(Vec::new()),
        }
    }

    /// Whether a first response has been applied since startup. Process-once
    /// payloads in later responses are skipped unless truncated.
    pub fn initial_request_applied(&self) -> bool {
        self.initial_request_applied.load(Ordering::SeqCst)
    }

    /// Applies one get-data response received from `sender`.
    pub fn process_get_data_response(&self, response: GetDataResponse, sender: &NodeAddress) {
        let rebroadcast_due =
            self.store.now_millis() + self.store.config().rebroadcast_delay.as_millis() as i64;

        for entry in response.protected_entries {
            if entry.payload.priority == ResponsePriority::High {
                self.pending_rebroadcasts.lock().push(PendingRebroadcast {
                    due_at: rebroadcast_due,
                    entry: entry.clone(),
                    sender: sender.clone(),
                });
            }
            self.store.add_protected_entry(entry, Some(sender), false);
        }

        for payload in response.append_only_payloads {
            if payload.process_once {
                // Applied once per startup; a truncated response signals an
                // incomplete first pass, so retries are allowed.
                if !self.initial_request_applied() || response.was_truncated {
                    self.store.add_append_only_from_initial_request(payload);
                }
            } else {
                self.store
                    .add_append_only_payload(payload, Some(sender), false, false, false);
            }
        }

        self.initial_request_applied.store(true, Ordering::SeqCst);
    }

    /// Broadcasts queued high-priority entries whose delay has elapsed.
    /// Returns the number of entries re-broadcast.
    pub fn broadcast_due_rebroadcasts(&self) -> usize {
        let now = self.store.now_millis();
        let due: Vec<PendingRebroadcast> = {
            let mut pending = self.pending_rebroadcasts.lock();
            let mut still_pending = Vec::new();
            let mut due = Vec::new();
            for item in pending.drain(..) {
                if item.due_at <= now {
                    due.push(item);
                } else {
                    still_pending.push(item);
                }
            }
            *pending = still_pending;
            due
        };

        let count = due.len();
        for item in due {
            self.broadcaster.broadcast(
                Envelope::Add(AddDataMessage { entry: item.entry }),
                Some(&item.sender),
            );
        }
        count
    }

    pub fn pending_rebroadcast_count(&self) -> usize {
        self.pending_rebroadcasts.lock().len()
    }
}
