use std::collections::HashMap;

use agora_core::{SequenceNumber, StorageHash, TimestampMs};
use serde::{Deserialize, Serialize};

/// Anti-replay ledger value: the last seen sequence number for a payload
/// hash and when it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumberEntry {
    pub sequence_nr: SequenceNumber,
    pub time_stamp: TimestampMs,
}

/// Persistent mapping from payload hash to the most recent sequence number.
///
/// Entries outlive their data entries so that stale late deliveries cannot
/// resurrect removed payloads.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SequenceNumberMap {
    map: HashMap<StorageHash, SequenceNumberEntry>,
}

impl SequenceNumberMap {
    pub fn get(&self, hash: &StorageHash) -> Option<SequenceNumberEntry> {
        self.map.get(hash).copied()
    }

    pub fn put(&mut self, hash: StorageHash, entry: SequenceNumberEntry) {
        self.map.insert(hash, entry);
    }

    pub fn contains_key(&self, hash: &StorageHash) -> bool {
        self.map.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Strictly-greater check against the recorded value. Hashes without a
    /// recorded value always pass.
    pub fn has_increased(&self, new_sequence_nr: SequenceNumber, hash: &StorageHash) -> bool {
        match self.map.get(hash) {
            Some(recorded) => new_sequence_nr > recorded.sequence_nr,
            None => true,
        }
    }

    /// Drops entries recorded at or before `cutoff`. Purging only shrinks
    /// the map; recorded sequence numbers are never lowered.
    pub fn purge_older_than(&mut self, cutoff: TimestampMs) {
        self.map.retain(|_, value| value.time_stamp > cutoff);
    }

    /// Copy for persistence.
    pub fn snapshot(&self) -> HashMap<StorageHash, SequenceNumberEntry> {
        self.map.clone()
    }
}
