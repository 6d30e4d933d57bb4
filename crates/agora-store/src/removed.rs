use std::collections::HashSet;

use agora_core::StorageHash;
use serde::{Deserialize, Serialize};

/// Persistent set of payload hashes that were permanently retracted.
///
/// Add-once payloads whose hash lands here can never be stored again.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RemovedPayloadsSet {
    hashes: HashSet<StorageHash>,
}

impl RemovedPayloadsSet {
    pub fn was_removed(&self, hash: &StorageHash) -> bool {
        self.hashes.contains(hash)
    }

    pub fn add_hash(&mut self, hash: StorageHash) -> bool {
        self.hashes.insert(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
