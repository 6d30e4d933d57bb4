use std::collections::HashMap;

use agora_codec::ProtectedStorageEntry;
use agora_core::StorageHash;
use serde::{Deserialize, Serialize};

/// Durable store holding the subset of live protected entries whose payload
/// is persistable. Always a subset of the main map.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProtectedEntryStore {
    map: HashMap<StorageHash, ProtectedStorageEntry>,
}

impl ProtectedEntryStore {
    pub fn put(&mut self, hash: StorageHash, entry: ProtectedStorageEntry) {
        self.map.insert(hash, entry);
    }

    pub fn remove(&mut self, hash: &StorageHash) -> Option<ProtectedStorageEntry> {
        self.map.remove(hash)
    }

    pub fn contains(&self, hash: &StorageHash) -> bool {
        self.map.contains_key(hash)
    }

    pub fn get_map(&self) -> &HashMap<StorageHash, ProtectedStorageEntry> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
