use std::collections::{BTreeMap, HashMap};

use agora_codec::AppendOnlyPayload;
use agora_core::StorageHash;
use serde::{Deserialize, Serialize};

/// Content-addressed immutable store for one payload category. Keys are
/// never deleted.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppendOnlyStore {
    map: HashMap<StorageHash, AppendOnlyPayload>,
}

impl AppendOnlyStore {
    pub fn contains(&self, hash: &StorageHash) -> bool {
        self.map.contains_key(hash)
    }

    /// Inserts if absent; returns whether the payload was newly added.
    pub fn put(&mut self, hash: StorageHash, payload: AppendOnlyPayload) -> bool {
        if self.map.contains_key(&hash) {
            return false;
        }
        self.map.insert(hash, payload);
        true
    }

    pub fn get_map(&self) -> &HashMap<StorageHash, AppendOnlyPayload> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Versioned append-only store: a live map receiving new payloads plus
/// read-only archives grouped by the protocol version they shipped with.
///
/// Requests carry only live-data hashes; the responder derives missing
/// archive data from the requester's version tag.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HistoricalStore {
    live: AppendOnlyStore,
    archives: BTreeMap<u32, HashMap<StorageHash, AppendOnlyPayload>>,
}

impl HistoricalStore {
    pub fn new(archives: BTreeMap<u32, HashMap<StorageHash, AppendOnlyPayload>>) -> Self {
        Self {
            live: AppendOnlyStore::default(),
            archives,
        }
    }

    pub fn contains(&self, hash: &StorageHash) -> bool {
        self.live.contains(hash) || self.archives.values().any(|map| map.contains_key(hash))
    }

    /// New payloads always land in the live map.
    pub fn put(&mut self, hash: StorageHash, payload: AppendOnlyPayload) -> bool {
        if self.contains(&hash) {
            return false;
        }
        self.live.put(hash, payload)
    }

    pub fn map_of_live_data(&self) -> &HashMap<StorageHash, AppendOnlyPayload> {
        self.live.get_map()
    }

    /// Data newer than the requester's version: archives tagged with a
    /// greater version plus all live data. A `None` version (legacy peer)
    /// receives everything.
    pub fn map_since_version(
        &self,
        requester_version: Option<u32>,
    ) -> HashMap<StorageHash, AppendOnlyPayload> {
        let mut result = HashMap::new();
        for (version, archive) in &self.archives {
            if requester_version.map_or(true, |v| *version > v) {
                result.extend(archive.iter().map(|(h, p)| (*h, p.clone())));
            }
        }
        result.extend(self.live.get_map().iter().map(|(h, p)| (*h, p.clone())));
        result
    }
}

/// One registered per-category store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppendOnlyService {
    Plain(AppendOnlyStore),
    Historical(HistoricalStore),
}

impl AppendOnlyService {
    pub fn contains(&self, hash: &StorageHash) -> bool {
        match self {
            AppendOnlyService::Plain(store) => store.contains(hash),
            AppendOnlyService::Historical(store) => store.contains(hash),
        }
    }

    pub fn put(&mut self, hash: StorageHash, payload: AppendOnlyPayload) -> bool {
        match self {
            AppendOnlyService::Plain(store) => store.put(hash, payload),
            AppendOnlyService::Historical(store) => store.put(hash, payload),
        }
    }

    /// Hashes contributed to the exclude-set of our own requests. Historical
    /// stores contribute only live data.
    pub fn map_for_request(&self) -> &HashMap<StorageHash, AppendOnlyPayload> {
        match self {
            AppendOnlyService::Plain(store) => store.get_map(),
            AppendOnlyService::Historical(store) => store.map_of_live_data(),
        }
    }

    /// Candidate payloads for a response to a peer at `requester_version`.
    pub fn map_for_response(
        &self,
        requester_version: Option<u32>,
    ) -> HashMap<StorageHash, AppendOnlyPayload> {
        match self {
            AppendOnlyService::Plain(store) => store.get_map().clone(),
            AppendOnlyService::Historical(store) => store.map_since_version(requester_version),
        }
    }
}

/// Category-keyed registry over all append-only stores of a node.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppendOnlyRegistry {
    services: HashMap<String, AppendOnlyService>,
}

impl AppendOnlyRegistry {
    pub fn register_plain(&mut self, category: impl Into<String>) {
        self.services
            .entry(category.into())
            .or_insert_with(|| AppendOnlyService::Plain(AppendOnlyStore::default()));
    }

    pub fn register_historical(&mut self, category: impl Into<String>, store: HistoricalStore) {
        self.services
            .insert(category.into(), AppendOnlyService::Historical(store));
    }

    /// Whether the category's store already holds `hash`.
    pub fn contains(&self, category: &str, hash: &StorageHash) -> bool {
        self.services
            .get(category)
            .map(|service| service.contains(hash))
            .unwrap_or(false)
    }

    /// Routes the payload to its category store, creating a plain store for
    /// unknown categories. Returns whether the payload was newly added.
    pub fn put(&mut self, hash: StorageHash, payload: AppendOnlyPayload) -> bool {
        self.services
            .entry(payload.category.clone())
            .or_insert_with(|| AppendOnlyService::Plain(AppendOnlyStore::default()))
            .put(hash, payload)
    }

    /// Union of every service's request map (live data only).
    pub fn map_for_request(&self) -> HashMap<StorageHash, AppendOnlyPayload> {
        let mut result = HashMap::new();
        for service in self.services.values() {
            result.extend(service.map_for_request().iter().map(|(h, p)| (*h, p.clone())));
        }
        result
    }

    /// Union of every service's response map for the given version.
    pub fn map_for_response(
        &self,
        requester_version: Option<u32>,
    ) -> HashMap<StorageHash, AppendOnlyPayload> {
        let mut result = HashMap::new();
        for service in self.services.values() {
            result.extend(service.map_for_response(requester_version));
        }
        result
    }
}
