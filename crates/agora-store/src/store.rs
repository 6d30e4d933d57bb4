use std::collections::HashMap;
use std::sync::Arc;

use agora_codec::entry::{signature_digest, Signature};
use agora_codec::messages::{
    AddAppendOnlyPayloadMessage, AddDataMessage, Envelope, RefreshTtlMessage, RemoveDataMessage,
    RemoveMailboxDataMessage,
};
use agora_codec::{AppendOnlyPayload, ProtectedPayload, ProtectedStorageEntry};
use agora_core::clock::Clock;
use agora_core::{NodeAddress, SequenceNumber, StorageHash, TimestampMs};
use agora_crypto::{Signer, Verifier};
use agora_net::{Broadcaster, CloseReason};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::append_only::AppendOnlyRegistry;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::listeners::{AppendOnlyListener, EntryMapListener, ListenerSet};
use crate::persistence::PersistenceRequest;
use crate::protected::ProtectedEntryStore;
use crate::removed::RemovedPayloadsSet;
use crate::sequence::{SequenceNumberEntry, SequenceNumberMap};

type FilterPredicate = Box<dyn Fn(&ProtectedPayload) -> bool + Send + Sync>;

/// Replicated storage core of one node.
///
/// All mutating paths serialize on the main-map mutex; the side stores guard
/// their own state. Listener callbacks and broadcasts run after the locks
/// are released.
pub struct DataStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    broadcaster: Arc<dyn Broadcaster>,
    verifier: Box<dyn Verifier + Send + Sync>,
    map: Mutex<HashMap<StorageHash, ProtectedStorageEntry>>,
    sequence_numbers: Mutex<SequenceNumberMap>,
    removed_payloads: Mutex<RemovedPayloadsSet>,
    append_only: Mutex<AppendOnlyRegistry>,
    protected_store: Mutex<ProtectedEntryStore>,
    entry_listeners: ListenerSet<dyn EntryMapListener>,
    append_only_listeners: ListenerSet<dyn AppendOnlyListener>,
    persistence: PersistenceRequest,
    filter_predicate: Mutex<Option<FilterPredicate>>,
}

impl DataStore {
    pub fn new(
        config: StoreConfig,
        clock: Arc<dyn Clock>,
        broadcaster: Arc<dyn Broadcaster>,
        verifier: impl Verifier + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            clock,
            broadcaster,
            verifier: Box::new(verifier),
            map: Mutex::new(HashMap::new()),
            sequence_numbers: Mutex::new(SequenceNumberMap::default()),
            removed_payloads: Mutex::new(RemovedPayloadsSet::default()),
            append_only: Mutex::new(AppendOnlyRegistry::default()),
            protected_store: Mutex::new(ProtectedEntryStore::default()),
            entry_listeners: ListenerSet::default(),
            append_only_listeners: ListenerSet::default(),
            persistence: PersistenceRequest::default(),
            filter_predicate: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn now_millis(&self) -> TimestampMs {
        self.clock.now_millis()
    }

    /// Installs the persisted sequence-number ledger, dropping entries older
    /// than the purge age. Must run before any ingress is accepted.
    pub fn install_persisted_sequence_numbers(&self, mut persisted: SequenceNumberMap) {
        let cutoff = self.clock.now_millis() - self.config.purge_age_ms();
        persisted.purge_older_than(cutoff);
        *self.sequence_numbers.lock() = persisted;
    }

    /// Installs the persisted protected-entry store and copies its entries
    /// into the main map.
    pub fn install_protected_store(&self, store: ProtectedEntryStore) {
        let mut map = self.map.lock();
        for (hash, entry) in store.get_map() {
            map.insert(*hash, entry.clone());
        }
        *self.protected_store.lock() = store;
    }

    /// Installs the append-only store registry loaded from disk/resources.
    pub fn install_append_only_registry(&self, registry: AppendOnlyRegistry) {
        *self.append_only.lock() = registry;
    }

    /// Adds a protected storage entry after the full validation chain;
    /// returns whether the entry was accepted and stored.
    pub fn add_protected_entry(
        &self,
        entry: ProtectedStorageEntry,
        sender: Option<&NodeAddress>,
        allow_broadcast: bool,
    ) -> bool {
        let Ok(hash) = entry.storage_hash() else {
            return false;
        };
        let now = self.clock.now_millis();

        let accepted_entry;
        {
            let mut map = self.map.lock();

            // Common early exit: a more recent operation is already stored.
            let stored = map.get(&hash).cloned();
            if let Some(stored_entry) = &stored {
                if entry.sequence_number <= stored_entry.sequence_number {
                    return false;
                }
            }

            if entry.payload.add_once && self.removed_payloads.lock().was_removed(&hash) {
                return false;
            }

            if entry.is_expired(now) {
                return false;
            }

            // Equal sequence numbers pass here so non-persistent payloads can
            // be rebuilt from peers at boot; the stored-entry check above
            // already rejected equality for locally present payloads.
            if let Some(recorded) = self.sequence_numbers.lock().get(&hash) {
                if recorded.sequence_nr > entry.sequence_number {
                    return false;
                }
            }

            if !entry.is_valid_for_add(self.verifier.as_ref()) {
                debug!(hash = ?hash, "rejected add: entry not valid for add operation");
                return false;
            }

            if let Some(stored_entry) = &stored {
                if !entry.matches_relevant_pub_key(stored_entry) {
                    return false;
                }
            }

            if let Some(predicate) = self.filter_predicate.lock().as_ref() {
                if !predicate(&entry.payload) {
                    debug!(hash = ?hash, "rejected add: filter predicate");
                    return false;
                }
            }

            map.insert(hash, entry.clone());
            self.sequence_numbers.lock().put(
                hash,
                SequenceNumberEntry {
                    sequence_nr: entry.sequence_number,
                    time_stamp: now,
                },
            );
            self.persistence.request();

            if entry.payload.persistable {
                self.protected_store.lock().put(hash, entry.clone());
            }
            accepted_entry = entry;
        }

        for listener in self.entry_listeners.snapshot() {
            listener.on_added(std::slice::from_ref(&accepted_entry));
        }

        if allow_broadcast {
            self.broadcaster.broadcast(
                Envelope::Add(AddDataMessage {
                    entry: accepted_entry,
                }),
                sender,
            );
        }

        true
    }

    /// Removes a protected entry (regular or mailbox). The sequence-number
    /// ledger is advanced even when the payload is not locally present, so a
    /// delayed add cannot resurrect it; the remove is broadcast regardless.
    pub fn remove_protected_entry(
        &self,
        entry: ProtectedStorageEntry,
        sender: Option<&NodeAddress>,
    ) -> bool {
        let Ok(hash) = entry.storage_hash() else {
            return false;
        };
        let now = self.clock.now_millis();

        let removed_stored;
        {
            let mut map = self.map.lock();

            if !self
                .sequence_numbers
                .lock()
                .has_increased(entry.sequence_number, &hash)
            {
                return false;
            }

            if !entry.is_valid_for_remove(self.verifier.as_ref()) {
                debug!(hash = ?hash, "rejected remove: entry not valid for remove operation");
                return false;
            }

            let stored = map.get(&hash).cloned();
            if let Some(stored_entry) = &stored {
                if !entry.matches_relevant_pub_key(stored_entry) {
                    return false;
                }
            }

            // Advance only after signature and owner checks both passed.
            self.sequence_numbers.lock().put(
                hash,
                SequenceNumberEntry {
                    sequence_nr: entry.sequence_number,
                    time_stamp: now,
                },
            );
            self.persistence.request();

            if entry.payload.add_once {
                self.removed_payloads.lock().add_hash(hash);
                self.persistence.request();
            }

            removed_stored = stored.map(|stored_entry| {
                map.remove(&hash);
                if stored_entry.payload.persistable {
                    self.protected_store.lock().remove(&hash);
                }
                stored_entry
            });
        }

        if let Some(stored_entry) = removed_stored {
            for listener in self.entry_listeners.snapshot() {
                listener.on_removed(std::slice::from_ref(&stored_entry));
            }
        }

        let message = if entry.is_mailbox() {
            Envelope::RemoveMailbox(RemoveMailboxDataMessage { entry })
        } else {
            Envelope::Remove(RemoveDataMessage { entry })
        };
        self.broadcaster.broadcast(message, sender);

        true
    }

    /// Applies a TTL refresh: rebuilds the stored entry with the new
    /// sequence number and signature and a fresh creation timestamp.
    /// Refreshes for unknown hashes are ignored (we missed the add).
    pub fn refresh_ttl(&self, message: &RefreshTtlMessage, sender: Option<&NodeAddress>) -> bool {
        let hash = message.payload_hash;
        {
            let mut map = self.map.lock();
            let Some(stored) = map.get(&hash).cloned() else {
                debug!(hash = ?hash, "ignored refresh for unknown payload hash");
                return false;
            };

            let updated = ProtectedStorageEntry {
                payload: stored.payload,
                owner_pubkey: stored.owner_pubkey,
                sequence_number: message.sequence_number,
                signature: message.signature.clone(),
                creation_ts: self.clock.now_millis(),
                receiver_pubkey: stored.receiver_pubkey,
            };

            if !self
                .sequence_numbers
                .lock()
                .has_increased(updated.sequence_number, &hash)
            {
                return false;
            }

            if !updated.is_valid_for_add(self.verifier.as_ref()) {
                return false;
            }

            self.sequence_numbers.lock().put(
                hash,
                SequenceNumberEntry {
                    sequence_nr: updated.sequence_number,
                    time_stamp: updated.creation_ts,
                },
            );
            self.persistence.request();
            map.insert(hash, updated);
        }

        self.broadcaster
            .broadcast(Envelope::RefreshTtl(message.clone()), sender);

        true
    }

    /// Ingests a content-addressed append-only payload. `check_date` applies
    /// the declared tolerance window (broadcast ingress only).
    pub fn add_append_only_payload(
        &self,
        payload: AppendOnlyPayload,
        sender: Option<&NodeAddress>,
        allow_broadcast: bool,
        allow_rebroadcast: bool,
        check_date: bool,
    ) -> bool {
        if !payload.verify_hash() {
            warn!(category = %payload.category, "append-only payload rejected: hash size/content mismatch");
            return false;
        }
        let Ok(hash) = payload.storage_hash() else {
            return false;
        };

        let was_added;
        {
            let mut registry = self.append_only.lock();
            let already_in_store = registry.contains(&payload.category, &hash);
            if already_in_store && !allow_rebroadcast {
                return false;
            }

            if check_date && !payload.is_date_in_tolerance(self.clock.now_millis()) {
                warn!(
                    category = %payload.category,
                    "append-only payload rejected: date outside tolerance"
                );
                return false;
            }

            was_added = !already_in_store && registry.put(hash, payload.clone());
        }

        if was_added {
            self.persistence.request();
            for listener in self.append_only_listeners.snapshot() {
                listener.on_added(&payload);
            }
            if allow_broadcast {
                self.broadcaster.broadcast(
                    Envelope::AddAppendOnly(AddAppendOnlyPayloadMessage { payload }),
                    sender,
                );
            }
        }

        true
    }

    /// Fast path for process-once payloads arriving in the initial sync:
    /// skips the duplicate check and listener notification.
    pub fn add_append_only_from_initial_request(&self, payload: AppendOnlyPayload) {
        if !payload.verify_hash() {
            warn!(category = %payload.category, "initial-sync payload rejected: hash size/content mismatch");
            return;
        }
        let Ok(hash) = payload.storage_hash() else {
            return;
        };
        self.append_only.lock().put(hash, payload);
        self.persistence.request();
    }

    /// Removes expired entries and runs the scheduled ledger purge. The
    /// sequence-number map keeps the expired hashes so stale late adds for
    /// them are still rejected.
    pub fn remove_expired_entries(&self) {
        let now = self.clock.now_millis();

        let removed_entries;
        {
            let mut map = self.map.lock();
            let expired: Vec<(StorageHash, ProtectedStorageEntry)> = map
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(hash, entry)| (*hash, entry.clone()))
                .collect();

            let mut removed = Vec::with_capacity(expired.len());
            for (hash, entry) in expired {
                map.remove(&hash);
                if entry.payload.persistable {
                    self.protected_store.lock().remove(&hash);
                }
                removed.push(entry);
            }
            removed_entries = removed;

            let mut sequence_numbers = self.sequence_numbers.lock();
            if sequence_numbers.len() > self.config.max_sequence_number_map_size_before_purge {
                sequence_numbers.purge_older_than(now - self.config.purge_age_ms());
                self.persistence.request();
            }
        }

        if !removed_entries.is_empty() {
            for listener in self.entry_listeners.snapshot() {
                listener.on_removed(&removed_entries);
            }
        }
    }

    /// Back-dates every entry whose payload requires its owner online and
    /// whose owner address matches the dropped peer. Intended closes are
    /// ignored.
    pub fn on_disconnect(&self, reason: CloseReason, peer: &NodeAddress) {
        if reason.is_intended {
            return;
        }
        let mut map = self.map.lock();
        for entry in map.values_mut() {
            if entry.payload.owner_address.as_ref() == Some(peer) {
                entry.back_date();
            }
        }
    }

    /// Dispatches one broadcast message from the network. Messages without a
    /// known sender address and non-broadcast messages are ignored.
    pub fn on_message(&self, envelope: Envelope, sender: Option<&NodeAddress>) {
        if !envelope.is_broadcast() {
            return;
        }
        let Some(sender) = sender else {
            return;
        };
        match envelope {
            Envelope::Add(message) => {
                self.add_protected_entry(message.entry, Some(sender), true);
            }
            Envelope::Remove(message) => {
                self.remove_protected_entry(message.entry, Some(sender));
            }
            Envelope::RemoveMailbox(message) => {
                self.remove_protected_entry(message.entry, Some(sender));
            }
            Envelope::RefreshTtl(message) => {
                self.refresh_ttl(&message, Some(sender));
            }
            Envelope::AddAppendOnly(message) => {
                self.add_append_only_payload(message.payload, Some(sender), true, false, true);
            }
            _ => {}
        }
    }

    /// Builds a signed entry for a payload we own, continuing from the last
    /// recorded sequence number.
    pub fn protected_entry_for(
        &self,
        payload: ProtectedPayload,
        signer: &dyn Signer,
    ) -> Result<ProtectedStorageEntry, StoreError> {
        let hash = payload.storage_hash()?;
        let sequence_number = self.next_sequence_number(&hash);
        let digest = signature_digest(&payload, sequence_number)?;
        let signature = Signature(signer.sign(&digest)?);
        Ok(ProtectedStorageEntry::new(
            payload,
            signer.public_key(),
            sequence_number,
            signature,
            self.clock.now_millis(),
        ))
    }

    /// Builds a signed mailbox entry addressed to `receiver_pubkey`.
    pub fn mailbox_entry_for(
        &self,
        mut payload: ProtectedPayload,
        signer: &dyn Signer,
        receiver_pubkey: [u8; 32],
    ) -> Result<ProtectedStorageEntry, StoreError> {
        payload.receiver_pubkey = Some(receiver_pubkey);
        let hash = payload.storage_hash()?;
        let sequence_number = self.next_sequence_number(&hash);
        let digest = signature_digest(&payload, sequence_number)?;
        let signature = Signature(signer.sign(&digest)?);
        Ok(ProtectedStorageEntry::new_mailbox(
            payload,
            signer.public_key(),
            sequence_number,
            signature,
            self.clock.now_millis(),
            receiver_pubkey,
        ))
    }

    /// Builds a TTL refresh message for a payload we own.
    pub fn refresh_message_for(
        &self,
        payload: &ProtectedPayload,
        signer: &dyn Signer,
    ) -> Result<RefreshTtlMessage, StoreError> {
        let hash = payload.storage_hash()?;
        let sequence_number = self.next_sequence_number(&hash);
        let digest = signature_digest(payload, sequence_number)?;
        let signature = Signature(signer.sign(&digest)?);
        Ok(RefreshTtlMessage {
            signed_digest: digest,
            signature,
            payload_hash: hash,
            sequence_number,
        })
    }

    fn next_sequence_number(&self, hash: &StorageHash) -> SequenceNumber {
        self.sequence_numbers
            .lock()
            .get(hash)
            .map(|entry| entry.sequence_nr + 1)
            .unwrap_or(1)
    }

    /// Inserts a known-valid mailbox entry directly into the main map so its
    /// hash lands in the excluded set of the initial request. No checks.
    pub fn add_mailbox_entry_to_map(&self, entry: ProtectedStorageEntry) {
        if let Ok(hash) = entry.storage_hash() {
            self.map.lock().insert(hash, entry);
        }
    }

    /// Re-broadcasts an existing mailbox entry that was valid when first
    /// stored. Only the removed-payloads ban is re-checked.
    pub fn republish_mailbox_entry(
        &self,
        entry: ProtectedStorageEntry,
        sender: Option<&NodeAddress>,
    ) {
        if let Ok(hash) = entry.storage_hash() {
            if entry.payload.add_once && self.removed_payloads.lock().was_removed(&hash) {
                return;
            }
        }
        self.broadcaster
            .broadcast(Envelope::Add(AddDataMessage { entry }), sender);
    }

    pub fn add_entry_listener(&self, listener: Arc<dyn EntryMapListener>) {
        self.entry_listeners.add(listener);
    }

    pub fn remove_entry_listener(&self, listener: &Arc<dyn EntryMapListener>) -> bool {
        self.entry_listeners.remove(listener)
    }

    pub fn add_append_only_listener(&self, listener: Arc<dyn AppendOnlyListener>) {
        self.append_only_listeners.add(listener);
    }

    pub fn remove_append_only_listener(&self, listener: &Arc<dyn AppendOnlyListener>) -> bool {
        self.append_only_listeners.remove(listener)
    }

    /// Installs the payload filter consulted on every add.
    pub fn set_filter_predicate(
        &self,
        predicate: impl Fn(&ProtectedPayload) -> bool + Send + Sync + 'static,
    ) {
        *self.filter_predicate.lock() = Some(Box::new(predicate));
    }

    /// Every hash known locally: all append-only live data plus the main
    /// map. Used as the excluded-keys set of our own get-data requests.
    pub fn known_payload_hashes(&self) -> Vec<StorageHash> {
        let mut hashes: Vec<StorageHash> =
            self.append_only.lock().map_for_request().keys().copied().collect();
        hashes.extend(self.map.lock().keys().copied());
        hashes
    }

    /// Snapshot of the live protected-entry map.
    pub fn map_snapshot(&self) -> HashMap<StorageHash, ProtectedStorageEntry> {
        self.map.lock().clone()
    }

    /// Append-only candidates for a response to a peer at `version`.
    pub fn append_only_map_for_response(
        &self,
        version: Option<u32>,
    ) -> HashMap<StorageHash, AppendOnlyPayload> {
        self.append_only.lock().map_for_response(version)
    }

    pub fn map_len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn contains(&self, hash: &StorageHash) -> bool {
        self.map.lock().contains_key(hash)
    }

    pub fn get_entry(&self, hash: &StorageHash) -> Option<ProtectedStorageEntry> {
        self.map.lock().get(hash).cloned()
    }

    pub fn sequence_number_of(&self, hash: &StorageHash) -> Option<SequenceNumberEntry> {
        self.sequence_numbers.lock().get(hash)
    }

    pub fn sequence_numbers_len(&self) -> usize {
        self.sequence_numbers.lock().len()
    }

    /// Snapshot of the ledger for persistence.
    pub fn sequence_numbers_snapshot(&self) -> SequenceNumberMap {
        self.sequence_numbers.lock().clone()
    }

    pub fn was_removed(&self, hash: &StorageHash) -> bool {
        self.removed_payloads.lock().was_removed(hash)
    }

    pub fn protected_store_snapshot(&self) -> ProtectedEntryStore {
        self.protected_store.lock().clone()
    }

    pub fn append_only_contains(&self, category: &str, hash: &StorageHash) -> bool {
        self.append_only.lock().contains(category, hash)
    }

    pub fn persistence(&self) -> &PersistenceRequest {
        &self.persistence
    }
}
