use agora_core::hash::sha256_32;
use agora_core::{CapabilitySet, NodeAddress, StorageHash, TimestampMs};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Fixed digest length for content-addressed append-only payloads.
pub const APPEND_ONLY_HASH_LENGTH: usize = 32;

/// Relative priority of a payload in get-data responses.
///
/// MID items are always included, LOW items are subject to the size budget,
/// HIGH items bypass both size and count limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponsePriority {
    Low,
    Mid,
    High,
}

/// Content-addressed immutable payload replicated across all peers.
///
/// The hash is self-computed over the content bytes and doubles as the store
/// key. Capability tags are plain fields so the truncation pipeline can
/// dispatch on them without downcasting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOnlyPayload {
    /// Store category this payload is routed to.
    pub category: String,
    /// Opaque application content bytes.
    pub data: Vec<u8>,
    /// Self-computed SHA-256 over `data`.
    pub hash: Vec<u8>,
    pub priority: ResponsePriority,
    /// Expensive to apply; ingested through the fast path once per startup.
    pub process_once: bool,
    /// Self-reported creation date; present when date-gated or date-sorted.
    pub date: Option<TimestampMs>,
    /// Maximum age/future skew accepted on ingress. `None` disables the check.
    pub date_tolerance_ms: Option<i64>,
    /// Item cap for date-sorted truncation; requires `date`.
    pub max_items: Option<usize>,
    /// Capabilities a peer must support to receive this payload.
    pub required_capabilities: CapabilitySet,
    /// Protocol-version tag used by historical stores.
    pub version: Option<u32>,
}

impl AppendOnlyPayload {
    /// Creates a minimal low-priority payload with a freshly computed hash.
    pub fn new(category: impl Into<String>, data: Vec<u8>) -> Self {
        let hash = sha256_32(&data).to_vec();
        Self {
            category: category.into(),
            data,
            hash,
            priority: ResponsePriority::Low,
            process_once: false,
            date: None,
            date_tolerance_ms: None,
            max_items: None,
            required_capabilities: CapabilitySet::default(),
            version: None,
        }
    }

    /// Checks the declared hash length and that it matches the content.
    pub fn verify_hash(&self) -> bool {
        self.hash.len() == APPEND_ONLY_HASH_LENGTH && self.hash == sha256_32(&self.data)
    }

    /// The store key derived from the declared hash bytes.
    pub fn storage_hash(&self) -> Result<StorageHash, CodecError> {
        StorageHash::from_slice(&self.hash)
            .map_err(|_| CodecError::InvalidPayload("append-only hash must be 32 bytes"))
    }

    /// Whether the self-reported date falls inside the declared tolerance
    /// window around `now`. Payloads without a tolerance always pass.
    pub fn is_date_in_tolerance(&self, now: TimestampMs) -> bool {
        match (self.date, self.date_tolerance_ms) {
            (Some(date), Some(tolerance)) => (now - date).abs() <= tolerance,
            _ => true,
        }
    }

    /// Date-sorted payloads carry both a date and an item cap.
    pub fn date_sorted(&self) -> Option<(TimestampMs, usize)> {
        match (self.date, self.max_items) {
            (Some(date), Some(max_items)) => Some((date, max_items)),
            _ => None,
        }
    }

    /// Serialized size used by the response size budget.
    pub fn encoded_len(&self) -> Result<usize, CodecError> {
        encode_cbor(self).map(|bytes| bytes.len())
    }
}

/// Mutable network state owned by a keypair; wrapped in a signed
/// [`crate::entry::ProtectedStorageEntry`] for replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedPayload {
    /// Opaque application content bytes.
    pub data: Vec<u8>,
    /// Public key entitled to add/refresh/remove this payload.
    pub owner_pubkey: [u8; 32],
    /// Time-to-live after which the entry expires without a refresh.
    pub ttl_ms: i64,
    pub priority: ResponsePriority,
    /// Once removed, the payload hash is banned from future adds.
    pub add_once: bool,
    /// Written through to the protected-entry store on disk.
    pub persistable: bool,
    /// Set when entry liveness is tied to this owner address being online.
    pub owner_address: Option<NodeAddress>,
    /// Mailbox receiver; only this key may issue the remove.
    pub receiver_pubkey: Option<[u8; 32]>,
    /// Capabilities a peer must support to receive this payload.
    pub required_capabilities: CapabilitySet,
}

impl ProtectedPayload {
    /// Creates a minimal low-priority payload owned by `owner_pubkey`.
    pub fn new(data: Vec<u8>, owner_pubkey: [u8; 32], ttl_ms: i64) -> Self {
        Self {
            data,
            owner_pubkey,
            ttl_ms,
            priority: ResponsePriority::Low,
            add_once: false,
            persistable: false,
            owner_address: None,
            receiver_pubkey: None,
            required_capabilities: CapabilitySet::default(),
        }
    }

    /// Canonical encoding used for hashing and signature digests.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode_cbor(self)
    }

    /// The store key: SHA-256 over the canonical encoding.
    pub fn storage_hash(&self) -> Result<StorageHash, CodecError> {
        Ok(StorageHash::of(&self.canonical_bytes()?))
    }
}

pub(crate) fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::{AppendOnlyPayload, ProtectedPayload, ResponsePriority};

    #[test]
    fn new_append_only_payload_verifies_its_own_hash() {
        let payload = AppendOnlyPayload::new("trade-stats", b"content".to_vec());
        assert!(payload.verify_hash());
        assert!(payload.storage_hash().is_ok());
    }

    #[test]
    fn verify_hash_rejects_tampered_content() {
        let mut payload = AppendOnlyPayload::new("trade-stats", b"content".to_vec());
        payload.data = b"tampered".to_vec();
        assert!(!payload.verify_hash());
    }

    #[test]
    fn verify_hash_rejects_short_hash() {
        let mut payload = AppendOnlyPayload::new("trade-stats", b"content".to_vec());
        payload.hash.truncate(20);
        assert!(!payload.verify_hash());
        assert!(payload.storage_hash().is_err());
    }

    #[test]
    fn date_tolerance_is_a_symmetric_window() {
        let mut payload = AppendOnlyPayload::new("trade-stats", b"dated".to_vec());
        payload.date = Some(10_000);
        payload.date_tolerance_ms = Some(1_000);

        assert!(payload.is_date_in_tolerance(10_500));
        assert!(payload.is_date_in_tolerance(9_500));
        assert!(!payload.is_date_in_tolerance(11_001));
        assert!(!payload.is_date_in_tolerance(8_999));
    }

    #[test]
    fn payload_without_tolerance_always_passes_date_check() {
        let payload = AppendOnlyPayload::new("trade-stats", b"undated".to_vec());
        assert!(payload.is_date_in_tolerance(i64::MAX));
    }

    #[test]
    fn date_sorted_requires_both_date_and_cap() {
        let mut payload = AppendOnlyPayload::new("trade-stats", b"sorted".to_vec());
        assert!(payload.date_sorted().is_none());
        payload.date = Some(42);
        assert!(payload.date_sorted().is_none());
        payload.max_items = Some(100);
        assert_eq!(payload.date_sorted(), Some((42, 100)));
    }

    #[test]
    fn protected_payload_hash_changes_with_content() {
        let a = ProtectedPayload::new(b"offer-a".to_vec(), [0x11; 32], 60_000);
        let b = ProtectedPayload::new(b"offer-b".to_vec(), [0x11; 32], 60_000);
        let hash_a = a.storage_hash().expect("hash should compute");
        let hash_b = b.storage_hash().expect("hash should compute");
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn protected_payload_hash_is_deterministic() {
        let payload = ProtectedPayload::new(b"offer".to_vec(), [0x22; 32], 60_000);
        assert_eq!(
            payload.storage_hash().expect("hash should compute"),
            payload.storage_hash().expect("hash should compute"),
        );
    }

    #[test]
    fn default_priority_is_low() {
        let payload = AppendOnlyPayload::new("trade-stats", Vec::new());
        assert_eq!(payload.priority, ResponsePriority::Low);
    }
}
