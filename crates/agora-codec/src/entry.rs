use agora_core::hash::sha256_32;
use agora_core::{SequenceNumber, StorageHash, TimestampMs};
use agora_crypto::Verifier;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CodecError;
use crate::payload::{encode_cbor, ProtectedPayload};

/// 64-byte signature wrapper for serde byte encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = <Vec<u8>>::deserialize(deserializer)?;
        if raw.len() != 64 {
            return Err(serde::de::Error::invalid_length(
                raw.len(),
                &"exactly 64 bytes",
            ));
        }

        let mut bytes = [0_u8; 64];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

#[derive(Serialize)]
struct PayloadAndSeqNr<'a> {
    payload: &'a ProtectedPayload,
    sequence_number: SequenceNumber,
}

/// Digest signed by the owner: SHA-256 over the canonical encoding of the
/// `(payload, sequence number)` pair. The same payload at different sequence
/// numbers yields different digests.
pub fn signature_digest(
    payload: &ProtectedPayload,
    sequence_number: SequenceNumber,
) -> Result<[u8; 32], CodecError> {
    let pair = PayloadAndSeqNr {
        payload,
        sequence_number,
    };
    Ok(sha256_32(&encode_cbor(&pair)?))
}

/// Owner-signed, monotonically versioned wrapper around a protected payload.
///
/// Mailbox entries additionally carry the receiver public key; only the
/// receiver may issue their remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedStorageEntry {
    pub payload: ProtectedPayload,
    pub owner_pubkey: [u8; 32],
    pub sequence_number: SequenceNumber,
    /// Signature over [`signature_digest`] of `(payload, sequence_number)`.
    pub signature: Signature,
    /// Ingress wall-clock time, locally assigned and subject to back-dating.
    pub creation_ts: TimestampMs,
    /// Present only for mailbox entries.
    pub receiver_pubkey: Option<[u8; 32]>,
}

impl ProtectedStorageEntry {
    pub fn new(
        payload: ProtectedPayload,
        owner_pubkey: [u8; 32],
        sequence_number: SequenceNumber,
        signature: Signature,
        creation_ts: TimestampMs,
    ) -> Self {
        Self {
            payload,
            owner_pubkey,
            sequence_number,
            signature,
            creation_ts,
            receiver_pubkey: None,
        }
    }

    pub fn new_mailbox(
        payload: ProtectedPayload,
        owner_pubkey: [u8; 32],
        sequence_number: SequenceNumber,
        signature: Signature,
        creation_ts: TimestampMs,
        receiver_pubkey: [u8; 32],
    ) -> Self {
        Self {
            payload,
            owner_pubkey,
            sequence_number,
            signature,
            creation_ts,
            receiver_pubkey: Some(receiver_pubkey),
        }
    }

    pub fn is_mailbox(&self) -> bool {
        self.receiver_pubkey.is_some()
    }

    /// The store key of the wrapped payload.
    pub fn storage_hash(&self) -> Result<StorageHash, CodecError> {
        self.payload.storage_hash()
    }

    /// Whether creation time plus the payload TTL lies in the past.
    pub fn is_expired(&self, now: TimestampMs) -> bool {
        self.creation_ts + self.payload.ttl_ms < now
    }

    /// Moves the creation timestamp back by half the TTL so the next
    /// expiration sweep removes the entry unless the owner refreshes it.
    pub fn back_date(&mut self) {
        self.creation_ts -= self.payload.ttl_ms / 2;
    }

    /// Compares the key that guards mutations: the receiver key for mailbox
    /// entries, the owner key otherwise.
    pub fn matches_relevant_pub_key(&self, stored: &Self) -> bool {
        match (self.receiver_pubkey, stored.receiver_pubkey) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.owner_pubkey == stored.owner_pubkey,
            _ => false,
        }
    }

    /// Validates the entry for the add path: well-formed owner key, valid
    /// signature over `(payload, sequence number)`, owner key matching the
    /// payload's declared owner, and for mailbox entries a receiver key
    /// matching the payload's declared receiver.
    pub fn is_valid_for_add(&self, verifier: &dyn Verifier) -> bool {
        if !verifier.is_well_formed(self.owner_pubkey) {
            return false;
        }
        if !self.signature_verifies(verifier, self.owner_pubkey) {
            return false;
        }
        if self.owner_pubkey != self.payload.owner_pubkey {
            return false;
        }
        match (self.receiver_pubkey, self.payload.receiver_pubkey) {
            (None, None) => true,
            (Some(entry_receiver), Some(declared_receiver)) => entry_receiver == declared_receiver,
            _ => false,
        }
    }

    /// Validates the entry for the remove path: the owner signs regular
    /// removes, the declared receiver signs mailbox removes.
    pub fn is_valid_for_remove(&self, verifier: &dyn Verifier) -> bool {
        match self.receiver_pubkey {
            Some(entry_receiver) => {
                self.payload.receiver_pubkey == Some(entry_receiver)
                    && verifier.is_well_formed(entry_receiver)
                    && self.signature_verifies(verifier, entry_receiver)
            }
            None => {
                self.owner_pubkey == self.payload.owner_pubkey
                    && verifier.is_well_formed(self.owner_pubkey)
                    && self.signature_verifies(verifier, self.owner_pubkey)
            }
        }
    }

    /// Serialized size used by the response size budget.
    pub fn encoded_len(&self) -> Result<usize, CodecError> {
        encode_cbor(self).map(|bytes| bytes.len())
    }

    fn signature_verifies(&self, verifier: &dyn Verifier, pubkey: [u8; 32]) -> bool {
        let Ok(digest) = signature_digest(&self.payload, self.sequence_number) else {
            return false;
        };
        verifier
            .verify(pubkey, &digest, self.signature.0)
            .unwrap_or(false)
    }
}
