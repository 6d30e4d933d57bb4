use agora_core::{NodeAddress, SequenceNumber, StorageHash};
use serde::{Deserialize, Serialize};

use crate::entry::{ProtectedStorageEntry, Signature};
use crate::error::CodecError;
use crate::payload::{encode_cbor, AppendOnlyPayload};

/// Broadcast add of a protected storage entry (regular or mailbox).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDataMessage {
    pub entry: ProtectedStorageEntry,
}

/// Broadcast remove of a regular protected storage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDataMessage {
    pub entry: ProtectedStorageEntry,
}

/// Broadcast remove of a mailbox entry, issued by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMailboxDataMessage {
    pub entry: ProtectedStorageEntry,
}

/// TTL refresh for an already-replicated entry: a new sequence number and a
/// fresh signature, addressed by payload hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTtlMessage {
    /// Digest of `(payload, sequence_number)` the signature covers.
    pub signed_digest: [u8; 32],
    pub signature: Signature,
    pub payload_hash: StorageHash,
    pub sequence_number: SequenceNumber,
}

/// Broadcast add of a content-addressed append-only payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAppendOnlyPayloadMessage {
    pub payload: AppendOnlyPayload,
}

/// First reconciliation request after boot, before our own address is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreliminaryGetDataRequest {
    pub nonce: u32,
    /// Hashes the requester already holds; the responder skips them.
    pub excluded_keys: Vec<StorageHash>,
    /// Requester protocol version; legacy peers send nothing and receive
    /// all historical data.
    pub version: Option<u32>,
}

/// Follow-up reconciliation request carrying the requester's address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUpdatedDataRequest {
    pub sender: NodeAddress,
    pub nonce: u32,
    pub excluded_keys: Vec<StorageHash>,
    pub version: Option<u32>,
}

/// Reconciliation response: everything the responder holds that the
/// requester did not exclude, subject to priority/size truncation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataResponse {
    pub protected_entries: Vec<ProtectedStorageEntry>,
    pub append_only_payloads: Vec<AppendOnlyPayload>,
    pub nonce: u32,
    pub is_get_updated_data_response: bool,
    /// Set when any truncation step dropped data; signals the requester to
    /// retry its initial sync.
    pub was_truncated: bool,
}

/// Wire envelope for every message the storage core produces or consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    Add(AddDataMessage),
    Remove(RemoveDataMessage),
    RemoveMailbox(RemoveMailboxDataMessage),
    RefreshTtl(RefreshTtlMessage),
    AddAppendOnly(AddAppendOnlyPayloadMessage),
    PreliminaryGetDataRequest(PreliminaryGetDataRequest),
    GetUpdatedDataRequest(GetUpdatedDataRequest),
    GetDataResponse(GetDataResponse),
}

impl Envelope {
    /// Whether this message is re-gossiped to the peer set on acceptance.
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            Envelope::Add(_)
                | Envelope::Remove(_)
                | Envelope::RemoveMailbox(_)
                | Envelope::RefreshTtl(_)
                | Envelope::AddAppendOnly(_)
        )
    }

    /// Validates schema and field consistency.
    pub fn validate(&self) -> Result<(), CodecError> {
        match self {
            Envelope::Remove(msg) if msg.entry.is_mailbox() => Err(CodecError::InvalidMessage(
                "mailbox entries must use the mailbox remove message",
            )),
            Envelope::RemoveMailbox(msg) if !msg.entry.is_mailbox() => Err(
                CodecError::InvalidMessage("mailbox remove requires a receiver key"),
            ),
            Envelope::AddAppendOnly(msg) if !msg.payload.verify_hash() => Err(
                CodecError::InvalidMessage("append-only payload hash does not match content"),
            ),
            _ => Ok(()),
        }
    }
}

/// Encodes an envelope as CBOR after validation.
pub fn encode_envelope_cbor(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    envelope.validate()?;
    encode_cbor(envelope)
}

/// Decodes and validates a CBOR envelope.
pub fn decode_envelope_cbor(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let envelope: Envelope =
        ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    envelope.validate()?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use agora_core::StorageHash;
    use agora_crypto::{Ed25519Signer, Signer};

    use super::{
        decode_envelope_cbor, encode_envelope_cbor, AddAppendOnlyPayloadMessage, AddDataMessage,
        Envelope, PreliminaryGetDataRequest, RemoveDataMessage, RemoveMailboxDataMessage,
    };
    use crate::entry::{signature_digest, ProtectedStorageEntry, Signature};
    use crate::payload::{AppendOnlyPayload, ProtectedPayload};

    fn sample_entry(mailbox: bool) -> ProtectedStorageEntry {
        let signer = Ed25519Signer::from_secret([0x42; 32]);
        let mut payload = ProtectedPayload::new(b"offer".to_vec(), signer.public_key(), 60_000);
        if mailbox {
            payload.receiver_pubkey = Some([0x55; 32]);
        }
        let digest = signature_digest(&payload, 1).expect("digest should compute");
        let sig = signer.sign(&digest).expect("sign should succeed");
        if mailbox {
            ProtectedStorageEntry::new_mailbox(
                payload,
                signer.public_key(),
                1,
                Signature(sig),
                1_000,
                [0x55; 32],
            )
        } else {
            ProtectedStorageEntry::new(payload, signer.public_key(), 1, Signature(sig), 1_000)
        }
    }

    #[test]
    fn envelope_round_trip() {
        let envelope = Envelope::Add(AddDataMessage {
            entry: sample_entry(false),
        });
        let bytes = encode_envelope_cbor(&envelope).expect("envelope should encode");
        let decoded = decode_envelope_cbor(&bytes).expect("envelope should decode");
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn mailbox_entry_in_plain_remove_is_rejected() {
        let envelope = Envelope::Remove(RemoveDataMessage {
            entry: sample_entry(true),
        });
        assert!(encode_envelope_cbor(&envelope).is_err());
    }

    #[test]
    fn plain_entry_in_mailbox_remove_is_rejected() {
        let envelope = Envelope::RemoveMailbox(RemoveMailboxDataMessage {
            entry: sample_entry(false),
        });
        assert!(encode_envelope_cbor(&envelope).is_err());
    }

    #[test]
    fn append_only_message_with_bad_hash_is_rejected() {
        let mut payload = AppendOnlyPayload::new("trade-stats", b"content".to_vec());
        payload.hash[0] ^= 0x01;
        let envelope = Envelope::AddAppendOnly(AddAppendOnlyPayloadMessage { payload });
        assert!(encode_envelope_cbor(&envelope).is_err());
    }

    #[test]
    fn requests_are_broadcast_neutral() {
        let request = Envelope::PreliminaryGetDataRequest(PreliminaryGetDataRequest {
            nonce: 7,
            excluded_keys: vec![StorageHash::of(b"known")],
            version: Some(1),
        });
        assert!(!request.is_broadcast());

        let add = Envelope::Add(AddDataMessage {
            entry: sample_entry(false),
        });
        assert!(add.is_broadcast());
    }
}
