//! End-to-end reconciliation between a responder and a fresh requester:
//! exclude-by-hash filtering, capability gating, process-once semantics,
//! and the delayed high-priority rebroadcast.

use std::sync::Arc;

use agora_codec::entry::{signature_digest, Signature};
use agora_codec::messages::Envelope;
use agora_codec::{AppendOnlyPayload, ProtectedPayload, ProtectedStorageEntry, ResponsePriority};
use agora_core::clock::{Clock, SimClock};
use agora_core::{Capability, CapabilitySet, NodeAddress};
use agora_crypto::{Ed25519Signer, Ed25519Verifier, Signer};
use agora_net::{Broadcaster, RecordingBroadcaster};
use agora_store::{DataStore, StoreConfig};
use agora_sync::{
    build_get_data_response, build_preliminary_request, build_updated_request, GetDataRequestView,
    ResponseIngest,
};

const TTL_MS: i64 = 600_000;
const START_MS: i64 = 1_000_000;

struct Node {
    store: Arc<DataStore>,
    clock: Arc<SimClock>,
    broadcaster: Arc<RecordingBroadcaster>,
}

fn node() -> Node {
    let clock = Arc::new(SimClock::new(START_MS));
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let store = Arc::new(DataStore::new(
        StoreConfig::default(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&broadcaster) as Arc<dyn Broadcaster>,
        Ed25519Verifier,
    ));
    Node {
        store,
        clock,
        broadcaster,
    }
}

fn signed_entry(
    signer: &Ed25519Signer,
    data: &[u8],
    seq: u32,
    creation_ts: i64,
) -> ProtectedStorageEntry {
    let payload = ProtectedPayload::new(data.to_vec(), signer.public_key(), TTL_MS);
    let digest = signature_digest(&payload, seq).expect("digest should compute");
    let sig = signer.sign(&digest).expect("sign should succeed");
    ProtectedStorageEntry::new(
        payload,
        signer.public_key(),
        seq,
        Signature(sig),
        creation_ts,
    )
}

fn seed() -> NodeAddress {
    NodeAddress::new("seed.onion", 8000)
}

fn all_capabilities() -> CapabilitySet {
    CapabilitySet::new([
        Capability::TradeStatistics,
        Capability::AccountWitness,
        Capability::Mediation,
        Capability::RefundAgency,
        Capability::SignedWitness,
    ])
}

#[test]
fn preliminary_sync_transfers_full_state_without_fanout() {
    let responder = node();
    let requester = node();
    let signer = Ed25519Signer::from_secret([0x42; 32]);

    let entry = signed_entry(&signer, b"offer-1", 1, START_MS);
    let entry_hash = entry.storage_hash().expect("hash should compute");
    assert!(responder.store.add_protected_entry(entry, None, false));

    let stats = AppendOnlyPayload::new("trade-stats", b"stat-1".to_vec());
    let stats_hash = stats.storage_hash().expect("hash should compute");
    assert!(responder
        .store
        .add_append_only_payload(stats, None, false, false, false));

    let request = build_preliminary_request(&requester.store, 7);
    let response = build_get_data_response(
        &responder.store,
        &GetDataRequestView::from(&request),
        1_000,
        &all_capabilities(),
    );
    assert_eq!(response.nonce, 7);
    assert!(!response.is_get_updated_data_response);
    assert!(!response.was_truncated);

    let ingest = ResponseIngest::new(
        Arc::clone(&requester.store),
        Arc::clone(&requester.broadcaster) as Arc<dyn Broadcaster>,
    );
    ingest.process_get_data_response(response, &seed());

    assert!(ingest.initial_request_applied());
    assert!(requester.store.contains(&entry_hash));
    assert!(requester
        .store
        .append_only_contains("trade-stats", &stats_hash));
    // Only connected to the seed: nothing is re-gossiped during ingest.
    assert_eq!(requester.broadcaster.sent_count(), 0);
}

#[test]
fn excluded_hashes_are_not_sent_again() {
    let responder = node();
    let requester = node();
    let signer = Ed25519Signer::from_secret([0x42; 32]);

    let shared = signed_entry(&signer, b"shared-offer", 1, START_MS);
    let missing = signed_entry(&signer, b"missing-offer", 1, START_MS);
    let missing_hash = missing.storage_hash().expect("hash should compute");
    assert!(responder
        .store
        .add_protected_entry(shared.clone(), None, false));
    assert!(responder.store.add_protected_entry(missing, None, false));
    assert!(requester.store.add_protected_entry(shared, None, false));

    let request = build_updated_request(&requester.store, NodeAddress::new("me.onion", 1), 9);
    let response = build_get_data_response(
        &responder.store,
        &GetDataRequestView::from(&request),
        1_000,
        &all_capabilities(),
    );

    assert!(response.is_get_updated_data_response);
    assert_eq!(response.protected_entries.len(), 1);
    assert_eq!(
        response.protected_entries[0]
            .storage_hash()
            .expect("hash should compute"),
        missing_hash
    );
}

#[test]
fn capability_gated_payloads_are_withheld() {
    let responder = node();
    let mut gated = AppendOnlyPayload::new("trade-stats", b"gated".to_vec());
    gated.required_capabilities = CapabilitySet::new([Capability::TradeStatistics]);
    assert!(responder
        .store
        .add_append_only_payload(gated, None, false, false, false));

    let excluded = Vec::new();
    let view = GetDataRequestView {
        nonce: 1,
        excluded_keys: &excluded,
        version: Some(1),
        is_updated: false,
    };

    let capable = build_get_data_response(
        &responder.store,
        &view,
        1_000,
        &CapabilitySet::new([Capability::TradeStatistics]),
    );
    assert_eq!(capable.append_only_payloads.len(), 1);

    let incapable =
        build_get_data_response(&responder.store, &view, 1_000, &CapabilitySet::default());
    assert!(incapable.append_only_payloads.is_empty());
    assert!(!incapable.was_truncated);
}

#[test]
fn process_once_payloads_apply_once_unless_truncated() {
    let requester = node();
    let ingest = ResponseIngest::new(
        Arc::clone(&requester.store),
        Arc::clone(&requester.broadcaster) as Arc<dyn Broadcaster>,
    );

    let mut first = AppendOnlyPayload::new("trade-stats", b"initial".to_vec());
    first.process_once = true;
    let first_hash = first.storage_hash().expect("hash should compute");

    let mut late = AppendOnlyPayload::new("trade-stats", b"late".to_vec());
    late.process_once = true;
    let late_hash = late.storage_hash().expect("hash should compute");

    let mut retried = AppendOnlyPayload::new("trade-stats", b"retried".to_vec());
    retried.process_once = true;
    let retried_hash = retried.storage_hash().expect("hash should compute");

    ingest.process_get_data_response(response_with(vec![first]), &seed());
    assert!(requester
        .store
        .append_only_contains("trade-stats", &first_hash));

    // A later untruncated response must not re-apply process-once data.
    ingest.process_get_data_response(response_with(vec![late]), &seed());
    assert!(!requester
        .store
        .append_only_contains("trade-stats", &late_hash));

    // A truncated response signals an incomplete first pass.
    let mut truncated = response_with(vec![retried]);
    truncated.was_truncated = true;
    ingest.process_get_data_response(truncated, &seed());
    assert!(requester
        .store
        .append_only_contains("trade-stats", &retried_hash));
}

fn response_with(payloads: Vec<AppendOnlyPayload>) -> agora_codec::messages::GetDataResponse {
    agora_codec::messages::GetDataResponse {
        protected_entries: Vec::new(),
        append_only_payloads: payloads,
        nonce: 1,
        is_get_updated_data_response: false,
        was_truncated: false,
    }
}

#[test]
fn high_priority_entries_are_rebroadcast_after_the_delay() {
    let requester = node();
    let ingest = ResponseIngest::new(
        Arc::clone(&requester.store),
        Arc::clone(&requester.broadcaster) as Arc<dyn Broadcaster>,
    );
    let signer = Ed25519Signer::from_secret([0x42; 32]);

    let mut entry = signed_entry(&signer, b"urgent-offer", 1, START_MS);
    entry.payload.priority = ResponsePriority::High;
    // Re-sign: priority is part of the payload encoding.
    let digest = signature_digest(&entry.payload, 1).expect("digest should compute");
    entry.signature = Signature(signer.sign(&digest).expect("sign should succeed"));

    let mut response = response_with(Vec::new());
    response.protected_entries = vec![entry];
    ingest.process_get_data_response(response, &seed());

    assert_eq!(ingest.pending_rebroadcast_count(), 1);
    assert_eq!(requester.broadcaster.sent_count(), 0);

    // Not due yet.
    requester.clock.advance(30_000);
    assert_eq!(ingest.broadcast_due_rebroadcasts(), 0);

    requester.clock.advance(30_001);
    assert_eq!(ingest.broadcast_due_rebroadcasts(), 1);
    assert_eq!(ingest.pending_rebroadcast_count(), 0);

    let sent = requester.broadcaster.take_sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(sent[0].0, Envelope::Add(_)));
    assert_eq!(sent[0].1.as_ref(), Some(&seed()));
}

#[test]
fn response_is_deterministic_for_fixed_inputs() {
    let responder = node();
    let signer = Ed25519Signer::from_secret([0x42; 32]);
    for i in 0..20_u8 {
        let entry = signed_entry(&signer, &[b'o', i], 1, START_MS);
        assert!(responder.store.add_protected_entry(entry, None, false));
        let payload = AppendOnlyPayload::new("trade-stats", vec![b's', i]);
        assert!(responder
            .store
            .add_append_only_payload(payload, None, false, false, false));
    }

    let excluded = Vec::new();
    let view = GetDataRequestView {
        nonce: 3,
        excluded_keys: &excluded,
        version: Some(1),
        is_updated: false,
    };

    let first = build_get_data_response(&responder.store, &view, 10, &all_capabilities());
    let second = build_get_data_response(&responder.store, &view, 10, &all_capabilities());
    assert_eq!(first, second);
    assert!(first.was_truncated);
    assert_eq!(first.protected_entries.len(), 10);
    assert_eq!(first.append_only_payloads.len(), 10);
}
