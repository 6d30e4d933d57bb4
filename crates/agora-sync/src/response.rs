use std::collections::HashSet;

use agora_codec::messages::{GetDataResponse, GetUpdatedDataRequest, PreliminaryGetDataRequest};
use agora_codec::{AppendOnlyPayload, ProtectedStorageEntry, ResponsePriority};
use agora_core::{CapabilitySet, StorageHash, TimestampMs};
use agora_store::DataStore;

/// Uniform view over both get-data request kinds.
#[derive(Debug, Clone)]
pub struct GetDataRequestView<'a> {
    pub nonce: u32,
    pub excluded_keys: &'a [StorageHash],
    pub version: Option<u32>,
    pub is_updated: bool,
}

impl<'a> From<&'a PreliminaryGetDataRequest> for GetDataRequestView<'a> {
    fn from(request: &'a PreliminaryGetDataRequest) -> Self {
        Self {
            nonce: request.nonce,
            excluded_keys: &request.excluded_keys,
            version: request.version,
            is_updated: false,
        }
    }
}

impl<'a> From<&'a GetUpdatedDataRequest> for GetDataRequestView<'a> {
    fn from(request: &'a GetUpdatedDataRequest) -> Self {
        Self {
            nonce: request.nonce,
            excluded_keys: &request.excluded_keys,
            version: request.version,
            is_updated: true,
        }
    }
}

/// Item that can be placed into a get-data response.
trait ResponseCandidate: Clone {
    fn priority(&self) -> ResponsePriority;
    /// Serialized size; un-encodable items count as infinitely large.
    fn size_bytes(&self) -> u64;
    fn date_sorted(&self) -> Option<(TimestampMs, usize)>;
    fn required_capabilities(&self) -> &CapabilitySet;
}

impl ResponseCandidate for ProtectedStorageEntry {
    fn priority(&self) -> ResponsePriority {
        self.payload.priority
    }

    fn size_bytes(&self) -> u64 {
        self.encoded_len().map(|len| len as u64).unwrap_or(u64::MAX)
    }

    fn date_sorted(&self) -> Option<(TimestampMs, usize)> {
        None
    }

    fn required_capabilities(&self) -> &CapabilitySet {
        &self.payload.required_capabilities
    }
}

impl ResponseCandidate for AppendOnlyPayload {
    fn priority(&self) -> ResponsePriority {
        self.priority
    }

    fn size_bytes(&self) -> u64 {
        self.encoded_len().map(|len| len as u64).unwrap_or(u64::MAX)
    }

    fn date_sorted(&self) -> Option<(TimestampMs, usize)> {
        self.date_sorted()
    }

    fn required_capabilities(&self) -> &CapabilitySet {
        &self.required_capabilities
    }
}

/// Whether a payload may be sent to a peer with the given capabilities.
fn should_transmit(peer_capabilities: &CapabilitySet, required: &CapabilitySet) -> bool {
    peer_capabilities.contains_all(required)
}

/// Five-step priority truncation over one candidate pool:
/// 1. all MID items;
/// 2. LOW non-date-sorted items until the size budget trips;
/// 3. if the budget still holds, LOW date-sorted items (same budget), capped
///    to the item-declared max by dropping the oldest, appended newest-first
///    so a later count cut removes the oldest;
/// 4. cut to `max_entries`;
/// 5. all HIGH items, bypassing both budgets.
fn truncate_candidates<T: ResponseCandidate>(
    candidates: &[T],
    limit_bytes: u64,
    max_entries: usize,
) -> (Vec<T>, bool) {
    let mut total_size = 0_u64;
    let mut exceeded_size_limit = false;
    let mut truncated = false;
    let mut result: Vec<T> = Vec::new();

    result.extend(
        candidates
            .iter()
            .filter(|item| item.priority() == ResponsePriority::Mid)
            .cloned(),
    );

    for item in candidates
        .iter()
        .filter(|item| item.priority() == ResponsePriority::Low && item.date_sorted().is_none())
    {
        if exceeded_size_limit {
            break;
        }
        total_size = total_size.saturating_add(item.size_bytes());
        if total_size > limit_bytes {
            exceeded_size_limit = true;
        } else {
            result.push(item.clone());
        }
    }

    if !exceeded_size_limit {
        let mut date_sorted_items: Vec<T> = Vec::new();
        for item in candidates
            .iter()
            .filter(|item| item.priority() == ResponsePriority::Low && item.date_sorted().is_some())
        {
            if exceeded_size_limit {
                break;
            }
            total_size = total_size.saturating_add(item.size_bytes());
            if total_size > limit_bytes {
                exceeded_size_limit = true;
            } else {
                date_sorted_items.push(item.clone());
            }
        }

        date_sorted_items.sort_by_key(|item| item.date_sorted().map(|(date, _)| date));
        if let Some(first) = date_sorted_items.first() {
            if let Some((_, max_items)) = first.date_sorted() {
                if date_sorted_items.len() > max_items {
                    let cut_from = date_sorted_items.len() - max_items;
                    date_sorted_items.drain(..cut_from);
                    truncated = true;
                }
            }
        }

        // Newest first, so a later count cut removes the oldest items.
        date_sorted_items.reverse();
        result.extend(date_sorted_items);
    }

    if result.len() > max_entries {
        result.truncate(max_entries);
        truncated = true;
    }

    truncated = truncated || exceeded_size_limit;

    result.extend(
        candidates
            .iter()
            .filter(|item| item.priority() == ResponsePriority::High)
            .cloned(),
    );

    (result, truncated)
}

/// Builds the response to a get-data request: everything the requester did
/// not exclude, gated by its capabilities and cut to the configured size and
/// count budgets. 25% of the byte budget goes to append-only payloads, 75%
/// to protected entries.
pub fn build_get_data_response(
    store: &DataStore,
    request: &GetDataRequestView<'_>,
    max_entries_per_type: usize,
    peer_capabilities: &CapabilitySet,
) -> GetDataResponse {
    let excluded: HashSet<StorageHash> = request.excluded_keys.iter().copied().collect();

    let mut append_only_candidates: Vec<(StorageHash, AppendOnlyPayload)> = store
        .append_only_map_for_response(request.version)
        .into_iter()
        .filter(|(hash, payload)| {
            !excluded.contains(hash)
                && should_transmit(peer_capabilities, &payload.required_capabilities)
        })
        .collect();
    // Fixed candidate order keeps the response deterministic for one input.
    append_only_candidates.sort_by_key(|(hash, _)| *hash);
    let append_only_pool: Vec<AppendOnlyPayload> = append_only_candidates
        .into_iter()
        .map(|(_, payload)| payload)
        .collect();
    let (append_only_payloads, append_only_truncated) = truncate_candidates(
        &append_only_pool,
        store.config().append_only_limit_bytes(),
        max_entries_per_type,
    );

    let mut protected_candidates: Vec<(StorageHash, ProtectedStorageEntry)> = store
        .map_snapshot()
        .into_iter()
        .filter(|(hash, entry)| {
            !excluded.contains(hash)
                && should_transmit(peer_capabilities, &entry.payload.required_capabilities)
        })
        .collect();
    protected_candidates.sort_by_key(|(hash, _)| *hash);
    let protected_pool: Vec<ProtectedStorageEntry> = protected_candidates
        .into_iter()
        .map(|(_, entry)| entry)
        .collect();
    let (protected_entries, protected_truncated) = truncate_candidates(
        &protected_pool,
        store.config().protected_limit_bytes(),
        max_entries_per_type,
    );

    GetDataResponse {
        protected_entries,
        append_only_payloads,
        nonce: request.nonce,
        is_get_updated_data_response: request.is_updated,
        was_truncated: append_only_truncated || protected_truncated,
    }
}
