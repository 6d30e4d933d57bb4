use agora_codec::messages::{GetUpdatedDataRequest, PreliminaryGetDataRequest};
use agora_core::NodeAddress;
use agora_store::DataStore;

/// Protocol version advertised in our own requests; responders use it to
/// skip historical data we already shipped with.
pub const PROTOCOL_VERSION: u32 = 1;

/// Freshly generated request nonce.
pub fn new_nonce() -> u32 {
    rand::random()
}

/// Builds the first reconciliation request after boot. The excluded set
/// carries every hash known locally so the responder only sends what we
/// miss.
pub fn build_preliminary_request(store: &DataStore, nonce: u32) -> PreliminaryGetDataRequest {
    PreliminaryGetDataRequest {
        nonce,
        excluded_keys: store.known_payload_hashes(),
        version: Some(PROTOCOL_VERSION),
    }
}

/// Builds the follow-up request carrying our own address.
pub fn build_updated_request(
    store: &DataStore,
    sender: NodeAddress,
    nonce: u32,
) -> GetUpdatedDataRequest {
    GetUpdatedDataRequest {
        sender,
        nonce,
        excluded_keys: store.known_payload_hashes(),
        version: Some(PROTOCOL_VERSION),
    }
}
