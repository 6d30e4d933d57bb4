//! Get-data reconciliation for the agora store.
//!
//! On connection, a peer sends the set of hashes it already holds; the
//! responder returns every unknown object subject to capability gating and
//! the tiered size/count truncation. Live mutations afterwards travel by
//! broadcast.

pub mod ingest;
pub mod request;
pub mod response;

pub use ingest::ResponseIngest;
pub use request::{build_preliminary_request, build_updated_request, new_nonce, PROTOCOL_VERSION};
pub use response::{build_get_data_response, GetDataRequestView};
