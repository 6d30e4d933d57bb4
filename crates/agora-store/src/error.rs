use agora_codec::CodecError;
use agora_crypto::SigningError;
use thiserror::Error;

use crate::persistence::PersistenceError;

/// Errors surfaced by owner-side store operations.
///
/// The ingress paths never return errors; every network-side rejection is a
/// boolean result.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
