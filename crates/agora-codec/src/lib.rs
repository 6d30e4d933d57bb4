//! Wire codec and data model for the agora storage network.
//!
//! Defines the payload model (append-only and owner-protected), the signed
//! storage entry schema, canonical CBOR encoding, and the message envelope
//! exchanged between peers.

pub mod entry;
pub mod error;
pub mod messages;
pub mod payload;

pub use entry::{signature_digest, ProtectedStorageEntry, Signature};
pub use error::CodecError;
pub use messages::Envelope;
pub use payload::{AppendOnlyPayload, ProtectedPayload, ResponsePriority};
