//! Core agora primitives shared across crates.
//!
//! Includes the storage hash type, clock abstraction, peer addressing, and
//! capability types.

pub mod clock;
pub mod error;
pub mod hash;
pub mod types;

pub use hash::StorageHash;
pub use types::{Capability, CapabilitySet, NodeAddress, SequenceNumber, TimestampMs};
