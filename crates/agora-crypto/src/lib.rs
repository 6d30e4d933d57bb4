//! Signing primitives for owner-protected storage entries.
//!
//! The store verifies entry signatures behind the [`signing::Verifier`]
//! seam; production code uses the Ed25519 implementations.

pub mod signing;

pub use signing::{Ed25519Signer, Ed25519Verifier, Signer, SigningError, Verifier};
