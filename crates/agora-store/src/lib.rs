//! Replicated storage core for the agora exchange network.
//!
//! Holds the in-memory map of live protected entries plus the durable side
//! stores (sequence-number ledger, removed-payloads set, append-only stores,
//! protected-entry store) and orchestrates validation, mutation, broadcast,
//! and expiration under concurrent ingress.
//!
//! Typical integration:
//! 1. Load persisted state and install it via [`store::DataStore`]'s
//!    `install_*` methods, gated by a [`readiness::ReadyLatch`].
//! 2. Register the store as the network message/disconnect listener.
//! 3. Call `on_bootstrapped` to start the [`sweeper::TtlSweeper`].

pub mod append_only;
pub mod config;
pub mod error;
pub mod listeners;
pub mod persistence;
pub mod protected;
pub mod readiness;
pub mod removed;
pub mod sequence;
pub mod store;
pub mod sweeper;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::DataStore;
