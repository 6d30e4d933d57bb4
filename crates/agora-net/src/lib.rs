//! Network-facing contracts consumed by the agora storage core.
//!
//! The transport itself lives outside this workspace; the store only needs a
//! best-effort broadcast hook and the disconnect reason carried by the
//! network layer.

pub mod broadcaster;
pub mod close;

pub use broadcaster::{Broadcaster, NullBroadcaster, RecordingBroadcaster};
pub use close::CloseReason;
