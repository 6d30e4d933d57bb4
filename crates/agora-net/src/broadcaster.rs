use agora_codec::Envelope;
use agora_core::NodeAddress;
use parking_lot::Mutex;

/// Best-effort fan-out contract used by the storage core to re-gossip
/// accepted mutations. Implementations deliver to the peer set minus the
/// excluded sender; delivery is not guaranteed.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, message: Envelope, exclude: Option<&NodeAddress>);
}

/// Broadcaster that drops everything. Useful when ingesting seed-node data
/// where fan-out is pointless.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn broadcast(&self, _message: Envelope, _exclude: Option<&NodeAddress>) {}
}

/// In-memory broadcaster for tests; records every requested broadcast.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<(Envelope, Option<NodeAddress>)>>,
}

impl RecordingBroadcaster {
    /// Drains and returns all recorded broadcasts.
    pub fn take_sent(&self) -> Vec<(Envelope, Option<NodeAddress>)> {
        std::mem::take(&mut self.sent.lock())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, message: Envelope, exclude: Option<&NodeAddress>) {
        self.sent.lock().push((message, exclude.cloned()));
    }
}

#[cfg(test)]
mod tests {
    use agora_codec::messages::{AddAppendOnlyPayloadMessage, Envelope};
    use agora_codec::AppendOnlyPayload;
    use agora_core::NodeAddress;

    use super::{Broadcaster, NullBroadcaster, RecordingBroadcaster};

    fn sample_message() -> Envelope {
        Envelope::AddAppendOnly(AddAppendOnlyPayloadMessage {
            payload: AppendOnlyPayload::new("trade-stats", b"payload".to_vec()),
        })
    }

    #[test]
    fn recording_broadcaster_captures_message_and_exclusion() {
        let broadcaster = RecordingBroadcaster::default();
        let sender = NodeAddress::new("peer-a", 1000);
        broadcaster.broadcast(sample_message(), Some(&sender));

        let sent = broadcaster.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Some(sender));
        assert!(broadcaster.take_sent().is_empty());
    }

    #[test]
    fn null_broadcaster_silently_drops() {
        NullBroadcaster.broadcast(sample_message(), None);
    }
}
