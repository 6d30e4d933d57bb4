use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Owner-chosen monotonic version of one protected payload.
pub type SequenceNumber = u32;

/// Wall-clock milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Network address of a peer node. Hosts may be onion-style names and are
/// treated as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Optional protocol feature a peer may support. Payloads can require
/// capabilities, in which case they are withheld from peers lacking them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    TradeStatistics,
    AccountWitness,
    Mediation,
    RefundAgency,
    SignedWitness,
}

/// Set of capabilities advertised by a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self(capabilities.into_iter().collect())
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Whether every capability in `required` is present.
    pub fn contains_all(&self, required: &CapabilitySet) -> bool {
        required.0.is_subset(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, CapabilitySet, NodeAddress};

    #[test]
    fn node_address_displays_host_and_port() {
        let addr = NodeAddress::new("abcdefgh.onion", 9999);
        assert_eq!(addr.to_string(), "abcdefgh.onion:9999");
    }

    #[test]
    fn contains_all_requires_subset() {
        let peer = CapabilitySet::new([Capability::TradeStatistics, Capability::Mediation]);
        let required = CapabilitySet::new([Capability::Mediation]);
        assert!(peer.contains_all(&required));

        let missing = CapabilitySet::new([Capability::RefundAgency]);
        assert!(!peer.contains_all(&missing));
    }

    #[test]
    fn empty_requirement_is_always_satisfied() {
        let peer = CapabilitySet::default();
        assert!(peer.contains_all(&CapabilitySet::default()));
    }
}
