use serde::{Deserialize, Serialize};

/// Why a peer connection closed. Only unintended drops trigger back-dating
/// of entries whose owner was the disconnected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    pub is_intended: bool,
}

impl CloseReason {
    pub const INTENDED: Self = Self { is_intended: true };
    pub const DROPPED: Self = Self { is_intended: false };
}

#[cfg(test)]
mod tests {
    use super::CloseReason;

    #[test]
    fn constants_carry_intent() {
        assert!(CloseReason::INTENDED.is_intended);
        assert!(!CloseReason::DROPPED.is_intended);
    }
}
