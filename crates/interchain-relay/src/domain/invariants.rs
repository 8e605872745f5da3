//! # Domain Invariants
//!
//! Rules checked by the scanner and submitter.

use super::entities::DispatchedMessage;
use super::errors::RelayError;
use super::value_objects::{Checkpoint, DomainId};

/// Invariant: a message read from a domain's log originates from that domain.
pub fn invariant_origin_matches(
    message: &DispatchedMessage,
    scanned: DomainId,
) -> Result<(), RelayError> {
    if message.origin != scanned {
        return Err(RelayError::MalformedMessage {
            domain: scanned,
            origin_tx: message.origin_tx,
            reason: format!(
                "message claims origin {} but was read from domain {}",
                message.origin, scanned
            ),
        });
    }
    Ok(())
}

/// Invariant: checkpoints never move backwards.
pub fn invariant_checkpoint_monotonic(current: Checkpoint, proposed: Checkpoint) -> bool {
    proposed >= current
}

/// Invariant: a delivery is final once it has the domain's confirmations.
pub fn invariant_sufficient_confirmations(confirmations: u64, required: u64) -> bool {
    confirmations >= required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogPosition;
    use primitive_types::H256;

    fn message_from(origin: u32) -> DispatchedMessage {
        DispatchedMessage {
            id: H256::zero(),
            version: 0,
            nonce: 0,
            origin: DomainId(origin),
            sender: H256::zero(),
            destination: DomainId(2),
            recipient: H256::zero(),
            body: vec![],
            origin_tx: H256::repeat_byte(7),
            position: LogPosition(0),
        }
    }

    #[test]
    fn test_origin_matches() {
        assert!(invariant_origin_matches(&message_from(1), DomainId(1)).is_ok());
    }

    #[test]
    fn test_origin_mismatch_is_malformed() {
        let result = invariant_origin_matches(&message_from(3), DomainId(1));
        assert!(matches!(
            result,
            Err(RelayError::MalformedMessage { domain: DomainId(1), .. })
        ));
    }

    #[test]
    fn test_checkpoint_monotonic() {
        let cp = Checkpoint::at(LogPosition(5));
        assert!(invariant_checkpoint_monotonic(cp, cp));
        assert!(invariant_checkpoint_monotonic(cp, Checkpoint::at(LogPosition(6))));
        assert!(!invariant_checkpoint_monotonic(cp, Checkpoint::GENESIS));
    }

    #[test]
    fn test_sufficient_confirmations() {
        assert!(invariant_sufficient_confirmations(1, 1));
        assert!(!invariant_sufficient_confirmations(0, 1));
    }
}
