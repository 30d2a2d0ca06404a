//! Hash chain utilities for ledger integrity

use crate::model::Ledger;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// `prev_hash` of ledger 1
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// SHA256 of the network passphrase; prefixes every transaction hash
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// Hex SHA256 of `network_id || payload`
pub fn transaction_hash(network_id: &[u8; 32], payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(network_id);
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Calculate the hash of a ledger header (excluding the hash field itself)
/// over the hashes of its transactions in id order.
pub fn ledger_hash(ledger: &Ledger, tx_hashes: &[String]) -> String {
    let mut hasher = Sha256::new();

    hasher.update(ledger.sequence.to_be_bytes());
    hasher.update(ledger.prev_hash.as_bytes());
    hasher.update(ledger.transaction_count.to_be_bytes());
    hasher.update(ledger.operation_count.to_be_bytes());
    hasher.update(ledger.closed_at.to_rfc3339().as_bytes());
    hasher.update(ledger.total_coins.to_string().as_bytes());
    hasher.update(ledger.fee_pool.to_string().as_bytes());
    hasher.update(ledger.base_fee.to_be_bytes());
    hasher.update(ledger.base_reserve.to_string().as_bytes());

    for hash in tx_hashes {
        hasher.update(hash.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Check that `next` may follow `last` (or open the chain when `last` is None)
pub fn check_link(last: Option<&Ledger>, next: &Ledger) -> Result<(), ChainError> {
    let (expected_sequence, expected_prev) = match last {
        Some(last) => (last.sequence + 1, last.hash.as_str()),
        None => (1, ZERO_HASH),
    };

    if next.sequence != expected_sequence {
        return Err(ChainError::InvalidSequence {
            expected: expected_sequence,
            actual: next.sequence,
        });
    }

    if next.prev_hash != expected_prev {
        return Err(ChainError::BrokenLink {
            sequence: next.sequence,
            expected: expected_prev.to_string(),
            actual: next.prev_hash.clone(),
        });
    }

    if next.hash.is_empty() || next.hash == next.prev_hash {
        return Err(ChainError::InvalidHash {
            sequence: next.sequence,
            hash: next.hash.clone(),
        });
    }

    Ok(())
}

/// Verify hash chain integrity of ledgers in ascending sequence order.
///
/// The slice must start at ledger 1.
pub fn verify_chain(ledgers: &[Ledger]) -> Result<(), ChainError> {
    let mut last: Option<&Ledger> = None;
    for ledger in ledgers {
        check_link(last, ledger)?;
        last = Some(ledger);
    }
    Ok(())
}

/// Errors in hash chain verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Broken link at seq {sequence}: expected prev_hash '{expected}', got '{actual}'")]
    BrokenLink {
        sequence: i64,
        expected: String,
        actual: String,
    },

    #[error("Invalid sequence: expected {expected}, got {actual}")]
    InvalidSequence { expected: i64, actual: i64 },

    #[error("Invalid hash at seq {sequence}: '{hash}'")]
    InvalidHash { sequence: i64, hash: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use chrono::Utc;

    fn create_ledger(sequence: i64, prev_hash: &str) -> Ledger {
        let mut ledger = Ledger {
            sequence,
            hash: String::new(),
            prev_hash: prev_hash.to_string(),
            transaction_count: 0,
            operation_count: 0,
            closed_at: Utc::now(),
            total_coins: Amount::from_stroops(1_000_000_000),
            fee_pool: Amount::ZERO,
            base_fee: 100,
            base_reserve: Amount::from_stroops(5_000_000),
        };
        ledger.hash = ledger_hash(&ledger, &[]);
        ledger
    }

    fn chain(len: i64) -> Vec<Ledger> {
        let mut ledgers: Vec<Ledger> = Vec::new();
        for sequence in 1..=len {
            let prev = ledgers.last().map(|l| l.hash.clone()).unwrap_or(ZERO_HASH.to_string());
            ledgers.push(create_ledger(sequence, &prev));
        }
        ledgers
    }

    #[test]
    fn test_zero_hash_shape() {
        assert_eq!(ZERO_HASH.len(), 64);
        assert!(ZERO_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn test_hash_deterministic() {
        let ledger = create_ledger(1, ZERO_HASH);
        assert_eq!(ledger_hash(&ledger, &[]), ledger_hash(&ledger, &[]));
        assert_eq!(ledger.hash.len(), 64);
    }

    #[test]
    fn test_hash_covers_transactions() {
        let ledger = create_ledger(1, ZERO_HASH);
        assert_ne!(
            ledger_hash(&ledger, &["aa".to_string()]),
            ledger_hash(&ledger, &["bb".to_string()])
        );
    }

    #[test]
    fn test_valid_chain() {
        assert!(verify_chain(&chain(4)).is_ok());
        assert!(verify_chain(&[]).is_ok());
    }

    #[test]
    fn test_genesis_requires_zero_hash() {
        let ledger = create_ledger(1, "abc");
        assert!(matches!(
            check_link(None, &ledger),
            Err(ChainError::BrokenLink { sequence: 1, .. })
        ));
    }

    #[test]
    fn test_broken_link_detected() {
        let mut ledgers = chain(3);
        ledgers[2].prev_hash = "wrong".to_string();
        assert!(matches!(
            verify_chain(&ledgers),
            Err(ChainError::BrokenLink { sequence: 3, .. })
        ));
    }

    #[test]
    fn test_gap_detected() {
        let mut ledgers = chain(3);
        ledgers.remove(1);
        assert!(matches!(
            verify_chain(&ledgers),
            Err(ChainError::InvalidSequence { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_transaction_hash_depends_on_network() {
        let a = transaction_hash(&network_id("Test Network"), b"{}");
        let b = transaction_hash(&network_id("Public Network"), b"{}");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
