//! Ordering-stable 64-bit ids for transactions and operations.
//!
//! ```text
//! | 32 bits: ledger sequence | 20 bits: tx order | 12 bits: operation slot |
//! ```
//!
//! - **Ledger**: the sequence the transaction closes into
//! - **Tx order**: 1-based position of the transaction within that ledger
//! - **Operation slot**: 0 for the transaction itself, `index + 1` for its operations
//!
//! Ids compare in commit order, so they double as paging tokens.

/// Number of bits for the operation slot.
pub const OPERATION_BITS: u32 = 12;

/// Number of bits for the transaction order within a ledger.
pub const TX_ORDER_BITS: u32 = 20;

const LEDGER_SHIFT: u32 = OPERATION_BITS + TX_ORDER_BITS;

/// Largest transaction order that fits in a ledger.
pub const MAX_TX_ORDER: i64 = (1 << TX_ORDER_BITS) - 1;

/// Hard cap on operations per transaction.
pub const MAX_OPERATIONS: usize = 100;

/// Id of the `order`-th transaction (1-based) in `ledger`.
pub fn transaction_id(ledger: i64, order: i64) -> i64 {
    (ledger << LEDGER_SHIFT) | (order << OPERATION_BITS)
}

/// Id of the operation at `index` (0-based) within transaction `tx_id`.
pub fn operation_id(tx_id: i64, index: usize) -> i64 {
    tx_id + index as i64 + 1
}

/// Lowest id belonging to `ledger`; every id of `ledger - 1` is below it.
pub fn ledger_floor(ledger: i64) -> i64 {
    ledger << LEDGER_SHIFT
}

/// Ledger component of an id.
pub fn ledger_of(id: i64) -> i64 {
    id >> LEDGER_SHIFT
}

/// Transaction order component of an id.
pub fn tx_order_of(id: i64) -> i64 {
    (id >> OPERATION_BITS) & MAX_TX_ORDER
}

/// Transaction id an operation id belongs to.
pub fn transaction_of(operation_id: i64) -> i64 {
    operation_id & !((1 << OPERATION_BITS) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let id = transaction_id(7, 3);
        assert_eq!(ledger_of(id), 7);
        assert_eq!(tx_order_of(id), 3);

        let op = operation_id(id, 4);
        assert_eq!(transaction_of(op), id);
        assert_eq!(op - id, 5);
    }

    #[test]
    fn test_ids_order_by_ledger_then_tx() {
        let last_in_ledger_2 = operation_id(transaction_id(2, MAX_TX_ORDER), MAX_OPERATIONS - 1);
        let first_in_ledger_3 = transaction_id(3, 1);
        assert!(last_in_ledger_2 < ledger_floor(3));
        assert!(ledger_floor(3) < first_in_ledger_3);
        assert!(transaction_id(3, 1) < transaction_id(3, 2));
    }
}
