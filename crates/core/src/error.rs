//! Horizon domain errors

use crate::account::AccountIdError;
use crate::amount::AmountError;
use crate::asset::AssetError;
use crate::hash::ChainError;
use crate::price::PriceError;
use thiserror::Error;

/// Coarse error category, the part of an error callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    InsufficientBalance,
    Internal,
}

/// Errors surfaced by the indexer, stores and query engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HorizonError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Sequence conflict for {account}: expected {expected}, got {actual}")]
    SequenceConflict {
        account: String,
        expected: i64,
        actual: i64,
    },

    #[error("Chain integrity violation: {0}")]
    ChainIntegrity(String),

    #[error("Duplicate transaction: {hash}")]
    Duplicate { hash: String },

    #[error("Insufficient balance for {account} in {asset}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: String,
        asset: String,
        available: String,
        requested: String,
    },

    #[error("Unknown asset {asset} for account {account}")]
    UnknownAsset { account: String, asset: String },

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Trust limit violation for {account} in {asset}: {reason}")]
    TrustLimit {
        account: String,
        asset: String,
        reason: String,
    },

    #[error("No ledgers have been closed")]
    LedgerEmpty,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HorizonError {
    /// Shorthand for [`HorizonError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        HorizonError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HorizonError::NotFound { .. } | HorizonError::LedgerEmpty => ErrorKind::NotFound,
            HorizonError::Validation(_) => ErrorKind::Validation,
            HorizonError::SequenceConflict { .. }
            | HorizonError::ChainIntegrity(_)
            | HorizonError::Duplicate { .. }
            | HorizonError::AccountExists(_)
            | HorizonError::TrustLimit { .. }
            | HorizonError::UnknownAsset { .. } => ErrorKind::Conflict,
            HorizonError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            HorizonError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<AmountError> for HorizonError {
    fn from(err: AmountError) -> Self {
        HorizonError::Validation(err.to_string())
    }
}

impl From<AssetError> for HorizonError {
    fn from(err: AssetError) -> Self {
        HorizonError::Validation(err.to_string())
    }
}

impl From<AccountIdError> for HorizonError {
    fn from(err: AccountIdError) -> Self {
        HorizonError::Validation(err.to_string())
    }
}

impl From<PriceError> for HorizonError {
    fn from(err: PriceError) -> Self {
        HorizonError::Validation(err.to_string())
    }
}

impl From<ChainError> for HorizonError {
    fn from(err: ChainError) -> Self {
        HorizonError::ChainIntegrity(err.to_string())
    }
}

pub type HorizonResult<T> = Result<T, HorizonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(HorizonError::not_found("account", "GA").kind(), ErrorKind::NotFound);
        assert_eq!(HorizonError::LedgerEmpty.kind(), ErrorKind::NotFound);
        assert_eq!(
            HorizonError::Duplicate { hash: "ab".into() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            HorizonError::SequenceConflict {
                account: "GA".into(),
                expected: 1,
                actual: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            HorizonError::ChainIntegrity("gap".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(HorizonError::Internal("db".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_parse_errors_become_validation() {
        let err: HorizonError = "x".parse::<crate::Amount>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_not_found_message() {
        let err = HorizonError::not_found("ledger", 42);
        assert_eq!(err.to_string(), "ledger not found: 42");
    }
}
