//! Store errors
//!
//! Wraps sqlx failures and corrupt rows; domain rejections raised while
//! applying a commit travel through unchanged.

use horizon_core::HorizonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt {entity} record: {reason}")]
    Decode { entity: &'static str, reason: String },

    #[error(transparent)]
    Rejected(#[from] HorizonError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn decode(entity: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            entity,
            reason: reason.to_string(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Database(err) => err
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl From<StoreError> for HorizonError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(err) => err,
            other => {
                tracing::error!(error = %other, "store failure");
                HorizonError::Internal(other.to_string())
            }
        }
    }
}
