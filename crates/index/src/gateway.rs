//! Submission Gateway
//!
//! Drives one envelope through the submission lifecycle:
//!
//! ```text
//! Received -> Validated -> Applied -> Committed
//!     \            \           \
//!      +------------+-----------+--> Rejected(reason)
//! ```
//!
//! `Validated` means the body decoded and passed structural checks,
//! `Applied` that it was lowered to store effects, `Committed` that the
//! store accepted those effects atomically. Malformed input never reaches
//! the store.

use crate::indexer::TransactionIndexer;
use horizon_core::toid;
use horizon_core::{HorizonError, TransactionEnvelope, TransactionRecord};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why a submission was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    Malformed,
    Duplicate,
    SequenceConflict,
    InsufficientBalance,
    UnknownAsset,
    AccountExists,
    TrustLimit,
    Internal,
}

impl RejectReason {
    pub fn from_error(error: &HorizonError) -> Self {
        match error {
            HorizonError::Validation(_) => RejectReason::Malformed,
            HorizonError::Duplicate { .. } => RejectReason::Duplicate,
            HorizonError::SequenceConflict { .. } => RejectReason::SequenceConflict,
            HorizonError::InsufficientBalance { .. } => RejectReason::InsufficientBalance,
            HorizonError::UnknownAsset { .. } => RejectReason::UnknownAsset,
            HorizonError::AccountExists(_) => RejectReason::AccountExists,
            HorizonError::TrustLimit { .. } => RejectReason::TrustLimit,
            HorizonError::NotFound { .. }
            | HorizonError::ChainIntegrity(_)
            | HorizonError::LedgerEmpty
            | HorizonError::Internal(_) => RejectReason::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Received,
    Validated,
    Applied,
    Committed,
    Rejected(RejectReason),
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Received => write!(f, "received"),
            SubmissionState::Validated => write!(f, "validated"),
            SubmissionState::Applied => write!(f, "applied"),
            SubmissionState::Committed => write!(f, "committed"),
            SubmissionState::Rejected(reason) => write!(f, "rejected({})", reason),
        }
    }
}

/// A committed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub record: TransactionRecord,
    /// Ledger the transaction closes into
    pub ledger: i64,
    pub state: SubmissionState,
}

/// A rejected submission; no state was changed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction rejected ({reason}): {error}")]
pub struct Rejection {
    pub reason: RejectReason,
    pub error: HorizonError,
}

impl Rejection {
    fn new(error: HorizonError) -> Self {
        Self {
            reason: RejectReason::from_error(&error),
            error,
        }
    }

    pub fn state(&self) -> SubmissionState {
        SubmissionState::Rejected(self.reason)
    }
}

impl From<Rejection> for HorizonError {
    fn from(rejection: Rejection) -> Self {
        rejection.error
    }
}

pub struct SubmissionGateway {
    indexer: Arc<TransactionIndexer>,
}

impl SubmissionGateway {
    pub fn new(indexer: Arc<TransactionIndexer>) -> Self {
        Self { indexer }
    }

    #[instrument(skip(self, envelope))]
    pub async fn submit(
        &self,
        envelope: &TransactionEnvelope,
    ) -> Result<SubmissionOutcome, Rejection> {
        let mut state = SubmissionState::Received;
        debug!(%state, "submission received");

        let validated = self
            .indexer
            .validate(envelope)
            .map_err(|e| reject(None, e))?;
        let hash = validated.hash.as_str();
        state = advance(hash, state, SubmissionState::Validated);

        match self.indexer.store().transaction_by_hash(hash).await {
            Ok(_) => {
                let error = HorizonError::Duplicate {
                    hash: hash.to_string(),
                };
                return Err(reject(Some(hash), error));
            }
            Err(HorizonError::NotFound { .. }) => {}
            Err(err) => return Err(reject(Some(hash), err)),
        }

        let plan = self
            .indexer
            .plan(envelope, &validated)
            .map_err(|e| reject(Some(hash), e))?;
        state = advance(hash, state, SubmissionState::Applied);

        let record = self
            .indexer
            .commit_plan(&plan)
            .await
            .map_err(|e| reject(Some(hash), e))?;
        state = advance(hash, state, SubmissionState::Committed);

        let ledger = toid::ledger_of(record.id);
        info!(hash = %record.hash, tx_id = record.id, ledger, "transaction committed");
        Ok(SubmissionOutcome {
            record,
            ledger,
            state,
        })
    }
}

fn advance(hash: &str, from: SubmissionState, to: SubmissionState) -> SubmissionState {
    debug!(hash, %from, %to, "submission transition");
    to
}

fn reject(hash: Option<&str>, error: HorizonError) -> Rejection {
    let rejection = Rejection::new(error);
    match rejection.reason {
        RejectReason::Internal => {
            warn!(hash, state = %rejection.state(), error = %rejection.error, "submission failed")
        }
        _ => info!(hash, state = %rejection.state(), error = %rejection.error, "submission rejected"),
    }
    rejection
}
