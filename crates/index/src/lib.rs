//! # Horizon Index
//!
//! The write and read paths over a [`horizon_store::HistoryStore`]:
//!
//! - [`TransactionIndexer`]: commit, ledger close, genesis and chain audit
//! - [`SubmissionGateway`]: the submission state machine in front of the indexer
//! - [`QueryEngine`]: cursor-paged reads

pub mod effects;
pub mod gateway;
pub mod indexer;
pub mod query;

pub use effects::plan_transaction;
pub use gateway::{RejectReason, Rejection, SubmissionGateway, SubmissionOutcome, SubmissionState};
pub use indexer::{AuditReport, NetworkSettings, TransactionIndexer, ValidatedTransaction};
pub use query::QueryEngine;
