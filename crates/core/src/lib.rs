//! Horizon Core - Domain types for the ledger-chain indexer
//!
//! # Key Types
//! - `Amount`: Exact scale-7 fixed-point value
//! - `AssetKey`: (type, code, issuer) asset identity
//! - `AccountId`: Opaque account identifier
//! - `TransactionBody` / `OperationBody`: Typed submission contents
//! - `CommitPlan`: Effects applied atomically by a store
//! - `PageRequest` / `Page`: Cursor paging

pub mod account;
pub mod amount;
pub mod asset;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod model;
pub mod paging;
pub mod plan;
pub mod price;
pub mod toid;

pub use account::{AccountId, AccountIdError};
pub use amount::{Amount, AmountError};
pub use asset::{AssetError, AssetKey, AssetType};
pub use envelope::{Operation, OperationBody, TransactionBody, TransactionEnvelope};
pub use error::{ErrorKind, HorizonError, HorizonResult};
pub use hash::{ChainError, ZERO_HASH};
pub use model::{
    Account, AccountWithBalances, AssetStat, Balance, Ledger, Offer, OperationRecord,
    OperationType, Pageable, TransactionRecord,
};
pub use paging::{Order, Page, PageRequest};
pub use plan::{CommitPlan, Effect, PlannedOperation};
pub use price::{Price, PriceError};
