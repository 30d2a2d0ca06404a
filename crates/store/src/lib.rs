//! # Horizon Store
//!
//! Persistence for the indexer: the `HistoryStore` repository trait and its
//! SQLite implementation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use horizon_store::{HistoryStore, SqliteStore, StoreOptions};
//!
//! let store = SqliteStore::connect("sqlite://horizon.db", &StoreOptions::default()).await?;
//! let latest = store.latest_ledger().await?;
//! ```

mod balances;
pub mod error;
pub mod locks;
pub mod repos;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use locks::AccountLocks;
pub use sqlite::{SqliteStore, StoreOptions};
pub use store::{CloseParams, HistoryStore, OperationFilter, TransactionFilter};
