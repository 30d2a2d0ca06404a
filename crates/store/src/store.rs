//! HistoryStore - the repository seam between the indexer and storage

use async_trait::async_trait;
use horizon_core::{
    Account, AccountId, AccountWithBalances, Amount, AssetKey, AssetStat, Balance, CommitPlan,
    HorizonResult, Ledger, Offer, OperationRecord, Page, PageRequest, TransactionRecord,
};

/// Narrows a transaction walk; filters AND with the cursor predicate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Transactions sourced by the account
    pub account: Option<AccountId>,
    pub ledger: Option<i64>,
}

/// Narrows an operation walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationFilter {
    /// Operations sourced by or paying the account
    pub account: Option<AccountId>,
    pub transaction: Option<i64>,
    pub ledger: Option<i64>,
    /// Only `create_account` and `payment`
    pub payments_only: bool,
}

/// Header fields chosen by the closer; the store fills in the rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseParams {
    pub closed_at: chrono::DateTime<chrono::Utc>,
    /// Stroops
    pub base_fee: i64,
    pub base_reserve: Amount,
}

/// Storage for ledgers, accounts, balances and transaction history.
///
/// Constructed once at startup and shared as `Arc<dyn HistoryStore>`.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Write ledger 1 and credit `root` with its total coins, on an empty store
    async fn bootstrap(&self, genesis: &Ledger, root: &AccountId) -> HorizonResult<()>;

    /// Append an externally produced header, attaching pending transactions
    async fn append_ledger(&self, ledger: &Ledger) -> HorizonResult<()>;

    /// Close the next ledger over all pending transactions
    async fn close_ledger(&self, params: &CloseParams) -> HorizonResult<Ledger>;

    async fn ledger(&self, sequence: i64) -> HorizonResult<Ledger>;

    /// Highest closed ledger, or `LedgerEmpty`
    async fn latest_ledger(&self) -> HorizonResult<Ledger>;

    async fn ledgers(&self, page: PageRequest) -> HorizonResult<Page<Ledger>>;

    /// Existing account, or a new one with sequence 0
    async fn get_or_create_account(&self, id: &AccountId) -> HorizonResult<Account>;

    async fn account(&self, id: &AccountId) -> HorizonResult<Account>;

    /// Account and balances read from one snapshot
    async fn account_with_balances(&self, id: &AccountId) -> HorizonResult<AccountWithBalances>;

    /// Increment the sequence if it currently equals `expected`
    async fn advance_sequence(&self, id: &AccountId, expected: i64) -> HorizonResult<Account>;

    async fn accounts(&self, page: PageRequest) -> HorizonResult<Page<Account>>;

    /// Apply a signed delta to one balance row.
    ///
    /// With `is_trustline_op`, a zero delta on a missing row opens it.
    async fn apply_delta(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        delta: Amount,
        is_trustline_op: bool,
    ) -> HorizonResult<Balance>;

    async fn balances_of(&self, account: &AccountId) -> HorizonResult<Vec<Balance>>;

    async fn asset_stats(&self, page: PageRequest) -> HorizonResult<Page<AssetStat>>;

    /// Apply a plan atomically; returns the pending transaction record
    async fn commit(&self, plan: &CommitPlan) -> HorizonResult<TransactionRecord>;

    async fn transaction_by_hash(&self, hash: &str) -> HorizonResult<TransactionRecord>;

    async fn transaction(&self, id: i64) -> HorizonResult<TransactionRecord>;

    async fn transactions(
        &self,
        page: PageRequest,
        filter: &TransactionFilter,
    ) -> HorizonResult<Page<TransactionRecord>>;

    async fn operation(&self, id: i64) -> HorizonResult<OperationRecord>;

    async fn operations(
        &self,
        page: PageRequest,
        filter: &OperationFilter,
    ) -> HorizonResult<Page<OperationRecord>>;

    async fn offers(
        &self,
        page: PageRequest,
        seller: Option<&AccountId>,
    ) -> HorizonResult<Page<Offer>>;
}
