//! Query Engine - read-only, cursor-paged views over the history store

use horizon_core::{
    Account, AccountId, AccountWithBalances, AssetStat, HorizonError, HorizonResult, Ledger,
    Offer, OperationRecord, Page, PageRequest, TransactionRecord,
};
use horizon_store::{HistoryStore, OperationFilter, TransactionFilter};
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn HistoryStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Highest closed ledger; None before genesis
    pub async fn latest_ledger(&self) -> HorizonResult<Option<Ledger>> {
        match self.store.latest_ledger().await {
            Ok(ledger) => Ok(Some(ledger)),
            Err(HorizonError::LedgerEmpty) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn account(&self, id: &AccountId) -> HorizonResult<AccountWithBalances> {
        self.store.account_with_balances(id).await
    }

    pub async fn accounts(&self, page: PageRequest) -> HorizonResult<Page<Account>> {
        self.store.accounts(page).await
    }

    /// Transactions the account sourced. An unknown account has an empty
    /// history.
    pub async fn account_transactions(
        &self,
        id: &AccountId,
        page: PageRequest,
    ) -> HorizonResult<Page<TransactionRecord>> {
        let filter = TransactionFilter {
            account: Some(id.clone()),
            ..Default::default()
        };
        self.store.transactions(page, &filter).await
    }

    pub async fn account_operations(
        &self,
        id: &AccountId,
        page: PageRequest,
    ) -> HorizonResult<Page<OperationRecord>> {
        let filter = OperationFilter {
            account: Some(id.clone()),
            ..Default::default()
        };
        self.store.operations(page, &filter).await
    }

    pub async fn account_payments(
        &self,
        id: &AccountId,
        page: PageRequest,
    ) -> HorizonResult<Page<OperationRecord>> {
        let filter = OperationFilter {
            account: Some(id.clone()),
            payments_only: true,
            ..Default::default()
        };
        self.store.operations(page, &filter).await
    }

    pub async fn transactions(&self, page: PageRequest) -> HorizonResult<Page<TransactionRecord>> {
        self.store
            .transactions(page, &TransactionFilter::default())
            .await
    }

    pub async fn transaction(&self, hash: &str) -> HorizonResult<TransactionRecord> {
        self.store.transaction_by_hash(hash).await
    }

    pub async fn transaction_operations(
        &self,
        hash: &str,
        page: PageRequest,
    ) -> HorizonResult<Page<OperationRecord>> {
        let tx = self.store.transaction_by_hash(hash).await?;
        let filter = OperationFilter {
            transaction: Some(tx.id),
            ..Default::default()
        };
        self.store.operations(page, &filter).await
    }

    pub async fn ledgers(&self, page: PageRequest) -> HorizonResult<Page<Ledger>> {
        self.store.ledgers(page).await
    }

    pub async fn ledger(&self, sequence: i64) -> HorizonResult<Ledger> {
        self.store.ledger(sequence).await
    }

    pub async fn ledger_transactions(
        &self,
        sequence: i64,
        page: PageRequest,
    ) -> HorizonResult<Page<TransactionRecord>> {
        self.store.ledger(sequence).await?;
        let filter = TransactionFilter {
            ledger: Some(sequence),
            ..Default::default()
        };
        self.store.transactions(page, &filter).await
    }

    pub async fn operations(&self, page: PageRequest) -> HorizonResult<Page<OperationRecord>> {
        self.store
            .operations(page, &OperationFilter::default())
            .await
    }

    pub async fn operation(&self, id: i64) -> HorizonResult<OperationRecord> {
        self.store.operation(id).await
    }

    /// `create_account` and `payment` operations
    pub async fn payments(&self, page: PageRequest) -> HorizonResult<Page<OperationRecord>> {
        let filter = OperationFilter {
            payments_only: true,
            ..Default::default()
        };
        self.store.operations(page, &filter).await
    }

    pub async fn assets(&self, page: PageRequest) -> HorizonResult<Page<AssetStat>> {
        self.store.asset_stats(page).await
    }

    pub async fn offers(
        &self,
        page: PageRequest,
        seller: Option<&AccountId>,
    ) -> HorizonResult<Page<Offer>> {
        self.store.offers(page, seller).await
    }
}
