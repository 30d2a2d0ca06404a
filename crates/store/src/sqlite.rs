//! SQLite-backed HistoryStore
//!
//! Every write transaction opens with a write statement. SQLite then takes
//! the write lock and a fresh snapshot together, so a commit never upgrades
//! a stale read snapshot (which would fail with SQLITE_BUSY instead of
//! waiting on the busy timeout).

use crate::balances;
use crate::error::{StoreError, StoreResult};
use crate::locks::AccountLocks;
use crate::repos::*;
use crate::schema::{decode_rows, parse_amount, parse_asset, SCHEMA};
use crate::store::{CloseParams, HistoryStore, OperationFilter, TransactionFilter};
use async_trait::async_trait;
use chrono::Utc;
use horizon_core::hash::{check_link, ledger_hash};
use horizon_core::toid::{self, MAX_OPERATIONS, MAX_TX_ORDER};
use horizon_core::{
    Account, AccountId, AccountWithBalances, Amount, AssetKey, AssetStat, Balance, CommitPlan,
    HorizonError, HorizonResult, Ledger, Offer, OperationRecord, Page, PageRequest,
    TransactionRecord,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Connection settings
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
    locks: AccountLocks,
    /// Serializes ledger writers within this process
    ledger_gate: Mutex<()>,
}

impl SqliteStore {
    /// Open (creating if missing) the database and ensure the schema
    pub async fn connect(database_url: &str, options: &StoreOptions) -> StoreResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await?;

        let store = Self {
            pool,
            locks: AccountLocks::new(),
            ledger_gate: Mutex::new(()),
        };
        store.init_schema().await?;
        info!(database_url, "history store ready");
        Ok(store)
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_ledger(conn: &mut SqliteConnection, ledger: &Ledger) -> StoreResult<()> {
        LedgerRepo::insert(conn, ledger).await.map_err(|err| {
            if err.is_unique_violation() {
                HorizonError::ChainIntegrity(format!(
                    "ledger {} or hash {} already exists",
                    ledger.sequence, ledger.hash
                ))
                .into()
            } else {
                err
            }
        })
    }

    /// Next id in `ledger`, minted under the write lock
    async fn next_transaction_id(conn: &mut SqliteConnection, ledger: i64) -> StoreResult<i64> {
        let order = match TransactionRepo::max_id_from(conn, toid::ledger_floor(ledger)).await? {
            Some(max) => toid::tx_order_of(max) + 1,
            None => 1,
        };
        if order > MAX_TX_ORDER {
            return Err(HorizonError::Internal(format!("ledger {} is full", ledger)).into());
        }
        Ok(toid::transaction_id(ledger, order))
    }

    async fn commit_locked(&self, plan: &CommitPlan) -> StoreResult<TransactionRecord> {
        if plan.operations.is_empty() || plan.operations.len() > MAX_OPERATIONS {
            return Err(HorizonError::Validation(format!(
                "transaction must have 1 to {} operations",
                MAX_OPERATIONS
            ))
            .into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        AccountRepo::insert_if_missing(&mut tx, &plan.source, now).await?;

        if TransactionRepo::hash_exists(&mut tx, &plan.hash).await? {
            return Err(HorizonError::Duplicate {
                hash: plan.hash.clone(),
            }
            .into());
        }

        if !AccountRepo::advance_sequence(&mut tx, &plan.source, plan.sequence - 1, now).await? {
            let current = AccountRepo::find(&mut tx, &plan.source)
                .await?
                .map(|row| row.sequence)
                .unwrap_or_default();
            return Err(HorizonError::SequenceConflict {
                account: plan.source.to_string(),
                expected: current + 1,
                actual: plan.sequence,
            }
            .into());
        }

        let ledger = LedgerRepo::latest_sequence(&mut tx)
            .await?
            .ok_or(HorizonError::LedgerEmpty)?
            + 1;
        let id = Self::next_transaction_id(&mut tx, ledger).await?;

        let record = TransactionRecord {
            id,
            hash: plan.hash.clone(),
            ledger_sequence: None,
            source_account: plan.source.clone(),
            fee: plan.fee,
            sequence: plan.sequence,
            operation_count: plan.operations.len() as i32,
            memo: plan.memo.clone(),
            envelope: plan.envelope.clone(),
            signatures: plan.signatures.clone(),
            created_at: now,
            successful: true,
        };

        TransactionRepo::insert(&mut tx, &record).await.map_err(|err| {
            if err.is_unique_violation() {
                HorizonError::Duplicate {
                    hash: plan.hash.clone(),
                }
                .into()
            } else {
                err
            }
        })?;

        for (index, op) in plan.operations.iter().enumerate() {
            let op_id = toid::operation_id(id, index);
            OperationRepo::insert(&mut tx, op_id, id, index as i32, op, now).await?;
            for effect in &op.effects {
                balances::apply_effect(&mut tx, effect, op_id, ledger, now).await?;
            }
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn close_ledger_gated(&self, params: &CloseParams) -> StoreResult<Ledger> {
        let _gate = self.ledger_gate.lock().await;

        let latest = {
            let mut conn = self.pool.acquire().await?;
            LedgerRepo::latest(&mut conn).await?
        };
        let previous: Ledger = latest.ok_or(HorizonError::LedgerEmpty)?.try_into()?;
        let sequence = previous.sequence + 1;

        let mut tx = self.pool.begin().await?;
        TransactionRepo::attach_pending(&mut tx, sequence, toid::ledger_floor(sequence + 1))
            .await?;

        if LedgerRepo::latest_sequence(&mut tx).await? != Some(previous.sequence) {
            return Err(HorizonError::ChainIntegrity(format!(
                "ledger {} was closed concurrently",
                sequence
            ))
            .into());
        }

        let included = TransactionRepo::in_ledger(&mut tx, sequence).await?;
        let fees = included
            .iter()
            .try_fold(0i64, |acc, row| acc.checked_add(row.fee))
            .ok_or_else(|| HorizonError::Internal("fee total overflow".to_string()))?;
        let fee_pool = previous
            .fee_pool
            .checked_add(&Amount::from_stroops(fees))
            .ok_or_else(|| HorizonError::Internal("fee pool overflow".to_string()))?;

        let mut ledger = Ledger {
            sequence,
            hash: String::new(),
            prev_hash: previous.hash.clone(),
            transaction_count: included.len() as i32,
            operation_count: included.iter().map(|row| row.operation_count).sum(),
            closed_at: params.closed_at,
            total_coins: previous.total_coins,
            fee_pool,
            base_fee: params.base_fee,
            base_reserve: params.base_reserve,
        };
        let hashes: Vec<String> = included.into_iter().map(|row| row.hash).collect();
        ledger.hash = ledger_hash(&ledger, &hashes);
        check_link(Some(&previous), &ledger).map_err(HorizonError::from)?;

        Self::insert_ledger(&mut tx, &ledger).await?;
        tx.commit().await?;

        info!(
            sequence = ledger.sequence,
            hash = %ledger.hash,
            transactions = ledger.transaction_count,
            "ledger closed"
        );
        Ok(ledger)
    }

    async fn append_ledger_gated(&self, ledger: &Ledger) -> StoreResult<()> {
        let _gate = self.ledger_gate.lock().await;

        let mut tx = self.pool.begin().await?;
        Self::insert_ledger(&mut tx, ledger).await?;

        let previous: Option<Ledger> = if ledger.sequence > 1 {
            let row = LedgerRepo::get(&mut tx, ledger.sequence - 1)
                .await?
                .ok_or_else(|| {
                    HorizonError::ChainIntegrity(format!(
                        "ledger {} has no predecessor",
                        ledger.sequence
                    ))
                })?;
            Some(row.try_into()?)
        } else {
            None
        };
        check_link(previous.as_ref(), ledger).map_err(HorizonError::from)?;

        let attached = TransactionRepo::attach_pending(
            &mut tx,
            ledger.sequence,
            toid::ledger_floor(ledger.sequence + 1),
        )
        .await?;
        tx.commit().await?;

        info!(sequence = ledger.sequence, attached, "ledger appended");
        Ok(())
    }

    async fn bootstrap_gated(&self, genesis: &Ledger, root: &AccountId) -> StoreResult<()> {
        let _gate = self.ledger_gate.lock().await;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        Self::insert_ledger(&mut tx, genesis).await?;
        check_link(None, genesis).map_err(HorizonError::from)?;

        balances::create_account(&mut tx, root, now).await?;
        balances::apply_delta(&mut tx, root, &AssetKey::native(), genesis.total_coins, false, now)
            .await?;
        tx.commit().await?;

        info!(root = %root, total_coins = %genesis.total_coins, "genesis ledger written");
        Ok(())
    }

    async fn account_snapshot(&self, id: &AccountId) -> StoreResult<AccountWithBalances> {
        let mut tx = self.pool.begin().await?;
        let account: Account = AccountRepo::find(&mut tx, id)
            .await?
            .ok_or_else(|| HorizonError::not_found("account", id))?
            .try_into()?;
        let balances = decode_rows("balance", BalanceRepo::of_account(&mut tx, id).await?);
        tx.commit().await?;
        Ok(AccountWithBalances { account, balances })
    }

    async fn advance_sequence_locked(&self, id: &AccountId, expected: i64) -> StoreResult<Account> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !AccountRepo::advance_sequence(&mut tx, id, expected, now).await? {
            let current = AccountRepo::find(&mut tx, id)
                .await?
                .ok_or_else(|| HorizonError::not_found("account", id))?;
            return Err(HorizonError::SequenceConflict {
                account: id.to_string(),
                expected,
                actual: current.sequence,
            }
            .into());
        }

        let account = AccountRepo::find(&mut tx, id)
            .await?
            .ok_or_else(|| HorizonError::not_found("account", id))?
            .try_into()?;
        tx.commit().await?;
        Ok(account)
    }

    async fn asset_stats_page(&self, page: PageRequest) -> StoreResult<Page<AssetStat>> {
        let mut tx = self.pool.begin().await?;
        let rows = AssetRepo::page(&mut tx, &page).await?;

        let mut assets = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_asset("asset", &row.asset_type, &row.code, &row.issuer) {
                Ok(asset) => assets.push((row.id, asset)),
                Err(err) => warn!(asset_id = row.id, error = %err, "skipping undecodable record"),
            }
        }

        let ids: Vec<i64> = assets.iter().map(|(id, _)| *id).collect();
        let holdings = AssetRepo::holdings(&mut tx, &ids).await?;
        tx.commit().await?;

        let mut totals: HashMap<i64, (i64, Amount)> = HashMap::new();
        let issuers: HashMap<i64, &str> = assets.iter().map(|(id, a)| (*id, a.issuer())).collect();
        for holding in &holdings {
            if issuers.get(&holding.asset_id) == Some(&holding.account_id.as_str()) {
                continue;
            }
            let amount = match parse_amount("balance", &holding.amount) {
                Ok(amount) => amount,
                Err(err) => {
                    warn!(account = %holding.account_id, error = %err, "skipping undecodable record");
                    continue;
                }
            };
            let entry = totals.entry(holding.asset_id).or_insert((0, Amount::ZERO));
            if amount.is_positive() || holding.trust_limit.is_some() {
                entry.0 += 1;
            }
            if amount.is_positive() {
                entry.1 = entry.1.checked_add(&amount).ok_or_else(|| {
                    HorizonError::Internal(format!("asset {} supply overflow", holding.asset_id))
                })?;
            }
        }

        let stats = assets
            .into_iter()
            .map(|(id, asset)| {
                let (num_accounts, amount) = totals.get(&id).copied().unwrap_or((0, Amount::ZERO));
                AssetStat {
                    id,
                    asset,
                    num_accounts,
                    amount,
                }
            })
            .collect();
        Ok(Page::new(stats, page))
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    #[instrument(skip(self, genesis, root), fields(root = %root))]
    async fn bootstrap(&self, genesis: &Ledger, root: &AccountId) -> HorizonResult<()> {
        Ok(self.bootstrap_gated(genesis, root).await?)
    }

    #[instrument(skip(self, ledger), fields(sequence = ledger.sequence))]
    async fn append_ledger(&self, ledger: &Ledger) -> HorizonResult<()> {
        Ok(self.append_ledger_gated(ledger).await?)
    }

    #[instrument(skip(self, params))]
    async fn close_ledger(&self, params: &CloseParams) -> HorizonResult<Ledger> {
        Ok(self.close_ledger_gated(params).await?)
    }

    async fn ledger(&self, sequence: i64) -> HorizonResult<Ledger> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = LedgerRepo::get(&mut conn, sequence)
            .await?
            .ok_or_else(|| HorizonError::not_found("ledger", sequence))?;
        Ok(Ledger::try_from(row)?)
    }

    async fn latest_ledger(&self) -> HorizonResult<Ledger> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = LedgerRepo::latest(&mut conn)
            .await?
            .ok_or(HorizonError::LedgerEmpty)?;
        Ok(Ledger::try_from(row)?)
    }

    async fn ledgers(&self, page: PageRequest) -> HorizonResult<Page<Ledger>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = LedgerRepo::page(&mut conn, &page).await?;
        Ok(Page::new(decode_rows("ledger", rows), page))
    }

    async fn get_or_create_account(&self, id: &AccountId) -> HorizonResult<Account> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        if AccountRepo::insert_if_missing(&mut conn, id, Utc::now()).await? {
            debug!(account = %id, "account created");
        }
        let row = AccountRepo::find(&mut conn, id)
            .await?
            .ok_or_else(|| HorizonError::not_found("account", id))?;
        Ok(Account::try_from(row)?)
    }

    async fn account(&self, id: &AccountId) -> HorizonResult<Account> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = AccountRepo::find(&mut conn, id)
            .await?
            .ok_or_else(|| HorizonError::not_found("account", id))?;
        Ok(Account::try_from(row)?)
    }

    async fn account_with_balances(&self, id: &AccountId) -> HorizonResult<AccountWithBalances> {
        Ok(self.account_snapshot(id).await?)
    }

    async fn advance_sequence(&self, id: &AccountId, expected: i64) -> HorizonResult<Account> {
        let _guards = self.locks.lock_all(std::slice::from_ref(id)).await;
        Ok(self.advance_sequence_locked(id, expected).await?)
    }

    async fn accounts(&self, page: PageRequest) -> HorizonResult<Page<Account>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = AccountRepo::page(&mut conn, &page).await?;
        Ok(Page::new(decode_rows("account", rows), page))
    }

    async fn apply_delta(
        &self,
        account: &AccountId,
        asset: &AssetKey,
        delta: Amount,
        is_trustline_op: bool,
    ) -> HorizonResult<Balance> {
        let _guards = self.locks.lock_all(std::slice::from_ref(account)).await;
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        let balance =
            balances::apply_delta(&mut tx, account, asset, delta, is_trustline_op, Utc::now())
                .await?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(balance)
    }

    async fn balances_of(&self, account: &AccountId) -> HorizonResult<Vec<Balance>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = BalanceRepo::of_account(&mut conn, account).await?;
        Ok(decode_rows("balance", rows))
    }

    async fn asset_stats(&self, page: PageRequest) -> HorizonResult<Page<AssetStat>> {
        Ok(self.asset_stats_page(page).await?)
    }

    #[instrument(skip(self, plan), fields(hash = %plan.hash, account = %plan.source))]
    async fn commit(&self, plan: &CommitPlan) -> HorizonResult<TransactionRecord> {
        let _guards = self.locks.lock_all(&plan.touched_accounts()).await;
        let record = self.commit_locked(plan).await?;
        debug!(tx_id = record.id, "transaction committed");
        Ok(record)
    }

    async fn transaction_by_hash(&self, hash: &str) -> HorizonResult<TransactionRecord> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = TransactionRepo::by_hash(&mut conn, hash)
            .await?
            .ok_or_else(|| HorizonError::not_found("transaction", hash))?;
        Ok(TransactionRecord::try_from(row)?)
    }

    async fn transaction(&self, id: i64) -> HorizonResult<TransactionRecord> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = TransactionRepo::by_id(&mut conn, id)
            .await?
            .ok_or_else(|| HorizonError::not_found("transaction", id))?;
        Ok(TransactionRecord::try_from(row)?)
    }

    async fn transactions(
        &self,
        page: PageRequest,
        filter: &TransactionFilter,
    ) -> HorizonResult<Page<TransactionRecord>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = TransactionRepo::page(&mut conn, &page, filter).await?;
        Ok(Page::new(decode_rows("transaction", rows), page))
    }

    async fn operation(&self, id: i64) -> HorizonResult<OperationRecord> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let row = OperationRepo::by_id(&mut conn, id)
            .await?
            .ok_or_else(|| HorizonError::not_found("operation", id))?;
        Ok(OperationRecord::try_from(row)?)
    }

    async fn operations(
        &self,
        page: PageRequest,
        filter: &OperationFilter,
    ) -> HorizonResult<Page<OperationRecord>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = OperationRepo::page(&mut conn, &page, filter).await?;
        Ok(Page::new(decode_rows("operation", rows), page))
    }

    async fn offers(
        &self,
        page: PageRequest,
        seller: Option<&AccountId>,
    ) -> HorizonResult<Page<Offer>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        let rows = OfferRepo::page(&mut conn, &page, seller).await?;
        Ok(Page::new(decode_rows("offer", rows), page))
    }
}
