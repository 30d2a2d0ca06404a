//! Repository implementations for SQLite
//!
//! Stateless statements over a borrowed connection, so the same calls run
//! against a pooled connection or inside a write transaction.

use crate::error::{StoreError, StoreResult};
use crate::schema::*;
use crate::store::{OperationFilter, TransactionFilter};
use chrono::{DateTime, Utc};
use horizon_core::{
    AccountId, Amount, AssetKey, Ledger, OperationType, PageRequest, PlannedOperation, Price,
    TransactionRecord,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

/// Append the cursor predicate, ordering and limit for a walk over `column`
fn push_paging(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, page: &PageRequest) {
    if let Some(cursor) = page.cursor {
        qb.push(format!(" AND {} {} ", column, page.order.cursor_op()));
        qb.push_bind(cursor);
    }
    qb.push(format!(" ORDER BY {} {} LIMIT ", column, page.order.sql()));
    qb.push_bind(page.limit as i64);
}

// ============================================================================
// Account Repository
// ============================================================================

pub struct AccountRepo;

impl AccountRepo {
    const SELECT: &'static str =
        "SELECT id, account_id, sequence, created_at, updated_at FROM accounts";

    /// Returns true when a row was created
    pub async fn insert_if_missing(
        conn: &mut SqliteConnection,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO accounts (account_id, sequence, created_at, updated_at) VALUES (?, 0, ?, ?)",
        )
        .bind(account.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find(
        conn: &mut SqliteConnection,
        account: &AccountId,
    ) -> StoreResult<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{} WHERE account_id = ?", Self::SELECT))
            .bind(account.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Compare-and-increment; returns false when the sequence did not match
    pub async fn advance_sequence(
        conn: &mut SqliteConnection,
        account: &AccountId,
        expected: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET sequence = sequence + 1, updated_at = ? WHERE account_id = ? AND sequence = ?",
        )
        .bind(now)
        .bind(account.as_str())
        .bind(expected)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn touch(
        conn: &mut SqliteConnection,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET updated_at = ? WHERE account_id = ?")
            .bind(now)
            .bind(account.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn page(
        conn: &mut SqliteConnection,
        page: &PageRequest,
    ) -> StoreResult<Vec<AccountRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(Self::SELECT);
        qb.push(" WHERE 1 = 1");
        push_paging(&mut qb, "id", page);
        let rows = qb.build_query_as::<AccountRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}

// ============================================================================
// Asset Repository
// ============================================================================

pub struct AssetRepo;

impl AssetRepo {
    /// Register the asset if needed and return its id
    pub async fn ensure(conn: &mut SqliteConnection, asset: &AssetKey) -> StoreResult<i64> {
        sqlx::query("INSERT OR IGNORE INTO assets (asset_type, code, issuer) VALUES (?, ?, ?)")
            .bind(asset.asset_type().to_string())
            .bind(asset.code())
            .bind(asset.issuer())
            .execute(&mut *conn)
            .await?;

        let (id,): (i64,) = sqlx::query_as(
            "SELECT id FROM assets WHERE asset_type = ? AND code = ? AND issuer = ?",
        )
        .bind(asset.asset_type().to_string())
        .bind(asset.code())
        .bind(asset.issuer())
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Every registered asset, native included
    pub async fn page(
        conn: &mut SqliteConnection,
        page: &PageRequest,
    ) -> StoreResult<Vec<AssetRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, asset_type, code, issuer FROM assets WHERE 1 = 1",
        );
        push_paging(&mut qb, "id", page);
        let rows = qb.build_query_as::<AssetRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }

    /// Every balance row of the given assets
    pub async fn holdings(
        conn: &mut SqliteConnection,
        asset_ids: &[i64],
    ) -> StoreResult<Vec<HoldingRow>> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT asset_id, account_id, amount, trust_limit FROM balances WHERE asset_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in asset_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let rows = qb.build_query_as::<HoldingRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}

// ============================================================================
// Balance Repository
// ============================================================================

pub struct BalanceRepo;

impl BalanceRepo {
    pub async fn find(
        conn: &mut SqliteConnection,
        account: &AccountId,
        asset_id: i64,
    ) -> StoreResult<Option<(Amount, Option<Amount>)>> {
        let row = sqlx::query_as::<_, BalanceStateRow>(
            "SELECT amount, trust_limit FROM balances WHERE account_id = ? AND asset_id = ?",
        )
        .bind(account.as_str())
        .bind(asset_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let amount = parse_amount("balance", &row.amount)?;
                let limit = row
                    .trust_limit
                    .as_deref()
                    .map(|l| parse_amount("balance", l))
                    .transpose()?;
                Ok(Some((amount, limit)))
            }
            None => Ok(None),
        }
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        account: &AccountId,
        asset_id: i64,
        amount: Amount,
        limit: Option<Amount>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO balances (account_id, asset_id, amount, trust_limit, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(account.as_str())
        .bind(asset_id)
        .bind(amount.to_string())
        .bind(limit.map(|l| l.to_string()))
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update_amount(
        conn: &mut SqliteConnection,
        account: &AccountId,
        asset_id: i64,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE balances SET amount = ?, updated_at = ? WHERE account_id = ? AND asset_id = ?",
        )
        .bind(amount.to_string())
        .bind(now)
        .bind(account.as_str())
        .bind(asset_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update_limit(
        conn: &mut SqliteConnection,
        account: &AccountId,
        asset_id: i64,
        limit: Amount,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE balances SET trust_limit = ?, updated_at = ? WHERE account_id = ? AND asset_id = ?",
        )
        .bind(limit.to_string())
        .bind(now)
        .bind(account.as_str())
        .bind(asset_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(
        conn: &mut SqliteConnection,
        account: &AccountId,
        asset_id: i64,
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM balances WHERE account_id = ? AND asset_id = ?")
            .bind(account.as_str())
            .bind(asset_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// All balances of an account, in asset registration order
    pub async fn of_account(
        conn: &mut SqliteConnection,
        account: &AccountId,
    ) -> StoreResult<Vec<BalanceRow>> {
        let rows = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT a.asset_type, a.code, a.issuer, b.amount, b.trust_limit
            FROM balances b
            JOIN assets a ON a.id = b.asset_id
            WHERE b.account_id = ?
            ORDER BY a.id
            "#,
        )
        .bind(account.as_str())
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Ledger Repository
// ============================================================================

pub struct LedgerRepo;

impl LedgerRepo {
    const SELECT: &'static str = "SELECT sequence, hash, prev_hash, transaction_count, operation_count, closed_at, total_coins, fee_pool, base_fee, base_reserve FROM ledgers";

    pub async fn insert(conn: &mut SqliteConnection, ledger: &Ledger) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledgers (sequence, hash, prev_hash, transaction_count, operation_count,
                                 closed_at, total_coins, fee_pool, base_fee, base_reserve)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ledger.sequence)
        .bind(&ledger.hash)
        .bind(&ledger.prev_hash)
        .bind(ledger.transaction_count)
        .bind(ledger.operation_count)
        .bind(ledger.closed_at)
        .bind(ledger.total_coins.to_string())
        .bind(ledger.fee_pool.to_string())
        .bind(ledger.base_fee)
        .bind(ledger.base_reserve.to_string())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, sequence: i64) -> StoreResult<Option<LedgerRow>> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!("{} WHERE sequence = ?", Self::SELECT))
            .bind(sequence)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn latest(conn: &mut SqliteConnection) -> StoreResult<Option<LedgerRow>> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            "{} ORDER BY sequence DESC LIMIT 1",
            Self::SELECT
        ))
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    pub async fn latest_sequence(conn: &mut SqliteConnection) -> StoreResult<Option<i64>> {
        let (sequence,): (Option<i64>,) = sqlx::query_as("SELECT MAX(sequence) FROM ledgers")
            .fetch_one(&mut *conn)
            .await?;
        Ok(sequence)
    }

    pub async fn page(
        conn: &mut SqliteConnection,
        page: &PageRequest,
    ) -> StoreResult<Vec<LedgerRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(Self::SELECT);
        qb.push(" WHERE 1 = 1");
        push_paging(&mut qb, "sequence", page);
        let rows = qb.build_query_as::<LedgerRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

pub struct TransactionRepo;

impl TransactionRepo {
    const SELECT: &'static str = "SELECT t.id, t.hash, t.ledger_sequence, t.source_account, t.fee, t.sequence, t.operation_count, t.memo, t.envelope, t.signatures, t.created_at, t.successful FROM transactions t";

    pub async fn insert(conn: &mut SqliteConnection, tx: &TransactionRecord) -> StoreResult<()> {
        let signatures = serde_json::to_string(&tx.signatures)
            .map_err(|e| StoreError::decode("transaction", e))?;
        sqlx::query(
            r#"
            INSERT INTO transactions (id, hash, ledger_sequence, source_account, fee, sequence,
                                      operation_count, memo, envelope, signatures, created_at, successful)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.id)
        .bind(&tx.hash)
        .bind(tx.ledger_sequence)
        .bind(tx.source_account.as_str())
        .bind(tx.fee)
        .bind(tx.sequence)
        .bind(tx.operation_count)
        .bind(&tx.memo)
        .bind(&tx.envelope)
        .bind(signatures)
        .bind(tx.created_at)
        .bind(tx.successful)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn hash_exists(conn: &mut SqliteConnection, hash: &str) -> StoreResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM transactions WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    /// Highest transaction id at or above `floor`
    pub async fn max_id_from(conn: &mut SqliteConnection, floor: i64) -> StoreResult<Option<i64>> {
        let (id,): (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM transactions WHERE id >= ?")
            .bind(floor)
            .fetch_one(&mut *conn)
            .await?;
        Ok(id)
    }

    /// Attach every pending transaction with id below `below_id` to `sequence`
    pub async fn attach_pending(
        conn: &mut SqliteConnection,
        sequence: i64,
        below_id: i64,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE transactions SET ledger_sequence = ? WHERE ledger_sequence IS NULL AND id < ?",
        )
        .bind(sequence)
        .bind(below_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Hash, fee and operation count of a ledger's transactions in id order
    pub async fn in_ledger(
        conn: &mut SqliteConnection,
        sequence: i64,
    ) -> StoreResult<Vec<ClosingRow>> {
        let rows = sqlx::query_as::<_, ClosingRow>(
            "SELECT hash, fee, operation_count FROM transactions WHERE ledger_sequence = ? ORDER BY id",
        )
        .bind(sequence)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn by_hash(
        conn: &mut SqliteConnection,
        hash: &str,
    ) -> StoreResult<Option<TransactionRow>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!("{} WHERE t.hash = ?", Self::SELECT))
            .bind(hash)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn by_id(conn: &mut SqliteConnection, id: i64) -> StoreResult<Option<TransactionRow>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!("{} WHERE t.id = ?", Self::SELECT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn page(
        conn: &mut SqliteConnection,
        page: &PageRequest,
        filter: &TransactionFilter,
    ) -> StoreResult<Vec<TransactionRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(Self::SELECT);
        qb.push(" WHERE 1 = 1");

        if let Some(account) = &filter.account {
            qb.push(" AND t.source_account = ");
            qb.push_bind(account.as_str().to_string());
        }

        if let Some(ledger) = filter.ledger {
            qb.push(" AND t.ledger_sequence = ");
            qb.push_bind(ledger);
        }

        push_paging(&mut qb, "t.id", page);
        let rows = qb.build_query_as::<TransactionRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}

// ============================================================================
// Operation Repository
// ============================================================================

pub struct OperationRepo;

impl OperationRepo {
    const SELECT: &'static str = r#"
        SELECT o.id, o.transaction_id, t.hash AS transaction_hash, o.op_type, o.application_order,
               o.source_account, o.destination, o.asset_type, o.asset_code, o.asset_issuer,
               o.amount, o.body, o.created_at
        FROM operations o
        JOIN transactions t ON t.id = o.transaction_id
    "#;

    pub async fn insert(
        conn: &mut SqliteConnection,
        id: i64,
        transaction_id: i64,
        order: i32,
        op: &PlannedOperation,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO operations (id, transaction_id, op_type, application_order, source_account,
                                    destination, asset_type, asset_code, asset_issuer, amount, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(transaction_id)
        .bind(op.op_type.to_string())
        .bind(order)
        .bind(op.source.as_str())
        .bind(op.destination.as_ref().map(|d| d.as_str().to_string()))
        .bind(op.asset.as_ref().map(|a| a.asset_type().to_string()))
        .bind(op.asset.as_ref().map(|a| a.code().to_string()))
        .bind(op.asset.as_ref().map(|a| a.issuer().to_string()))
        .bind(op.amount.map(|a| a.to_string()))
        .bind(op.body.to_string())
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn by_id(conn: &mut SqliteConnection, id: i64) -> StoreResult<Option<OperationRow>> {
        let row = sqlx::query_as::<_, OperationRow>(&format!("{} WHERE o.id = ?", Self::SELECT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    pub async fn page(
        conn: &mut SqliteConnection,
        page: &PageRequest,
        filter: &OperationFilter,
    ) -> StoreResult<Vec<OperationRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(Self::SELECT);
        qb.push(" WHERE 1 = 1");

        if let Some(account) = &filter.account {
            qb.push(" AND (o.source_account = ");
            qb.push_bind(account.as_str().to_string());
            qb.push(" OR o.destination = ");
            qb.push_bind(account.as_str().to_string());
            qb.push(")");
        }

        if let Some(transaction) = filter.transaction {
            qb.push(" AND o.transaction_id = ");
            qb.push_bind(transaction);
        }

        if let Some(ledger) = filter.ledger {
            qb.push(" AND t.ledger_sequence = ");
            qb.push_bind(ledger);
        }

        if filter.payments_only {
            qb.push(" AND o.op_type IN (");
            qb.push_bind(OperationType::CreateAccount.to_string());
            qb.push(", ");
            qb.push_bind(OperationType::Payment.to_string());
            qb.push(")");
        }

        push_paging(&mut qb, "o.id", page);
        let rows = qb.build_query_as::<OperationRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}

// ============================================================================
// Offer Repository
// ============================================================================

pub struct OfferRepo;

impl OfferRepo {
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: i64,
        seller: &AccountId,
        selling: &AssetKey,
        buying: &AssetKey,
        amount: Amount,
        price: &Price,
        ledger: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO offers (id, seller, selling_type, selling_code, selling_issuer,
                                buying_type, buying_code, buying_issuer, amount, price_n, price_d,
                                last_modified_ledger)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(seller.as_str())
        .bind(selling.asset_type().to_string())
        .bind(selling.code())
        .bind(selling.issuer())
        .bind(buying.asset_type().to_string())
        .bind(buying.code())
        .bind(buying.issuer())
        .bind(amount.to_string())
        .bind(price.n)
        .bind(price.d)
        .bind(ledger)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn page(
        conn: &mut SqliteConnection,
        page: &PageRequest,
        seller: Option<&AccountId>,
    ) -> StoreResult<Vec<OfferRow>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, seller, selling_type, selling_code, selling_issuer, buying_type, buying_code,
                   buying_issuer, amount, price_n, price_d, last_modified_ledger
            FROM offers WHERE 1 = 1
            "#,
        );
        if let Some(seller) = seller {
            qb.push(" AND seller = ");
            qb.push_bind(seller.as_str().to_string());
        }
        push_paging(&mut qb, "id", page);
        let rows = qb.build_query_as::<OfferRow>().fetch_all(&mut *conn).await?;
        Ok(rows)
    }
}
