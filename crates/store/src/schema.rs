//! Database schema definitions
//!
//! Table DDL plus the row types sqlx maps query results into. Amounts are
//! stored as TEXT with exactly seven decimals and parsed back with
//! `rust_decimal`; SQL never does arithmetic on them.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use horizon_core::{
    Account, AccountId, Amount, AssetKey, AssetType, Balance, Ledger, Offer, OperationRecord,
    OperationType, Price, TransactionRecord,
};
use std::str::FromStr;

/// Executed statement by statement at startup
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id TEXT NOT NULL UNIQUE,
        sequence INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_type TEXT NOT NULL,
        code TEXT NOT NULL DEFAULT '',
        issuer TEXT NOT NULL DEFAULT '',
        UNIQUE (asset_type, code, issuer)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS balances (
        account_id TEXT NOT NULL REFERENCES accounts(account_id),
        asset_id INTEGER NOT NULL REFERENCES assets(id),
        amount TEXT NOT NULL,
        trust_limit TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (account_id, asset_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_balances_asset ON balances(asset_id)",
    r#"
    CREATE TABLE IF NOT EXISTS ledgers (
        sequence INTEGER PRIMARY KEY,
        hash TEXT NOT NULL UNIQUE,
        prev_hash TEXT NOT NULL,
        transaction_count INTEGER NOT NULL DEFAULT 0,
        operation_count INTEGER NOT NULL DEFAULT 0,
        closed_at TEXT NOT NULL,
        total_coins TEXT NOT NULL,
        fee_pool TEXT NOT NULL,
        base_fee INTEGER NOT NULL,
        base_reserve TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY,
        hash TEXT NOT NULL UNIQUE,
        ledger_sequence INTEGER REFERENCES ledgers(sequence) DEFERRABLE INITIALLY DEFERRED,
        source_account TEXT NOT NULL REFERENCES accounts(account_id),
        fee INTEGER NOT NULL,
        sequence INTEGER NOT NULL,
        operation_count INTEGER NOT NULL,
        memo TEXT,
        envelope TEXT NOT NULL,
        signatures TEXT NOT NULL,
        created_at TEXT NOT NULL,
        successful INTEGER NOT NULL DEFAULT 1
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_source ON transactions(source_account, id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_ledger ON transactions(ledger_sequence, id)",
    r#"
    CREATE TABLE IF NOT EXISTS operations (
        id INTEGER PRIMARY KEY,
        transaction_id INTEGER NOT NULL REFERENCES transactions(id),
        op_type TEXT NOT NULL,
        application_order INTEGER NOT NULL,
        source_account TEXT NOT NULL,
        destination TEXT,
        asset_type TEXT,
        asset_code TEXT,
        asset_issuer TEXT,
        amount TEXT,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (transaction_id, application_order)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_operations_source ON operations(source_account, id)",
    "CREATE INDEX IF NOT EXISTS idx_operations_destination ON operations(destination, id)",
    r#"
    CREATE TABLE IF NOT EXISTS offers (
        id INTEGER PRIMARY KEY,
        seller TEXT NOT NULL REFERENCES accounts(account_id),
        selling_type TEXT NOT NULL,
        selling_code TEXT NOT NULL,
        selling_issuer TEXT NOT NULL,
        buying_type TEXT NOT NULL,
        buying_code TEXT NOT NULL,
        buying_issuer TEXT NOT NULL,
        amount TEXT NOT NULL,
        price_n INTEGER NOT NULL,
        price_d INTEGER NOT NULL,
        last_modified_ledger INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_offers_seller ON offers(seller, id)",
];

/// Row type for `accounts`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub account_id: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for `balances` joined with `assets`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BalanceRow {
    pub asset_type: String,
    pub code: String,
    pub issuer: String,
    pub amount: String,
    pub trust_limit: Option<String>,
}

/// Row type for `assets`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssetRow {
    pub id: i64,
    pub asset_type: String,
    pub code: String,
    pub issuer: String,
}

/// Row type for `ledgers`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    pub sequence: i64,
    pub hash: String,
    pub prev_hash: String,
    pub transaction_count: i32,
    pub operation_count: i32,
    pub closed_at: DateTime<Utc>,
    pub total_coins: String,
    pub fee_pool: String,
    pub base_fee: i64,
    pub base_reserve: String,
}

/// Row type for `transactions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub hash: String,
    pub ledger_sequence: Option<i64>,
    pub source_account: String,
    pub fee: i64,
    pub sequence: i64,
    pub operation_count: i32,
    pub memo: Option<String>,
    pub envelope: String,
    pub signatures: String, // JSON array
    pub created_at: DateTime<Utc>,
    pub successful: bool,
}

/// Row type for `operations` joined with the owning transaction's hash
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationRow {
    pub id: i64,
    pub transaction_id: i64,
    pub transaction_hash: String,
    pub op_type: String,
    pub application_order: i32,
    pub source_account: String,
    pub destination: Option<String>,
    pub asset_type: Option<String>,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
    pub amount: Option<String>,
    pub body: String, // JSON
    pub created_at: DateTime<Utc>,
}

/// Row type for `offers`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfferRow {
    pub id: i64,
    pub seller: String,
    pub selling_type: String,
    pub selling_code: String,
    pub selling_issuer: String,
    pub buying_type: String,
    pub buying_code: String,
    pub buying_issuer: String,
    pub amount: String,
    pub price_n: i32,
    pub price_d: i32,
    pub last_modified_ledger: i64,
}

/// Balance row as seen while applying a delta
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BalanceStateRow {
    pub amount: String,
    pub trust_limit: Option<String>,
}

/// Balance row keyed by asset, for asset stats
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HoldingRow {
    pub asset_id: i64,
    pub account_id: String,
    pub amount: String,
    pub trust_limit: Option<String>,
}

/// Per-transaction inputs to a ledger header
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClosingRow {
    pub hash: String,
    pub fee: i64,
    pub operation_count: i32,
}

pub(crate) fn parse_amount(entity: &'static str, raw: &str) -> StoreResult<Amount> {
    Amount::from_str(raw).map_err(|e| StoreError::decode(entity, e))
}

pub(crate) fn parse_account_id(entity: &'static str, raw: &str) -> StoreResult<AccountId> {
    AccountId::from_str(raw).map_err(|e| StoreError::decode(entity, e))
}

pub(crate) fn parse_asset(
    entity: &'static str,
    asset_type: &str,
    code: &str,
    issuer: &str,
) -> StoreResult<AssetKey> {
    let asset_type =
        AssetType::from_str(asset_type).map_err(|e| StoreError::decode(entity, e))?;
    AssetKey::from_parts(asset_type, code, issuer).map_err(|e| StoreError::decode(entity, e))
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> StoreResult<Self> {
        Ok(Account {
            id: row.id,
            account_id: parse_account_id("account", &row.account_id)?,
            sequence: row.sequence,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<BalanceRow> for Balance {
    type Error = StoreError;

    fn try_from(row: BalanceRow) -> StoreResult<Self> {
        Ok(Balance {
            asset: parse_asset("balance", &row.asset_type, &row.code, &row.issuer)?,
            balance: parse_amount("balance", &row.amount)?,
            limit: row
                .trust_limit
                .as_deref()
                .map(|l| parse_amount("balance", l))
                .transpose()?,
        })
    }
}

impl TryFrom<LedgerRow> for Ledger {
    type Error = StoreError;

    fn try_from(row: LedgerRow) -> StoreResult<Self> {
        Ok(Ledger {
            sequence: row.sequence,
            hash: row.hash,
            prev_hash: row.prev_hash,
            transaction_count: row.transaction_count,
            operation_count: row.operation_count,
            closed_at: row.closed_at,
            total_coins: parse_amount("ledger", &row.total_coins)?,
            fee_pool: parse_amount("ledger", &row.fee_pool)?,
            base_fee: row.base_fee,
            base_reserve: parse_amount("ledger", &row.base_reserve)?,
        })
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> StoreResult<Self> {
        let signatures: Vec<String> = serde_json::from_str(&row.signatures)
            .map_err(|e| StoreError::decode("transaction", e))?;
        Ok(TransactionRecord {
            id: row.id,
            hash: row.hash,
            ledger_sequence: row.ledger_sequence,
            source_account: parse_account_id("transaction", &row.source_account)?,
            fee: row.fee,
            sequence: row.sequence,
            operation_count: row.operation_count,
            memo: row.memo,
            envelope: row.envelope,
            signatures,
            created_at: row.created_at,
            successful: row.successful,
        })
    }
}

impl TryFrom<OperationRow> for OperationRecord {
    type Error = StoreError;

    fn try_from(row: OperationRow) -> StoreResult<Self> {
        let op_type = OperationType::from_str(&row.op_type)
            .map_err(|e| StoreError::decode("operation", e))?;
        let asset = match row.asset_type.as_deref() {
            Some(asset_type) => Some(parse_asset(
                "operation",
                asset_type,
                row.asset_code.as_deref().unwrap_or_default(),
                row.asset_issuer.as_deref().unwrap_or_default(),
            )?),
            None => None,
        };
        Ok(OperationRecord {
            id: row.id,
            transaction_id: row.transaction_id,
            transaction_hash: row.transaction_hash,
            op_type,
            application_order: row.application_order,
            source_account: parse_account_id("operation", &row.source_account)?,
            destination: row
                .destination
                .as_deref()
                .map(|d| parse_account_id("operation", d))
                .transpose()?,
            asset,
            amount: row
                .amount
                .as_deref()
                .map(|a| parse_amount("operation", a))
                .transpose()?,
            body: serde_json::from_str(&row.body).map_err(|e| StoreError::decode("operation", e))?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<OfferRow> for Offer {
    type Error = StoreError;

    fn try_from(row: OfferRow) -> StoreResult<Self> {
        Ok(Offer {
            id: row.id,
            seller: parse_account_id("offer", &row.seller)?,
            selling: parse_asset(
                "offer",
                &row.selling_type,
                &row.selling_code,
                &row.selling_issuer,
            )?,
            buying: parse_asset("offer", &row.buying_type, &row.buying_code, &row.buying_issuer)?,
            amount: parse_amount("offer", &row.amount)?,
            price: Price::new(row.price_n, row.price_d).map_err(|e| StoreError::decode("offer", e))?,
            last_modified_ledger: row.last_modified_ledger,
        })
    }
}

/// Convert rows, skipping (and logging) any that fail to decode
pub(crate) fn decode_rows<R, T>(entity: &'static str, rows: Vec<R>) -> Vec<T>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(entity, error = %err, "skipping undecodable record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance_row(amount: &str) -> BalanceRow {
        BalanceRow {
            asset_type: "credit_alphanum4".into(),
            code: "USD".into(),
            issuer: "GISSUER".into(),
            amount: amount.into(),
            trust_limit: Some("1000.0000000".into()),
        }
    }

    #[test]
    fn test_balance_row_decodes() {
        let balance = Balance::try_from(balance_row("12.5000000")).unwrap();
        assert_eq!(balance.balance.to_string(), "12.5000000");
        assert_eq!(balance.asset.code(), "USD");
        assert!(balance.limit.is_some());
    }

    #[test]
    fn test_decode_rows_skips_corrupt() {
        let rows = vec![balance_row("1"), balance_row("not a number"), balance_row("2")];
        let balances: Vec<Balance> = decode_rows("balance", rows);
        assert_eq!(balances.len(), 2);
    }
}
