//! Indexed records: accounts, balances, ledgers, transactions, operations, offers

use crate::account::AccountId;
use crate::amount::Amount;
use crate::asset::AssetKey;
use crate::price::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Anything that can be walked with a cursor
pub trait Pageable {
    /// Integer the page is ordered by; its decimal string is the cursor
    fn paging_key(&self) -> i64;

    fn paging_token(&self) -> String {
        self.paging_key().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Insertion-ordered paging id
    pub id: i64,
    pub account_id: AccountId,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pageable for Account {
    fn paging_key(&self) -> i64 {
        self.id
    }
}

/// One (account, asset) balance row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: AssetKey,
    pub balance: Amount,
    /// Trust line limit; `None` for native and for issuer rows
    pub limit: Option<Amount>,
}

/// An account with all of its balances, read from one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWithBalances {
    pub account: Account,
    pub balances: Vec<Balance>,
}

/// A closed ledger header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub sequence: i64,
    pub hash: String,
    pub prev_hash: String,
    pub transaction_count: i32,
    pub operation_count: i32,
    pub closed_at: DateTime<Utc>,
    pub total_coins: Amount,
    pub fee_pool: Amount,
    /// Stroops
    pub base_fee: i64,
    pub base_reserve: Amount,
}

impl Pageable for Ledger {
    fn paging_key(&self) -> i64 {
        self.sequence
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub hash: String,
    /// `None` until the containing ledger closes
    pub ledger_sequence: Option<i64>,
    pub source_account: AccountId,
    /// Stroops
    pub fee: i64,
    /// Account sequence consumed by this transaction
    pub sequence: i64,
    pub operation_count: i32,
    pub memo: Option<String>,
    pub envelope: String,
    pub signatures: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub successful: bool,
}

impl Pageable for TransactionRecord {
    fn paging_key(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationType {
    CreateAccount,
    Payment,
    ChangeTrust,
    ManageOffer,
}

impl OperationType {
    /// Types that move value between two accounts
    pub fn is_payment(&self) -> bool {
        matches!(self, OperationType::CreateAccount | OperationType::Payment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: i64,
    pub transaction_id: i64,
    pub transaction_hash: String,
    pub op_type: OperationType,
    /// 0-based position within the transaction
    pub application_order: i32,
    pub source_account: AccountId,
    pub destination: Option<AccountId>,
    pub asset: Option<AssetKey>,
    pub amount: Option<Amount>,
    /// Typed operation body as submitted
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Pageable for OperationRecord {
    fn paging_key(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Id of the operation that created the offer
    pub id: i64,
    pub seller: AccountId,
    pub selling: AssetKey,
    pub buying: AssetKey,
    pub amount: Amount,
    pub price: Price,
    pub last_modified_ledger: i64,
}

impl Pageable for Offer {
    fn paging_key(&self) -> i64 {
        self.id
    }
}

/// Aggregate holdings of one registered asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStat {
    pub id: i64,
    pub asset: AssetKey,
    pub num_accounts: i64,
    pub amount: Amount,
}

impl Pageable for AssetStat {
    fn paging_key(&self) -> i64 {
        self.id
    }
}
