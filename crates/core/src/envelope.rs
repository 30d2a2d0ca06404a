//! Transaction envelopes and the closed set of typed operations
//!
//! A submission is `{ "tx": "<json body>", "signatures": [..] }`. The body
//! decodes into [`TransactionBody`]; unknown operation tags are rejected.

use crate::account::AccountId;
use crate::amount::Amount;
use crate::asset::AssetKey;
use crate::error::{HorizonError, HorizonResult};
use crate::hash;
use crate::model::OperationType;
use crate::price::Price;
use crate::toid::MAX_OPERATIONS;
use serde::{Deserialize, Serialize};

/// Maximum memo length in bytes
pub const MAX_MEMO_BYTES: usize = 28;

/// Submitted envelope, as received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx: String,
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl TransactionEnvelope {
    /// Decode and structurally validate the body
    pub fn decode(&self) -> HorizonResult<TransactionBody> {
        if self.tx.trim().is_empty() {
            return Err(HorizonError::Validation("tx is empty".to_string()));
        }
        let body: TransactionBody = serde_json::from_str(&self.tx)
            .map_err(|e| HorizonError::Validation(format!("malformed transaction body: {}", e)))?;
        body.validate()?;
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub source_account: AccountId,
    /// Stroops
    pub fee: i64,
    /// New sequence of the source account (current + 1)
    pub sequence: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub operations: Vec<Operation>,
}

impl TransactionBody {
    pub fn validate(&self) -> HorizonResult<()> {
        if self.fee < 0 {
            return Err(HorizonError::Validation(format!(
                "fee must not be negative: {}",
                self.fee
            )));
        }

        if self.sequence <= 0 {
            return Err(HorizonError::Validation(format!(
                "sequence must be positive: {}",
                self.sequence
            )));
        }

        if let Some(memo) = &self.memo {
            if memo.len() > MAX_MEMO_BYTES {
                return Err(HorizonError::Validation(format!(
                    "memo exceeds {} bytes",
                    MAX_MEMO_BYTES
                )));
            }
        }

        if self.operations.is_empty() {
            return Err(HorizonError::Validation(
                "transaction has no operations".to_string(),
            ));
        }

        if self.operations.len() > MAX_OPERATIONS {
            return Err(HorizonError::Validation(format!(
                "transaction has {} operations, max {}",
                self.operations.len(),
                MAX_OPERATIONS
            )));
        }

        for (index, op) in self.operations.iter().enumerate() {
            op.validate(&self.source_account)
                .map_err(|e| HorizonError::Validation(format!("operation {}: {}", index, e)))?;
        }

        Ok(())
    }

    /// Content hash under the given network passphrase
    pub fn hash(&self, network_passphrase: &str) -> HorizonResult<String> {
        let payload = serde_json::to_vec(self)
            .map_err(|e| HorizonError::Internal(format!("encode transaction body: {}", e)))?;
        Ok(hash::transaction_hash(
            &hash::network_id(network_passphrase),
            &payload,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Overrides the transaction source for this operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<AccountId>,
    #[serde(flatten)]
    pub body: OperationBody,
}

impl Operation {
    /// Effective source account
    pub fn source<'a>(&'a self, tx_source: &'a AccountId) -> &'a AccountId {
        self.source_account.as_ref().unwrap_or(tx_source)
    }

    fn validate(&self, tx_source: &AccountId) -> Result<(), String> {
        let source = self.source(tx_source);
        match &self.body {
            OperationBody::CreateAccount {
                destination,
                starting_balance,
            } => {
                if !starting_balance.is_positive() {
                    return Err("starting_balance must be positive".to_string());
                }
                if destination == source {
                    return Err("cannot create the source account".to_string());
                }
            }
            OperationBody::Payment { amount, .. } => {
                if !amount.is_positive() {
                    return Err("amount must be positive".to_string());
                }
            }
            OperationBody::ChangeTrust { asset, limit } => {
                if asset.is_native() {
                    return Err("cannot change trust for the native asset".to_string());
                }
                if asset.issuer() == source.as_str() {
                    return Err("issuer cannot trust its own asset".to_string());
                }
                if limit.is_negative() {
                    return Err("limit must not be negative".to_string());
                }
            }
            OperationBody::ManageOffer {
                selling,
                buying,
                amount,
                price,
            } => {
                if !amount.is_positive() {
                    return Err("amount must be positive".to_string());
                }
                if selling == buying {
                    return Err("selling and buying must differ".to_string());
                }
                price.validate().map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    CreateAccount {
        destination: AccountId,
        starting_balance: Amount,
    },
    Payment {
        destination: AccountId,
        asset: AssetKey,
        amount: Amount,
    },
    ChangeTrust {
        asset: AssetKey,
        limit: Amount,
    },
    ManageOffer {
        selling: AssetKey,
        buying: AssetKey,
        amount: Amount,
        price: Price,
    },
}

impl OperationBody {
    pub fn op_type(&self) -> OperationType {
        match self {
            OperationBody::CreateAccount { .. } => OperationType::CreateAccount,
            OperationBody::Payment { .. } => OperationType::Payment,
            OperationBody::ChangeTrust { .. } => OperationType::ChangeTrust,
            OperationBody::ManageOffer { .. } => OperationType::ManageOffer,
        }
    }
}
