//! CommitPlan - a validated transaction lowered to store-level effects
//!
//! The indexer builds a plan from a typed envelope; the store applies every
//! effect of a plan inside one write transaction or none of them.

use crate::account::AccountId;
use crate::amount::Amount;
use crate::asset::AssetKey;
use crate::model::OperationType;
use crate::price::Price;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single state change produced by an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Create an account that must not already exist
    CreateAccount { account: AccountId },

    /// Signed balance change; negative debits, positive credits
    Delta {
        account: AccountId,
        asset: AssetKey,
        amount: Amount,
    },

    /// Open, resize or (limit 0) remove a trust line
    Trust {
        account: AccountId,
        asset: AssetKey,
        limit: Amount,
    },

    /// Record a standing offer
    Offer {
        seller: AccountId,
        selling: AssetKey,
        buying: AssetKey,
        amount: Amount,
        price: Price,
    },
}

impl Effect {
    pub fn account(&self) -> &AccountId {
        match self {
            Effect::CreateAccount { account }
            | Effect::Delta { account, .. }
            | Effect::Trust { account, .. } => account,
            Effect::Offer { seller, .. } => seller,
        }
    }
}

/// One operation row plus the effects it applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub op_type: OperationType,
    pub source: AccountId,
    pub destination: Option<AccountId>,
    pub asset: Option<AssetKey>,
    pub amount: Option<Amount>,
    pub body: serde_json::Value,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPlan {
    pub hash: String,
    pub source: AccountId,
    /// Sequence the source account advances to
    pub sequence: i64,
    /// Stroops
    pub fee: i64,
    pub memo: Option<String>,
    pub envelope: String,
    pub signatures: Vec<String>,
    pub operations: Vec<PlannedOperation>,
}

impl CommitPlan {
    /// Every account the plan writes, sorted and deduplicated.
    ///
    /// Locks are taken in this order, so two plans can never wait on each other.
    pub fn touched_accounts(&self) -> Vec<AccountId> {
        let mut accounts = BTreeSet::new();
        accounts.insert(self.source.clone());
        for op in &self.operations {
            accounts.insert(op.source.clone());
            if let Some(destination) = &op.destination {
                accounts.insert(destination.clone());
            }
            for effect in &op.effects {
                accounts.insert(effect.account().clone());
            }
        }
        accounts.into_iter().collect()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AccountId {
        s.parse().unwrap()
    }

    #[test]
    fn test_touched_accounts_sorted_and_unique() {
        let amount: Amount = "10".parse().unwrap();
        let plan = CommitPlan {
            hash: "h".into(),
            source: id("GZED"),
            sequence: 1,
            fee: 100,
            memo: None,
            envelope: "{}".into(),
            signatures: vec![],
            operations: vec![PlannedOperation {
                op_type: OperationType::Payment,
                source: id("GZED"),
                destination: Some(id("GAMY")),
                asset: Some(AssetKey::native()),
                amount: Some(amount),
                body: serde_json::Value::Null,
                effects: vec![
                    Effect::Delta {
                        account: id("GZED"),
                        asset: AssetKey::native(),
                        amount: amount.negate(),
                    },
                    Effect::Delta {
                        account: id("GAMY"),
                        asset: AssetKey::native(),
                        amount,
                    },
                ],
            }],
        };

        assert_eq!(plan.touched_accounts(), vec![id("GAMY"), id("GZED")]);
    }
}
