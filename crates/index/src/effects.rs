//! Effect planning - lowers a validated transaction body to a CommitPlan
//!
//! Planning is pure: it never reads the store. Whether a debit is covered or
//! an account already exists is decided when the store applies the plan.

use horizon_core::{
    AccountId, AssetKey, CommitPlan, Effect, HorizonError, HorizonResult, Operation,
    OperationBody, PlannedOperation, TransactionBody, TransactionEnvelope,
};

/// Build the commit plan for `body`, already decoded from `envelope`
pub fn plan_transaction(
    envelope: &TransactionEnvelope,
    body: &TransactionBody,
    hash: String,
) -> HorizonResult<CommitPlan> {
    let operations = body
        .operations
        .iter()
        .map(|op| plan_operation(op, &body.source_account))
        .collect::<HorizonResult<Vec<_>>>()?;

    Ok(CommitPlan {
        hash,
        source: body.source_account.clone(),
        sequence: body.sequence,
        fee: body.fee,
        memo: body.memo.clone(),
        envelope: envelope.tx.clone(),
        signatures: envelope.signatures.clone(),
        operations,
    })
}

fn plan_operation(op: &Operation, tx_source: &AccountId) -> HorizonResult<PlannedOperation> {
    let source = op.source(tx_source).clone();
    let body = serde_json::to_value(op)
        .map_err(|e| HorizonError::Internal(format!("encode operation: {}", e)))?;

    let (destination, asset, amount, effects) = match &op.body {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        } => (
            Some(destination.clone()),
            Some(AssetKey::native()),
            Some(*starting_balance),
            vec![
                Effect::CreateAccount {
                    account: destination.clone(),
                },
                Effect::Delta {
                    account: source.clone(),
                    asset: AssetKey::native(),
                    amount: starting_balance.negate(),
                },
                Effect::Delta {
                    account: destination.clone(),
                    asset: AssetKey::native(),
                    amount: *starting_balance,
                },
            ],
        ),
        OperationBody::Payment {
            destination,
            asset,
            amount,
        } => (
            Some(destination.clone()),
            Some(asset.clone()),
            Some(*amount),
            vec![
                Effect::Delta {
                    account: source.clone(),
                    asset: asset.clone(),
                    amount: amount.negate(),
                },
                Effect::Delta {
                    account: destination.clone(),
                    asset: asset.clone(),
                    amount: *amount,
                },
            ],
        ),
        OperationBody::ChangeTrust { asset, limit } => (
            None,
            Some(asset.clone()),
            Some(*limit),
            vec![Effect::Trust {
                account: source.clone(),
                asset: asset.clone(),
                limit: *limit,
            }],
        ),
        OperationBody::ManageOffer {
            selling,
            buying,
            amount,
            price,
        } => (
            None,
            Some(selling.clone()),
            Some(*amount),
            vec![Effect::Offer {
                seller: source.clone(),
                selling: selling.clone(),
                buying: buying.clone(),
                amount: *amount,
                price: *price,
            }],
        ),
    };

    Ok(PlannedOperation {
        op_type: op.body.op_type(),
        source,
        destination,
        asset,
        amount,
        body,
        effects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_core::{Amount, OperationType};

    fn id(s: &str) -> AccountId {
        s.parse().unwrap()
    }

    fn envelope(tx: serde_json::Value) -> (TransactionEnvelope, TransactionBody) {
        let envelope = TransactionEnvelope {
            tx: tx.to_string(),
            signatures: vec!["sig".to_string()],
        };
        let body = envelope.decode().unwrap();
        (envelope, body)
    }

    #[test]
    fn test_payment_moves_same_amount() {
        let (env, body) = envelope(serde_json::json!({
            "source_account": "GALICE",
            "fee": 100,
            "sequence": 6,
            "operations": [{
                "type": "payment",
                "destination": "GBOB",
                "asset": {"asset_type": "native"},
                "amount": "100"
            }]
        }));

        let plan = plan_transaction(&env, &body, "h".to_string()).unwrap();
        assert_eq!(plan.sequence, 6);
        assert_eq!(plan.signatures, vec!["sig".to_string()]);

        let op = &plan.operations[0];
        assert_eq!(op.op_type, OperationType::Payment);
        assert_eq!(op.destination, Some(id("GBOB")));

        let total = op.effects.iter().fold(Amount::ZERO, |acc, effect| match effect {
            Effect::Delta { amount, .. } => acc.checked_add(amount).unwrap(),
            _ => acc,
        });
        assert!(total.is_zero());
    }

    #[test]
    fn test_create_account_creates_before_crediting() {
        let (env, body) = envelope(serde_json::json!({
            "source_account": "GROOT",
            "fee": 100,
            "sequence": 1,
            "operations": [{
                "type": "create_account",
                "destination": "GNEW",
                "starting_balance": "25"
            }]
        }));

        let plan = plan_transaction(&env, &body, "h".to_string()).unwrap();
        let effects = &plan.operations[0].effects;
        assert_eq!(
            effects[0],
            Effect::CreateAccount {
                account: id("GNEW")
            }
        );
        assert_eq!(effects.len(), 3);
    }

    #[test]
    fn test_operation_source_override() {
        let (env, body) = envelope(serde_json::json!({
            "source_account": "GALICE",
            "fee": 0,
            "sequence": 1,
            "operations": [{
                "type": "change_trust",
                "source_account": "GCAROL",
                "asset": {"asset_type": "credit_alphanum4", "asset_code": "USD", "asset_issuer": "GISSUER"},
                "limit": "1000"
            }]
        }));

        let plan = plan_transaction(&env, &body, "h".to_string()).unwrap();
        let op = &plan.operations[0];
        assert_eq!(op.source, id("GCAROL"));
        assert_eq!(op.effects[0].account(), &id("GCAROL"));
        assert_eq!(op.body["source_account"], "GCAROL");
        assert_eq!(
            plan.touched_accounts(),
            vec![id("GALICE"), id("GCAROL")]
        );
    }
}
