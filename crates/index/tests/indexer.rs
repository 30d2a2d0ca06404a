//! End-to-end tests: gateway -> indexer -> SQLite store -> query engine

use horizon_core::hash::verify_chain;
use horizon_core::{
    AccountId, Amount, ErrorKind, HorizonError, Order, OperationType, PageRequest,
    TransactionEnvelope,
};
use horizon_index::{
    NetworkSettings, QueryEngine, RejectReason, SubmissionGateway, SubmissionState,
    TransactionIndexer,
};
use horizon_store::{HistoryStore, SqliteStore, StoreOptions};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<dyn HistoryStore>,
    indexer: Arc<TransactionIndexer>,
    gateway: SubmissionGateway,
    query: QueryEngine,
}

fn id(s: &str) -> AccountId {
    s.parse().unwrap()
}

fn total_coins() -> Amount {
    Amount::new(dec!(1000000)).unwrap()
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("horizon.db").display());
    let store: Arc<dyn HistoryStore> = Arc::new(
        SqliteStore::connect(&url, &StoreOptions::default())
            .await
            .unwrap(),
    );
    let indexer = Arc::new(TransactionIndexer::new(
        store.clone(),
        NetworkSettings {
            passphrase: "Test Network ; 2024".to_string(),
            base_fee: 100,
            base_reserve: Amount::new(dec!(0.5)).unwrap(),
        },
    ));
    indexer.bootstrap(&id("GROOT"), total_coins()).await.unwrap();

    Harness {
        _dir: dir,
        gateway: SubmissionGateway::new(indexer.clone()),
        query: QueryEngine::new(store.clone()),
        store,
        indexer,
    }
}

fn envelope(source: &str, sequence: i64, operations: Vec<Value>) -> TransactionEnvelope {
    let body = json!({
        "source_account": source,
        "fee": 100,
        "sequence": sequence,
        "operations": operations,
    });
    TransactionEnvelope {
        tx: body.to_string(),
        signatures: vec!["c2lnbmF0dXJl".to_string()],
    }
}

fn payment(destination: &str, amount: &str) -> Value {
    json!({
        "type": "payment",
        "destination": destination,
        "asset": {"asset_type": "native"},
        "amount": amount,
    })
}

fn create_account(destination: &str, starting_balance: &str) -> Value {
    json!({
        "type": "create_account",
        "destination": destination,
        "starting_balance": starting_balance,
    })
}

async fn native(h: &Harness, account: &str) -> Amount {
    h.query
        .account(&id(account))
        .await
        .unwrap()
        .balances
        .into_iter()
        .find(|b| b.asset.is_native())
        .map(|b| b.balance)
        .unwrap_or(Amount::ZERO)
}

#[tokio::test]
async fn test_payment_updates_sequence_and_balances() {
    let h = harness().await;
    h.gateway
        .submit(&envelope("GROOT", 1, vec![create_account("GALICE", "1000")]))
        .await
        .unwrap();
    for expected in 0..5 {
        h.store.advance_sequence(&id("GALICE"), expected).await.unwrap();
    }

    let outcome = h
        .gateway
        .submit(&envelope("GALICE", 6, vec![payment("GBOB", "100")]))
        .await
        .unwrap();

    assert_eq!(outcome.state, SubmissionState::Committed);
    assert_eq!(outcome.ledger, 2);
    assert!(outcome.record.successful);
    assert_eq!(outcome.record.operation_count, 1);

    let alice = h.query.account(&id("GALICE")).await.unwrap();
    assert_eq!(alice.account.sequence, 6);
    assert_eq!(native(&h, "GALICE").await.to_string(), "900.0000000");
    assert_eq!(native(&h, "GBOB").await, Amount::new(dec!(100)).unwrap());
}

#[tokio::test]
async fn test_account_transactions_desc_pagination() {
    let h = harness().await;
    h.gateway
        .submit(&envelope("GROOT", 1, vec![create_account("GALICE", "1000")]))
        .await
        .unwrap();
    for seq in 1..=4 {
        h.gateway
            .submit(&envelope("GALICE", seq, vec![payment("GBOB", "1")]))
            .await
            .unwrap();
    }

    let first = h
        .query
        .account_transactions(&id("GALICE"), PageRequest::new(None, 2, Order::Desc))
        .await
        .unwrap();
    let first_seqs: Vec<i64> = first.records.iter().map(|t| t.sequence).collect();
    assert_eq!(first_seqs, vec![4, 3]);

    let second = h
        .query
        .account_transactions(&id("GALICE"), first.next())
        .await
        .unwrap();
    let second_seqs: Vec<i64> = second.records.iter().map(|t| t.sequence).collect();
    assert_eq!(second_seqs, vec![2, 1]);

    let third = h
        .query
        .account_transactions(&id("GALICE"), second.next())
        .await
        .unwrap();
    assert!(third.records.is_empty());

    let back = h
        .query
        .account_transactions(&id("GALICE"), second.prev())
        .await
        .unwrap();
    let back_seqs: Vec<i64> = back.records.iter().map(|t| t.sequence).collect();
    assert_eq!(back_seqs, vec![3, 4]);
}

#[tokio::test]
async fn test_account_transactions_list_only_sourced() {
    let h = harness().await;
    h.gateway
        .submit(&envelope("GROOT", 1, vec![payment("GBOB", "10")]))
        .await
        .unwrap();
    h.gateway
        .submit(&envelope("GBOB", 1, vec![payment("GCAROL", "2")]))
        .await
        .unwrap();

    let bob = h
        .query
        .account_transactions(&id("GBOB"), PageRequest::default())
        .await
        .unwrap();
    let sources: Vec<&AccountId> = bob.records.iter().map(|t| &t.source_account).collect();
    assert_eq!(sources, vec![&id("GBOB")]);

    let carol = h
        .query
        .account_transactions(&id("GCAROL"), PageRequest::default())
        .await
        .unwrap();
    assert!(carol.records.is_empty());

    // Received payments still show up in the operation views
    let bob_payments = h
        .query
        .account_payments(&id("GBOB"), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(bob_payments.records.len(), 2);
}

#[tokio::test]
async fn test_duplicate_submission_rejected() {
    let h = harness().await;
    let env = envelope("GROOT", 1, vec![payment("GBOB", "5")]);
    h.gateway.submit(&env).await.unwrap();

    let rejection = h.gateway.submit(&env).await.unwrap_err();
    assert_eq!(rejection.reason, RejectReason::Duplicate);
    assert_eq!(rejection.error.kind(), ErrorKind::Conflict);
    assert_eq!(native(&h, "GBOB").await, Amount::new(dec!(5)).unwrap());

    let all = h.query.transactions(PageRequest::default()).await.unwrap();
    assert_eq!(all.records.len(), 1);
}

#[tokio::test]
async fn test_gateway_commits_the_prepared_plan() {
    let h = harness().await;
    let env = envelope("GROOT", 1, vec![payment("GBOB", "5"), payment("GCAROL", "1")]);

    let validated = h.indexer.validate(&env).unwrap();
    let plan = h.indexer.plan(&env, &validated).unwrap();
    assert_eq!(h.indexer.prepare(&env).unwrap(), plan);
    assert_eq!(plan.hash, validated.hash);
    assert_eq!(plan.operations.len(), 2);

    let outcome = h.gateway.submit(&env).await.unwrap();
    assert_eq!(outcome.record.hash, validated.hash);
    assert_eq!(outcome.state, SubmissionState::Committed);

    let ops = h
        .query
        .transaction_operations(&validated.hash, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ops.records.len(), plan.operations.len());
}

#[tokio::test]
async fn test_malformed_input_never_reaches_store() {
    let h = harness().await;

    let garbage = TransactionEnvelope {
        tx: "not json".to_string(),
        signatures: vec![],
    };
    let rejection = h.gateway.submit(&garbage).await.unwrap_err();
    assert_eq!(rejection.reason, RejectReason::Malformed);

    let unknown = envelope("GMALLORY", 1, vec![json!({"type": "inflation"})]);
    let rejection = h.gateway.submit(&unknown).await.unwrap_err();
    assert_eq!(rejection.reason, RejectReason::Malformed);

    let negative = envelope("GMALLORY", 1, vec![payment("GBOB", "-5")]);
    let rejection = h.gateway.submit(&negative).await.unwrap_err();
    assert_eq!(rejection.reason, RejectReason::Malformed);

    let err = h.query.account(&id("GMALLORY")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_rejections_leave_no_partial_state() {
    let h = harness().await;
    h.gateway
        .submit(&envelope("GROOT", 1, vec![create_account("GALICE", "10")]))
        .await
        .unwrap();

    let rejection = h
        .gateway
        .submit(&envelope("GALICE", 3, vec![payment("GBOB", "1")]))
        .await
        .unwrap_err();
    assert_eq!(rejection.reason, RejectReason::SequenceConflict);

    let rejection = h
        .gateway
        .submit(&envelope(
            "GALICE",
            1,
            vec![payment("GBOB", "4"), payment("GCAROL", "7")],
        ))
        .await
        .unwrap_err();
    assert_eq!(rejection.reason, RejectReason::InsufficientBalance);

    let rejection = h
        .gateway
        .submit(&envelope("GROOT", 2, vec![create_account("GALICE", "1")]))
        .await
        .unwrap_err();
    assert_eq!(rejection.reason, RejectReason::AccountExists);

    assert_eq!(h.query.account(&id("GALICE")).await.unwrap().account.sequence, 0);
    assert_eq!(native(&h, "GALICE").await, Amount::new(dec!(10)).unwrap());
    assert!(h.query.account(&id("GBOB")).await.is_err());
    assert_eq!(h.query.account(&id("GROOT")).await.unwrap().account.sequence, 1);
}

#[tokio::test]
async fn test_unknown_asset_rejected() {
    let h = harness().await;
    let rejection = h
        .gateway
        .submit(&envelope(
            "GROOT",
            1,
            vec![json!({
                "type": "payment",
                "destination": "GBOB",
                "asset": {"asset_type": "credit_alphanum4", "asset_code": "USD", "asset_issuer": "GISSUER"},
                "amount": "1",
            })],
        ))
        .await
        .unwrap_err();
    assert_eq!(rejection.reason, RejectReason::UnknownAsset);
}

#[tokio::test]
async fn test_native_supply_is_conserved() {
    let h = harness().await;
    let accounts = ["GA", "GB", "GC"];
    for (i, account) in accounts.iter().enumerate() {
        h.indexer
            .commit(&envelope("GROOT", i as i64 + 1, vec![create_account(account, "50")]))
            .await
            .unwrap();
    }

    for round in 1..=3 {
        for (i, account) in accounts.iter().enumerate() {
            let to = accounts[(i + 1) % accounts.len()];
            h.gateway
                .submit(&envelope(account, round, vec![payment(to, "7.1234567")]))
                .await
                .unwrap();
        }
        h.indexer.close_ledger().await.unwrap();
    }

    let mut total = native(&h, "GROOT").await;
    for account in accounts {
        assert_eq!(native(&h, account).await, Amount::new(dec!(50)).unwrap());
        total = total.checked_add(&native(&h, account).await).unwrap();
    }
    assert_eq!(total, total_coins());

    let latest = h.query.latest_ledger().await.unwrap().unwrap();
    assert_eq!(latest.total_coins, total_coins());
}

#[tokio::test]
async fn test_ledger_chain_and_audit() {
    let h = harness().await;
    h.gateway
        .submit(&envelope("GROOT", 1, vec![payment("GBOB", "1")]))
        .await
        .unwrap();
    let second = h.indexer.close_ledger().await.unwrap();
    let third = h.indexer.close_ledger().await.unwrap();

    assert_eq!(second.transaction_count, 1);
    assert_eq!(second.fee_pool, Amount::from_stroops(100));
    assert_eq!(third.prev_hash, second.hash);
    assert_eq!(third.transaction_count, 0);
    assert_eq!(third.fee_pool, second.fee_pool);

    let report = h.indexer.audit().await.unwrap();
    assert_eq!(report.ledgers, 3);
    let latest = report.latest.unwrap();
    assert_eq!(latest.sequence, 3);
    assert_eq!(latest.hash, third.hash);

    let chain = h
        .query
        .ledgers(PageRequest::new(None, 200, Order::Asc))
        .await
        .unwrap();
    assert!(verify_chain(&chain.records).is_ok());

    let in_second = h
        .query
        .ledger_transactions(2, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(in_second.records.len(), 1);
    assert_eq!(in_second.records[0].ledger_sequence, Some(2));

    let err = h
        .query
        .ledger_transactions(99, PageRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HorizonError::NotFound { .. }));
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let h = harness().await;
    let genesis = h.query.ledger(1).await.unwrap();
    let again = h
        .indexer
        .bootstrap(&id("GROOT"), total_coins())
        .await
        .unwrap();
    assert_eq!(again.hash, genesis.hash);
    assert_eq!(native(&h, "GROOT").await, total_coins());
}

#[tokio::test]
async fn test_payments_view_and_transaction_operations() {
    let h = harness().await;
    let created = h
        .gateway
        .submit(&envelope(
            "GROOT",
            1,
            vec![create_account("GALICE", "20"), payment("GBOB", "3")],
        ))
        .await
        .unwrap();
    h.gateway
        .submit(&envelope(
            "GALICE",
            1,
            vec![json!({
                "type": "change_trust",
                "asset": {"asset_type": "credit_alphanum4", "asset_code": "USD", "asset_issuer": "GISSUER"},
                "limit": "500",
            })],
        ))
        .await
        .unwrap();

    let ops = h
        .query
        .transaction_operations(&created.record.hash, PageRequest::new(None, 10, Order::Asc))
        .await
        .unwrap();
    let types: Vec<OperationType> = ops.records.iter().map(|o| o.op_type).collect();
    assert_eq!(types, vec![OperationType::CreateAccount, OperationType::Payment]);
    assert_eq!(ops.records[1].application_order, 1);

    let payments = h.query.payments(PageRequest::default()).await.unwrap();
    assert_eq!(payments.records.len(), 2);
    assert!(payments.records.iter().all(|o| o.op_type.is_payment()));

    let all = h.query.operations(PageRequest::default()).await.unwrap();
    assert_eq!(all.records.len(), 3);

    let alice_payments = h
        .query
        .account_payments(&id("GALICE"), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(alice_payments.records.len(), 1);

    let stats = h.query.assets(PageRequest::default()).await.unwrap();
    assert_eq!(stats.records.len(), 2);
    let usd = stats
        .records
        .iter()
        .find(|s| s.asset.code() == "USD")
        .unwrap();
    assert_eq!(usd.num_accounts, 1);
    assert!(usd.amount.is_zero());

    let lumens = stats.records.iter().find(|s| s.asset.is_native()).unwrap();
    assert_eq!(lumens.num_accounts, 3);
    assert_eq!(lumens.amount, total_coins());
}

#[tokio::test]
async fn test_concurrent_submissions_from_distinct_accounts() {
    let h = harness().await;
    let senders: Vec<String> = (0..6).map(|i| format!("GSENDER{}", i)).collect();
    for (i, sender) in senders.iter().enumerate() {
        h.gateway
            .submit(&envelope("GROOT", i as i64 + 1, vec![create_account(sender, "10")]))
            .await
            .unwrap();
    }

    let gateway = Arc::new(h.gateway);
    let mut handles = Vec::new();
    for sender in &senders {
        let gateway = gateway.clone();
        let env = envelope(sender, 1, vec![payment("GSINK", "2")]);
        handles.push(tokio::spawn(async move { gateway.submit(&env).await }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().record.id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), senders.len());

    let sink = h.query.account(&id("GSINK")).await.unwrap();
    assert_eq!(sink.balances[0].balance, Amount::new(dec!(12)).unwrap());
}
