//! Transaction Indexer - commits transactions and maintains the ledger chain

use crate::effects::plan_transaction;
use chrono::Utc;
use horizon_core::hash::{check_link, ledger_hash, ZERO_HASH};
use horizon_core::paging::MAX_LIMIT;
use horizon_core::{
    AccountId, Amount, CommitPlan, HorizonError, HorizonResult, Ledger, Order, PageRequest,
    TransactionBody, TransactionEnvelope, TransactionRecord,
};
use horizon_store::{CloseParams, HistoryStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Network parameters stamped onto transactions and ledgers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub passphrase: String,
    /// Stroops
    pub base_fee: i64,
    pub base_reserve: Amount,
}

/// A decoded body with its network hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    pub body: TransactionBody,
    pub hash: String,
}

/// Result of walking the whole chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub ledgers: u64,
    pub latest: Option<Ledger>,
}

pub struct TransactionIndexer {
    store: Arc<dyn HistoryStore>,
    network: NetworkSettings,
}

impl TransactionIndexer {
    pub fn new(store: Arc<dyn HistoryStore>, network: NetworkSettings) -> Self {
        Self { store, network }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn network(&self) -> &NetworkSettings {
        &self.network
    }

    /// Decode and structurally validate an envelope, then hash it under
    /// this network's passphrase
    pub fn validate(&self, envelope: &TransactionEnvelope) -> HorizonResult<ValidatedTransaction> {
        let body = envelope.decode()?;
        let hash = body.hash(&self.network.passphrase)?;
        Ok(ValidatedTransaction { body, hash })
    }

    /// Lower a validated transaction to store effects
    pub fn plan(
        &self,
        envelope: &TransactionEnvelope,
        validated: &ValidatedTransaction,
    ) -> HorizonResult<CommitPlan> {
        plan_transaction(envelope, &validated.body, validated.hash.clone())
    }

    /// Validate and plan an envelope without touching the store
    pub fn prepare(&self, envelope: &TransactionEnvelope) -> HorizonResult<CommitPlan> {
        let validated = self.validate(envelope)?;
        self.plan(envelope, &validated)
    }

    /// Apply a prepared plan atomically
    pub async fn commit_plan(&self, plan: &CommitPlan) -> HorizonResult<TransactionRecord> {
        self.store.commit(plan).await
    }

    /// Prepare and commit in one step
    pub async fn commit(&self, envelope: &TransactionEnvelope) -> HorizonResult<TransactionRecord> {
        let plan = self.prepare(envelope)?;
        self.commit_plan(&plan).await
    }

    /// Write ledger 1 and fund `root`. Returns the existing genesis when the
    /// chain is already initialised.
    #[instrument(skip(self, root, total_coins), fields(root = %root))]
    pub async fn bootstrap(&self, root: &AccountId, total_coins: Amount) -> HorizonResult<Ledger> {
        if !total_coins.is_positive() {
            return Err(HorizonError::Validation(format!(
                "total coins must be positive: {}",
                total_coins
            )));
        }

        match self.store.latest_ledger().await {
            Ok(latest) => {
                info!(latest = latest.sequence, "chain already initialised");
                return self.store.ledger(1).await;
            }
            Err(HorizonError::LedgerEmpty) => {}
            Err(err) => return Err(err),
        }

        let genesis = self.genesis(total_coins);
        self.store.bootstrap(&genesis, root).await?;
        Ok(genesis)
    }

    fn genesis(&self, total_coins: Amount) -> Ledger {
        let mut genesis = Ledger {
            sequence: 1,
            hash: String::new(),
            prev_hash: ZERO_HASH.to_string(),
            transaction_count: 0,
            operation_count: 0,
            closed_at: Utc::now(),
            total_coins,
            fee_pool: Amount::ZERO,
            base_fee: self.network.base_fee,
            base_reserve: self.network.base_reserve,
        };
        genesis.hash = ledger_hash(&genesis, &[]);
        genesis
    }

    /// Close the next ledger over every pending transaction
    pub async fn close_ledger(&self) -> HorizonResult<Ledger> {
        let params = CloseParams {
            closed_at: Utc::now(),
            base_fee: self.network.base_fee,
            base_reserve: self.network.base_reserve,
        };
        self.store.close_ledger(&params).await
    }

    /// Append a header produced elsewhere
    pub async fn append_ledger(&self, ledger: &Ledger) -> HorizonResult<()> {
        self.store.append_ledger(ledger).await
    }

    /// Walk the chain from ledger 1, checking sequences and prev-hash links
    pub async fn audit(&self) -> HorizonResult<AuditReport> {
        let mut request = PageRequest::new(None, MAX_LIMIT, Order::Asc);
        let mut last: Option<Ledger> = None;
        let mut count = 0u64;

        loop {
            let page = self.store.ledgers(request).await?;
            if page.records.is_empty() {
                break;
            }
            request = page.next();

            for ledger in page.records {
                if let Err(err) = check_link(last.as_ref(), &ledger) {
                    warn!(sequence = ledger.sequence, error = %err, "chain audit failed");
                    return Err(err.into());
                }
                count += 1;
                last = Some(ledger);
            }
        }

        info!(ledgers = count, "chain audit passed");
        Ok(AuditReport {
            ledgers: count,
            latest: last,
        })
    }
}
