//! Application state

use horizon_index::{NetworkSettings, QueryEngine, SubmissionGateway, TransactionIndexer};
use horizon_store::HistoryStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub query: QueryEngine,
    pub gateway: Arc<SubmissionGateway>,
    pub indexer: Arc<TransactionIndexer>,
}

impl AppState {
    pub fn new(store: Arc<dyn HistoryStore>, network: NetworkSettings) -> Self {
        let indexer = Arc::new(TransactionIndexer::new(store.clone(), network));
        Self {
            query: QueryEngine::new(store),
            gateway: Arc::new(SubmissionGateway::new(indexer.clone())),
            indexer,
        }
    }

    pub fn network_passphrase(&self) -> &str {
        &self.indexer.network().passphrase
    }
}
