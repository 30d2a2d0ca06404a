//! API Routes

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Accounts
        .route("/accounts", get(handlers::list_accounts))
        .route("/accounts/:account_id", get(handlers::get_account))
        .route(
            "/accounts/:account_id/transactions",
            get(handlers::account_transactions),
        )
        .route(
            "/accounts/:account_id/operations",
            get(handlers::account_operations),
        )
        .route(
            "/accounts/:account_id/payments",
            get(handlers::account_payments),
        )
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::submit_transaction),
        )
        .route("/transactions/:hash", get(handlers::get_transaction))
        .route(
            "/transactions/:hash/operations",
            get(handlers::transaction_operations),
        )
        // Ledgers
        .route("/ledgers", get(handlers::list_ledgers))
        .route("/ledgers/:sequence", get(handlers::get_ledger))
        .route(
            "/ledgers/:sequence/transactions",
            get(handlers::ledger_transactions),
        )
        // Operations
        .route("/operations", get(handlers::list_operations))
        .route("/operations/:id", get(handlers::get_operation))
        .route("/payments", get(handlers::list_payments))
        .route("/assets", get(handlers::list_assets))
        .route("/offers", get(handlers::list_offers));

    let router = if cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
