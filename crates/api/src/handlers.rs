//! API Handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use horizon_core::{
    AccountId, HorizonError, HorizonResult, Page, PageRequest, Pageable, TransactionEnvelope,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::problem::{json_rejection, ApiResult};
use crate::state::AppState;

// ============ Request Types ============

/// `?cursor&limit&order`
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub order: Option<String>,
}

impl PageParams {
    pub fn request(&self) -> HorizonResult<PageRequest> {
        PageRequest::from_query(
            self.cursor.as_deref(),
            self.limit.as_deref(),
            self.order.as_deref(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OfferParams {
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub order: Option<String>,
    pub seller: Option<String>,
}

// ============ Response Helpers ============

fn page_href(path: &str, request: &PageRequest) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    match request.cursor {
        Some(cursor) => format!(
            "{}{}cursor={}&limit={}&order={}",
            path, separator, cursor, request.limit, request.order
        ),
        None => format!(
            "{}{}limit={}&order={}",
            path, separator, request.limit, request.order
        ),
    }
}

fn encode<T: Serialize>(value: &T) -> HorizonResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| HorizonError::Internal(format!("encode response: {}", e)))
}

/// A record with its cursor attached
fn with_paging_token<T: Pageable + Serialize>(record: &T) -> HorizonResult<Value> {
    let mut value = encode(record)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "paging_token".to_string(),
            Value::String(record.paging_token()),
        );
    }
    Ok(value)
}

/// HAL page envelope with self/next/prev links
fn hal_page<T: Pageable + Serialize>(path: &str, page: &Page<T>) -> ApiResult<Json<Value>> {
    let records = page
        .records
        .iter()
        .map(with_paging_token)
        .collect::<HorizonResult<Vec<_>>>()?;

    Ok(Json(json!({
        "_links": {
            "self": { "href": page_href(path, &page.request) },
            "next": { "href": page_href(path, &page.next()) },
            "prev": { "href": page_href(path, &page.prev()) },
        },
        "_embedded": { "records": records },
    })))
}

fn parse_account(raw: &str) -> ApiResult<AccountId> {
    Ok(raw.parse::<AccountId>()?)
}

fn parse_id(entity: &str, raw: &str) -> ApiResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(HorizonError::Validation(format!("invalid {}: {}", entity, raw)).into()),
    }
}

// ============ Handlers ============

pub async fn root(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let latest = state.query.latest_ledger().await?;
    Ok(Json(json!({
        "_links": {
            "account": { "href": "/accounts/{account_id}", "templated": true },
            "accounts": { "href": "/accounts{?cursor,limit,order}", "templated": true },
            "account_transactions": {
                "href": "/accounts/{account_id}/transactions{?cursor,limit,order}",
                "templated": true
            },
            "assets": { "href": "/assets{?cursor,limit,order}", "templated": true },
            "ledgers": { "href": "/ledgers{?cursor,limit,order}", "templated": true },
            "offers": { "href": "/offers{?seller,cursor,limit,order}", "templated": true },
            "operations": { "href": "/operations{?cursor,limit,order}", "templated": true },
            "payments": { "href": "/payments{?cursor,limit,order}", "templated": true },
            "transactions": { "href": "/transactions{?cursor,limit,order}", "templated": true },
        },
        "horizon_version": env!("CARGO_PKG_VERSION"),
        "network_passphrase": state.network_passphrase(),
        "history_latest_ledger": latest.map(|l| l.sequence),
    })))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let latest = state.query.latest_ledger().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": "connected",
        "latest_ledger": latest.map(|l| l.sequence),
        "timestamp": Utc::now(),
    })))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state.query.accounts(params.request()?).await?;
    hal_page("/accounts", &page)
}

/// Account with balances
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_account(&account_id)?;
    let snapshot = state.query.account(&id).await?;

    let mut body = with_paging_token(&snapshot.account)?;
    if let Value::Object(map) = &mut body {
        map.insert("balances".to_string(), encode(&snapshot.balances)?);
    }
    Ok(Json(body))
}

pub async fn account_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let id = parse_account(&account_id)?;
    let page = state
        .query
        .account_transactions(&id, params.request()?)
        .await?;
    hal_page(&format!("/accounts/{}/transactions", id), &page)
}

pub async fn account_operations(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let id = parse_account(&account_id)?;
    let page = state
        .query
        .account_operations(&id, params.request()?)
        .await?;
    hal_page(&format!("/accounts/{}/operations", id), &page)
}

pub async fn account_payments(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let id = parse_account(&account_id)?;
    let page = state.query.account_payments(&id, params.request()?).await?;
    hal_page(&format!("/accounts/{}/payments", id), &page)
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state.query.transactions(params.request()?).await?;
    hal_page("/transactions", &page)
}

/// Submit a transaction envelope
pub async fn submit_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TransactionEnvelope>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(envelope) = payload.map_err(json_rejection)?;
    let outcome = state.gateway.submit(&envelope).await?;
    let record = outcome.record;

    Ok(Json(json!({
        "id": record.id.to_string(),
        "paging_token": record.paging_token(),
        "hash": record.hash,
        "ledger": outcome.ledger,
        "envelope": record.envelope,
        "result": "success",
        "successful": record.successful,
    })))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = state.query.transaction(&hash).await?;
    Ok(Json(with_paging_token(&record)?))
}

pub async fn transaction_operations(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state
        .query
        .transaction_operations(&hash, params.request()?)
        .await?;
    hal_page(&format!("/transactions/{}/operations", hash), &page)
}

pub async fn list_ledgers(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state.query.ledgers(params.request()?).await?;
    hal_page("/ledgers", &page)
}

pub async fn get_ledger(
    State(state): State<AppState>,
    Path(sequence): Path<String>,
) -> ApiResult<Json<Value>> {
    let sequence = parse_id("ledger sequence", &sequence)?;
    let ledger = state.query.ledger(sequence).await?;
    Ok(Json(with_paging_token(&ledger)?))
}

pub async fn ledger_transactions(
    State(state): State<AppState>,
    Path(sequence): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let sequence = parse_id("ledger sequence", &sequence)?;
    let page = state
        .query
        .ledger_transactions(sequence, params.request()?)
        .await?;
    hal_page(&format!("/ledgers/{}/transactions", sequence), &page)
}

pub async fn list_operations(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state.query.operations(params.request()?).await?;
    hal_page("/operations", &page)
}

pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id("operation id", &id)?;
    let operation = state.query.operation(id).await?;
    Ok(Json(with_paging_token(&operation)?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state.query.payments(params.request()?).await?;
    hal_page("/payments", &page)
}

/// Issued assets with holder counts and supply
pub async fn list_assets(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Value>> {
    let page = state.query.assets(params.request()?).await?;
    hal_page("/assets", &page)
}

pub async fn list_offers(
    State(state): State<AppState>,
    Query(params): Query<OfferParams>,
) -> ApiResult<Json<Value>> {
    let request = PageRequest::from_query(
        params.cursor.as_deref(),
        params.limit.as_deref(),
        params.order.as_deref(),
    )?;
    let seller = params
        .seller
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_account)
        .transpose()?;

    let page = state.query.offers(request, seller.as_ref()).await?;
    let path = match &seller {
        Some(seller) => format!("/offers?seller={}", seller),
        None => "/offers".to_string(),
    };
    hal_page(&path, &page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_core::Order;

    #[test]
    fn test_page_href() {
        let request = PageRequest::new(Some(42), 2, Order::Desc);
        assert_eq!(
            page_href("/transactions", &request),
            "/transactions?cursor=42&limit=2&order=desc"
        );

        let request = PageRequest::new(None, 10, Order::Asc);
        assert_eq!(
            page_href("/offers?seller=GALICE", &request),
            "/offers?seller=GALICE&limit=10&order=asc"
        );
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("ledger sequence", "7").unwrap(), 7);
        assert!(parse_id("ledger sequence", "0").is_err());
        assert!(parse_id("ledger sequence", "seven").is_err());
    }
}
