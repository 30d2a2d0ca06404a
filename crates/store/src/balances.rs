//! Balance Ledger - applies commit effects inside an open write transaction
//!
//! Every function here assumes the caller holds the account locks and a
//! SQLite write transaction; nothing is committed here.

use crate::error::StoreResult;
use crate::repos::{AccountRepo, AssetRepo, BalanceRepo, OfferRepo};
use chrono::{DateTime, Utc};
use horizon_core::{AccountId, Amount, AssetKey, Balance, Effect, HorizonError};
use sqlx::SqliteConnection;

/// Error for debiting an asset the account holds no row of
fn missing_balance(account: &AccountId, asset: &AssetKey, requested: Amount) -> HorizonError {
    if asset.is_native() {
        HorizonError::InsufficientBalance {
            account: account.to_string(),
            asset: asset.to_string(),
            available: Amount::ZERO.to_string(),
            requested: requested.to_string(),
        }
    } else {
        HorizonError::UnknownAsset {
            account: account.to_string(),
            asset: asset.to_string(),
        }
    }
}

pub(crate) async fn create_account(
    conn: &mut SqliteConnection,
    account: &AccountId,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    if !AccountRepo::insert_if_missing(conn, account, now).await? {
        return Err(HorizonError::AccountExists(account.to_string()).into());
    }
    Ok(())
}

/// Apply a signed delta to one (account, asset) row
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    account: &AccountId,
    asset: &AssetKey,
    delta: Amount,
    is_trustline_op: bool,
    now: DateTime<Utc>,
) -> StoreResult<Balance> {
    AccountRepo::insert_if_missing(conn, account, now).await?;
    let asset_id = AssetRepo::ensure(conn, asset).await?;
    let allows_negative = asset.allows_negative_for(account);

    let (balance, limit) = match BalanceRepo::find(conn, account, asset_id).await? {
        None => {
            if delta.is_negative() && !allows_negative {
                return Err(missing_balance(account, asset, delta.negate()).into());
            }
            if delta.is_zero() && !is_trustline_op {
                return Ok(Balance {
                    asset: asset.clone(),
                    balance: Amount::ZERO,
                    limit: None,
                });
            }
            BalanceRepo::insert(conn, account, asset_id, delta, None, now).await?;
            (delta, None)
        }
        Some((current, limit)) => {
            let next = current.checked_add(&delta).ok_or_else(|| {
                HorizonError::Validation(format!("balance overflow for {} in {}", account, asset))
            })?;

            if next.is_negative() && !allows_negative {
                return Err(HorizonError::InsufficientBalance {
                    account: account.to_string(),
                    asset: asset.to_string(),
                    available: current.to_string(),
                    requested: delta.negate().to_string(),
                }
                .into());
            }

            if let Some(limit) = limit {
                if delta.is_positive() && next > limit {
                    return Err(HorizonError::TrustLimit {
                        account: account.to_string(),
                        asset: asset.to_string(),
                        reason: format!("balance {} would exceed limit {}", next, limit),
                    }
                    .into());
                }
            }

            BalanceRepo::update_amount(conn, account, asset_id, next, now).await?;
            (next, limit)
        }
    };

    AccountRepo::touch(conn, account, now).await?;
    Ok(Balance {
        asset: asset.clone(),
        balance,
        limit,
    })
}

/// Open, resize or remove a trust line
pub(crate) async fn change_trust(
    conn: &mut SqliteConnection,
    account: &AccountId,
    asset: &AssetKey,
    limit: Amount,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    let trust_error = |reason: String| HorizonError::TrustLimit {
        account: account.to_string(),
        asset: asset.to_string(),
        reason,
    };

    AccountRepo::insert_if_missing(conn, account, now).await?;
    let asset_id = AssetRepo::ensure(conn, asset).await?;

    match BalanceRepo::find(conn, account, asset_id).await? {
        None if limit.is_zero() => {}
        None => {
            BalanceRepo::insert(conn, account, asset_id, Amount::ZERO, Some(limit), now).await?;
        }
        Some((current, _)) if limit.is_zero() => {
            if !current.is_zero() {
                return Err(trust_error(format!(
                    "cannot remove trust line holding {}",
                    current
                ))
                .into());
            }
            BalanceRepo::delete(conn, account, asset_id).await?;
        }
        Some((current, _)) => {
            if limit < current {
                return Err(trust_error(format!(
                    "limit {} is below balance {}",
                    limit, current
                ))
                .into());
            }
            BalanceRepo::update_limit(conn, account, asset_id, limit, now).await?;
        }
    }

    AccountRepo::touch(conn, account, now).await?;
    Ok(())
}

/// Check that `account` holds at least `amount` of `asset`; issuers always do
async fn ensure_holding(
    conn: &mut SqliteConnection,
    account: &AccountId,
    asset: &AssetKey,
    amount: Amount,
) -> StoreResult<()> {
    if asset.allows_negative_for(account) {
        return Ok(());
    }

    let asset_id = AssetRepo::ensure(conn, asset).await?;
    match BalanceRepo::find(conn, account, asset_id).await? {
        None => Err(missing_balance(account, asset, amount).into()),
        Some((current, _)) if current < amount => Err(HorizonError::InsufficientBalance {
            account: account.to_string(),
            asset: asset.to_string(),
            available: current.to_string(),
            requested: amount.to_string(),
        }
        .into()),
        Some(_) => Ok(()),
    }
}

/// Apply one effect of operation `operation_id`, closing into `ledger`
pub(crate) async fn apply_effect(
    conn: &mut SqliteConnection,
    effect: &Effect,
    operation_id: i64,
    ledger: i64,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    match effect {
        Effect::CreateAccount { account } => create_account(conn, account, now).await,
        Effect::Delta {
            account,
            asset,
            amount,
        } => apply_delta(conn, account, asset, *amount, false, now)
            .await
            .map(|_| ()),
        Effect::Trust {
            account,
            asset,
            limit,
        } => change_trust(conn, account, asset, *limit, now).await,
        Effect::Offer {
            seller,
            selling,
            buying,
            amount,
            price,
        } => {
            AccountRepo::insert_if_missing(conn, seller, now).await?;
            ensure_holding(conn, seller, selling, *amount).await?;
            AssetRepo::ensure(conn, buying).await?;
            OfferRepo::insert(conn, operation_id, seller, selling, buying, *amount, price, ledger)
                .await
        }
    }
}
