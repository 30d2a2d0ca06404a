//! Per-account write locks
//!
//! Writes touching the same account are serialized; writes on disjoint
//! account sets run concurrently.

use dashmap::DashMap;
use horizon_core::AccountId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Entries live only while some commit holds or awaits them, so the map
/// is bounded by in-flight writers rather than by every account ever seen.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

/// Guards held for the duration of one commit
#[derive(Debug)]
pub struct AccountGuards {
    guards: Vec<OwnedMutexGuard<()>>,
    accounts: Vec<AccountId>,
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

impl Drop for AccountGuards {
    fn drop(&mut self) {
        self.guards.clear();
        // The shard lock makes the count check atomic with lock_for
        for account in &self.accounts {
            self.locks
                .remove_if(account, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account: &AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(account.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Lock every account in sorted order.
    ///
    /// The map shard guard is released before awaiting.
    pub async fn lock_all(&self, accounts: &[AccountId]) -> AccountGuards {
        let mut sorted: Vec<AccountId> = accounts.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for account in &sorted {
            let lock = self.lock_for(account);
            guards.push(lock.lock_owned().await);
        }
        AccountGuards {
            guards,
            accounts: sorted,
            locks: self.locks.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(s: &str) -> AccountId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_duplicates_do_not_deadlock() {
        let locks = AccountLocks::new();
        let _guards = locks.lock_all(&[id("GA"), id("GB"), id("GA")]).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = AccountLocks::new();
        for n in 0..100 {
            let _g = locks.lock_all(&[id(&format!("GACC{n}")), id("GROOT")]).await;
        }
        assert!(locks.is_empty());

        let held = locks.lock_all(&[id("GA"), id("GB")]).await;
        let other = locks.lock_all(&[id("GC")]).await;
        drop(other);
        assert_eq!(locks.len(), 2);
        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(AccountLocks::new());
        let held = locks.lock_all(&[id("GA")]).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock_all(&[id("GA")]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The waiter still shares the mutex, so release must not evict it
        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::new());
        let held = locks.lock_all(&[id("GA")]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock_all(&[id("GA")]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_accounts_proceed() {
        let locks = AccountLocks::new();
        let _a = locks.lock_all(&[id("GA")]).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock_all(&[id("GB")])).await;
        assert!(b.is_ok());
    }
}
