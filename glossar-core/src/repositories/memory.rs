//! In-memory account store.
//!
//! Used by tests and by applications that do not need durable accounts.
//! Each account has its own async mutex; a transaction holds the mutexes of
//! the accounts it touched until it commits or is dropped.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Account, AccountId, Error,
    repositories::{AccountRepository, AccountTransaction},
};

type AccountLocks = DashMap<AccountId, Arc<Mutex<()>>>;

fn lock_handle(locks: &AccountLocks, id: &AccountId) -> Arc<Mutex<()>> {
    Arc::clone(&locks.entry(id.clone()).or_default())
}

fn matching_ids(accounts: &DashMap<AccountId, Account>, username: &str) -> Vec<AccountId> {
    accounts
        .iter()
        .filter(|entry| entry.value().username == username)
        .map(|entry| entry.key().clone())
        .collect()
}

/// Account store backed by a [`DashMap`].
///
/// Usernames are not constrained to be unique, mirroring a store without a
/// unique index; duplicate detection happens at lookup time.
#[derive(Clone, Default)]
pub struct InMemoryAccountRepository {
    accounts: Arc<DashMap<AccountId, Account>>,
    locks: Arc<AccountLocks>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    type Transaction = InMemoryAccountTransaction;

    async fn begin(&self) -> Result<Self::Transaction, Error> {
        Ok(InMemoryAccountTransaction {
            accounts: Arc::clone(&self.accounts),
            locks: Arc::clone(&self.locks),
            held: HashMap::new(),
            staged: HashMap::new(),
        })
    }

    async fn find_matching_username(&self, username: &str) -> Result<Vec<Account>, Error> {
        Ok(self
            .accounts
            .iter()
            .filter(|entry| entry.value().username == username)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, account: &Account) -> Result<Account, Error> {
        let handle = lock_handle(&self.locks, &account.id);
        let _guard = handle.lock().await;
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(account.clone())
    }

    async fn find_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>, Error> {
        let mut inactive: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| entry.value().active && entry.value().last_login_before(cutoff))
            .map(|entry| entry.value().clone())
            .collect();

        inactive.sort_by(|a, b| {
            a.last_login_at
                .cmp(&b.last_login_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(inactive)
    }
}

/// Transaction over an [`InMemoryAccountRepository`].
pub struct InMemoryAccountTransaction {
    accounts: Arc<DashMap<AccountId, Account>>,
    locks: Arc<AccountLocks>,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged: HashMap<AccountId, Account>,
}

impl InMemoryAccountTransaction {
    async fn acquire(&mut self, id: &AccountId) {
        if self.held.contains_key(id) {
            return;
        }
        let guard = lock_handle(&self.locks, id).lock_owned().await;
        self.held.insert(id.clone(), guard);
    }

    fn current(&self, id: &AccountId) -> Option<Account> {
        self.staged
            .get(id)
            .cloned()
            .or_else(|| self.accounts.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AccountTransaction for InMemoryAccountTransaction {
    async fn find_matching_username(&mut self, username: &str) -> Result<Vec<Account>, Error> {
        let mut ids = matching_ids(&self.accounts, username);
        ids.extend(
            self.staged
                .values()
                .filter(|account| account.username == username)
                .map(|account| account.id.clone()),
        );
        // Sorted acquisition keeps two transactions over the same duplicates
        // from deadlocking.
        ids.sort();
        ids.dedup();

        for id in &ids {
            self.acquire(id).await;
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.current(id))
            .filter(|account| account.username == username)
            .collect())
    }

    async fn find_by_id(&mut self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.acquire(id).await;
        Ok(self.current(id))
    }

    async fn save(&mut self, account: &Account) -> Result<Account, Error> {
        self.acquire(&account.id).await;
        self.staged.insert(account.id.clone(), account.clone());
        Ok(account.clone())
    }

    async fn commit(self) -> Result<(), Error> {
        let Self {
            accounts,
            held,
            staged,
            ..
        } = self;

        for (id, account) in staged {
            accounts.insert(id, account);
        }
        drop(held);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NEVER_LOGGED_IN;
    use chrono::Duration;

    fn account(username: &str) -> Account {
        Account::builder().username(username).build().unwrap()
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = InMemoryAccountRepository::new();
        let bob = repo.save(&account("bob")).await.unwrap();

        assert_eq!(repo.find_by_id(&bob.id).await.unwrap(), Some(bob.clone()));
        assert_eq!(repo.find_by_username("bob").await.unwrap(), Some(bob));
        assert_eq!(repo.find_by_username("Bob").await.unwrap(), None);
        assert_eq!(repo.find_by_username("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let repo = InMemoryAccountRepository::new();
        let mut bob = repo.save(&account("bob")).await.unwrap();

        bob.failed_login_attempts = 2;
        repo.save(&bob).await.unwrap();

        assert_eq!(repo.len(), 1);
        let stored = repo.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 2);
    }

    #[tokio::test]
    async fn test_duplicate_usernames_are_not_found() {
        let repo = InMemoryAccountRepository::new();
        repo.save(&account("bob")).await.unwrap();
        repo.save(&account("bob")).await.unwrap();

        assert_eq!(repo.find_by_username("bob").await.unwrap(), None);
        assert_eq!(repo.find_matching_username("bob").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_inactive_before_orders_oldest_first() {
        let repo = InMemoryAccountRepository::new();
        let now = Utc::now();

        let recent = Account::builder()
            .username("recent")
            .last_login_at(now - Duration::minutes(6))
            .build()
            .unwrap();
        let oldest = Account::builder()
            .username("oldest")
            .last_login_at(now - Duration::minutes(60))
            .build()
            .unwrap();
        let fresh = Account::builder()
            .username("fresh")
            .last_login_at(now)
            .build()
            .unwrap();
        let never = Account::builder().username("never").build().unwrap();
        let locked = Account::builder()
            .username("locked")
            .active(false)
            .last_login_at(now - Duration::minutes(100))
            .build()
            .unwrap();

        for account in [&recent, &oldest, &fresh, &never, &locked] {
            repo.save(account).await.unwrap();
        }

        let inactive = repo
            .find_inactive_before(now - Duration::minutes(5))
            .await
            .unwrap();
        let names: Vec<_> = inactive.iter().map(|a| a.username.as_str()).collect();

        assert_eq!(names, vec!["never", "oldest", "recent"]);
        assert_eq!(inactive[0].last_login_at, NEVER_LOGGED_IN);
    }

    #[tokio::test]
    async fn test_transaction_writes_invisible_until_commit() {
        let repo = InMemoryAccountRepository::new();
        let bob = repo.save(&account("bob")).await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let mut staged = tx.find_by_id(&bob.id).await.unwrap().unwrap();
        staged.failed_login_attempts = 1;
        tx.save(&staged).await.unwrap();

        let outside = repo.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(outside.failed_login_attempts, 0);

        tx.commit().await.unwrap();
        let outside = repo.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(outside.failed_login_attempts, 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes_and_releases_lock() {
        let repo = InMemoryAccountRepository::new();
        let bob = repo.save(&account("bob")).await.unwrap();

        {
            let mut tx = repo.begin().await.unwrap();
            let mut staged = tx.find_by_id(&bob.id).await.unwrap().unwrap();
            staged.active = false;
            tx.save(&staged).await.unwrap();
        }

        let mut tx = repo.begin().await.unwrap();
        let current = tx.find_by_id(&bob.id).await.unwrap().unwrap();
        assert!(current.active);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_username_lookup_sees_own_writes() {
        let repo = InMemoryAccountRepository::new();

        let mut tx = repo.begin().await.unwrap();
        let bob = tx.save(&account("bob")).await.unwrap();
        let lookup = tx.find_by_username("bob").await.unwrap();
        assert_eq!(lookup.into_account(), Some(bob));
        tx.commit().await.unwrap();

        assert_eq!(repo.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transactions_on_one_account_serialize() {
        let repo = InMemoryAccountRepository::new();
        let bob = repo.save(&account("bob")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = repo.clone();
            let id = bob.id.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = repo.begin().await.unwrap();
                let mut current = tx.find_by_id(&id).await.unwrap().unwrap();
                tokio::task::yield_now().await;
                current.record_failed_login();
                tx.save(&current).await.unwrap();
                tx.commit().await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = repo.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 20);
    }
}
