use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{Account, AccountId, Error};

/// Result of resolving a username against the store.
///
/// A username is supposed to identify at most one account. When the store
/// holds several, the lookup is [`UsernameLookup::Ambiguous`] and callers must
/// treat it as "not found" rather than pick one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameLookup {
    Found(Account),
    NotFound,
    Ambiguous { matches: usize },
}

impl UsernameLookup {
    /// Classify the raw matches returned by a store.
    ///
    /// Matches are re-checked byte for byte so a store with a case-insensitive
    /// collation cannot leak `Alice` into a lookup for `alice`. Ambiguous results
    /// are logged at error level here, once, for every caller.
    pub fn from_matches(username: &str, matches: Vec<Account>) -> Self {
        let mut matches: Vec<Account> = matches
            .into_iter()
            .filter(|account| account.username == username)
            .collect();

        match matches.len() {
            0 => UsernameLookup::NotFound,
            1 => UsernameLookup::Found(matches.remove(0)),
            count => {
                tracing::error!(
                    username = %username,
                    matches = count,
                    "Username matches more than one account; treating as not found"
                );
                UsernameLookup::Ambiguous { matches: count }
            }
        }
    }

    pub fn into_account(self) -> Option<Account> {
        match self {
            UsernameLookup::Found(account) => Some(account),
            UsernameLookup::NotFound | UsernameLookup::Ambiguous { .. } => None,
        }
    }
}

/// Repository for account data access
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// The transaction type handed out by [`AccountRepository::begin`]
    type Transaction: AccountTransaction;

    /// Open a transaction for a read-modify-write of one account.
    ///
    /// Dropping the transaction without calling
    /// [`AccountTransaction::commit`] discards its writes.
    async fn begin(&self) -> Result<Self::Transaction, Error>;

    /// Return the accounts whose username equals `username` exactly.
    ///
    /// Implementations may stop after two matches; callers only need to
    /// distinguish zero, one and "more than one".
    async fn find_matching_username(&self, username: &str) -> Result<Vec<Account>, Error>;

    /// Find the single account with this username.
    ///
    /// Returns `None` when no account or more than one account matches.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, Error> {
        let matches = self.find_matching_username(username).await?;
        Ok(UsernameLookup::from_matches(username, matches).into_account())
    }

    /// Find an account by ID
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    /// Insert or update an account, keyed by its id, and return the persisted state
    async fn save(&self, account: &Account) -> Result<Account, Error>;

    /// Active accounts whose last successful login is strictly before `cutoff`,
    /// oldest login first.
    ///
    /// Accounts that never logged in carry the epoch sentinel and therefore
    /// always qualify. Inactive accounts are never returned.
    async fn find_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>, Error>;

    /// Active accounts without a successful login during the last `threshold`,
    /// oldest login first.
    ///
    /// A threshold reaching back past the representable range matches nothing.
    async fn find_inactive_since(&self, threshold: Duration) -> Result<Vec<Account>, Error> {
        match Utc::now().checked_sub_signed(threshold) {
            Some(cutoff) => self.find_inactive_before(cutoff).await,
            None => Ok(Vec::new()),
        }
    }

    /// Bring the backing schema up to date. Stores without a schema do nothing.
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Check that the store is reachable
    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// A per-account critical section.
///
/// Each account read or written through the transaction stays locked until
/// the transaction is committed or dropped. Writes become visible to others
/// on commit only.
#[async_trait]
pub trait AccountTransaction: Send {
    /// Same contract as [`AccountRepository::find_matching_username`]; every
    /// returned account is locked by this transaction.
    async fn find_matching_username(&mut self, username: &str) -> Result<Vec<Account>, Error>;

    /// Resolve a username to a single account within this transaction.
    async fn find_by_username(&mut self, username: &str) -> Result<UsernameLookup, Error> {
        let matches = self.find_matching_username(username).await?;
        Ok(UsernameLookup::from_matches(username, matches))
    }

    /// Find and lock an account by ID
    async fn find_by_id(&mut self, id: &AccountId) -> Result<Option<Account>, Error>;

    /// Stage an upsert of `account`
    async fn save(&mut self, account: &Account) -> Result<Account, Error>;

    /// Make the staged writes visible and release all locks.
    async fn commit(self) -> Result<(), Error>;
}
