//! SQLite account store for glossar.
//!
//! ```rust,ignore
//! use glossar_storage_sqlite::SqliteStorage;
//!
//! let storage = SqliteStorage::connect("sqlite://glossar.db?mode=rwc").await?;
//! storage.migrate().await?;
//! let accounts = storage.accounts();
//! ```
pub mod migrations;
pub mod repositories;

use std::{str::FromStr, sync::Arc};

use glossar_core::{Error, error::StorageError, repositories::AccountRepository};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub use repositories::{SqliteAccountRepository, SqliteAccountTransaction};
pub use sqlx::SqlitePool;

/// Connection pool plus the account repository built on it.
pub struct SqliteStorage {
    pool: SqlitePool,
    accounts: Arc<SqliteAccountRepository>,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        let accounts = Arc::new(SqliteAccountRepository::new(pool.clone()));
        Self { pool, accounts }
    }

    /// Open a pool for `database_url`, creating the database file if needed.
    ///
    /// File databases use WAL so readers never block the single writer.
    /// In-memory databases live in a single connection that is never
    /// recycled, since the database disappears with its last connection.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                tracing::error!(error = %e, "Invalid SQLite database URL");
                StorageError::Connection(format!("Invalid database URL: {e}"))
            })?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            StorageError::Connection("Failed to connect to SQLite".to_string())
        })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The account repository; all handles share one writer gate.
    pub fn accounts(&self) -> Arc<SqliteAccountRepository> {
        Arc::clone(&self.accounts)
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), Error> {
        self.accounts.migrate().await
    }

    /// Check that the database answers
    pub async fn health_check(&self) -> Result<(), Error> {
        self.accounts.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossar_core::{
        AccountSecurityConfig, Argon2PasswordEncoder, InactivitySweepService,
        LoginOutcomeService, SweepOutcome, services::AccountService,
    };

    async fn storage() -> SqliteStorage {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_migrate_twice() {
        let storage = storage().await;
        storage.migrate().await.unwrap();
        storage.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_url_is_connection_error() {
        let err = SqliteStorage::connect("sqlite:///nonexistent-glossar-dir/accounts.db")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Storage(StorageError::Connection(_))));
    }

    #[tokio::test]
    async fn test_lockout_against_sqlite() {
        let storage = storage().await;
        let accounts = storage.accounts();
        AccountService::new(accounts.clone(), Arc::new(Argon2PasswordEncoder))
            .create_account("bob", "secret")
            .await
            .unwrap();

        let config = AccountSecurityConfig::default().with_max_failed_login_attempts(3);
        let service = LoginOutcomeService::new(accounts.clone(), &config);
        for _ in 0..3 {
            service.on_login_failure(Some("bob")).await.unwrap();
        }

        let bob = accounts.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.failed_login_attempts, 3);
        assert!(!bob.active);
    }

    #[tokio::test]
    async fn test_sweep_against_sqlite() {
        let storage = storage().await;
        let accounts = storage.accounts();
        let alice = glossar_core::Account::builder()
            .username("alice")
            .last_login_at(chrono::Utc::now() - chrono::Duration::minutes(10))
            .build()
            .unwrap();
        accounts.save(&alice).await.unwrap();

        let config = AccountSecurityConfig::default().with_inactivity_threshold_minutes(5);
        let sweep = InactivitySweepService::new(accounts.clone(), &config);

        let SweepOutcome::Completed(report) = sweep.run_once().await.unwrap() else {
            panic!("sweep was skipped");
        };
        assert_eq!(report.deactivated, vec!["alice"]);
        assert!(!accounts.find_by_id(&alice.id).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_sweep_with_huge_threshold_against_sqlite() {
        let storage = storage().await;
        let accounts = storage.accounts();
        let alice = glossar_core::Account::builder()
            .username("alice")
            .last_login_at(chrono::Utc::now() - chrono::Duration::minutes(10))
            .build()
            .unwrap();
        accounts.save(&alice).await.unwrap();

        let config =
            AccountSecurityConfig::default().with_inactivity_threshold_minutes(200_000_000);
        let sweep = InactivitySweepService::new(accounts.clone(), &config);

        let SweepOutcome::Completed(report) = sweep.run_once().await.unwrap() else {
            panic!("sweep was skipped");
        };
        assert!(report.deactivated.is_empty());
        assert!(accounts.find_by_id(&alice.id).await.unwrap().unwrap().active);
    }
}
