//! SQLite implementation of the account repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glossar_core::{
    Account, AccountId, Error,
    error::{StorageError, ValidationError, utilities::DatabaseResultExt},
    repositories::{AccountRepository, AccountTransaction},
};
use sqlx::{Sqlite, SqliteExecutor, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

const ACCOUNT_COLUMNS: &str =
    "id, username, password_hash, active, last_login_at, failed_login_attempts, created_at, updated_at";

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteAccount {
    id: String,
    username: String,
    password_hash: String,
    active: bool,
    last_login_at: i64,
    failed_login_attempts: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteAccount> for Account {
    type Error = Error;

    fn try_from(row: SqliteAccount) -> Result<Self, Self::Error> {
        let failed_login_attempts = u32::try_from(row.failed_login_attempts).map_err(|_| {
            StorageError::Constraint(format!(
                "failed_login_attempts out of range for account {}",
                row.id
            ))
        })?;

        Account::builder()
            .id(AccountId::new(&row.id))
            .username(row.username)
            .password_hash(row.password_hash)
            .active(row.active)
            .last_login_at(DateTime::from_timestamp_nanos(row.last_login_at))
            .failed_login_attempts(failed_login_attempts)
            .created_at(DateTime::from_timestamp_nanos(row.created_at))
            .updated_at(DateTime::from_timestamp_nanos(row.updated_at))
            .build()
    }
}

fn to_nanos(at: DateTime<Utc>, field: &str) -> Result<i64, Error> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| ValidationError::InvalidField(format!("{field} out of range")).into())
}

/// Cutoffs outside the storable range match nothing (too early) or every
/// row (too late), so they are clamped instead of rejected.
fn cutoff_nanos(cutoff: DateTime<Utc>) -> i64 {
    cutoff.timestamp_nanos_opt().unwrap_or(if cutoff < DateTime::UNIX_EPOCH {
        i64::MIN
    } else {
        i64::MAX
    })
}

async fn fetch_by_id<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &AccountId,
) -> Result<Option<Account>, Error> {
    let row = sqlx::query_as::<_, SqliteAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
    ))
    .bind(id.as_str())
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, account_id = %id, "Failed to load account");
        StorageError::Database("Failed to load account".to_string())
    })?;

    row.map(Account::try_from).transpose()
}

/// At most two rows: enough to tell "unique" from "ambiguous".
async fn fetch_matching_username<'e>(
    executor: impl SqliteExecutor<'e>,
    username: &str,
) -> Result<Vec<Account>, Error> {
    let rows = sqlx::query_as::<_, SqliteAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1 ORDER BY id LIMIT 2"
    ))
    .bind(username)
    .fetch_all(executor)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, username = %username, "Failed to look up account by username");
        StorageError::Database("Failed to look up account by username".to_string())
    })?;

    rows.into_iter().map(Account::try_from).collect()
}

async fn upsert<'e>(executor: impl SqliteExecutor<'e>, account: &Account) -> Result<Account, Error> {
    let row = sqlx::query_as::<_, SqliteAccount>(&format!(
        r#"
        INSERT INTO accounts ({ACCOUNT_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            password_hash = excluded.password_hash,
            active = excluded.active,
            last_login_at = excluded.last_login_at,
            failed_login_attempts = excluded.failed_login_attempts,
            updated_at = excluded.updated_at
        RETURNING {ACCOUNT_COLUMNS}
        "#
    ))
    .bind(account.id.as_str())
    .bind(&account.username)
    .bind(&account.password_hash)
    .bind(account.active)
    .bind(to_nanos(account.last_login_at, "last_login_at")?)
    .bind(i64::from(account.failed_login_attempts))
    .bind(to_nanos(account.created_at, "created_at")?)
    .bind(to_nanos(account.updated_at, "updated_at")?)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, account_id = %account.id, "Failed to save account");
        StorageError::Database("Failed to save account".to_string())
    })?;

    row.try_into()
}

/// SQLite repository for accounts.
///
/// SQLite allows a single writer. Every write path (transactions and plain
/// saves) goes through one in-process gate so concurrent writers queue up
/// instead of failing with `SQLITE_BUSY`. Clones share the gate.
#[derive(Clone)]
pub struct SqliteAccountRepository {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    type Transaction = SqliteAccountTransaction;

    async fn begin(&self) -> Result<Self::Transaction, Error> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_db_err_with_context("Failed to begin account transaction")?;

        Ok(SqliteAccountTransaction { tx, _writer: writer })
    }

    async fn find_matching_username(&self, username: &str) -> Result<Vec<Account>, Error> {
        fetch_matching_username(&self.pool, username).await
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        fetch_by_id(&self.pool, id).await
    }

    async fn save(&self, account: &Account) -> Result<Account, Error> {
        let _writer = self.writer.lock().await;
        upsert(&self.pool, account).await
    }

    async fn find_inactive_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Account>, Error> {
        let rows = sqlx::query_as::<_, SqliteAccount>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS} FROM accounts
            WHERE active = 1 AND last_login_at < ?1
            ORDER BY last_login_at ASC, id ASC
            "#
        ))
        .bind(cutoff_nanos(cutoff))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to query inactive accounts");
            StorageError::Database("Failed to query inactive accounts".to_string())
        })?;

        rows.into_iter().map(Account::try_from).collect()
    }

    async fn migrate(&self) -> Result<(), Error> {
        crate::migrations::run(&self.pool).await
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "SQLite health check failed");
                StorageError::Connection("Database unavailable".to_string())
            })?;
        Ok(())
    }
}

/// An open SQLite transaction holding the repository's writer gate.
///
/// Dropping it without [`AccountTransaction::commit`] rolls back.
pub struct SqliteAccountTransaction {
    // Dropped before the gate so the rollback is queued while still exclusive.
    tx: Transaction<'static, Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl AccountTransaction for SqliteAccountTransaction {
    async fn find_matching_username(&mut self, username: &str) -> Result<Vec<Account>, Error> {
        fetch_matching_username(&mut *self.tx, username).await
    }

    async fn find_by_id(&mut self, id: &AccountId) -> Result<Option<Account>, Error> {
        fetch_by_id(&mut *self.tx, id).await
    }

    async fn save(&mut self, account: &Account) -> Result<Account, Error> {
        upsert(&mut *self.tx, account).await
    }

    async fn commit(self) -> Result<(), Error> {
        let Self { tx, _writer } = self;
        tx.commit()
            .await
            .map_db_err_with_context("Failed to commit account transaction")
    }
}
