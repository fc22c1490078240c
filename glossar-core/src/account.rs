//! Accounts and their login-security bookkeeping
//!
//! An account is a principal that can sign in to the glossary editor. Besides
//! its credential it tracks the state that the lockout policy and the
//! inactivity sweep act on:
//!
//! | Field                   | Type            | Description                                                   |
//! | ----------------------- | --------------- | ------------------------------------------------------------- |
//! | `id`                    | `AccountId`     | Opaque unique identifier, assigned at creation, never reused. |
//! | `username`              | `String`        | Case-sensitive business key used for lookup.                  |
//! | `password_hash`         | `String`        | Encoded credential. Never logged or serialized.               |
//! | `active`                | `bool`          | `false` blocks authentication.                                |
//! | `last_login_at`         | `DateTime`      | Last successful login, [`NEVER_LOGGED_IN`] if none.           |
//! | `failed_login_attempts` | `u32`           | Consecutive failed logins since the last success.             |
//! | `created_at`            | `DateTime`      | The timestamp when the account was created.                   |
//! | `updated_at`            | `DateTime`      | The timestamp when the account was last updated.              |
use crate::{
    Error,
    error::{ValidationError, utilities::RequiredFieldExt},
    id::{generate_prefixed_id, validate_prefixed_id},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for [`Account::last_login_at`] meaning "never logged in".
pub const NEVER_LOGGED_IN: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// A unique, stable identifier for a specific account
/// This value should be treated as opaque
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        AccountId(id.to_string())
    }

    pub fn new_random() -> Self {
        AccountId(generate_prefixed_id("acct"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for an account ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "acct")
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    pub username: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub active: bool,

    pub last_login_at: DateTime<Utc>,

    pub failed_login_attempts: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("active", &self.active)
            .field("last_login_at", &self.last_login_at)
            .field("failed_login_attempts", &self.failed_login_attempts)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Account {
    pub fn builder() -> AccountBuilder {
        AccountBuilder::default()
    }

    /// Whether the account has ever completed a successful login.
    pub fn has_logged_in(&self) -> bool {
        self.last_login_at > NEVER_LOGGED_IN
    }

    /// Whether the last successful login happened strictly before `cutoff`.
    pub fn last_login_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_login_at < cutoff
    }

    /// Record a successful login at `at`.
    ///
    /// Resets the failure counter. `last_login_at` never moves backwards, so a
    /// late-arriving success with an older clock reading keeps the newer value.
    /// `active` is left untouched.
    pub fn record_successful_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = self.last_login_at.max(at);
        self.failed_login_attempts = 0;
        self.updated_at = at;
    }

    /// Record one failed login and return the new consecutive failure count.
    pub fn record_failed_login(&mut self) -> u32 {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
        self.updated_at = Utc::now();
        self.failed_login_attempts
    }

    /// Deactivate the account. Returns `false` if it already was inactive.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.updated_at = Utc::now();
        true
    }
}

#[derive(Default)]
pub struct AccountBuilder {
    id: Option<AccountId>,
    username: Option<String>,
    password_hash: Option<String>,
    active: Option<bool>,
    last_login_at: Option<DateTime<Utc>>,
    failed_login_attempts: Option<u32>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl AccountBuilder {
    pub fn id(mut self, id: AccountId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn last_login_at(mut self, last_login_at: DateTime<Utc>) -> Self {
        self.last_login_at = Some(last_login_at);
        self
    }

    pub fn failed_login_attempts(mut self, failed_login_attempts: u32) -> Self {
        self.failed_login_attempts = Some(failed_login_attempts);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Build the account. Unset fields take the values of a freshly registered
    /// account: random id, active, never logged in, no failed attempts.
    pub fn build(self) -> Result<Account, Error> {
        let now = Utc::now();
        let username = self.username.require_field("Username")?;
        if username.is_empty() {
            return Err(ValidationError::MissingField("Username is required".to_string()).into());
        }

        Ok(Account {
            id: self.id.unwrap_or_default(),
            username,
            password_hash: self.password_hash.unwrap_or_default(),
            active: self.active.unwrap_or(true),
            last_login_at: self.last_login_at.unwrap_or(NEVER_LOGGED_IN),
            failed_login_attempts: self.failed_login_attempts.unwrap_or(0),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

/// Registration input for a new account.
#[derive(Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
}

impl NewAccount {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    /// Turn the registration input into an account with a fresh id.
    pub fn into_account(self) -> Result<Account, Error> {
        Account::builder()
            .username(self.username)
            .password_hash(self.password_hash)
            .build()
    }
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}
