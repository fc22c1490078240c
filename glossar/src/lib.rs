//! # Glossar
//!
//! Glossar protects the create and edit pages of the glossary application
//! behind a login and keeps the accounts behind that login healthy:
//!
//! - every failed login is counted, and an account is locked once it reaches
//!   the configured number of consecutive failures,
//! - every successful login resets the counter and records the login time,
//! - a background sweep deactivates accounts that have not logged in for
//!   longer than the configured inactivity threshold.
//!
//! Locked and deactivated accounts stay inactive until an operator
//! intervenes.
//!
//! ## Storage Support
//!
//! - SQLite (feature `sqlite`, enabled by default)
//! - In memory, for tests and throwaway deployments
//!
//! ## Example
//!
//! ```rust,no_run
//! use glossar::{AccountSecurityConfig, GlossarBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let glossar = GlossarBuilder::new()
//!         .with_sqlite("sqlite://glossar.db?mode=rwc")
//!         .await?
//!         .with_config(
//!             AccountSecurityConfig::default()
//!                 .with_max_failed_login_attempts(3)
//!                 .with_inactivity_threshold_minutes(5),
//!         )
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let redirect = glossar.login("alice", "g3h3im").await?;
//!     println!("redirect to {}", redirect.location);
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use glossar_core::services::{
    AccountService, AuthenticationService, InactivitySweepService, LoginOutcomeHandler,
    LoginOutcomeService,
};

mod builder;

pub use builder::{GlossarBuilder, GlossarBuilderError, NoStorage, WithStorage};

/// Re-export core types from glossar_core
///
/// These types are commonly used when working with the Glossar API.
pub use glossar_core::{
    Account, AccountId, AccountRepository, AccountSecurityConfig, AccountUpdate,
    Argon2PasswordEncoder, Event, EventBus, EventHandler, InMemoryAccountRepository, LoginOutcome,
    LoginRedirect, NEVER_LOGGED_IN, PasswordEncoder, SweepOutcome, SweepReport,
};

/// Re-export the SQLite storage backend
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use glossar_storage_sqlite::*;
}

#[cfg(feature = "sqlite")]
pub use glossar_storage_sqlite::{SqliteAccountRepository, SqliteStorage};

/// Errors that can occur when using Glossar.
///
/// Expected outcomes of a login (unknown user, wrong password, locked
/// account) are not errors; they surface as [`LoginRedirect`]s.
#[derive(Debug, thiserror::Error)]
pub enum GlossarError {
    /// Error during authentication or registration
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Rejected input
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<glossar_core::Error> for GlossarError {
    fn from(err: glossar_core::Error) -> Self {
        use glossar_core::Error;

        match err {
            Error::Storage(_) | Error::Event(_) => GlossarError::StorageError(err.to_string()),
            Error::Validation(_) => GlossarError::ValidationError(err.to_string()),
            Error::Auth(_) | Error::Crypto(_) => GlossarError::AuthError(err.to_string()),
        }
    }
}

/// The main entry point of the account-security lifecycle.
///
/// Wires the credential check, the login outcome handlers and the inactivity
/// sweep to one account store and one [`AccountSecurityConfig`].
pub struct Glossar<R: AccountRepository, E: PasswordEncoder = Argon2PasswordEncoder> {
    repository: Arc<R>,
    encoder: Arc<E>,
    config: AccountSecurityConfig,
    events: Option<EventBus>,
    account_service: AccountService<R, E>,
    authentication_service: AuthenticationService<R, E>,
    login_service: LoginOutcomeService<R>,
    sweep_service: InactivitySweepService<R>,
}

impl<R: AccountRepository> Glossar<R> {
    /// Create a new Glossar instance with default configuration
    ///
    /// The default configuration never locks and never sweeps; see
    /// [`Glossar::with_config`].
    ///
    /// # Arguments
    ///
    /// * `repository` - The account store
    pub fn new(repository: Arc<R>) -> Self {
        Self::assemble(
            repository,
            Arc::new(Argon2PasswordEncoder),
            AccountSecurityConfig::default(),
            None,
        )
    }
}

impl<R: AccountRepository, E: PasswordEncoder> Glossar<R, E> {
    fn assemble(
        repository: Arc<R>,
        encoder: Arc<E>,
        config: AccountSecurityConfig,
        events: Option<EventBus>,
    ) -> Self {
        let mut login_service = LoginOutcomeService::new(repository.clone(), &config);
        let mut sweep_service = InactivitySweepService::new(repository.clone(), &config);
        if let Some(bus) = &events {
            login_service = login_service.with_event_bus(bus.clone());
            sweep_service = sweep_service.with_event_bus(bus.clone());
        }

        Self {
            account_service: AccountService::new(repository.clone(), encoder.clone()),
            authentication_service: AuthenticationService::new(repository.clone(), encoder.clone()),
            login_service,
            sweep_service,
            repository,
            encoder,
            config,
            events,
        }
    }

    /// Replace the account security configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Lockout limit, inactivity threshold, sweep interval and redirects
    pub fn with_config(self, config: AccountSecurityConfig) -> Self {
        Self::assemble(self.repository, self.encoder, config, self.events)
    }

    /// Publish security events to `bus`
    pub fn with_event_bus(self, bus: EventBus) -> Self {
        Self::assemble(self.repository, self.encoder, self.config, Some(bus))
    }

    /// Use a different password encoder for registration and credential checks
    pub fn with_password_encoder<E2: PasswordEncoder>(self, encoder: Arc<E2>) -> Glossar<R, E2> {
        Glossar::assemble(self.repository, encoder, self.config, self.events)
    }

    pub fn config(&self) -> &AccountSecurityConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Run migrations for the account store
    pub async fn migrate(&self) -> Result<(), GlossarError> {
        Ok(self.repository.migrate().await?)
    }

    /// Health check for the account store
    pub async fn health_check(&self) -> Result<(), GlossarError> {
        Ok(self.repository.health_check().await?)
    }

    /// Register a new account
    ///
    /// # Arguments
    ///
    /// * `username`: The unique, case-sensitive username
    /// * `password`: The raw password; only its encoding is stored
    ///
    /// # Returns
    ///
    /// Returns the active account, which has never logged in
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Account, GlossarError> {
        Ok(self.account_service.create_account(username, password).await?)
    }

    /// Register an account unless one with this username exists already
    ///
    /// The existing account is returned untouched; its password is not changed.
    pub async fn ensure_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Account, GlossarError> {
        Ok(self.account_service.ensure_account(username, password).await?)
    }

    /// Get an account by username
    ///
    /// # Returns
    ///
    /// Returns the account if exactly one account has this username, otherwise `None`
    pub async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, GlossarError> {
        Ok(self.account_service.get_account_by_username(username).await?)
    }

    /// Check credentials without recording anything
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, GlossarError> {
        Ok(self
            .authentication_service
            .authenticate(username, password)
            .await?)
    }

    /// Record the outcome of a login attempt and decide where to redirect
    pub async fn record_login_outcome(
        &self,
        outcome: LoginOutcome,
    ) -> Result<LoginRedirect, GlossarError> {
        Ok(self.login_service.handle_outcome(outcome).await?)
    }

    /// Check credentials and record the outcome
    ///
    /// # Arguments
    ///
    /// * `username`: The submitted username, possibly empty
    /// * `password`: The submitted password
    ///
    /// # Returns
    ///
    /// Returns the redirect for the browser. Wrong credentials are not an
    /// error; only store failures are.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginRedirect, GlossarError> {
        let outcome = self.authenticate(username, password).await?;
        self.record_login_outcome(outcome).await
    }

    /// Run the inactivity sweep once, now
    ///
    /// Returns [`SweepOutcome::Skipped`] if a sweep is already running.
    pub async fn sweep_inactive_accounts(&self) -> Result<SweepOutcome, GlossarError> {
        Ok(self.sweep_service.run_once().await?)
    }

    /// Start the periodic inactivity sweep on its own task
    ///
    /// # Arguments
    ///
    /// * `shutdown`: The task stops when this receiver observes a change
    pub fn start_sweep_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.sweep_service.start_sweep_task(shutdown)
    }
}
