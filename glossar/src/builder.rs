//! Builder pattern for constructing Glossar instances
//!
//! This module provides a type-safe builder for creating [`Glossar`] instances
//! with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use glossar::GlossarBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let glossar = GlossarBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or build without auto-migration and run manually
//!     let glossar = GlossarBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .build()
//!         .await?;
//!     glossar.migrate().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use glossar_core::{
    AccountSecurityConfig, EventBus, InMemoryAccountRepository, repositories::AccountRepository,
};

use crate::Glossar;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Glossar instance.
#[derive(Debug, thiserror::Error)]
pub enum GlossarBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`GlossarBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: AccountRepository> {
    repository: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Glossar`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
pub struct GlossarBuilder<Storage> {
    storage: Storage,
    config: AccountSecurityConfig,
    events: Option<EventBus>,
    apply_migrations: bool,
}

impl Default for GlossarBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl GlossarBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Lockout: unbounded (accounts are never locked)
    /// - Inactivity sweep: disabled, interval 3 minutes
    /// - Redirects: `/app/hauptseite` and `/login?error`
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: AccountSecurityConfig::default(),
            events: None,
            apply_migrations: false,
        }
    }

    fn with_storage<R: AccountRepository>(
        self,
        repository: Arc<R>,
    ) -> GlossarBuilder<WithStorage<R>> {
        GlossarBuilder {
            storage: WithStorage { repository },
            config: self.config,
            events: self.events,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Use an existing account store.
    pub fn with_repository<R: AccountRepository>(
        self,
        repository: Arc<R>,
    ) -> GlossarBuilder<WithStorage<R>> {
        self.with_storage(repository)
    }

    /// Keep accounts in memory only.
    pub fn with_in_memory(self) -> GlossarBuilder<WithStorage<InMemoryAccountRepository>> {
        self.with_storage(Arc::new(InMemoryAccountRepository::new()))
    }
}

#[cfg(feature = "sqlite")]
impl GlossarBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://glossar.db?mode=rwc")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<GlossarBuilder<WithStorage<crate::sqlite::SqliteAccountRepository>>, GlossarBuilderError>
    {
        let storage = crate::sqlite::SqliteStorage::connect(url)
            .await
            .map_err(|e| GlossarBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_storage(storage.accounts()))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: crate::sqlite::SqlitePool,
    ) -> GlossarBuilder<WithStorage<crate::sqlite::SqliteAccountRepository>> {
        self.with_storage(crate::sqlite::SqliteStorage::new(pool).accounts())
    }
}

impl<S> GlossarBuilder<S> {
    /// Replace the whole account security configuration.
    pub fn with_config(mut self, config: AccountSecurityConfig) -> Self {
        self.config = config;
        self
    }

    /// Lock an account once it reaches `max` consecutive failed logins.
    pub fn with_max_failed_login_attempts(mut self, max: u32) -> Self {
        self.config = self.config.with_max_failed_login_attempts(max);
        self
    }

    /// Deactivate accounts without a successful login for longer than `threshold`.
    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.config = self.config.with_inactivity_threshold(threshold);
        self
    }

    /// How often the background sweep runs.
    pub fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.config = self.config.with_sweep_interval(interval);
        self
    }

    /// Publish security events to `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Run pending migrations during [`GlossarBuilder::build`].
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<R: AccountRepository> GlossarBuilder<WithStorage<R>> {
    /// Build the Glossar instance.
    pub async fn build(self) -> Result<Glossar<R>, GlossarBuilderError> {
        if self.config.sweep_interval.is_zero() {
            return Err(GlossarBuilderError::InvalidConfiguration(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self
            .config
            .inactivity_threshold
            .is_some_and(|threshold| threshold <= Duration::zero())
        {
            return Err(GlossarBuilderError::InvalidConfiguration(
                "inactivity threshold must be positive".to_string(),
            ));
        }

        let repository = self.storage.repository;
        if self.apply_migrations {
            repository
                .migrate()
                .await
                .map_err(|e| GlossarBuilderError::Migration(e.to_string()))?;
        }

        let mut glossar = Glossar::new(repository).with_config(self.config);
        if let Some(bus) = self.events {
            glossar = glossar.with_event_bus(bus);
        }
        Ok(glossar)
    }
}
