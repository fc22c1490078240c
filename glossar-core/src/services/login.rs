//! Login outcome handlers.
//!
//! The authentication pipeline reports every login attempt as a
//! [`LoginOutcome`]. The [`LoginOutcomeService`] updates the account's
//! bookkeeping and always answers with a [`LoginRedirect`]: unknown or
//! ambiguous usernames are logged and skipped, never turned into errors. Only
//! store failures propagate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    Error,
    config::AccountSecurityConfig,
    events::{Event, EventBus, publish},
    repositories::{AccountRepository, AccountTransaction, UsernameLookup},
    services::lockout::LockoutPolicy,
};

/// What the authentication pipeline decided about a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The credential was verified for `username`.
    Success { username: String },

    /// The credential check failed. The attempted username may be missing.
    Failure { attempted_username: Option<String> },
}

impl LoginOutcome {
    pub fn success(username: impl Into<String>) -> Self {
        LoginOutcome::Success {
            username: username.into(),
        }
    }

    /// A failed attempt; an empty username is recorded as missing.
    pub fn failure(attempted_username: Option<&str>) -> Self {
        LoginOutcome::Failure {
            attempted_username: attempted_username
                .filter(|username| !username.is_empty())
                .map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success { .. })
    }
}

/// What happened to the account store while handling an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountUpdate {
    /// Successful login recorded: counter reset, last login updated.
    LoginRecorded,

    /// Failed login recorded; the account stays as active as it was.
    FailureRecorded { failed_attempts: u32 },

    /// Failed login recorded and the account was locked by it.
    Locked { failed_attempts: u32 },

    /// No account with this username (or no username at all); nothing written.
    UnknownAccount,

    /// The username matched several accounts; nothing written.
    AmbiguousUsername { matches: usize },
}

/// The response the web layer must give after a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// Redirect target
    pub location: String,

    /// Bookkeeping that was performed, for callers and tests
    pub update: AccountUpdate,
}

/// Capability the web layer invokes after each login attempt.
#[async_trait]
pub trait LoginOutcomeHandler: Send + Sync + 'static {
    async fn handle_outcome(&self, outcome: LoginOutcome) -> Result<LoginRedirect, Error>;
}

/// Records login successes and failures on accounts and applies the lockout policy.
pub struct LoginOutcomeService<R: AccountRepository> {
    repository: Arc<R>,
    policy: LockoutPolicy,
    success_redirect: String,
    failure_redirect: String,
    events: Option<EventBus>,
}

impl<R: AccountRepository> LoginOutcomeService<R> {
    pub fn new(repository: Arc<R>, config: &AccountSecurityConfig) -> Self {
        Self {
            repository,
            policy: LockoutPolicy::from_config(config),
            success_redirect: config.success_redirect.clone(),
            failure_redirect: config.failure_redirect.clone(),
            events: None,
        }
    }

    /// Publish security events on `bus`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Record a successful login for `username`.
    ///
    /// Resets the failure counter and moves the last login to now. An unknown
    /// username means the pipeline and the store disagree; it is logged at
    /// error level and nothing is written.
    pub async fn on_login_success(&self, username: &str) -> Result<LoginRedirect, Error> {
        let mut tx = self.repository.begin().await?;

        let update = match tx.find_by_username(username).await? {
            UsernameLookup::Found(mut account) => {
                let now = Utc::now();
                account.record_successful_login(now);
                let account = tx.save(&account).await?;
                tx.commit().await?;

                tracing::info!(username = %account.username, "Login succeeded");
                publish(
                    self.events.as_ref(),
                    Event::LoginSucceeded {
                        account_id: account.id,
                        username: account.username,
                        timestamp: now,
                    },
                )
                .await;
                AccountUpdate::LoginRecorded
            }
            UsernameLookup::NotFound => {
                drop(tx);
                tracing::error!(
                    username = %username,
                    "Login succeeded for an account unknown to the store"
                );
                publish(
                    self.events.as_ref(),
                    Event::UnknownAccountOnSuccess {
                        username: username.to_string(),
                        timestamp: Utc::now(),
                    },
                )
                .await;
                AccountUpdate::UnknownAccount
            }
            UsernameLookup::Ambiguous { matches } => {
                drop(tx);
                self.publish_duplicate(username, matches).await;
                AccountUpdate::AmbiguousUsername { matches }
            }
        };

        Ok(LoginRedirect {
            location: self.success_redirect.clone(),
            update,
        })
    }

    /// Record a failed login for `attempted_username`.
    ///
    /// Increments the failure counter and deactivates the account once the
    /// lockout policy says so. Unknown, empty or missing usernames are logged
    /// at warn level and nothing is written.
    pub async fn on_login_failure(
        &self,
        attempted_username: Option<&str>,
    ) -> Result<LoginRedirect, Error> {
        let update = match attempted_username.filter(|username| !username.is_empty()) {
            None => {
                tracing::warn!("Failed login without a username");
                AccountUpdate::UnknownAccount
            }
            Some(username) => self.record_failure(username).await?,
        };

        Ok(LoginRedirect {
            location: self.failure_redirect.clone(),
            update,
        })
    }

    async fn record_failure(&self, username: &str) -> Result<AccountUpdate, Error> {
        let mut tx = self.repository.begin().await?;

        let mut account = match tx.find_by_username(username).await? {
            UsernameLookup::Found(account) => account,
            UsernameLookup::NotFound => {
                drop(tx);
                tracing::warn!(username = %username, "Failed login for unknown username");
                return Ok(AccountUpdate::UnknownAccount);
            }
            UsernameLookup::Ambiguous { matches } => {
                drop(tx);
                self.publish_duplicate(username, matches).await;
                return Ok(AccountUpdate::AmbiguousUsername { matches });
            }
        };

        let failed_attempts = account.record_failed_login();
        let locked = self.policy.should_lock(failed_attempts) && account.deactivate();

        let account = tx.save(&account).await?;
        tx.commit().await?;

        let now = Utc::now();
        tracing::info!(
            username = %account.username,
            failed_attempts = failed_attempts,
            "Login failed"
        );
        publish(
            self.events.as_ref(),
            Event::LoginFailed {
                account_id: account.id.clone(),
                username: account.username.clone(),
                failed_attempts,
                timestamp: now,
            },
        )
        .await;

        if !locked {
            return Ok(AccountUpdate::FailureRecorded { failed_attempts });
        }

        tracing::warn!(
            username = %account.username,
            failed_attempts = failed_attempts,
            max_failed_attempts = ?self.policy.max_failed_attempts(),
            "Account locked after too many failed logins"
        );
        publish(
            self.events.as_ref(),
            Event::AccountLocked {
                account_id: account.id,
                username: account.username,
                failed_attempts,
                timestamp: now,
            },
        )
        .await;

        Ok(AccountUpdate::Locked { failed_attempts })
    }

    async fn publish_duplicate(&self, username: &str, matches: usize) {
        publish(
            self.events.as_ref(),
            Event::DuplicateUsername {
                username: username.to_string(),
                matches,
                timestamp: Utc::now(),
            },
        )
        .await;
    }
}

#[async_trait]
impl<R: AccountRepository> LoginOutcomeHandler for LoginOutcomeService<R> {
    async fn handle_outcome(&self, outcome: LoginOutcome) -> Result<LoginRedirect, Error> {
        match outcome {
            LoginOutcome::Success { username } => self.on_login_success(&username).await,
            LoginOutcome::Failure { attempted_username } => {
                self.on_login_failure(attempted_username.as_deref()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Account, AccountId,
        error::EventError,
        events::EventHandler,
        repositories::InMemoryAccountRepository,
    };
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn config(max_attempts: u32) -> AccountSecurityConfig {
        AccountSecurityConfig::default().with_max_failed_login_attempts(max_attempts)
    }

    async fn setup(
        config: &AccountSecurityConfig,
        accounts: &[Account],
    ) -> (
        Arc<InMemoryAccountRepository>,
        LoginOutcomeService<InMemoryAccountRepository>,
    ) {
        let repo = Arc::new(InMemoryAccountRepository::new());
        for account in accounts {
            repo.save(account).await.unwrap();
        }
        let service = LoginOutcomeService::new(repo.clone(), config);
        (repo, service)
    }

    fn account(username: &str) -> Account {
        Account::builder().username(username).build().unwrap()
    }

    async fn reload(repo: &InMemoryAccountRepository, id: &AccountId) -> Account {
        repo.find_by_id(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_bob_is_locked_on_third_failure() {
        let bob = account("bob");
        let (repo, service) = setup(&config(3), &[bob.clone()]).await;

        let redirect = service.on_login_failure(Some("bob")).await.unwrap();
        assert_eq!(
            redirect.update,
            AccountUpdate::FailureRecorded { failed_attempts: 1 }
        );
        let stored = reload(&repo, &bob.id).await;
        assert_eq!((stored.failed_login_attempts, stored.active), (1, true));

        service.on_login_failure(Some("bob")).await.unwrap();
        let stored = reload(&repo, &bob.id).await;
        assert_eq!((stored.failed_login_attempts, stored.active), (2, true));

        let redirect = service.on_login_failure(Some("bob")).await.unwrap();
        assert_eq!(redirect.update, AccountUpdate::Locked { failed_attempts: 3 });
        assert_eq!(redirect.location, "/login?error");
        let stored = reload(&repo, &bob.id).await;
        assert_eq!((stored.failed_login_attempts, stored.active), (3, false));
    }

    #[tokio::test]
    async fn test_failures_below_limit_keep_account_active() {
        let bob = account("bob");
        let (repo, service) = setup(&config(5), &[bob.clone()]).await;

        for _ in 0..4 {
            service.on_login_failure(Some("bob")).await.unwrap();
        }

        let stored = reload(&repo, &bob.id).await;
        assert!(stored.active);
        assert_eq!(stored.failed_login_attempts, 4);
    }

    #[tokio::test]
    async fn test_locked_account_stays_locked() {
        let bob = account("bob");
        let (repo, service) = setup(&config(1), &[bob.clone()]).await;

        let redirect = service.on_login_failure(Some("bob")).await.unwrap();
        assert_eq!(redirect.update, AccountUpdate::Locked { failed_attempts: 1 });

        let redirect = service.on_login_failure(Some("bob")).await.unwrap();
        assert_eq!(
            redirect.update,
            AccountUpdate::FailureRecorded { failed_attempts: 2 }
        );
        assert!(!reload(&repo, &bob.id).await.active);
    }

    #[tokio::test]
    async fn test_unbounded_limit_never_locks() {
        let bob = account("bob");
        let (repo, service) = setup(&AccountSecurityConfig::default(), &[bob.clone()]).await;

        for _ in 0..50 {
            service.on_login_failure(Some("bob")).await.unwrap();
        }

        let stored = reload(&repo, &bob.id).await;
        assert!(stored.active);
        assert_eq!(stored.failed_login_attempts, 50);
    }

    #[tokio::test]
    async fn test_success_resets_counter_and_sets_last_login() {
        let bob = account("bob");
        let (repo, service) = setup(&config(3), &[bob.clone()]).await;

        service.on_login_failure(Some("bob")).await.unwrap();
        service.on_login_failure(Some("bob")).await.unwrap();

        let before = Utc::now();
        let redirect = service.on_login_success("bob").await.unwrap();
        assert_eq!(redirect.location, "/app/hauptseite");
        assert_eq!(redirect.update, AccountUpdate::LoginRecorded);

        let stored = reload(&repo, &bob.id).await;
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.active);
        assert!(stored.last_login_at >= before);
    }

    #[tokio::test]
    async fn test_success_on_inactive_account_resets_counter_only() {
        let claire = Account::builder()
            .username("claire")
            .active(false)
            .failed_login_attempts(3)
            .build()
            .unwrap();
        let (repo, service) = setup(&config(3), &[claire.clone()]).await;

        service.on_login_success("claire").await.unwrap();

        let stored = reload(&repo, &claire.id).await;
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(!stored.active);
        assert!(stored.has_logged_in());
    }

    #[tokio::test]
    async fn test_success_never_moves_last_login_backwards() {
        let future = Utc::now() + Duration::hours(1);
        let alice = Account::builder()
            .username("alice")
            .last_login_at(future)
            .build()
            .unwrap();
        let (repo, service) = setup(&config(3), &[alice.clone()]).await;

        service.on_login_success("alice").await.unwrap();

        assert_eq!(reload(&repo, &alice.id).await.last_login_at, future);
    }

    #[tokio::test]
    async fn test_unknown_username_on_failure_still_redirects() {
        let (repo, service) = setup(&config(3), &[]).await;

        let redirect = service.on_login_failure(Some("mallory")).await.unwrap();
        assert_eq!(redirect.location, "/login?error");
        assert_eq!(redirect.update, AccountUpdate::UnknownAccount);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_empty_username_on_failure() {
        let (_repo, service) = setup(&config(3), &[]).await;

        let redirect = service.on_login_failure(None).await.unwrap();
        assert_eq!(redirect.update, AccountUpdate::UnknownAccount);

        let redirect = service.on_login_failure(Some("")).await.unwrap();
        assert_eq!(redirect.update, AccountUpdate::UnknownAccount);
        assert_eq!(redirect.location, "/login?error");
    }

    #[tokio::test]
    async fn test_unknown_username_on_success_still_redirects() {
        let (repo, service) = setup(&config(3), &[]).await;
        let recorder = Arc::new(RecordingHandler::default());
        let bus = EventBus::new();
        bus.register(recorder.clone()).await;
        let service = service.with_event_bus(bus);

        let redirect = service.on_login_success("ghost").await.unwrap();
        assert_eq!(redirect.location, "/app/hauptseite");
        assert_eq!(redirect.update, AccountUpdate::UnknownAccount);
        assert!(repo.is_empty());

        let events = recorder.events.lock().unwrap();
        assert!(matches!(
            events.as_slice(),
            [Event::UnknownAccountOnSuccess { username, .. }] if username == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_usernames_are_not_touched() {
        let first = account("bob");
        let second = account("bob");
        let (repo, service) = setup(&config(1), &[first.clone(), second.clone()]).await;
        let recorder = Arc::new(RecordingHandler::default());
        let bus = EventBus::new();
        bus.register(recorder.clone()).await;
        let service = service.with_event_bus(bus);

        let redirect = service.on_login_failure(Some("bob")).await.unwrap();
        assert_eq!(
            redirect.update,
            AccountUpdate::AmbiguousUsername { matches: 2 }
        );
        let redirect = service.on_login_success("bob").await.unwrap();
        assert_eq!(
            redirect.update,
            AccountUpdate::AmbiguousUsername { matches: 2 }
        );

        for id in [&first.id, &second.id] {
            let stored = reload(&repo, id).await;
            assert!(stored.active);
            assert_eq!(stored.failed_login_attempts, 0);
            assert!(!stored.has_logged_in());
        }

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .all(|e| matches!(e, Event::DuplicateUsername { matches: 2, .. }))
        );
    }

    #[tokio::test]
    async fn test_lock_publishes_events() {
        let bob = account("bob");
        let (_repo, service) = setup(&config(2), &[bob.clone()]).await;
        let recorder = Arc::new(RecordingHandler::default());
        let bus = EventBus::new();
        bus.register(recorder.clone()).await;
        let service = service.with_event_bus(bus);

        service.on_login_failure(Some("bob")).await.unwrap();
        service.on_login_failure(Some("bob")).await.unwrap();

        let events = recorder.events.lock().unwrap();
        let kinds: Vec<_> = events
            .iter()
            .map(|e| match e {
                Event::LoginFailed {
                    failed_attempts, ..
                } => format!("failed:{failed_attempts}"),
                Event::AccountLocked { username, .. } => format!("locked:{username}"),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec!["failed:1", "failed:2", "locked:bob"]);
    }

    #[tokio::test]
    async fn test_handle_outcome_dispatches() {
        let bob = account("bob");
        let (repo, service) = setup(&config(3), &[bob.clone()]).await;
        let handler: &dyn LoginOutcomeHandler = &service;

        let redirect = handler
            .handle_outcome(LoginOutcome::failure(Some("bob")))
            .await
            .unwrap();
        assert_eq!(redirect.location, "/login?error");
        assert_eq!(reload(&repo, &bob.id).await.failed_login_attempts, 1);

        let redirect = handler
            .handle_outcome(LoginOutcome::success("bob"))
            .await
            .unwrap();
        assert_eq!(redirect.location, "/app/hauptseite");
        assert_eq!(reload(&repo, &bob.id).await.failed_login_attempts, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_do_not_lose_updates() {
        let bob = account("bob");
        let (repo, service) = setup(&config(10), &[bob.clone()]).await;
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.on_login_failure(Some("bob")).await.unwrap()
            }));
        }

        let mut locks = 0;
        for handle in handles {
            if matches!(handle.await.unwrap().update, AccountUpdate::Locked { .. }) {
                locks += 1;
            }
        }

        let stored = reload(&repo, &bob.id).await;
        assert_eq!(stored.failed_login_attempts, 10);
        assert!(!stored.active);
        assert_eq!(locks, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_racing_the_sweep_do_not_lose_updates() {
        use crate::services::sweep::{InactivitySweepService, SweepOutcome};

        let bob = Account::builder()
            .username("bob")
            .last_login_at(Utc::now() - Duration::minutes(10))
            .build()
            .unwrap();
        let config = AccountSecurityConfig::default().with_inactivity_threshold_minutes(5);
        let (repo, service) = setup(&config, &[bob.clone()]).await;
        let service = Arc::new(service);
        let sweep = InactivitySweepService::new(repo.clone(), &config);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.on_login_failure(Some("bob")).await.unwrap()
            }));
        }
        let sweep_handle = tokio::spawn(async move { sweep.run_once().await.unwrap() });
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.on_login_failure(Some("bob")).await.unwrap()
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        let SweepOutcome::Completed(report) = sweep_handle.await.unwrap() else {
            panic!("sweep was skipped");
        };

        let stored = reload(&repo, &bob.id).await;
        assert_eq!(report.deactivated, vec!["bob"]);
        assert_eq!(stored.failed_login_attempts, 16);
        assert!(!stored.active);
        assert_eq!(stored.last_login_at, bob.last_login_at);
    }

    #[test]
    fn test_failure_outcome_normalizes_empty_username() {
        assert_eq!(
            LoginOutcome::failure(Some("")),
            LoginOutcome::Failure {
                attempted_username: None
            }
        );
        assert!(LoginOutcome::success("bob").is_success());
        assert!(!LoginOutcome::failure(None).is_success());
    }
}
