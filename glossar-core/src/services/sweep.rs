//! Periodic deactivation of accounts that have not logged in for too long.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::{sync::Mutex, time::MissedTickBehavior};

use crate::{
    AccountId, Error,
    account::{Account, NEVER_LOGGED_IN},
    config::AccountSecurityConfig,
    events::{Event, EventBus, publish},
    repositories::{AccountRepository, AccountTransaction},
};

/// Shortest period the sweep timer accepts; shorter intervals are raised to it.
pub const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

/// Result of one completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Accounts whose last login is before this instant qualified.
    /// `None` when no inactivity threshold is configured, or when the
    /// threshold reaches back past the epoch.
    pub cutoff: Option<DateTime<Utc>>,

    /// Usernames deactivated by this run, oldest last login first
    pub deactivated: Vec<String>,
}

impl SweepReport {
    pub fn count(&self) -> usize {
        self.deactivated.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),

    /// Another sweep was still running; this one did nothing.
    Skipped,
}

/// Deactivates active accounts whose last login is older than the configured
/// inactivity threshold.
///
/// Runs never overlap: a run that starts while another is in progress returns
/// [`SweepOutcome::Skipped`] immediately.
pub struct InactivitySweepService<R: AccountRepository> {
    repository: Arc<R>,
    threshold: Option<Duration>,
    interval: std::time::Duration,
    events: Option<EventBus>,
    running: Arc<Mutex<()>>,
}

impl<R: AccountRepository> Clone for InactivitySweepService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            threshold: self.threshold,
            interval: self.interval,
            events: self.events.clone(),
            running: Arc::clone(&self.running),
        }
    }
}

impl<R: AccountRepository> InactivitySweepService<R> {
    pub fn new(repository: Arc<R>, config: &AccountSecurityConfig) -> Self {
        let mut interval = config.sweep_interval;
        if interval < MIN_SWEEP_INTERVAL {
            tracing::warn!(
                requested_ms = interval.as_millis(),
                "Sweep interval too short, using the minimum"
            );
            interval = MIN_SWEEP_INTERVAL;
        }

        Self {
            repository,
            threshold: config.inactivity_threshold,
            interval,
            events: None,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }

    /// Period of the background task, never below [`MIN_SWEEP_INTERVAL`]
    pub fn interval(&self) -> std::time::Duration {
        self.interval
    }

    /// Run one sweep now.
    ///
    /// Each qualifying account is re-read and deactivated in its own
    /// transaction. An account that logged in after the candidate query, or
    /// that was locked in the meantime, is left alone.
    pub async fn run_once(&self) -> Result<SweepOutcome, Error> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("Inactivity sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        };

        let Some(threshold) = self.threshold else {
            tracing::debug!("No inactivity threshold configured, nothing to sweep");
            return Ok(SweepOutcome::Completed(SweepReport::default()));
        };

        let Some(cutoff) = Utc::now()
            .checked_sub_signed(threshold)
            .filter(|cutoff| *cutoff > NEVER_LOGGED_IN)
        else {
            tracing::debug!(
                threshold_minutes = threshold.num_minutes(),
                "Inactivity threshold reaches back past the epoch, nothing can qualify"
            );
            return Ok(SweepOutcome::Completed(SweepReport::default()));
        };
        let candidates = self.repository.find_inactive_before(cutoff).await?;

        let mut report = SweepReport {
            cutoff: Some(cutoff),
            deactivated: Vec::with_capacity(candidates.len()),
        };

        for candidate in candidates {
            if let Some(account) = self.deactivate(&candidate.id, cutoff).await? {
                tracing::info!(
                    username = %account.username,
                    last_login_at = %account.last_login_at,
                    "Deactivated inactive account"
                );
                publish(
                    self.events.as_ref(),
                    Event::AccountDeactivated {
                        account_id: account.id,
                        username: account.username.clone(),
                        last_login_at: account.last_login_at,
                        timestamp: Utc::now(),
                    },
                )
                .await;
                report.deactivated.push(account.username);
            }
        }

        tracing::info!(
            count = report.count(),
            cutoff = %cutoff,
            "Inactivity sweep finished"
        );
        Ok(SweepOutcome::Completed(report))
    }

    async fn deactivate(
        &self,
        id: &AccountId,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Account>, Error> {
        let mut tx = self.repository.begin().await?;

        let Some(mut account) = tx.find_by_id(id).await? else {
            return Ok(None);
        };
        if !account.last_login_before(cutoff) {
            tracing::debug!(
                username = %account.username,
                "Account logged in during the sweep, keeping it active"
            );
            return Ok(None);
        }
        if !account.deactivate() {
            return Ok(None);
        }

        let account = tx.save(&account).await?;
        tx.commit().await?;
        Ok(Some(account))
    }

    /// Spawn the periodic sweep.
    ///
    /// Runs every `sweep_interval`, the first run right away. Ticks missed
    /// while a run is in progress are dropped rather than queued. Failed runs
    /// are logged and the task keeps its schedule. The task ends when
    /// `shutdown` changes or its sender is dropped.
    pub fn start_sweep_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let service = self.clone();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(service.interval);
            interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                interval_secs = service.interval.as_secs(),
                threshold_minutes = ?service.threshold.map(|t| t.num_minutes()),
                "Inactivity sweep task started"
            );

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if let Err(e) = service.run_once().await {
                            tracing::warn!(error = %e, "Inactivity sweep failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down inactivity sweep task");
                        break;
                    }
                }
            }
        })
    }
}
