//! Process-wide account security configuration.
//!
//! Built once at start-up and handed to each service; nothing reads it from
//! global state.

use chrono::Duration;

/// Reference interval between inactivity sweeps.
pub const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3 * 60);

/// Where a successful login lands.
pub const DEFAULT_SUCCESS_REDIRECT: &str = "/app/hauptseite";

/// Where a failed login lands.
pub const DEFAULT_FAILURE_REDIRECT: &str = "/login?error";

/// Configuration for lockout, login bookkeeping and the inactivity sweep.
///
/// `None` thresholds mean "unbounded": no number of failures locks an
/// account, and no amount of inactivity deactivates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSecurityConfig {
    /// Consecutive failed logins after which an account is deactivated.
    pub max_failed_login_attempts: Option<u32>,

    /// How long an account may go without a successful login before the sweep
    /// deactivates it.
    pub inactivity_threshold: Option<Duration>,

    /// Fixed rate of the inactivity sweep.
    pub sweep_interval: std::time::Duration,

    /// Redirect target after a successful login.
    pub success_redirect: String,

    /// Redirect target after a failed login.
    pub failure_redirect: String,
}

impl Default for AccountSecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_login_attempts: None,
            inactivity_threshold: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            success_redirect: DEFAULT_SUCCESS_REDIRECT.to_string(),
            failure_redirect: DEFAULT_FAILURE_REDIRECT.to_string(),
        }
    }
}

impl AccountSecurityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_failed_login_attempts(mut self, max: u32) -> Self {
        self.max_failed_login_attempts = Some(max);
        self
    }

    pub fn with_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.inactivity_threshold = Some(threshold);
        self
    }

    /// Convenience for [`Self::with_inactivity_threshold`] in whole minutes.
    pub fn with_inactivity_threshold_minutes(self, minutes: u32) -> Self {
        self.with_inactivity_threshold(Duration::minutes(i64::from(minutes)))
    }

    pub fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_success_redirect(mut self, target: impl Into<String>) -> Self {
        self.success_redirect = target.into();
        self
    }

    pub fn with_failure_redirect(mut self, target: impl Into<String>) -> Self {
        self.failure_redirect = target.into();
        self
    }
}
