//! Lockout policy: when do failed logins deactivate an account?

use crate::config::AccountSecurityConfig;

/// Whether `failed_attempts` consecutive failures reach `max_allowed`.
pub fn should_lock(failed_attempts: u32, max_allowed: u32) -> bool {
    failed_attempts >= max_allowed
}

/// The process-wide lockout limit.
///
/// `None` means unbounded: accounts are never locked for failed logins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_failed_attempts: Option<u32>,
}

impl LockoutPolicy {
    pub fn new(max_failed_attempts: Option<u32>) -> Self {
        Self {
            max_failed_attempts,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn from_config(config: &AccountSecurityConfig) -> Self {
        Self::new(config.max_failed_login_attempts)
    }

    pub fn max_failed_attempts(&self) -> Option<u32> {
        self.max_failed_attempts
    }

    pub fn should_lock(&self, failed_attempts: u32) -> bool {
        self.max_failed_attempts
            .is_some_and(|max| should_lock(failed_attempts, max))
    }
}
