//! Service layer for business logic
//!
//! This module contains the services of the account-security lifecycle:
//! registration, credential checks, login bookkeeping with lockout, and the
//! inactivity sweep.

pub mod account;
pub mod authentication;
pub mod lockout;
pub mod login;
pub mod sweep;

pub use account::AccountService;
pub use authentication::AuthenticationService;
pub use lockout::{LockoutPolicy, should_lock};
pub use login::{
    AccountUpdate, LoginOutcome, LoginOutcomeHandler, LoginOutcomeService, LoginRedirect,
};
pub use sweep::{InactivitySweepService, SweepOutcome, SweepReport};
