//! Core functionality for the glossar account-security lifecycle
//!
//! This crate contains the account model, the repository traits every account
//! store implements, and the services built on top of them:
//!
//! - [`services::LoginOutcomeService`] records login successes and failures and
//!   locks accounts after too many consecutive failures,
//! - [`services::InactivitySweepService`] periodically deactivates accounts that
//!   have not logged in for longer than the configured threshold,
//! - [`services::AuthenticationService`] checks credentials and reports a
//!   [`services::LoginOutcome`].
//!
//! Storage backends live in their own crates and implement
//! [`repositories::AccountRepository`]. An in-memory implementation ships here
//! for tests and small deployments.
pub mod account;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod repositories;
pub mod services;
pub mod validation;

pub use account::{Account, AccountBuilder, AccountId, NEVER_LOGGED_IN, NewAccount};
pub use config::AccountSecurityConfig;
pub use crypto::{Argon2PasswordEncoder, PasswordEncoder};
pub use error::Error;
pub use events::{Event, EventBus, EventHandler};
pub use repositories::{
    AccountRepository, AccountTransaction, InMemoryAccountRepository, UsernameLookup,
};
pub use services::{
    AccountService, AccountUpdate, AuthenticationService, InactivitySweepService, LockoutPolicy,
    LoginOutcome, LoginOutcomeHandler, LoginOutcomeService, LoginRedirect, SweepOutcome,
    SweepReport,
};
