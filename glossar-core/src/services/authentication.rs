use std::sync::Arc;

use crate::{
    Error,
    crypto::PasswordEncoder,
    repositories::{AccountRepository, UsernameLookup},
    services::login::LoginOutcome,
};

/// Checks submitted credentials against the account store.
///
/// Produces a [`LoginOutcome`] for the login handlers; it never writes to the
/// store itself. Unknown usernames, locked accounts and wrong passwords all
/// come back as [`LoginOutcome::Failure`] so the caller cannot tell them apart.
pub struct AuthenticationService<R: AccountRepository, E: PasswordEncoder> {
    repository: Arc<R>,
    encoder: Arc<E>,
}

impl<R: AccountRepository, E: PasswordEncoder> AuthenticationService<R, E> {
    pub fn new(repository: Arc<R>, encoder: Arc<E>) -> Self {
        Self {
            repository,
            encoder,
        }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<LoginOutcome, Error> {
        if username.is_empty() {
            return Ok(LoginOutcome::failure(None));
        }
        let failure = || LoginOutcome::failure(Some(username));

        let matches = self.repository.find_matching_username(username).await?;
        let account = match UsernameLookup::from_matches(username, matches) {
            UsernameLookup::Found(account) => account,
            UsernameLookup::NotFound | UsernameLookup::Ambiguous { .. } => {
                tracing::debug!(username = %username, "No unique account for login attempt");
                return Ok(failure());
            }
        };

        if !account.active {
            tracing::debug!(username = %username, "Login attempt on inactive account");
            return Ok(failure());
        }

        if !self.encoder.matches(password, &account.password_hash) {
            tracing::debug!(username = %username, "Password mismatch");
            return Ok(failure());
        }

        Ok(LoginOutcome::success(account.username))
    }
}
