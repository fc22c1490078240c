use crate::{
    Account, AccountId, Error,
    account::NewAccount,
    crypto::PasswordEncoder,
    error::AuthError,
    repositories::AccountRepository,
    validation::{validate_password, validate_username},
};
use std::sync::Arc;

/// Service for account registration and lookup
pub struct AccountService<R: AccountRepository, E: PasswordEncoder> {
    repository: Arc<R>,
    encoder: Arc<E>,
}

impl<R: AccountRepository, E: PasswordEncoder> AccountService<R, E> {
    /// Create a new AccountService with the given repository and password encoder
    pub fn new(repository: Arc<R>, encoder: Arc<E>) -> Self {
        Self {
            repository,
            encoder,
        }
    }

    /// Register a new, active account that has never logged in
    pub async fn create_account(&self, username: &str, password: &str) -> Result<Account, Error> {
        validate_username(username)?;
        validate_password(password)?;

        if !self
            .repository
            .find_matching_username(username)
            .await?
            .is_empty()
        {
            return Err(AuthError::AccountAlreadyExists.into());
        }

        let password_hash = self.encoder.encode(password)?;
        let account = NewAccount::new(username, password_hash).into_account()?;
        let account = self.repository.save(&account).await?;

        tracing::info!(username = %account.username, account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Create the account unless one with this username already exists
    pub async fn ensure_account(&self, username: &str, password: &str) -> Result<Account, Error> {
        match self.create_account(username, password).await {
            Err(Error::Auth(AuthError::AccountAlreadyExists)) => self
                .repository
                .find_by_username(username)
                .await?
                .ok_or(Error::Auth(AuthError::AccountNotFound)),
            other => other,
        }
    }

    /// Get an account by ID
    pub async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.repository.find_by_id(id).await
    }

    /// Get an account by username
    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, Error> {
        self.repository.find_by_username(username).await
    }
}
