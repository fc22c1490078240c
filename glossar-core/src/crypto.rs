//! Password encoding
//!
//! Credentials are compared through the [`PasswordEncoder`] abstraction so the
//! hashing scheme can be swapped without touching the login pipeline. The
//! default encoder produces PHC strings (Argon2id) via the `password-auth`
//! crate.

use crate::Error;

/// Encodes raw passwords and checks raw passwords against encoded ones.
pub trait PasswordEncoder: Send + Sync + 'static {
    /// Encode a raw password for storage.
    fn encode(&self, raw_password: &str) -> Result<String, Error>;

    /// Whether `raw_password` matches `encoded_password`.
    ///
    /// Malformed encodings never match.
    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool;
}

/// Argon2id encoder with a random salt per password.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordEncoder;

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw_password: &str) -> Result<String, Error> {
        Ok(password_auth::generate_hash(raw_password))
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        password_auth::verify_password(raw_password, encoded_password).is_ok()
    }
}
