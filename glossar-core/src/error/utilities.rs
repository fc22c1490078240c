use crate::{
    Error,
    error::{StorageError, ValidationError},
};

/// Extension trait for mapping driver errors into [`StorageError::Database`].
///
/// ```rust,ignore
/// use glossar_core::error::utilities::DatabaseResultExt;
///
/// let tx = pool.begin().await.map_db_err_with_context("Failed to begin")?;
/// ```
pub trait DatabaseResultExt<T> {
    /// Convert a database error to a storage error, prefixed with `context`
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(format!("{context}: {e}"))))
    }
}

/// Converts a missing builder field into [`ValidationError::MissingField`].
pub trait RequiredFieldExt<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError>;
}

impl<T> RequiredFieldExt<T> for Option<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError> {
        self.ok_or_else(|| ValidationError::MissingField(format!("{field_name} is required")))
    }
}
