//! Repository error types.
//!
//! This module provides a [`RepositoryError`] enum that wraps storage-level
//! errors and adds domain-specific error variants for repository operations.
//!
//! "Not found" on a lookup is not represented here: lookups return
//! `Ok(None)` so callers can always tell an absent record from a broken
//! store. The `NotFound` variant below is reserved for mutations that
//! require the record to exist (update, rename, delete).

use subarr_storage::StorageError;

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A mutation targeted an entity that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entity with the same unique attribute already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Validation of input data failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization or deserialization of a stored value failed
    /// (corruption or schema drift).
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying storage engine failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RepositoryError {
    /// Shorthand for a serialization fault carrying the serde message.
    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_conversion() {
        let storage_err = StorageError::Backend("disk on fire".to_string());
        let repo_err: RepositoryError = storage_err.into();
        assert!(matches!(repo_err, RepositoryError::Storage(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RepositoryError::NotFound("tag 123".to_string());
        assert_eq!(err.to_string(), "not found: tag 123");

        let err = RepositoryError::AlreadyExists("account username \"alice\"".to_string());
        assert_eq!(err.to_string(), "already exists: account username \"alice\"");
    }
}
