//! Error types for the sync engine.

use entimap_core::CoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that end a sync pass.
///
/// Every variant aborts the pass it occurs in and rolls back its pending
/// changes. Only [`SyncError::Scope`] lets a batch of passes continue.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Entity, attribute or relationship metadata cannot be resolved.
    #[error("metadata error: {0}")]
    Metadata(CoreError),

    /// A record lacks a usable primary-key value.
    #[error("record for {entity} has no usable primary key {key}")]
    MissingPrimaryKey {
        /// Entity being synced.
        entity: String,
        /// Remote key that was looked up.
        key: String,
    },

    /// The store failed.
    #[error("store error: {0}")]
    Store(CoreError),

    /// The pass's scope cannot be resolved.
    #[error("scope error for {entity}: {message}")]
    Scope {
        /// Entity being synced.
        entity: String,
        /// Description of the problem.
        message: String,
    },

    /// The batch was cancelled between passes.
    #[error("sync cancelled")]
    Cancelled,

    /// The engine cannot start a pass in its current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the conflict.
        message: String,
    },
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        if err.is_metadata() {
            Self::Metadata(err)
        } else {
            Self::Store(err)
        }
    }
}

impl SyncError {
    /// Creates a scope error.
    pub fn scope(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scope {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates a missing-key error.
    pub fn missing_primary_key(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Returns true for errors confined to one scope.
    pub fn is_scope(&self) -> bool {
        matches!(self, Self::Scope { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_are_classified() {
        assert!(matches!(
            SyncError::from(CoreError::entity_not_found("Ghost")),
            SyncError::Metadata(_)
        ));
        assert!(matches!(
            SyncError::from(CoreError::storage("disk full")),
            SyncError::Store(_)
        ));
    }

    #[test]
    fn only_scope_errors_are_scoped() {
        assert!(SyncError::scope("User", "no parent relationship").is_scope());
        assert!(!SyncError::Cancelled.is_scope());
        assert!(!SyncError::missing_primary_key("User", "id").is_scope());
    }

    #[test]
    fn error_display() {
        let err = SyncError::missing_primary_key("User", "id");
        assert_eq!(err.to_string(), "record for User has no usable primary key id");
        assert_eq!(SyncError::Cancelled.to_string(), "sync cancelled");
    }
}
