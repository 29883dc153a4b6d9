use thiserror::Error;
use uuid::Uuid;

/// Error type that captures storage-layer failures.
///
/// Constraint violations and lock timeouts are distinguishable variants so
/// callers can translate them into domain failures instead of string-matching.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: String },
    #[error("timed out waiting for a row lock on period {period_id}")]
    LockTimeout { period_id: Uuid },
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl StorageError {
    /// True when the error reports a violation of the named constraint.
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, StorageError::UniqueViolation { constraint: violated } if violated == constraint)
    }
}
