//! Error types for the proven header store.
use thiserror::Error;

/// Failures of the durable header repository.
///
/// Any of these aborts the surrounding write transaction; nothing is
/// partially visible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("storage: {0}")] Storage(String),
    #[error("codec: {0}")] Codec(String),
    #[error("corrupt record: {0}")] Corrupt(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No common point between the durable tip and the live chain.
    #[error("Proven block header store failed to recover.")] RecoveryFailed,
    /// The pending batch is not a contiguous run of heights.
    #[error("Invalid proven block header pending batch sequence - unable to save to the database repository (expected height {expected}, got {got})")]
    InvalidSequence { expected: u64, got: u64 },
    #[error("proven block header not found at height {0}")] HeaderNotFound(u64),
    #[error("height {height} is beyond the store tip {tip}")] NotYetKnown { height: u64, tip: u64 },
    #[error("store is not initialized")] NotInitialized,
    #[error("store is already initialized")] AlreadyInitialized,
    #[error(transparent)] Repository(#[from] RepositoryError),
}

impl StoreError {
    /// Whether the error means the store cannot be used at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::RecoveryFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_failed_message() {
        assert_eq!(
            StoreError::RecoveryFailed.to_string(),
            "Proven block header store failed to recover."
        );
    }

    #[test]
    fn invalid_sequence_message_names_heights() {
        let msg = StoreError::InvalidSequence { expected: 6, got: 7 }.to_string();
        assert!(msg.starts_with("Invalid proven block header pending batch sequence"));
        assert!(msg.contains("expected height 6, got 7"));
    }

    #[test]
    fn repository_error_is_transparent() {
        let err: StoreError = RepositoryError::Storage("disk full".into()).into();
        assert_eq!(err.to_string(), "storage: disk full");
        assert!(!err.is_fatal());
    }

    #[test]
    fn only_recovery_failure_is_fatal() {
        assert!(StoreError::RecoveryFailed.is_fatal());
        assert!(!StoreError::HeaderNotFound(3).is_fatal());
        assert!(!StoreError::InvalidSequence { expected: 1, got: 0 }.is_fatal());
    }
}
