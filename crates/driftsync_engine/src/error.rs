//! Error types for the sync engine.

use crate::identity::CredentialError;
use crate::remote::RemoteError;
use driftsync_model::ValidationError;
use driftsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No network connectivity; checked before dispatch, never retried.
    #[error("network connectivity unavailable")]
    NoConnectivity,

    /// Identity credentials could not be acquired or refreshed.
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// The remote store rejected an operation.
    #[error("remote storage error: {0}")]
    Remote(#[from] RemoteError),

    /// The local record store failed.
    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    /// A key or dataset name failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A merge, delete, or conflict callback declined to proceed.
    #[error("sync cancelled by {stage} callback")]
    Cancelled {
        /// Which callback declined: `"merge"`, `"delete"`, or `"conflict"`.
        stage: &'static str,
    },

    /// The retry budget was exhausted without reaching agreement.
    ///
    /// Carries no underlying cause: every retried attempt failed only on
    /// the recoverable version-conflict branch.
    #[error("synchronization gave up after exhausting retries")]
    RetriesExhausted,

    /// A reconciliation pass is already in flight for this dataset.
    #[error("synchronization already in progress for dataset {dataset_name:?}")]
    AlreadyInProgress {
        /// The dataset with the active pass.
        dataset_name: String,
    },

    /// The worker thread terminated abnormally.
    #[error("sync worker terminated abnormally")]
    WorkerFailed,
}

impl SyncError {
    /// Returns true if the engine's retry loop may restart the pass on
    /// this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Remote(RemoteError::Conflict(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_version_conflicts_are_retryable() {
        assert!(SyncError::Remote(RemoteError::Conflict("stale token".into())).is_retryable());
        assert!(!SyncError::NoConnectivity.is_retryable());
        assert!(!SyncError::RetriesExhausted.is_retryable());
        assert!(!SyncError::Cancelled { stage: "merge" }.is_retryable());
        assert!(!SyncError::Remote(RemoteError::Network("timeout".into())).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Cancelled { stage: "conflict" };
        assert_eq!(err.to_string(), "sync cancelled by conflict callback");

        let err = SyncError::AlreadyInProgress {
            dataset_name: "profile".into(),
        };
        assert!(err.to_string().contains("profile"));
    }
}
