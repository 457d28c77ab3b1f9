//! Error types for local storage operations.

use std::io;
use thiserror::Error;

/// Result type for local storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the local record store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in a durable backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested dataset does not exist.
    #[error("dataset {dataset_name:?} not found for identity {identity_id:?}")]
    DatasetNotFound {
        /// Identity the lookup was scoped to.
        identity_id: String,
        /// The requested dataset name.
        dataset_name: String,
    },

    /// The store's on-disk state is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}
