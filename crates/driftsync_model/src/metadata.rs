//! Per-dataset metadata.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Sentinel sync count marking a dataset as deleted locally but not yet
/// reconciled with the remote store.
pub const LOCALLY_DELETED_SYNC_COUNT: i64 = -1;

/// Bookkeeping for one dataset under one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Dataset name.
    pub dataset_name: String,
    /// Last sync count agreed with the remote store.
    ///
    /// [`LOCALLY_DELETED_SYNC_COUNT`] means the dataset was deleted locally
    /// and the deletion has not been pushed yet.
    pub last_sync_count: i64,
    /// Time of the last local modification.
    pub last_modified: SystemTime,
    /// Time the dataset was created locally.
    pub created: SystemTime,
    /// Total size of all records in bytes.
    pub storage_size_bytes: u64,
}

impl DatasetMetadata {
    /// Creates metadata for a freshly created dataset.
    pub fn new(dataset_name: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            dataset_name: dataset_name.into(),
            last_sync_count: 0,
            last_modified: now,
            created: now,
            storage_size_bytes: 0,
        }
    }

    /// Returns true if the dataset is deleted locally and the deletion has
    /// not been reconciled with the remote store.
    pub fn is_locally_deleted(&self) -> bool {
        self.last_sync_count == LOCALLY_DELETED_SYNC_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metadata_defaults() {
        let meta = DatasetMetadata::new("profile");
        assert_eq!(meta.dataset_name, "profile");
        assert_eq!(meta.last_sync_count, 0);
        assert_eq!(meta.storage_size_bytes, 0);
        assert!(!meta.is_locally_deleted());
    }

    #[test]
    fn sentinel_marks_local_deletion() {
        let mut meta = DatasetMetadata::new("profile");
        meta.last_sync_count = LOCALLY_DELETED_SYNC_COUNT;
        assert!(meta.is_locally_deleted());
    }
}
