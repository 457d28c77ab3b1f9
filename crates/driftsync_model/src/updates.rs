//! Remote update snapshots.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// The result of listing remote updates for a dataset since a sync count.
///
/// Produced by one remote call and consumed within one reconciliation pass.
/// The `sync_session_token` makes the following push conditional on having
/// observed exactly this remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetUpdates {
    /// Whether the dataset exists on the remote store.
    pub exists: bool,
    /// Whether the remote store marked the dataset as deleted.
    pub deleted: bool,
    /// The remote dataset's current sync count.
    pub sync_count: i64,
    /// Opaque token required for the conditional push that follows.
    pub sync_session_token: String,
    /// Records changed since the requested sync count.
    pub records: Vec<Record>,
    /// Datasets the remote service merged into this one, if any.
    pub merged_dataset_names: Vec<String>,
}

impl DatasetUpdates {
    /// Creates a snapshot of an existing remote dataset.
    pub fn new(sync_count: i64, sync_session_token: impl Into<String>) -> Self {
        Self {
            exists: true,
            deleted: false,
            sync_count,
            sync_session_token: sync_session_token.into(),
            records: Vec::new(),
            merged_dataset_names: Vec::new(),
        }
    }

    /// Creates a snapshot for a dataset the remote store has never seen.
    pub fn not_exists() -> Self {
        Self {
            exists: false,
            deleted: false,
            sync_count: 0,
            sync_session_token: String::new(),
            records: Vec::new(),
            merged_dataset_names: Vec::new(),
        }
    }

    /// Sets the changed records.
    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    /// Sets the merged dataset names.
    pub fn with_merged_dataset_names(mut self, names: Vec<String>) -> Self {
        self.merged_dataset_names = names;
        self
    }

    /// Marks the snapshot as a remote-side deletion.
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Sets the session token.
    pub fn with_sync_session_token(mut self, token: impl Into<String>) -> Self {
        self.sync_session_token = token.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_builder() {
        let updates = DatasetUpdates::new(5, "token-5")
            .with_records(vec![Record::new("theme", Some("dark".into()))])
            .with_merged_dataset_names(vec!["profile.1".into()]);

        assert!(updates.exists);
        assert!(!updates.deleted);
        assert_eq!(updates.sync_count, 5);
        assert_eq!(updates.sync_session_token, "token-5");
        assert_eq!(updates.records.len(), 1);
        assert_eq!(updates.merged_dataset_names, vec!["profile.1".to_string()]);
    }

    #[test]
    fn not_exists_snapshot() {
        let updates = DatasetUpdates::not_exists();
        assert!(!updates.exists);
        assert_eq!(updates.sync_count, 0);
        assert!(updates.records.is_empty());
    }
}
