//! Key-value records.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A single key-value record within a dataset.
///
/// A record with `value == None` is a **tombstone**: it marks the key as
/// deleted and propagates through sync like any other value change until
/// both sides agree on the deletion.
///
/// # Fields
///
/// - `sync_count`: the dataset version at which the remote service last
///   accepted this record. `0` for records never pushed.
/// - `modified`: true only for locally mutated records that have not yet
///   been pushed. The sync engine clears it when the remote service
///   acknowledges the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record key.
    pub key: String,
    /// Record value. `None` is a tombstone.
    pub value: Option<String>,
    /// Dataset version at which the remote service accepted this record.
    pub sync_count: i64,
    /// Identity or device that last modified the record.
    pub last_modified_by: String,
    /// Device-local wall-clock time of the last modification.
    pub device_last_modified: SystemTime,
    /// True for locally mutated, not-yet-pushed records.
    pub modified: bool,
}

impl Record {
    /// Creates a new unsynchronized record.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
            sync_count: 0,
            last_modified_by: String::new(),
            device_last_modified: SystemTime::now(),
            modified: false,
        }
    }

    /// Sets the sync count.
    pub fn with_sync_count(mut self, sync_count: i64) -> Self {
        self.sync_count = sync_count;
        self
    }

    /// Sets the modified flag.
    pub fn with_modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }

    /// Sets the last modifier.
    pub fn with_last_modified_by(mut self, by: impl Into<String>) -> Self {
        self.last_modified_by = by.into();
        self
    }

    /// Returns true if this record is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the record's storage footprint in bytes.
    ///
    /// Counted as UTF-8 key length plus value length; tombstones count the
    /// key only.
    pub fn size_in_bytes(&self) -> u64 {
        let value_len = self.value.as_ref().map(|v| v.len()).unwrap_or(0);
        (self.key.len() + value_len) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let record = Record::new("color", Some("blue".into()));
        assert_eq!(record.key, "color");
        assert_eq!(record.value.as_deref(), Some("blue"));
        assert_eq!(record.sync_count, 0);
        assert!(!record.modified);
        assert!(!record.is_deleted());
    }

    #[test]
    fn tombstone_is_deleted() {
        let record = Record::new("color", None);
        assert!(record.is_deleted());
    }

    #[test]
    fn builder_chain() {
        let record = Record::new("k", Some("v".into()))
            .with_sync_count(7)
            .with_modified(true)
            .with_last_modified_by("device-a");
        assert_eq!(record.sync_count, 7);
        assert!(record.modified);
        assert_eq!(record.last_modified_by, "device-a");
    }

    #[test]
    fn size_counts_key_and_value() {
        let record = Record::new("theme", Some("dark".into()));
        assert_eq!(record.size_in_bytes(), 9);

        let tombstone = Record::new("theme", None);
        assert_eq!(tombstone.size_in_bytes(), 5);
    }

    #[test]
    fn serde_roundtrip() {
        let record = Record::new("k", Some("v".into())).with_sync_count(3);
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
