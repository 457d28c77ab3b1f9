//! Conflict pairs between local and remote records.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A remote record and a local record sharing one key with differing values,
/// where the local record carries unpushed modifications.
///
/// Constructed only to drive conflict resolution. The `resolve_with_*`
/// methods build the agreed record; which side's value survives determines
/// whether the record needs another push:
///
/// - remote wins: `modified = false`, nothing further to push;
/// - local wins or a new value: `modified = true`, the record is re-pushed
///   in the same pass.
///
/// Either way the agreed record adopts the remote sync count, so the next
/// push is verified against the version the remote store actually holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// The contested key.
    pub key: String,
    /// The remote side of the conflict.
    pub remote: Record,
    /// The local side of the conflict.
    pub local: Record,
}

impl SyncConflict {
    /// Creates a conflict pair from a remote and a local record.
    ///
    /// Both records must carry the same key.
    pub fn new(remote: Record, local: Record) -> Self {
        debug_assert_eq!(remote.key, local.key);
        Self {
            key: remote.key.clone(),
            remote,
            local,
        }
    }

    /// Resolves the conflict by keeping the remote value.
    pub fn resolve_with_remote(&self) -> Record {
        Record {
            key: self.key.clone(),
            value: self.remote.value.clone(),
            sync_count: self.remote.sync_count,
            last_modified_by: self.remote.last_modified_by.clone(),
            device_last_modified: self.remote.device_last_modified,
            modified: false,
        }
    }

    /// Resolves the conflict by keeping the local value.
    pub fn resolve_with_local(&self) -> Record {
        Record {
            key: self.key.clone(),
            value: self.local.value.clone(),
            sync_count: self.remote.sync_count,
            last_modified_by: self.local.last_modified_by.clone(),
            device_last_modified: self.local.device_last_modified,
            modified: true,
        }
    }

    /// Resolves the conflict with a caller-supplied value.
    pub fn resolve_with_value(&self, value: Option<String>) -> Record {
        Record {
            key: self.key.clone(),
            value,
            sync_count: self.remote.sync_count,
            last_modified_by: self.local.last_modified_by.clone(),
            device_last_modified: SystemTime::now(),
            modified: true,
        }
    }
}
