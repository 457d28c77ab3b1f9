//! In-memory record store.

use crate::error::StorageResult;
use crate::local::LocalStorage;
use driftsync_model::{DatasetMetadata, Record, LOCALLY_DELETED_SYNC_COUNT};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct DatasetEntry {
    metadata: DatasetMetadata,
    records: BTreeMap<String, Record>,
}

impl DatasetEntry {
    fn new(dataset_name: &str) -> Self {
        Self {
            metadata: DatasetMetadata::new(dataset_name),
            records: BTreeMap::new(),
        }
    }

    fn touch(&mut self) {
        self.metadata.last_modified = SystemTime::now();
        self.metadata.storage_size_bytes =
            self.records.values().map(|r| r.size_in_bytes()).sum();
    }
}

type Partition = BTreeMap<String, DatasetEntry>;

/// An in-memory record store.
///
/// Suitable for unit tests, integration tests, and hosts without a durable
/// store. All operations take a single lock per call, so each write batch is
/// atomic with respect to concurrent readers.
///
/// # Example
///
/// ```rust
/// use driftsync_storage::{InMemoryStorage, LocalStorage};
///
/// let store = InMemoryStorage::new();
/// store.put_value("id-1", "profile", "nickname", Some("Bob")).unwrap();
/// assert_eq!(
///     store.get_value("id-1", "profile", "nickname").unwrap().as_deref(),
///     Some("Bob"),
/// );
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    data: RwLock<HashMap<String, Partition>>,
}

impl InMemoryStorage {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_record(entry: &mut DatasetEntry, identity_id: &str, key: &str, value: Option<&str>) {
        let existing = entry.records.get(key);
        if let Some(record) = existing {
            // Writing the value a record already holds is a no-op.
            if record.value.as_deref() == value {
                return;
            }
        }
        let sync_count = existing.map(|r| r.sync_count).unwrap_or(0);
        let record = Record {
            key: key.to_string(),
            value: value.map(str::to_string),
            sync_count,
            last_modified_by: identity_id.to_string(),
            device_last_modified: SystemTime::now(),
            modified: true,
        };
        entry.records.insert(key.to_string(), record);
    }
}

impl LocalStorage for InMemoryStorage {
    fn get_record(
        &self,
        identity_id: &str,
        dataset_name: &str,
        key: &str,
    ) -> StorageResult<Option<Record>> {
        let data = self.data.read();
        Ok(data
            .get(identity_id)
            .and_then(|p| p.get(dataset_name))
            .and_then(|e| e.records.get(key))
            .cloned())
    }

    fn get_records(&self, identity_id: &str, dataset_name: &str) -> StorageResult<Vec<Record>> {
        let data = self.data.read();
        Ok(data
            .get(identity_id)
            .and_then(|p| p.get(dataset_name))
            .map(|e| e.records.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_value(
        &self,
        identity_id: &str,
        dataset_name: &str,
        key: &str,
    ) -> StorageResult<Option<String>> {
        Ok(self
            .get_record(identity_id, dataset_name, key)?
            .filter(|r| !r.is_deleted())
            .and_then(|r| r.value))
    }

    fn put_value(
        &self,
        identity_id: &str,
        dataset_name: &str,
        key: &str,
        value: Option<&str>,
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let entry = data
            .entry(identity_id.to_string())
            .or_default()
            .entry(dataset_name.to_string())
            .or_insert_with(|| DatasetEntry::new(dataset_name));
        Self::write_record(entry, identity_id, key, value);
        entry.touch();
        Ok(())
    }

    fn put_all_values(
        &self,
        identity_id: &str,
        dataset_name: &str,
        values: &[(String, Option<String>)],
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let entry = data
            .entry(identity_id.to_string())
            .or_default()
            .entry(dataset_name.to_string())
            .or_insert_with(|| DatasetEntry::new(dataset_name));
        for (key, value) in values {
            Self::write_record(entry, identity_id, key, value.as_deref());
        }
        entry.touch();
        Ok(())
    }

    fn put_records(
        &self,
        identity_id: &str,
        dataset_name: &str,
        records: &[Record],
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let entry = data
            .entry(identity_id.to_string())
            .or_default()
            .entry(dataset_name.to_string())
            .or_insert_with(|| DatasetEntry::new(dataset_name));
        for record in records {
            entry.records.insert(record.key.clone(), record.clone());
        }
        entry.touch();
        Ok(())
    }

    fn get_modified_records(
        &self,
        identity_id: &str,
        dataset_name: &str,
    ) -> StorageResult<Vec<Record>> {
        Ok(self
            .get_records(identity_id, dataset_name)?
            .into_iter()
            .filter(|r| r.modified)
            .collect())
    }

    fn get_last_sync_count(&self, identity_id: &str, dataset_name: &str) -> StorageResult<i64> {
        let data = self.data.read();
        Ok(data
            .get(identity_id)
            .and_then(|p| p.get(dataset_name))
            .map(|e| e.metadata.last_sync_count)
            .unwrap_or(0))
    }

    fn update_last_sync_count(
        &self,
        identity_id: &str,
        dataset_name: &str,
        sync_count: i64,
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let entry = data
            .entry(identity_id.to_string())
            .or_default()
            .entry(dataset_name.to_string())
            .or_insert_with(|| DatasetEntry::new(dataset_name));
        entry.metadata.last_sync_count = sync_count;
        entry.metadata.last_modified = SystemTime::now();
        Ok(())
    }

    fn get_datasets(&self, identity_id: &str) -> StorageResult<Vec<DatasetMetadata>> {
        let data = self.data.read();
        Ok(data
            .get(identity_id)
            .map(|p| p.values().map(|e| e.metadata.clone()).collect())
            .unwrap_or_default())
    }

    fn get_dataset_metadata(
        &self,
        identity_id: &str,
        dataset_name: &str,
    ) -> StorageResult<Option<DatasetMetadata>> {
        let data = self.data.read();
        Ok(data
            .get(identity_id)
            .and_then(|p| p.get(dataset_name))
            .map(|e| e.metadata.clone()))
    }

    fn create_dataset(&self, identity_id: &str, dataset_name: &str) -> StorageResult<()> {
        let mut data = self.data.write();
        data.entry(identity_id.to_string())
            .or_default()
            .entry(dataset_name.to_string())
            .or_insert_with(|| DatasetEntry::new(dataset_name));
        Ok(())
    }

    fn update_dataset_metadata(
        &self,
        identity_id: &str,
        metadata: &[DatasetMetadata],
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let partition = data.entry(identity_id.to_string()).or_default();
        for meta in metadata {
            match partition.get_mut(&meta.dataset_name) {
                Some(entry) => {
                    let last_sync_count = entry.metadata.last_sync_count;
                    entry.metadata = meta.clone();
                    entry.metadata.last_sync_count = last_sync_count;
                }
                None => {
                    let mut entry = DatasetEntry::new(&meta.dataset_name);
                    entry.metadata = meta.clone();
                    entry.metadata.last_sync_count = 0;
                    partition.insert(meta.dataset_name.clone(), entry);
                }
            }
        }
        Ok(())
    }

    fn delete_dataset(&self, identity_id: &str, dataset_name: &str) -> StorageResult<()> {
        let mut data = self.data.write();
        let entry = data
            .entry(identity_id.to_string())
            .or_default()
            .entry(dataset_name.to_string())
            .or_insert_with(|| DatasetEntry::new(dataset_name));
        entry.records.clear();
        entry.metadata.last_sync_count = LOCALLY_DELETED_SYNC_COUNT;
        entry.touch();
        Ok(())
    }

    fn purge_dataset(&self, identity_id: &str, dataset_name: &str) -> StorageResult<()> {
        let mut data = self.data.write();
        if let Some(partition) = data.get_mut(identity_id) {
            partition.remove(dataset_name);
        }
        Ok(())
    }

    fn change_identity_id(
        &self,
        old_identity_id: &str,
        new_identity_id: &str,
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let Some(old_partition) = data.remove(old_identity_id) else {
            return Ok(());
        };
        let new_partition = data.entry(new_identity_id.to_string()).or_default();
        for (name, mut entry) in old_partition {
            if new_partition.contains_key(&name) {
                // Collision: re-key under the old identity so merge
                // discovery surfaces it on the next sync.
                let merged_name = format!("{}.{}", name, old_identity_id);
                entry.metadata.dataset_name = merged_name.clone();
                new_partition.insert(merged_name, entry);
            } else {
                new_partition.insert(name, entry);
            }
        }
        Ok(())
    }

    fn wipe_data(&self) -> StorageResult<()> {
        self.data.write().clear();
        Ok(())
    }
}
