//! Local record store capability.

use crate::error::StorageResult;
use driftsync_model::{DatasetMetadata, Record};

/// The on-device record store consumed by the sync engine.
///
/// All data is partitioned first by identity id, then by dataset name.
/// Implementations are **value stores with sync bookkeeping**: they hold
/// records, per-dataset metadata, and the last agreed sync count, and they
/// maintain the `modified` flag that drives the push phase.
///
/// # Invariants
///
/// - `put_value` marks the written record `modified` and stamps the device
///   modification time; writing the value a record already holds is a no-op
/// - `put_records` writes records verbatim (flags included) — it is the
///   engine's channel for server-authoritative state
/// - `delete_dataset` drops the records and writes the locally-deleted
///   sync-count sentinel; `purge_dataset` removes the metadata row too
/// - each write batch is atomic with respect to concurrent readers
/// - implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`crate::InMemoryStorage`] — for tests and ephemeral hosts
pub trait LocalStorage: Send + Sync {
    /// Returns one record, or `None` if the key was never written.
    fn get_record(
        &self,
        identity_id: &str,
        dataset_name: &str,
        key: &str,
    ) -> StorageResult<Option<Record>>;

    /// Returns all records of a dataset, tombstones included.
    fn get_records(&self, identity_id: &str, dataset_name: &str) -> StorageResult<Vec<Record>>;

    /// Returns the live value for a key (`None` for absent keys and
    /// tombstones).
    fn get_value(
        &self,
        identity_id: &str,
        dataset_name: &str,
        key: &str,
    ) -> StorageResult<Option<String>>;

    /// Writes one value locally, marking the record as modified.
    /// A `None` value writes a tombstone.
    fn put_value(
        &self,
        identity_id: &str,
        dataset_name: &str,
        key: &str,
        value: Option<&str>,
    ) -> StorageResult<()>;

    /// Writes a batch of values locally in one atomic step.
    fn put_all_values(
        &self,
        identity_id: &str,
        dataset_name: &str,
        values: &[(String, Option<String>)],
    ) -> StorageResult<()>;

    /// Writes records verbatim, replacing any records with the same keys.
    ///
    /// Used by the sync engine to apply remote and conflict-resolved state;
    /// the records' `modified` flags and sync counts are preserved as given.
    fn put_records(
        &self,
        identity_id: &str,
        dataset_name: &str,
        records: &[Record],
    ) -> StorageResult<()>;

    /// Returns all records with unpushed local modifications.
    fn get_modified_records(
        &self,
        identity_id: &str,
        dataset_name: &str,
    ) -> StorageResult<Vec<Record>>;

    /// Returns the last sync count agreed with the remote store
    /// (`0` for datasets never synchronized).
    fn get_last_sync_count(&self, identity_id: &str, dataset_name: &str) -> StorageResult<i64>;

    /// Records a newly agreed sync count.
    fn update_last_sync_count(
        &self,
        identity_id: &str,
        dataset_name: &str,
        sync_count: i64,
    ) -> StorageResult<()>;

    /// Returns metadata for every dataset under an identity.
    fn get_datasets(&self, identity_id: &str) -> StorageResult<Vec<DatasetMetadata>>;

    /// Returns metadata for one dataset, or `None` if it was never created.
    fn get_dataset_metadata(
        &self,
        identity_id: &str,
        dataset_name: &str,
    ) -> StorageResult<Option<DatasetMetadata>>;

    /// Creates an empty dataset if it does not exist yet.
    fn create_dataset(&self, identity_id: &str, dataset_name: &str) -> StorageResult<()>;

    /// Merges remote dataset metadata into the local table.
    ///
    /// Existing rows keep their local `last_sync_count`; new rows start at
    /// zero.
    fn update_dataset_metadata(
        &self,
        identity_id: &str,
        metadata: &[DatasetMetadata],
    ) -> StorageResult<()>;

    /// Deletes a dataset locally: drops its records and writes the
    /// locally-deleted sentinel so the next sync pushes the deletion.
    fn delete_dataset(&self, identity_id: &str, dataset_name: &str) -> StorageResult<()>;

    /// Removes a dataset entirely, metadata row included.
    fn purge_dataset(&self, identity_id: &str, dataset_name: &str) -> StorageResult<()>;

    /// Moves every dataset from one identity partition to another.
    ///
    /// When the new identity already holds a dataset with the same name,
    /// the old dataset is re-keyed to `"{name}.{old_identity_id}"` so merge
    /// discovery surfaces it on the next sync.
    fn change_identity_id(&self, old_identity_id: &str, new_identity_id: &str)
        -> StorageResult<()>;

    /// Removes all local data across every identity.
    fn wipe_data(&self) -> StorageResult<()>;
}
