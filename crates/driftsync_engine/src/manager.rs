//! Dataset and identity lifecycle management.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::dataset::Dataset;
use crate::error::SyncResult;
use crate::identity::{IdentityChange, IdentityFeed, IdentityProvider};
use crate::remote::RemoteDataStorage;
use driftsync_model::{validate_dataset_name, DatasetMetadata, UNKNOWN_IDENTITY_ID};
use driftsync_storage::LocalStorage;
use parking_lot::Mutex;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::info;

/// Owns dataset enumeration and the identity lifecycle.
///
/// The manager subscribes to an [`IdentityFeed`] at construction and drains
/// pending identity changes at every public entry point (and on demand via
/// [`SyncManager::process_identity_events`]). An identity change renames
/// the whole local partition from the old id to the new one; records
/// written before any identity existed live under the reserved unknown
/// bucket and migrate on the first change. This is a metadata-level bulk
/// rename and never contacts the remote store.
pub struct SyncManager {
    local: Arc<dyn LocalStorage>,
    remote: Arc<dyn RemoteDataStorage>,
    identity: Arc<dyn IdentityProvider>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    config: SyncConfig,
    identity_events: Mutex<Receiver<IdentityChange>>,
}

impl SyncManager {
    /// Creates a manager and subscribes it to the identity feed.
    pub fn new(
        local: Arc<dyn LocalStorage>,
        remote: Arc<dyn RemoteDataStorage>,
        identity: Arc<dyn IdentityProvider>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        identity_feed: &IdentityFeed,
    ) -> Self {
        Self {
            local,
            remote,
            identity,
            connectivity,
            config: SyncConfig::default(),
            identity_events: Mutex::new(identity_feed.subscribe()),
        }
    }

    /// Sets the sync configuration handed to datasets opened afterwards.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    fn identity_id(&self) -> String {
        self.identity
            .identity_id()
            .unwrap_or_else(|| UNKNOWN_IDENTITY_ID.to_string())
    }

    /// Applies all pending identity changes to the local store.
    pub fn process_identity_events(&self) -> SyncResult<()> {
        let events = self.identity_events.lock();
        while let Ok(change) = events.try_recv() {
            let old_id = change
                .old_id
                .unwrap_or_else(|| UNKNOWN_IDENTITY_ID.to_string());
            if old_id != change.new_id {
                info!(old = %old_id, new = %change.new_id, "identity change detected");
                self.local.change_identity_id(&old_id, &change.new_id)?;
            }
        }
        Ok(())
    }

    /// Opens a dataset, creating it locally if it does not exist yet.
    pub fn open_or_create_dataset(&self, dataset_name: &str) -> SyncResult<Dataset> {
        self.process_identity_events()?;
        validate_dataset_name(dataset_name)?;
        self.local.create_dataset(&self.identity_id(), dataset_name)?;
        Ok(Dataset::new(
            dataset_name.to_string(),
            Arc::clone(&self.local),
            Arc::clone(&self.remote),
            Arc::clone(&self.identity),
            Arc::clone(&self.connectivity),
            self.config.clone(),
        ))
    }

    /// Lists local metadata for every dataset under the current identity.
    pub fn list_datasets(&self) -> SyncResult<Vec<DatasetMetadata>> {
        self.process_identity_events()?;
        Ok(self.local.get_datasets(&self.identity_id())?)
    }

    /// Pulls the authoritative dataset metadata list from the remote store
    /// and merges it into the local table.
    pub fn refresh_dataset_metadata(&self) -> SyncResult<Vec<DatasetMetadata>> {
        self.process_identity_events()?;
        if !self.identity.has_valid_credentials() {
            self.identity.refresh()?;
        }
        let metadata = self.remote.get_datasets()?;
        self.local
            .update_dataset_metadata(&self.identity_id(), &metadata)?;
        Ok(metadata)
    }

    /// Removes all local data across every identity. Never contacts the
    /// remote store.
    pub fn wipe_data(&self) -> SyncResult<()> {
        self.process_identity_events()?;
        self.local.wipe_data()?;
        info!("all local data wiped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticConnectivity;
    use crate::error::SyncError;
    use crate::identity::StaticIdentityProvider;
    use crate::remote::MockRemoteStorage;
    use driftsync_model::ValidationError;
    use driftsync_storage::InMemoryStorage;

    struct Fixture {
        local: Arc<InMemoryStorage>,
        remote: Arc<MockRemoteStorage>,
        identity: Arc<StaticIdentityProvider>,
        feed: IdentityFeed,
        manager: SyncManager,
    }

    fn fixture(identity: StaticIdentityProvider) -> Fixture {
        let local = Arc::new(InMemoryStorage::new());
        let remote = Arc::new(MockRemoteStorage::new());
        let identity = Arc::new(identity);
        let feed = IdentityFeed::new();
        let manager = SyncManager::new(
            Arc::clone(&local) as Arc<dyn LocalStorage>,
            Arc::clone(&remote) as Arc<dyn RemoteDataStorage>,
            Arc::clone(&identity) as Arc<dyn IdentityProvider>,
            Arc::new(StaticConnectivity::new(true)),
            &feed,
        );
        Fixture {
            local,
            remote,
            identity,
            feed,
            manager,
        }
    }

    #[test]
    fn open_creates_dataset_locally() {
        let f = fixture(StaticIdentityProvider::new("id-1"));
        let dataset = f.manager.open_or_create_dataset("profile").unwrap();
        assert_eq!(dataset.name(), "profile");
        assert!(f
            .local
            .get_dataset_metadata("id-1", "profile")
            .unwrap()
            .is_some());
    }

    #[test]
    fn open_rejects_invalid_names() {
        let f = fixture(StaticIdentityProvider::new("id-1"));
        assert!(matches!(
            f.manager.open_or_create_dataset("no spaces"),
            Err(SyncError::Validation(ValidationError::InvalidCharacter { .. }))
        ));
    }

    #[test]
    fn datasets_without_identity_use_unknown_bucket() {
        let f = fixture(StaticIdentityProvider::anonymous());
        f.manager.open_or_create_dataset("profile").unwrap();
        assert!(f
            .local
            .get_dataset_metadata(UNKNOWN_IDENTITY_ID, "profile")
            .unwrap()
            .is_some());
    }

    #[test]
    fn identity_change_migrates_unknown_bucket() {
        let f = fixture(StaticIdentityProvider::anonymous());
        let dataset = f.manager.open_or_create_dataset("profile").unwrap();
        dataset.put("nickname", "Bob").unwrap();

        f.identity.set_identity_id("id-9");
        f.feed.emit(IdentityChange {
            old_id: None,
            new_id: "id-9".into(),
        });

        // The next entry point drains the event.
        let datasets = f.manager.list_datasets().unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(
            f.local
                .get_value("id-9", "profile", "nickname")
                .unwrap()
                .as_deref(),
            Some("Bob")
        );
        assert!(f.local.get_datasets(UNKNOWN_IDENTITY_ID).unwrap().is_empty());
    }

    #[test]
    fn identity_change_between_real_ids() {
        let f = fixture(StaticIdentityProvider::new("id-1"));
        let dataset = f.manager.open_or_create_dataset("profile").unwrap();
        dataset.put("k", "v").unwrap();

        f.identity.set_identity_id("id-2");
        f.feed.emit(IdentityChange {
            old_id: Some("id-1".into()),
            new_id: "id-2".into(),
        });
        f.manager.process_identity_events().unwrap();

        assert!(f.local.get_datasets("id-1").unwrap().is_empty());
        assert_eq!(
            f.local.get_value("id-2", "profile", "k").unwrap().as_deref(),
            Some("v")
        );
    }

    #[test]
    fn unchanged_identity_is_ignored() {
        let f = fixture(StaticIdentityProvider::new("id-1"));
        let dataset = f.manager.open_or_create_dataset("profile").unwrap();
        dataset.put("k", "v").unwrap();

        f.feed.emit(IdentityChange {
            old_id: Some("id-1".into()),
            new_id: "id-1".into(),
        });
        f.manager.process_identity_events().unwrap();

        assert_eq!(
            f.local.get_value("id-1", "profile", "k").unwrap().as_deref(),
            Some("v")
        );
    }

    #[test]
    fn refresh_merges_remote_metadata() {
        let f = fixture(StaticIdentityProvider::new("id-1"));
        f.manager.open_or_create_dataset("profile").unwrap();
        f.local.update_last_sync_count("id-1", "profile", 4).unwrap();

        let mut remote_meta = DatasetMetadata::new("profile");
        remote_meta.storage_size_bytes = 256;
        let mut other = DatasetMetadata::new("settings");
        other.storage_size_bytes = 64;
        f.remote.queue_get_datasets(Ok(vec![remote_meta, other]));

        let refreshed = f.manager.refresh_dataset_metadata().unwrap();
        assert_eq!(refreshed.len(), 2);

        let datasets = f.manager.list_datasets().unwrap();
        assert_eq!(datasets.len(), 2);
        // Local sync bookkeeping survives the merge.
        assert_eq!(f.local.get_last_sync_count("id-1", "profile").unwrap(), 4);
    }

    #[test]
    fn wipe_clears_all_identities() {
        let f = fixture(StaticIdentityProvider::new("id-1"));
        let dataset = f.manager.open_or_create_dataset("profile").unwrap();
        dataset.put("k", "v").unwrap();

        f.manager.wipe_data().unwrap();
        assert!(f.manager.list_datasets().unwrap().is_empty());
    }
}
