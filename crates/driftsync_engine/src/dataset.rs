//! Dataset façade.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::hooks::SyncHooks;
use crate::identity::IdentityProvider;
use crate::remote::RemoteDataStorage;
use crate::resolver::ConflictResolver;
use crate::state::{SyncEngine, SyncState};
use driftsync_model::{
    validate_record_key, DatasetMetadata, Record, UNKNOWN_IDENTITY_ID,
};
use driftsync_storage::LocalStorage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// The outcome channel of a dispatched synchronization.
///
/// `wait` blocks until the pass reaches a terminal outcome. Dropping the
/// handle detaches the worker; the registered hooks still report the
/// outcome either way.
pub struct SyncHandle {
    inner: HandleInner,
}

enum HandleInner {
    Completed(SyncResult<Vec<Record>>),
    Running(JoinHandle<SyncResult<Vec<Record>>>),
}

impl SyncHandle {
    fn completed(result: SyncResult<Vec<Record>>) -> Self {
        Self {
            inner: HandleInner::Completed(result),
        }
    }

    fn running(handle: JoinHandle<SyncResult<Vec<Record>>>) -> Self {
        Self {
            inner: HandleInner::Running(handle),
        }
    }

    /// Waits for the pass to finish and returns its terminal outcome.
    pub fn wait(self) -> SyncResult<Vec<Record>> {
        match self.inner {
            HandleInner::Completed(result) => result,
            HandleInner::Running(handle) => {
                handle.join().unwrap_or_else(|_| Err(SyncError::WorkerFailed))
            }
        }
    }
}

/// A named collection of key-value records scoped to one identity.
///
/// Reads and writes go straight to the local record store; no method here
/// touches the network except [`Dataset::synchronize`] and
/// [`Dataset::synchronize_on_connectivity`]. Keys are validated before any
/// store access.
///
/// Obtained from [`crate::SyncManager::open_or_create_dataset`].
#[derive(Clone)]
pub struct Dataset {
    name: String,
    local: Arc<dyn LocalStorage>,
    remote: Arc<dyn RemoteDataStorage>,
    identity: Arc<dyn IdentityProvider>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    config: SyncConfig,
    hooks: Arc<SyncHooks>,
    state: Arc<RwLock<SyncState>>,
    in_flight: Arc<AtomicBool>,
    waiting_for_connectivity: Arc<AtomicBool>,
}

impl Dataset {
    pub(crate) fn new(
        name: String,
        local: Arc<dyn LocalStorage>,
        remote: Arc<dyn RemoteDataStorage>,
        identity: Arc<dyn IdentityProvider>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        config: SyncConfig,
    ) -> Self {
        Self {
            name,
            local,
            remote,
            identity,
            connectivity,
            config,
            hooks: Arc::new(SyncHooks::default()),
            state: Arc::new(RwLock::new(SyncState::Idle)),
            in_flight: Arc::new(AtomicBool::new(false)),
            waiting_for_connectivity: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the state of the current or last reconciliation pass.
    pub fn sync_state(&self) -> SyncState {
        *self.state.read()
    }

    fn identity_id(&self) -> String {
        self.identity
            .identity_id()
            .unwrap_or_else(|| UNKNOWN_IDENTITY_ID.to_string())
    }

    /// Returns the live value for a key.
    pub fn get(&self, key: &str) -> SyncResult<Option<String>> {
        validate_record_key(key)?;
        Ok(self.local.get_value(&self.identity_id(), &self.name, key)?)
    }

    /// Writes a value locally; it is pushed on the next synchronization.
    pub fn put(&self, key: &str, value: &str) -> SyncResult<()> {
        validate_record_key(key)?;
        Ok(self
            .local
            .put_value(&self.identity_id(), &self.name, key, Some(value))?)
    }

    /// Writes a batch of values locally in one atomic step.
    pub fn put_all(&self, values: &[(String, String)]) -> SyncResult<()> {
        for (key, _) in values {
            validate_record_key(key)?;
        }
        let values: Vec<(String, Option<String>)> = values
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect();
        Ok(self
            .local
            .put_all_values(&self.identity_id(), &self.name, &values)?)
    }

    /// Removes a key by writing a tombstone; the deletion is pushed on the
    /// next synchronization.
    pub fn remove(&self, key: &str) -> SyncResult<()> {
        validate_record_key(key)?;
        Ok(self
            .local
            .put_value(&self.identity_id(), &self.name, key, None)?)
    }

    /// Returns all live key-value pairs.
    pub fn get_all(&self) -> SyncResult<HashMap<String, String>> {
        Ok(self
            .local
            .get_records(&self.identity_id(), &self.name)?
            .into_iter()
            .filter(|r| !r.is_deleted())
            .filter_map(|r| r.value.map(|v| (r.key, v)))
            .collect())
    }

    /// Returns all records, tombstones included.
    pub fn get_all_records(&self) -> SyncResult<Vec<Record>> {
        Ok(self.local.get_records(&self.identity_id(), &self.name)?)
    }

    /// Returns true if a key holds unpushed local modifications.
    pub fn is_changed(&self, key: &str) -> SyncResult<bool> {
        validate_record_key(key)?;
        Ok(self
            .local
            .get_record(&self.identity_id(), &self.name, key)?
            .map(|r| r.modified)
            .unwrap_or(false))
    }

    /// Returns the storage footprint of one record in bytes.
    pub fn size_in_bytes(&self, key: &str) -> SyncResult<u64> {
        validate_record_key(key)?;
        Ok(self
            .local
            .get_record(&self.identity_id(), &self.name, key)?
            .map(|r| r.size_in_bytes())
            .unwrap_or(0))
    }

    /// Returns the storage footprint of the whole dataset in bytes.
    pub fn total_size_in_bytes(&self) -> SyncResult<u64> {
        Ok(self
            .local
            .get_records(&self.identity_id(), &self.name)?
            .iter()
            .map(Record::size_in_bytes)
            .sum())
    }

    /// Returns the dataset's local metadata row.
    pub fn metadata(&self) -> SyncResult<Option<DatasetMetadata>> {
        Ok(self
            .local
            .get_dataset_metadata(&self.identity_id(), &self.name)?)
    }

    /// Deletes the dataset locally; the next synchronization pushes the
    /// deletion to the remote store.
    pub fn delete(&self) -> SyncResult<()> {
        Ok(self.local.delete_dataset(&self.identity_id(), &self.name)?)
    }

    /// Replaces the conflict resolution strategy (remote-wins by default).
    pub fn set_conflict_resolver(&self, resolver: impl ConflictResolver + 'static) {
        self.hooks.set_resolver(Arc::new(resolver));
    }

    /// Registers a handler consulted when merged datasets are discovered.
    /// Returning `false` cancels the pass.
    pub fn on_dataset_merged(
        &self,
        handler: impl Fn(&str, &[String]) -> bool + Send + Sync + 'static,
    ) {
        self.hooks.set_merge_handler(Arc::new(handler));
    }

    /// Registers a handler consulted when the remote store reports the
    /// dataset deleted. Returning `false` cancels the pass; `true` (and the
    /// absent-handler default) purges the local copy.
    pub fn on_dataset_deleted(&self, handler: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.hooks.set_delete_handler(Arc::new(handler));
    }

    /// Registers a transform applied to incoming remote records before they
    /// are written locally.
    pub fn on_records_updating(
        &self,
        hook: impl Fn(&str, Vec<Record>) -> Vec<Record> + Send + Sync + 'static,
    ) {
        self.hooks.set_transform(Arc::new(hook));
    }

    /// Registers the sync-succeeded event handler.
    pub fn on_sync_success(&self, handler: impl Fn(&str, &[Record]) + Send + Sync + 'static) {
        self.hooks.set_success_handler(Arc::new(handler));
    }

    /// Registers the sync-failed event handler.
    pub fn on_sync_failure(&self, handler: impl Fn(&str, &SyncError) + Send + Sync + 'static) {
        self.hooks.set_failure_handler(Arc::new(handler));
    }

    /// Starts one reconciliation pass on a worker thread.
    ///
    /// Connectivity is checked once, synchronously, before dispatch; when
    /// offline the pass fails fast without retry. A second call while a
    /// pass is in flight is rejected. The terminal outcome is reported
    /// through the registered hooks and through the returned handle.
    pub fn synchronize(&self) -> SyncHandle {
        self.waiting_for_connectivity.store(false, Ordering::SeqCst);

        if !self.connectivity.is_online() {
            let error = SyncError::NoConnectivity;
            self.hooks.fire_failure(&self.name, &error);
            return SyncHandle::completed(Err(error));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // The active pass reports its own outcome; this call is only
            // rejected, so the hooks stay silent.
            return SyncHandle::completed(Err(SyncError::AlreadyInProgress {
                dataset_name: self.name.clone(),
            }));
        }

        let dataset = self.clone();
        let handle = thread::spawn(move || {
            let engine = SyncEngine::new(
                dataset.name.clone(),
                Arc::clone(&dataset.local),
                Arc::clone(&dataset.remote),
                Arc::clone(&dataset.identity),
                Arc::clone(&dataset.hooks),
                dataset.config.clone(),
                Arc::clone(&dataset.state),
            );
            let result = engine.run();
            match &result {
                Ok(applied) => dataset.hooks.fire_success(&dataset.name, applied),
                Err(error) => dataset.hooks.fire_failure(&dataset.name, error),
            }
            dataset.in_flight.store(false, Ordering::SeqCst);
            result
        });
        SyncHandle::running(handle)
    }

    /// Synchronizes now if online, otherwise defers one pass until a
    /// connectivity-restored notification arrives.
    pub fn synchronize_on_connectivity(&self) {
        if self.connectivity.is_online() {
            self.synchronize();
            return;
        }

        debug!(dataset = %self.name, "offline, deferring synchronization");
        if self.waiting_for_connectivity.swap(true, Ordering::SeqCst) {
            // A watcher is already parked on the feed.
            return;
        }

        let receiver = self.connectivity.subscribe();
        let dataset = self.clone();
        thread::spawn(move || {
            while let Ok(online) = receiver.recv() {
                if !dataset.waiting_for_connectivity.load(Ordering::SeqCst) {
                    // A direct synchronize ran in the meantime.
                    return;
                }
                if online && dataset.waiting_for_connectivity.swap(false, Ordering::SeqCst) {
                    dataset.synchronize();
                    return;
                }
            }
        });
    }
}
