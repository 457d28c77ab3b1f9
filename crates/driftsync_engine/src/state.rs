//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::hooks::SyncHooks;
use crate::identity::IdentityProvider;
use crate::remote::{RemoteDataStorage, RemoteError};
use crate::resolver::Resolution;
use driftsync_model::{DatasetUpdates, Record, SyncConflict, LOCALLY_DELETED_SYNC_COUNT};
use driftsync_storage::LocalStorage;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The state of a dataset's reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass is running.
    Idle,
    /// Scanning local metadata for merged datasets.
    Discovering,
    /// Pulling remote updates.
    Pulling,
    /// Resolving divergent records through the registered strategy.
    ConflictResolving,
    /// Pushing local modifications.
    Pushing,
    /// The last pass converged.
    Succeeded,
    /// The last pass failed.
    Failed,
    /// The last pass was cancelled by a callback.
    Cancelled,
}

impl SyncState {
    /// Returns true if a pass is actively running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Discovering
                | SyncState::Pulling
                | SyncState::ConflictResolving
                | SyncState::Pushing
        )
    }

    /// Returns true for the terminal states of a finished pass.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Succeeded | SyncState::Failed | SyncState::Cancelled
        )
    }
}

/// Outcome of one attempt within the retry loop.
enum Attempt {
    /// The pass converged; carries the records applied from the remote side.
    Complete(Vec<Record>),
    /// A recoverable outcome (remote-side merge or push version conflict);
    /// restart from the pull with one less retry.
    Retry,
}

/// Executes one complete reconciliation pass for a dataset, with bounded
/// retry on recoverable outcomes.
///
/// The engine reads and writes local state only through [`LocalStorage`]
/// and talks to the remote service only through [`RemoteDataStorage`].
/// Callbacks (merge, delete, conflict, transform) are consulted through
/// the dataset's [`SyncHooks`]; declining any of them cancels the pass.
pub(crate) struct SyncEngine {
    dataset_name: String,
    local: Arc<dyn LocalStorage>,
    remote: Arc<dyn RemoteDataStorage>,
    identity: Arc<dyn IdentityProvider>,
    hooks: Arc<SyncHooks>,
    config: SyncConfig,
    state: Arc<RwLock<SyncState>>,
}

impl SyncEngine {
    pub(crate) fn new(
        dataset_name: String,
        local: Arc<dyn LocalStorage>,
        remote: Arc<dyn RemoteDataStorage>,
        identity: Arc<dyn IdentityProvider>,
        hooks: Arc<SyncHooks>,
        config: SyncConfig,
        state: Arc<RwLock<SyncState>>,
    ) -> Self {
        Self {
            dataset_name,
            local,
            remote,
            identity,
            hooks,
            config,
            state,
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs the pass to a terminal outcome.
    pub(crate) fn run(&self) -> SyncResult<Vec<Record>> {
        let result = self.run_inner();
        match &result {
            Ok(applied) => {
                info!(
                    dataset = %self.dataset_name,
                    applied = applied.len(),
                    "synchronization succeeded"
                );
                self.set_state(SyncState::Succeeded);
            }
            Err(SyncError::Cancelled { stage }) => {
                info!(dataset = %self.dataset_name, stage, "synchronization cancelled");
                self.set_state(SyncState::Cancelled);
            }
            Err(error) => {
                warn!(dataset = %self.dataset_name, %error, "synchronization failed");
                self.set_state(SyncState::Failed);
            }
        }
        result
    }

    fn run_inner(&self) -> SyncResult<Vec<Record>> {
        let identity_id = self.effective_identity()?;
        let mut retries_left = self.config.max_retries;

        loop {
            match self.run_attempt(&identity_id)? {
                Attempt::Complete(applied) => return Ok(applied),
                Attempt::Retry => {
                    if retries_left == 0 {
                        warn!(dataset = %self.dataset_name, "retry budget exhausted, giving up");
                        return Err(SyncError::RetriesExhausted);
                    }
                    retries_left -= 1;
                    debug!(dataset = %self.dataset_name, retries_left, "restarting pass");
                }
            }
        }
    }

    /// Returns the identity to sync under, refreshing credentials when the
    /// id is missing or the credentials are stale.
    fn effective_identity(&self) -> SyncResult<String> {
        match self.identity.identity_id() {
            Some(id) if self.identity.has_valid_credentials() => Ok(id),
            _ => {
                debug!(dataset = %self.dataset_name, "refreshing credentials");
                Ok(self.identity.refresh()?)
            }
        }
    }

    /// One attempt: discover, pull, resolve, apply, push.
    fn run_attempt(&self, identity_id: &str) -> SyncResult<Attempt> {
        self.set_state(SyncState::Discovering);

        let merged = self.local_merged_datasets(identity_id)?;
        if !merged.is_empty() {
            info!(
                dataset = %self.dataset_name,
                merged = merged.len(),
                "detected locally merged datasets"
            );
            if !self.hooks.merge_accepted(&self.dataset_name, &merged) {
                return Err(SyncError::Cancelled { stage: "merge" });
            }
        }

        let last_sync_count = self
            .local
            .get_last_sync_count(identity_id, &self.dataset_name)?;

        // Dataset deleted locally and never reconciled: push the deletion.
        if last_sync_count == LOCALLY_DELETED_SYNC_COUNT {
            return self.push_local_deletion(identity_id).map(Attempt::Complete);
        }

        self.set_state(SyncState::Pulling);
        debug!(
            dataset = %self.dataset_name,
            since = last_sync_count,
            "listing remote updates"
        );
        let updates = self.remote.list_updates(&self.dataset_name, last_sync_count)?;

        if !updates.merged_dataset_names.is_empty() {
            info!(
                dataset = %self.dataset_name,
                merged = updates.merged_dataset_names.len(),
                "remote store reports merged datasets"
            );
            return if self
                .hooks
                .merge_accepted(&self.dataset_name, &updates.merged_dataset_names)
            {
                Ok(Attempt::Retry)
            } else {
                Err(SyncError::Cancelled { stage: "merge" })
            };
        }

        // A missing remote dataset on the very first sync is a brand-new
        // dataset, not a server-side deletion.
        if (last_sync_count != 0 && !updates.exists) || updates.deleted {
            return if self.hooks.delete_accepted(&self.dataset_name) {
                self.local.delete_dataset(identity_id, &self.dataset_name)?;
                self.local.purge_dataset(identity_id, &self.dataset_name)?;
                info!(dataset = %self.dataset_name, "removed locally after remote deletion");
                Ok(Attempt::Complete(Vec::new()))
            } else {
                Err(SyncError::Cancelled { stage: "delete" })
            };
        }

        let mut applied = Vec::new();
        let pulled_any = !updates.records.is_empty();
        if pulled_any {
            let (clean, conflicts) = self.partition_conflicts(identity_id, &updates.records)?;

            if !conflicts.is_empty() {
                self.set_state(SyncState::ConflictResolving);
                info!(
                    dataset = %self.dataset_name,
                    conflicts = conflicts.len(),
                    "records in conflict"
                );
                match self.hooks.resolve(&self.dataset_name, &conflicts) {
                    Resolution::Continue(resolved) => {
                        self.local
                            .put_records(identity_id, &self.dataset_name, &resolved)?;
                        applied.extend(resolved);
                    }
                    Resolution::Cancel => {
                        return Err(SyncError::Cancelled { stage: "conflict" });
                    }
                }
            }

            if !clean.is_empty() {
                let clean = self.hooks.transform(&self.dataset_name, clean);
                debug!(
                    dataset = %self.dataset_name,
                    records = clean.len(),
                    "applying remote records"
                );
                self.local
                    .put_records(identity_id, &self.dataset_name, &clean)?;
                applied.extend(clean);
            }

            self.local
                .update_last_sync_count(identity_id, &self.dataset_name, updates.sync_count)?;
            debug!(
                dataset = %self.dataset_name,
                sync_count = updates.sync_count,
                "advanced last sync count"
            );
        }

        let pending = self
            .local
            .get_modified_records(identity_id, &self.dataset_name)?;
        if pending.is_empty() {
            return Ok(Attempt::Complete(applied));
        }

        self.set_state(SyncState::Pushing);
        info!(
            dataset = %self.dataset_name,
            records = pending.len(),
            "pushing local changes"
        );
        let committed = match self.remote.put_records(
            &self.dataset_name,
            &pending,
            &updates.sync_session_token,
        ) {
            Ok(committed) => committed,
            Err(RemoteError::Conflict(message)) => {
                warn!(
                    dataset = %self.dataset_name,
                    %message,
                    "remote version advanced during push"
                );
                return Ok(Attempt::Retry);
            }
            Err(error) => return Err(error.into()),
        };

        self.local
            .put_records(identity_id, &self.dataset_name, &committed)?;
        self.verify_push(identity_id, &updates, pending.len(), &committed)?;

        Ok(Attempt::Complete(applied))
    }

    /// Advances the sync count after a push only when no interleaving
    /// write is evidenced; otherwise the next pull re-derives it.
    fn verify_push(
        &self,
        identity_id: &str,
        updates: &DatasetUpdates,
        pushed: usize,
        committed: &[Record],
    ) -> SyncResult<()> {
        let new_sync_count = committed
            .iter()
            .map(|r| r.sync_count)
            .max()
            .unwrap_or(updates.sync_count);
        let expected = updates.sync_count + pushed as i64;

        if new_sync_count == expected {
            self.local
                .update_last_sync_count(identity_id, &self.dataset_name, new_sync_count)?;
            debug!(
                dataset = %self.dataset_name,
                sync_count = new_sync_count,
                "advanced last sync count after push"
            );
        } else {
            warn!(
                dataset = %self.dataset_name,
                new_sync_count,
                expected,
                "interleaving write detected, leaving last sync count unchanged"
            );
        }
        Ok(())
    }

    /// Pushes a local deletion to the remote store and purges local state.
    /// A remote "not found" is success: the deletion is idempotent.
    fn push_local_deletion(&self, identity_id: &str) -> SyncResult<Vec<Record>> {
        match self.remote.delete_dataset(&self.dataset_name) {
            Ok(()) => {}
            Err(RemoteError::DatasetNotFound) => {
                debug!(dataset = %self.dataset_name, "remote dataset already absent");
            }
            Err(error) => return Err(error.into()),
        }
        self.local.purge_dataset(identity_id, &self.dataset_name)?;
        info!(dataset = %self.dataset_name, "local deletion pushed to remote");
        Ok(Vec::new())
    }

    /// Datasets named `"{this}.{suffix}"`, produced when the remote service
    /// merges datasets under one identity.
    fn local_merged_datasets(&self, identity_id: &str) -> SyncResult<Vec<String>> {
        let prefix = format!("{}.", self.dataset_name);
        Ok(self
            .local
            .get_datasets(identity_id)?
            .into_iter()
            .map(|meta| meta.dataset_name)
            .filter(|name| name.starts_with(&prefix))
            .collect())
    }

    /// Splits pulled records into a clean set and a conflict set. A pulled
    /// record conflicts when the local record is modified and holds a
    /// different value.
    fn partition_conflicts(
        &self,
        identity_id: &str,
        remote_records: &[Record],
    ) -> SyncResult<(Vec<Record>, Vec<SyncConflict>)> {
        let mut clean = Vec::new();
        let mut conflicts = Vec::new();
        for remote_record in remote_records {
            let local_record =
                self.local
                    .get_record(identity_id, &self.dataset_name, &remote_record.key)?;
            match local_record {
                Some(local) if local.modified && local.value != remote_record.value => {
                    conflicts.push(SyncConflict::new(remote_record.clone(), local));
                }
                _ => clean.push(remote_record.clone()),
            }
        }
        Ok((clean, conflicts))
    }
}
