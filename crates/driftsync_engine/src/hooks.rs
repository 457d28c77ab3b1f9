//! Registrable callbacks for sync lifecycle events.

use crate::error::SyncError;
use crate::resolver::{ConflictResolver, RemoteWins, Resolution};
use driftsync_model::{Record, SyncConflict};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Decides whether to proceed after merged datasets are discovered.
/// Receives the dataset name and the merged dataset names.
pub type MergeHandler = dyn Fn(&str, &[String]) -> bool + Send + Sync;

/// Decides whether to accept a remote-side dataset deletion.
pub type DeleteHandler = dyn Fn(&str) -> bool + Send + Sync;

/// Transforms incoming remote records before they are applied locally.
pub type TransformHook = dyn Fn(&str, Vec<Record>) -> Vec<Record> + Send + Sync;

/// Receives the applied records after a successful pass.
pub type SuccessHandler = dyn Fn(&str, &[Record]) + Send + Sync;

/// Receives the terminal error of a failed pass.
pub type FailureHandler = dyn Fn(&str, &SyncError) + Send + Sync;

/// The registered callbacks of one dataset.
///
/// Absent merge and delete handlers accept; the absent resolver defaults
/// to remote-wins. Only a registered handler can cancel a pass.
pub(crate) struct SyncHooks {
    resolver: RwLock<Arc<dyn ConflictResolver>>,
    on_merge: RwLock<Option<Arc<MergeHandler>>>,
    on_delete: RwLock<Option<Arc<DeleteHandler>>>,
    transform: RwLock<Option<Arc<TransformHook>>>,
    on_success: RwLock<Option<Arc<SuccessHandler>>>,
    on_failure: RwLock<Option<Arc<FailureHandler>>>,
}

impl Default for SyncHooks {
    fn default() -> Self {
        Self {
            resolver: RwLock::new(Arc::new(RemoteWins)),
            on_merge: RwLock::new(None),
            on_delete: RwLock::new(None),
            transform: RwLock::new(None),
            on_success: RwLock::new(None),
            on_failure: RwLock::new(None),
        }
    }
}

impl SyncHooks {
    pub(crate) fn set_resolver(&self, resolver: Arc<dyn ConflictResolver>) {
        *self.resolver.write() = resolver;
    }

    pub(crate) fn set_merge_handler(&self, handler: Arc<MergeHandler>) {
        *self.on_merge.write() = Some(handler);
    }

    pub(crate) fn set_delete_handler(&self, handler: Arc<DeleteHandler>) {
        *self.on_delete.write() = Some(handler);
    }

    pub(crate) fn set_transform(&self, hook: Arc<TransformHook>) {
        *self.transform.write() = Some(hook);
    }

    pub(crate) fn set_success_handler(&self, handler: Arc<SuccessHandler>) {
        *self.on_success.write() = Some(handler);
    }

    pub(crate) fn set_failure_handler(&self, handler: Arc<FailureHandler>) {
        *self.on_failure.write() = Some(handler);
    }

    /// Asks the merge handler whether to proceed. Accepts when none is
    /// registered.
    pub(crate) fn merge_accepted(&self, dataset_name: &str, merged: &[String]) -> bool {
        let handler = self.on_merge.read().clone();
        match handler {
            Some(h) => h(dataset_name, merged),
            None => {
                debug!(dataset = dataset_name, "no merge handler registered, proceeding");
                true
            }
        }
    }

    /// Asks the delete handler whether to accept a remote deletion.
    /// Accepts when none is registered.
    pub(crate) fn delete_accepted(&self, dataset_name: &str) -> bool {
        let handler = self.on_delete.read().clone();
        match handler {
            Some(h) => h(dataset_name),
            None => true,
        }
    }

    /// Runs the transform hook over incoming remote records, if registered.
    pub(crate) fn transform(&self, dataset_name: &str, records: Vec<Record>) -> Vec<Record> {
        let hook = self.transform.read().clone();
        match hook {
            Some(h) => h(dataset_name, records),
            None => records,
        }
    }

    /// Resolves a conflict set through the registered strategy.
    pub(crate) fn resolve(&self, dataset_name: &str, conflicts: &[SyncConflict]) -> Resolution {
        self.resolver.read().resolve(dataset_name, conflicts)
    }

    pub(crate) fn fire_success(&self, dataset_name: &str, applied: &[Record]) {
        if let Some(h) = self.on_success.read().clone() {
            h(dataset_name, applied);
        }
    }

    pub(crate) fn fire_failure(&self, dataset_name: &str, error: &SyncError) {
        if let Some(h) = self.on_failure.read().clone() {
            h(dataset_name, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn absent_handlers_accept() {
        let hooks = SyncHooks::default();
        assert!(hooks.merge_accepted("profile", &["profile.1".into()]));
        assert!(hooks.delete_accepted("profile"));
    }

    #[test]
    fn registered_merge_handler_can_decline() {
        let hooks = SyncHooks::default();
        hooks.set_merge_handler(Arc::new(|_, _| false));
        assert!(!hooks.merge_accepted("profile", &["profile.1".into()]));
    }

    #[test]
    fn transform_defaults_to_identity() {
        let hooks = SyncHooks::default();
        let records = vec![Record::new("k", Some("v".into()))];
        assert_eq!(hooks.transform("profile", records.clone()), records);
    }

    #[test]
    fn success_handler_sees_applied_records() {
        let hooks = SyncHooks::default();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        hooks.set_success_handler(Arc::new(move |_, applied| {
            seen.store(applied.len(), Ordering::SeqCst);
        }));

        hooks.fire_success("profile", &[Record::new("k", Some("v".into()))]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
