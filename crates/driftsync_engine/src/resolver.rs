//! Conflict resolution strategies.

use driftsync_model::{Record, SyncConflict};

/// The outcome of a conflict resolution round.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Proceed with these agreed records; the engine writes them to the
    /// local store before applying the clean remote set.
    Continue(Vec<Record>),
    /// Abort the pass; no local state changes.
    Cancel,
}

/// Decides the agreed record for each key where local and remote diverge.
///
/// Invoked synchronously, once per pass, with the full conflict set. A
/// strategy may apply any per-key policy; returning [`Resolution::Cancel`]
/// aborts the whole pass.
pub trait ConflictResolver: Send + Sync {
    /// Resolves a non-empty, ordered conflict set.
    fn resolve(&self, dataset_name: &str, conflicts: &[SyncConflict]) -> Resolution;
}

/// Keeps the remote value for every conflicting key. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteWins;

impl ConflictResolver for RemoteWins {
    fn resolve(&self, _dataset_name: &str, conflicts: &[SyncConflict]) -> Resolution {
        Resolution::Continue(conflicts.iter().map(SyncConflict::resolve_with_remote).collect())
    }
}

/// Keeps the local value for every conflicting key; the kept values are
/// re-pushed in the same pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWins;

impl ConflictResolver for LocalWins {
    fn resolve(&self, _dataset_name: &str, conflicts: &[SyncConflict]) -> Resolution {
        Resolution::Continue(conflicts.iter().map(SyncConflict::resolve_with_local).collect())
    }
}

/// Wraps a closure as a [`ConflictResolver`].
pub struct ResolverFn<F>(F);

impl<F> ResolverFn<F>
where
    F: Fn(&str, &[SyncConflict]) -> Resolution + Send + Sync,
{
    /// Creates a resolver from a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ConflictResolver for ResolverFn<F>
where
    F: Fn(&str, &[SyncConflict]) -> Resolution + Send + Sync,
{
    fn resolve(&self, dataset_name: &str, conflicts: &[SyncConflict]) -> Resolution {
        (self.0)(dataset_name, conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflicts() -> Vec<SyncConflict> {
        let remote = Record::new("color", Some("blue".into())).with_sync_count(8);
        let local = Record::new("color", Some("red".into()))
            .with_sync_count(5)
            .with_modified(true);
        vec![SyncConflict::new(remote, local)]
    }

    #[test]
    fn remote_wins_takes_remote_values() {
        let conflicts = conflicts();
        let Resolution::Continue(records) = RemoteWins.resolve("profile", &conflicts) else {
            panic!("expected Continue");
        };
        assert_eq!(records[0].value.as_deref(), Some("blue"));
        assert!(!records[0].modified);
    }

    #[test]
    fn local_wins_takes_local_values() {
        let conflicts = conflicts();
        let Resolution::Continue(records) = LocalWins.resolve("profile", &conflicts) else {
            panic!("expected Continue");
        };
        assert_eq!(records[0].value.as_deref(), Some("red"));
        assert!(records[0].modified);
    }

    #[test]
    fn closure_resolver_can_cancel() {
        let resolver = ResolverFn::new(|_, _| Resolution::Cancel);
        assert_eq!(resolver.resolve("profile", &conflicts()), Resolution::Cancel);
    }

    #[test]
    fn closure_resolver_per_key_policy() {
        let resolver = ResolverFn::new(|_, conflicts: &[SyncConflict]| {
            Resolution::Continue(
                conflicts
                    .iter()
                    .map(|c| c.resolve_with_value(Some("merged".into())))
                    .collect(),
            )
        });
        let Resolution::Continue(records) = resolver.resolve("profile", &conflicts()) else {
            panic!("expected Continue");
        };
        assert_eq!(records[0].value.as_deref(), Some("merged"));
    }
}
