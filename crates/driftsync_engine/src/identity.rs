//! Identity and credential capabilities.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

/// Credential acquisition or refresh failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("credential refresh failed: {0}")]
pub struct CredentialError(pub String);

/// Source of the caller's identity and credentials.
///
/// The engine asks for the identity id before each pass and triggers a
/// refresh transparently when the id is missing or the credentials are
/// stale. Credential storage and the actual token exchange live in host
/// applications.
pub trait IdentityProvider: Send + Sync {
    /// Returns the established identity id, if any.
    fn identity_id(&self) -> Option<String>;

    /// Returns true if the current credentials are usable as-is.
    fn has_valid_credentials(&self) -> bool;

    /// Acquires or refreshes credentials, returning the identity id.
    fn refresh(&self) -> Result<String, CredentialError>;
}

/// A fixed identity provider for tests and single-identity hosts.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    identity_id: RwLock<Option<String>>,
    valid: AtomicBool,
    fail_refresh: AtomicBool,
}

impl StaticIdentityProvider {
    /// Creates a provider with an established identity and valid
    /// credentials.
    pub fn new(identity_id: impl Into<String>) -> Self {
        Self {
            identity_id: RwLock::new(Some(identity_id.into())),
            valid: AtomicBool::new(true),
            fail_refresh: AtomicBool::new(false),
        }
    }

    /// Creates a provider with no established identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Replaces the identity id.
    pub fn set_identity_id(&self, identity_id: impl Into<String>) {
        *self.identity_id.write() = Some(identity_id.into());
    }

    /// Marks the credentials as expired; the next pass must refresh.
    pub fn invalidate_credentials(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    /// Makes subsequent refreshes fail.
    pub fn fail_refreshes(&self) {
        self.fail_refresh.store(true, Ordering::SeqCst);
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn identity_id(&self) -> Option<String> {
        self.identity_id.read().clone()
    }

    fn has_valid_credentials(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn refresh(&self) -> Result<String, CredentialError> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(CredentialError("refresh rejected".into()));
        }
        match self.identity_id.read().clone() {
            Some(id) => {
                self.valid.store(true, Ordering::SeqCst);
                Ok(id)
            }
            None => Err(CredentialError("no identity established".into())),
        }
    }
}

/// An identity change: the old id (if one was ever established) and the
/// new id now in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChange {
    /// The previous identity id, or `None` if none was established.
    pub old_id: Option<String>,
    /// The identity id now in effect.
    pub new_id: String,
}

/// A stream of identity changes.
///
/// Hosts emit onto the feed when the signed-in identity changes; the
/// [`crate::SyncManager`] subscribes at construction and drains pending
/// events at each public entry point.
#[derive(Debug, Default)]
pub struct IdentityFeed {
    subscribers: RwLock<Vec<Sender<IdentityChange>>>,
}

impl IdentityFeed {
    /// Creates a new feed with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the feed, receiving all future identity changes.
    pub fn subscribe(&self) -> Receiver<IdentityChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an identity change to all subscribers.
    ///
    /// Disconnected subscribers are dropped.
    pub fn emit(&self, change: IdentityChange) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_refresh_restores_validity() {
        let provider = StaticIdentityProvider::new("id-1");
        assert!(provider.has_valid_credentials());

        provider.invalidate_credentials();
        assert!(!provider.has_valid_credentials());

        assert_eq!(provider.refresh().unwrap(), "id-1");
        assert!(provider.has_valid_credentials());
    }

    #[test]
    fn anonymous_provider_cannot_refresh() {
        let provider = StaticIdentityProvider::anonymous();
        assert_eq!(provider.identity_id(), None);
        assert!(provider.refresh().is_err());
    }

    #[test]
    fn failing_refresh() {
        let provider = StaticIdentityProvider::new("id-1");
        provider.fail_refreshes();
        assert!(provider.refresh().is_err());
    }

    #[test]
    fn feed_delivers_changes() {
        let feed = IdentityFeed::new();
        let rx = feed.subscribe();

        let change = IdentityChange {
            old_id: None,
            new_id: "id-1".into(),
        };
        feed.emit(change.clone());

        assert_eq!(rx.try_recv().unwrap(), change);
    }

    #[test]
    fn feed_prunes_dead_subscribers() {
        let feed = IdentityFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(IdentityChange {
            old_id: None,
            new_id: "id-1".into(),
        });
        assert_eq!(feed.subscriber_count(), 0);
    }
}
