//! Network reachability capability.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Reports whether the network is believed reachable and notifies when
/// reachability changes.
///
/// The engine checks `is_online` once, synchronously, before dispatching a
/// pass; `subscribe` backs [`crate::Dataset::synchronize_on_connectivity`],
/// which parks until a `true` notification arrives.
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns true if the network is believed reachable.
    fn is_online(&self) -> bool;

    /// Subscribes to reachability changes (`true` = restored).
    fn subscribe(&self) -> Receiver<bool>;
}

/// A connectivity monitor driven by explicit state changes.
///
/// Suitable for tests and for hosts that surface reachability through
/// their own platform callbacks.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
    subscribers: RwLock<Vec<Sender<bool>>>,
}

impl StaticConnectivity {
    /// Creates a monitor in the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Changes the reachability state and notifies subscribers.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(online).is_ok());
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Receiver<bool> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changes_are_observable() {
        let monitor = StaticConnectivity::new(true);
        assert!(monitor.is_online());

        monitor.set_online(false);
        assert!(!monitor.is_online());
    }

    #[test]
    fn subscribers_are_notified() {
        let monitor = StaticConnectivity::new(false);
        let rx = monitor.subscribe();

        monitor.set_online(true);
        assert!(rx.try_recv().unwrap());
    }
}
