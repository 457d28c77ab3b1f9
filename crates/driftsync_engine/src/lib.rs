//! # DriftSync Engine
//!
//! Dataset synchronization engine for DriftSync.
//!
//! This crate provides:
//! - Sync state machine (idle → discovering → pulling → resolving → pushing)
//! - Conflict detection and pluggable resolution strategies
//! - Bounded retry on remote version conflicts
//! - The [`Dataset`] façade for local reads/writes and synchronization
//! - The [`SyncManager`] for dataset enumeration and identity migration
//! - Remote storage, identity, and connectivity capability traits
//!
//! ## Architecture
//!
//! Callers mutate records locally through a [`Dataset`] with no network
//! involved, then invoke [`Dataset::synchronize`]. The engine runs one
//! complete reconciliation pass on a worker thread:
//!
//! 1. Discover locally merged datasets
//! 2. Pull remote updates since the last agreed sync count
//! 3. Partition pulled records into clean and conflicting sets
//! 4. Resolve conflicts through the registered strategy (remote wins by
//!    default)
//! 5. Apply the agreed remote state locally
//! 6. Push unpushed local modifications, conditional on the pull's session
//!    token
//!
//! A push rejected because the remote version advanced restarts the pass
//! from the pull, up to the configured retry budget.
//!
//! ## Key Invariants
//!
//! - A dataset's sync count never decreases
//! - A locally modified record is never overwritten by a remote value
//!   without passing through conflict detection
//! - At most one reconciliation pass per dataset is in flight at a time
//! - Every terminal outcome is reported exactly once through the
//!   registered hooks

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod dataset;
mod error;
mod hooks;
mod identity;
mod manager;
mod remote;
mod resolver;
mod state;

pub use config::{SyncConfig, DEFAULT_MAX_RETRIES};
pub use connectivity::{ConnectivityMonitor, StaticConnectivity};
pub use dataset::{Dataset, SyncHandle};
pub use error::{SyncError, SyncResult};
pub use hooks::{DeleteHandler, FailureHandler, MergeHandler, SuccessHandler, TransformHook};
pub use identity::{
    CredentialError, IdentityChange, IdentityFeed, IdentityProvider, StaticIdentityProvider,
};
pub use manager::SyncManager;
pub use remote::{MockRemoteStorage, PutRecordsCall, RemoteDataStorage, RemoteError};
pub use resolver::{ConflictResolver, LocalWins, RemoteWins, Resolution, ResolverFn};
pub use state::SyncState;
