//! # DriftSync Model
//!
//! Data model types for DriftSync.
//!
//! This crate provides:
//! - `Record` for key-value records with tombstone semantics
//! - `DatasetMetadata` for per-dataset bookkeeping
//! - `DatasetUpdates` for remote pull snapshots
//! - `SyncConflict` for divergent local/remote record pairs
//! - Key and dataset-name validation
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod metadata;
mod record;
mod updates;
mod validate;

pub use conflict::SyncConflict;
pub use metadata::{DatasetMetadata, LOCALLY_DELETED_SYNC_COUNT};
pub use record::Record;
pub use updates::DatasetUpdates;
pub use validate::{
    validate_dataset_name, validate_record_key, ValidationError, MAX_DATASET_NAME_LENGTH,
    MAX_KEY_LENGTH, UNKNOWN_IDENTITY_ID,
};
