//! Remote store capability.

use driftsync_model::{DatasetMetadata, DatasetUpdates, Record};
use parking_lot::Mutex;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors returned by the remote store.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The remote version advanced since the pull the push was conditioned
    /// on. Recoverable: the engine restarts the pass from a fresh pull.
    #[error("remote version conflict: {0}")]
    Conflict(String),

    /// The dataset does not exist on the remote store.
    #[error("dataset not found on remote store")]
    DatasetNotFound,

    /// The remote store failed to process the request.
    #[error("remote storage failure: {0}")]
    Storage(String),

    /// The request never reached the remote store.
    #[error("network error: {0}")]
    Network(String),
}

/// The remote service's authoritative version history for datasets.
///
/// This trait abstracts the wire client. Transport concerns (auth headers,
/// marshalling, HTTP retry/backoff) belong to implementations; the sync
/// engine only sees these four calls.
pub trait RemoteDataStorage: Send + Sync {
    /// Lists updates to a dataset since the given sync count.
    fn list_updates(
        &self,
        dataset_name: &str,
        since_sync_count: i64,
    ) -> Result<DatasetUpdates, RemoteError>;

    /// Writes a batch of records, conditional on the session token from the
    /// pull that preceded it. Returns the authoritative records as accepted,
    /// each carrying its new sync count.
    fn put_records(
        &self,
        dataset_name: &str,
        records: &[Record],
        sync_session_token: &str,
    ) -> Result<Vec<Record>, RemoteError>;

    /// Deletes a dataset and its history.
    fn delete_dataset(&self, dataset_name: &str) -> Result<(), RemoteError>;

    /// Lists metadata for every dataset under the caller's identity.
    fn get_datasets(&self) -> Result<Vec<DatasetMetadata>, RemoteError>;
}

/// One recorded `put_records` call on a [`MockRemoteStorage`].
#[derive(Debug, Clone)]
pub struct PutRecordsCall {
    /// Dataset the push targeted.
    pub dataset_name: String,
    /// Records in the pushed batch.
    pub records: Vec<Record>,
    /// Session token the push was conditioned on.
    pub sync_session_token: String,
}

/// A scripted remote store for testing.
///
/// Responses are queued per call; each call consumes one queued response.
/// An empty queue yields a network error, so tests fail loudly when the
/// engine makes more remote calls than the script expects.
#[derive(Debug, Default)]
pub struct MockRemoteStorage {
    list_responses: Mutex<VecDeque<Result<DatasetUpdates, RemoteError>>>,
    put_responses: Mutex<VecDeque<Result<Vec<Record>, RemoteError>>>,
    delete_responses: Mutex<VecDeque<Result<(), RemoteError>>>,
    datasets_responses: Mutex<VecDeque<Result<Vec<DatasetMetadata>, RemoteError>>>,
    put_calls: Mutex<Vec<PutRecordsCall>>,
    list_calls: Mutex<Vec<(String, i64)>>,
    delete_calls: Mutex<Vec<String>>,
}

impl MockRemoteStorage {
    /// Creates a new mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next unanswered `list_updates` call.
    pub fn queue_list_updates(&self, response: Result<DatasetUpdates, RemoteError>) {
        self.list_responses.lock().push_back(response);
    }

    /// Queues a response for the next unanswered `put_records` call.
    pub fn queue_put_records(&self, response: Result<Vec<Record>, RemoteError>) {
        self.put_responses.lock().push_back(response);
    }

    /// Queues a response for the next unanswered `delete_dataset` call.
    pub fn queue_delete_dataset(&self, response: Result<(), RemoteError>) {
        self.delete_responses.lock().push_back(response);
    }

    /// Queues a response for the next unanswered `get_datasets` call.
    pub fn queue_get_datasets(&self, response: Result<Vec<DatasetMetadata>, RemoteError>) {
        self.datasets_responses.lock().push_back(response);
    }

    /// Returns all recorded `put_records` calls.
    pub fn put_calls(&self) -> Vec<PutRecordsCall> {
        self.put_calls.lock().clone()
    }

    /// Returns all recorded `list_updates` calls as `(dataset, since)`.
    pub fn list_calls(&self) -> Vec<(String, i64)> {
        self.list_calls.lock().clone()
    }

    /// Returns all recorded `delete_dataset` calls.
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().clone()
    }
}

impl RemoteDataStorage for MockRemoteStorage {
    fn list_updates(
        &self,
        dataset_name: &str,
        since_sync_count: i64,
    ) -> Result<DatasetUpdates, RemoteError> {
        self.list_calls
            .lock()
            .push((dataset_name.to_string(), since_sync_count));
        self.list_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Network("no scripted list_updates response".into())))
    }

    fn put_records(
        &self,
        dataset_name: &str,
        records: &[Record],
        sync_session_token: &str,
    ) -> Result<Vec<Record>, RemoteError> {
        self.put_calls.lock().push(PutRecordsCall {
            dataset_name: dataset_name.to_string(),
            records: records.to_vec(),
            sync_session_token: sync_session_token.to_string(),
        });
        self.put_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Network("no scripted put_records response".into())))
    }

    fn delete_dataset(&self, dataset_name: &str) -> Result<(), RemoteError> {
        self.delete_calls.lock().push(dataset_name.to_string());
        self.delete_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RemoteError::Network("no scripted delete_dataset response".into()))
            })
    }

    fn get_datasets(&self) -> Result<Vec<DatasetMetadata>, RemoteError> {
        self.datasets_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Network("no scripted get_datasets response".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_calls_error() {
        let mock = MockRemoteStorage::new();
        assert!(matches!(
            mock.list_updates("profile", 0),
            Err(RemoteError::Network(_))
        ));
    }

    #[test]
    fn responses_consumed_in_order() {
        let mock = MockRemoteStorage::new();
        mock.queue_list_updates(Ok(DatasetUpdates::new(1, "t1")));
        mock.queue_list_updates(Ok(DatasetUpdates::new(2, "t2")));

        assert_eq!(mock.list_updates("profile", 0).unwrap().sync_count, 1);
        assert_eq!(mock.list_updates("profile", 1).unwrap().sync_count, 2);
        assert_eq!(mock.list_calls().len(), 2);
    }

    #[test]
    fn put_calls_are_recorded() {
        let mock = MockRemoteStorage::new();
        mock.queue_put_records(Ok(vec![]));

        let batch = vec![Record::new("k", Some("v".into()))];
        mock.put_records("profile", &batch, "token").unwrap();

        let calls = mock.put_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].dataset_name, "profile");
        assert_eq!(calls[0].sync_session_token, "token");
        assert_eq!(calls[0].records.len(), 1);
    }
}
