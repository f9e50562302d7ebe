use async_trait::async_trait;
use bytes::Bytes;
use helm_s3_proxy::{BackendError, FetchOutcome, ObjectStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod helpers;

/// A single `get_object` call as seen by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: String,
    pub if_none_match: Option<String>,
}

#[derive(Clone)]
struct MockObject {
    body: Bytes,
    etag: Option<String>,
}

/// In-memory object store for testing. Honors `If-None-Match` against the
/// stored ETag the way S3 does.
#[derive(Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<String, MockObject>>>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
    failure: Arc<Mutex<Option<BackendError>>>,
    always_not_modified: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate storage with test data
    pub async fn put_object(&self, key: &str, data: &[u8], etag: Option<&str>) {
        let mut objects = self.objects.lock().await;
        objects.insert(
            key.to_string(),
            MockObject {
                body: Bytes::copy_from_slice(data),
                etag: etag.map(str::to_string),
            },
        );
    }

    pub async fn remove_object(&self, key: &str) {
        self.objects.lock().await.remove(key);
    }

    /// Every subsequent call fails with `message` until cleared with `None`.
    pub async fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().await = message.map(BackendError::new);
    }

    /// Answer `NotModified` regardless of what was presented.
    pub async fn always_not_modified(&self, enabled: bool) {
        *self.always_not_modified.lock().await = enabled;
    }

    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn get_request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn last_request(&self) -> Option<FetchRequest> {
        self.requests.lock().await.last().cloned()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_object(&self, key: &str, if_none_match: Option<&str>) -> FetchOutcome {
        self.requests.lock().await.push(FetchRequest {
            key: key.to_string(),
            if_none_match: if_none_match.map(str::to_string),
        });

        if let Some(error) = self.failure.lock().await.clone() {
            return FetchOutcome::Failed(error);
        }

        if *self.always_not_modified.lock().await {
            return FetchOutcome::NotModified;
        }

        let objects = self.objects.lock().await;
        let Some(object) = objects.get(key) else {
            return FetchOutcome::NotFound;
        };

        if let (Some(presented), Some(current)) = (if_none_match, object.etag.as_deref()) {
            if presented == current {
                return FetchOutcome::NotModified;
            }
        }

        FetchOutcome::Fresh {
            body: object.body.clone(),
            validator: object.etag.clone(),
        }
    }
}
