//! In-process object store
//!
//! Keeps every stored object in memory. Supports injected latency and
//! failures so the upload pipeline can be exercised without a backend.

use super::{ObjectStore, StoreError, StoreOptions, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type FailureRule = dyn Fn(&str, &Bytes) -> Option<StoreError> + Send + Sync;

/// Stored blob and its content type
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// In-memory [`ObjectStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<(String, String), StoredBlob>>>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
    failure: Option<Arc<FailureRule>>,
    base_url: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every store call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail store calls for which `rule(name, body)` returns an error
    #[must_use]
    pub fn with_failure<F>(mut self, rule: F) -> Self
    where
        F: Fn(&str, &Bytes) -> Option<StoreError> + Send + Sync + 'static,
    {
        self.failure = Some(Arc::new(rule));
        self
    }

    /// Base used by `public_url`. Default: `memory://`
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Number of store calls issued, successful or not
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Paths stored in `bucket`, sorted
    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn store(
        &self,
        bucket: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        options: StoreOptions,
    ) -> Result<StoredObject, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(rule) = &self.failure {
            if let Some(err) = rule(name, &body) {
                tracing::debug!(bucket = %bucket, key = %name, error = %err, "Injected store failure");
                return Err(err);
            }
        }

        let key = (bucket.to_string(), name.to_string());
        let mut objects = self.objects.lock();
        if !options.overwrite_existing && objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }

        objects.insert(
            key,
            StoredBlob {
                body,
                content_type: content_type.map(str::to_string),
            },
        );

        Ok(StoredObject {
            path: name.to_string(),
            etag: None,
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}/{}", base, bucket, path),
            None => format!("memory://{}/{}", bucket, path),
        }
    }
}
