//! Object store seam.
//!
//! The synchronizer only needs two operations from the remote store: write
//! an object, and read back the fingerprint recorded with it. Listing and
//! fetching object bodies are not part of the contract.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use preview_core::Fingerprint;
use tracing::debug;

use crate::error::StoreError;

/// A single object write.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Canned access control applied to the object (e.g. `public-read`).
    pub acl: String,
    /// Integrity tag recorded with the object.
    pub fingerprint: Fingerprint,
}

/// Remote object storage, abstracted for testability.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or overwrite) an object.
    async fn put(&self, object: PutObject) -> Result<(), StoreError>;

    /// Fingerprint recorded by the last successful `put` of `key`, if any.
    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError>;
}

/// An object as held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: String,
    pub fingerprint: Fingerprint,
}

/// Scripted failures for one key.
#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    remaining: u32,
    retryable: bool,
}

/// In-memory object store with failure injection and call accounting.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    failures: Mutex<HashMap<String, InjectedFailure>>,
    put_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    put_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every `put` for `delay` before completing it.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Make the next `times` puts of `key` fail. Retryable failures surface
    /// as [`StoreError::Unavailable`], others as [`StoreError::Rejected`].
    pub fn fail_next(&self, key: &str, times: u32, retryable: bool) {
        self.failures.lock().expect("failures lock").insert(
            key.to_string(),
            InjectedFailure {
                remaining: times,
                retryable,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().expect("objects lock").get(key).cloned()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .expect("objects lock")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of `put` calls received, including failed ones.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `put` calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self, key: &str) -> Option<StoreError> {
        let mut failures = self.failures.lock().expect("failures lock");
        let failure = failures.get_mut(key)?;
        if failure.remaining == 0 {
            return None;
        }
        failure.remaining -= 1;
        Some(if failure.retryable {
            StoreError::Unavailable(format!("injected failure for {key}"))
        } else {
            StoreError::Rejected {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            }
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, object: PutObject) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.take_failure(&object.key) {
            Some(err) => Err(err),
            None => {
                debug!(key = %object.key, bytes = object.body.len(), "memory store put");
                self.objects.lock().expect("objects lock").insert(
                    object.key,
                    StoredObject {
                        body: object.body,
                        content_type: object.content_type,
                        acl: object.acl,
                        fingerprint: object.fingerprint,
                    },
                );
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        Ok(self
            .objects
            .lock()
            .expect("objects lock")
            .get(key)
            .map(|o| o.fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(key: &str, body: &[u8]) -> PutObject {
        PutObject {
            key: key.to_string(),
            body: body.to_vec(),
            content_type: "text/plain".to_string(),
            acl: "public-read".to_string(),
            fingerprint: Fingerprint::of(body),
        }
    }

    #[tokio::test]
    async fn put_then_head_returns_fingerprint() {
        let store = MemoryStore::new();
        store.put(object("a/b.txt", b"hello")).await.unwrap();

        assert_eq!(
            store.head("a/b.txt").await.unwrap(),
            Some(Fingerprint::of(b"hello"))
        );
        assert_eq!(store.head("missing").await.unwrap(), None);
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test]
    async fn injected_failures_run_out() {
        let store = MemoryStore::new();
        store.fail_next("k", 2, true);

        assert!(store.put(object("k", b"1")).await.unwrap_err().is_retryable());
        assert!(store.put(object("k", b"1")).await.is_err());
        store.put(object("k", b"1")).await.unwrap();
        assert_eq!(store.keys(), vec!["k"]);
    }

    #[tokio::test]
    async fn non_retryable_failure_is_rejection() {
        let store = MemoryStore::new();
        store.fail_next("k", 1, false);
        let err = store.put(object("k", b"1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert!(!err.is_retryable());
    }
}
