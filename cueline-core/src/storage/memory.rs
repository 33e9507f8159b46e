use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::Notify;

use super::{ObjectInfo, ObjectStore};
use crate::error::StorageError;

/// In-memory object store for tests and local runs.
///
/// Clones share state, so a test can keep a handle while the store under test
/// owns another. Failures can be injected per prefix, per key, or globally for
/// presigning and writes. A listing can also be held open with
/// [`InMemoryObjectStore::hold_listing`] to interleave other calls with a pass.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    failing_prefixes: HashSet<String>,
    failing_probes: HashSet<String>,
    held_listings: HashMap<String, Arc<ListingGate>>,
    fail_presign: bool,
    fail_puts: bool,
    puts: usize,
}

/// Pauses one listing until released.
#[derive(Debug, Default)]
pub struct ListingGate {
    reached: Notify,
    release: Notify,
}

impl ListingGate {
    /// Resolves once the held listing has started.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an empty object with the given modification time.
    pub fn insert(&self, key: impl Into<String>, last_modified: DateTime<Utc>) {
        self.state().objects.insert(
            key.into(),
            StoredObject {
                body: Vec::new(),
                last_modified,
            },
        );
    }

    pub fn insert_bytes(&self, key: impl Into<String>, body: Vec<u8>) {
        self.state().objects.insert(
            key.into(),
            StoredObject {
                body,
                last_modified: Utc::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.state().objects.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.state().objects.get(key).map(|object| object.body.clone())
    }

    /// Number of successful `put_object` calls so far.
    pub fn put_count(&self) -> usize {
        self.state().puts
    }

    pub fn fail_listing(&self, prefix: impl Into<String>, failing: bool) {
        let prefix = prefix.into();
        let mut state = self.state();
        if failing {
            state.failing_prefixes.insert(prefix);
        } else {
            state.failing_prefixes.remove(&prefix);
        }
    }

    pub fn fail_probe(&self, key: impl Into<String>, failing: bool) {
        let key = key.into();
        let mut state = self.state();
        if failing {
            state.failing_probes.insert(key);
        } else {
            state.failing_probes.remove(&key);
        }
    }

    /// Hold the next listing of `prefix` until the returned gate is released.
    pub fn hold_listing(&self, prefix: impl Into<String>) -> Arc<ListingGate> {
        let gate = Arc::new(ListingGate::default());
        self.state()
            .held_listings
            .insert(prefix.into(), Arc::clone(&gate));
        gate
    }

    pub fn fail_presign(&self, failing: bool) {
        self.state().fail_presign = failing;
    }

    pub fn fail_puts(&self, failing: bool) {
        self.state().fail_puts = failing;
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn list_objects<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<ObjectInfo, StorageError>> {
        let mut state = self.state();
        let mut items: Vec<Result<ObjectInfo, StorageError>> = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| recursive || !key[prefix.len()..].contains('/'))
            .map(|(key, object)| {
                Ok(ObjectInfo {
                    key: key.clone(),
                    last_modified: object.last_modified,
                })
            })
            .collect();

        // Simulate a listing that dies after the first page.
        if state.failing_prefixes.contains(prefix) {
            items.truncate(1);
            items.push(Err(StorageError::backend(
                "list_objects",
                format!("injected failure for prefix {prefix}"),
            )));
        }

        match state.held_listings.remove(prefix) {
            Some(gate) => stream::once(async move {
                gate.pass().await;
                stream::iter(items)
            })
            .flatten()
            .boxed(),
            None => stream::iter(items).boxed(),
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        let state = self.state();
        if state.failing_probes.contains(key) {
            return Err(StorageError::backend(
                "object_exists",
                format!("injected failure for {key}"),
            ));
        }
        Ok(state.objects.contains_key(key))
    }

    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        if self.state().fail_presign {
            return Err(StorageError::Presign {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(format!("memory://{key}?expires_in={}", ttl.as_secs()))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.bytes(key))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let mut state = self.state();
        if state.fail_puts {
            return Err(StorageError::backend(
                "put_object",
                format!("injected failure for {key}"),
            ));
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified: Utc::now(),
            },
        );
        state.puts += 1;
        Ok(())
    }
}
