//! In-memory backend.
//!
//! This provides a [`Backend`](super::Backend) backed by a `BTreeMap`, which removes the need for
//! any external service in tests and local experiments. The backend is [`Clone`] so tests can hold
//! a handle for direct inspection while the client owns another copy.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::common::{Backend, BackendResult, GetResponse, ListPage, PutResponse};
use crate::object::{DeleteBatch, ObjectRef};

/// The default number of keys returned per listing page, matching common object stores.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
    version: u64,
}

#[derive(Debug, Default)]
struct Store {
    objects: BTreeMap<ObjectRef, StoredObject>,
    next_version: u64,
}

/// A [`Backend`] that keeps all objects in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    store: Arc<Mutex<Store>>,
    page_size: usize,
}

impl InMemoryBackend {
    /// Creates an empty backend with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty backend that returns at most `page_size` keys per listing.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            store: Arc::default(),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores an object directly, bypassing the [`Backend`] trait.
    pub fn insert(&self, object: ObjectRef, body: impl Into<Bytes>) {
        let mut store = self.lock();
        store.next_version += 1;
        let stored = StoredObject {
            body: body.into(),
            content_type: None,
            version: store.next_version,
        };
        store.objects.insert(object, stored);
    }

    /// Returns a clone of the stored bytes and content type, if present.
    pub fn get_stored(&self, object: &ObjectRef) -> Option<(Bytes, Option<String>)> {
        self.lock()
            .objects
            .get(object)
            .map(|stored| (stored.body.clone(), stored.content_type.clone()))
    }

    /// Returns `true` if the backend contains an entry for the given object.
    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.lock().objects.contains_key(object)
    }

    /// Returns the number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    /// Returns `true` if the backend has no stored objects.
    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn get_object(&self, object: &ObjectRef) -> BackendResult<Option<GetResponse>> {
        let stored = self.lock().objects.get(object).cloned();
        Ok(stored.map(|stored| GetResponse {
            body: stored.body,
            content_type: stored.content_type,
            etag: Some(format!("\"{}\"", stored.version)),
            ..Default::default()
        }))
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        body: Bytes,
        content_type: &str,
    ) -> BackendResult<PutResponse> {
        let mut store = self.lock();
        store.next_version += 1;
        let version = store.next_version;
        let stored = StoredObject {
            body,
            content_type: Some(content_type.to_owned()),
            version,
        };
        store.objects.insert(object.clone(), stored);

        Ok(PutResponse {
            etag: Some(format!("\"{version}\"")),
        })
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> BackendResult<ListPage> {
        let store = self.lock();
        let mut matching = store
            .objects
            .keys()
            .filter(|object| object.bucket() == bucket && object.key().starts_with(prefix))
            .map(|object| object.key().to_owned());

        let keys: Vec<_> = matching.by_ref().take(self.page_size).collect();
        let truncated = matching.next().is_some();

        Ok(ListPage { keys, truncated })
    }

    async fn delete_objects(&self, _bucket: &str, batch: &DeleteBatch) -> BackendResult<()> {
        let mut store = self.lock();
        for object in batch.objects() {
            store.objects.remove(object);
        }
        Ok(())
    }
}
