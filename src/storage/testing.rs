//! In-memory object store for tests

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ObjectStore, StoreError, StoredObject};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    pub fail_store: AtomicBool,
    pub fail_delete: AtomicBool,
    pub store_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_store() -> Self {
        let store = Self::default();
        store.fail_store.store(true, Ordering::SeqCst);
        store
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    pub fn stores(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, key: &str, bytes: Bytes, _content_type: Option<&str>) -> Result<StoredObject, StoreError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(StoreError::Upload("object store unavailable".to_string()));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(StoredObject {
            url: format!("memory://{}", key),
            id: key.to_string(),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Delete("object store unavailable".to_string()));
        }
        self.objects.lock().unwrap().remove(id);
        Ok(())
    }
}
