use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{ObjectStore, StoreError, StoredObject};

/// Object store backed by a directory on local disk
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub async fn new(root: &Path, public_base_url: Option<String>) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(root).await?;
        let public_base_url = public_base_url
            .unwrap_or_else(|| format!("file://{}", root.display()))
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            root: root.to_path_buf(),
            public_base_url,
        })
    }

    /// Map an object id to a path, refusing anything that escapes the root
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if id.is_empty() || !safe {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn store(&self, key: &str, bytes: Bytes, _content_type: Option<&str>) -> Result<StoredObject, StoreError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| StoreError::Upload(format!("invalid object key: {}", key)))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(key = %key, size = bytes.len(), "Stored object on local disk");

        Ok(StoredObject {
            url: format!("{}/{}", self.public_base_url, key),
            id: key.to_string(),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self
            .path_for(id)
            .ok_or_else(|| StoreError::Delete(format!("invalid object id: {}", id)))?;
        tokio::fs::remove_file(&path).await?;
        debug!(id = %id, "Removed object from local disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), Some("http://files.local/".to_string()))
            .await
            .unwrap();

        let stored = store
            .store("patient_documents/patient_1/abc/scan.pdf", Bytes::from_static(b"%PDF"), None)
            .await
            .unwrap();
        assert_eq!(stored.id, "patient_documents/patient_1/abc/scan.pdf");
        assert_eq!(
            stored.url,
            "http://files.local/patient_documents/patient_1/abc/scan.pdf"
        );
        let on_disk = dir.path().join(&stored.id);
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"%PDF");

        store.delete(&stored.id).await.unwrap();
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None).await.unwrap();
        assert!(matches!(store.delete("nope/missing.pdf").await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_rejects_keys_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), None).await.unwrap();
        let result = store.store("../escape.txt", Bytes::from_static(b"x"), None).await;
        assert!(matches!(result, Err(StoreError::Upload(_))));
        assert!(matches!(store.delete("/etc/passwd").await, Err(StoreError::Delete(_))));
    }
}
