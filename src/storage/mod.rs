//! External object store capability.
//!
//! Document bytes never touch the relational store. They are written to an
//! [`ObjectStore`] which hands back a public URL and an opaque object id; the
//! id is what later deletes (and compensating deletes) refer to.

mod local;
mod s3;
#[cfg(test)]
pub mod testing;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object upload failed: {0}")]
    Upload(String),
    #[error("object delete failed: {0}")]
    Delete(String),
    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a stored object ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub id: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `key`. When `content_type` is `None` the store
    /// detects it from the key.
    async fn store(&self, key: &str, bytes: Bytes, content_type: Option<&str>) -> Result<StoredObject, StoreError>;
    /// Remove a previously stored object by the id returned from `store`
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Build the configured object store backend
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => {
            let store = LocalObjectStore::new(&config.local_root, config.public_base_url.clone()).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::S3 => Ok(Arc::new(S3ObjectStore::from_config(config).await?)),
    }
}

/// Resolve the content type to record for an object.
///
/// A specific client-supplied type wins; a missing or generic
/// `application/octet-stream` falls back to a guess from the file name.
pub fn detect_content_type(file_name: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Reduce a client-supplied file name to a single safe path segment
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Object key for a patient's document.
///
/// Namespaced by patient and original file name; the unique segment keeps
/// every row bound to its own object even for repeated file names.
pub fn document_key(prefix: &str, patient_id: i64, file_name: &str) -> String {
    format!(
        "{}/patient_{}/{}/{}",
        prefix.trim_end_matches('/'),
        patient_id,
        uuid::Uuid::new_v4().simple(),
        sanitize_file_name(file_name)
    )
}
