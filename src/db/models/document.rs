//! Patient document metadata. The file itself lives in the object store.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub patient_id: i64,
    pub file_name: String,
    pub external_url: String,
    /// Object store key; never sent to clients
    #[serde(skip_serializing, default)]
    pub external_object_id: String,
    pub mime_type: String,
    pub uploaded_at: String,
}

/// Metadata for a document whose bytes are already in the object store
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub patient_id: i64,
    pub file_name: String,
    pub external_url: String,
    pub external_object_id: String,
    pub mime_type: String,
}
