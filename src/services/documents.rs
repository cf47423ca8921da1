use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::validation::{validate_required, FieldErrors, MAX_NAME_LEN};
use super::{run_detached, ServiceError};
use crate::db::{Document, NewDocument};
use crate::repository::{DocumentRepository, PatientRepository};
use crate::storage::{self, ObjectStore};

/// A file received from a client
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    /// Content type declared by the client, if any
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Patient documents, split between the object store (bytes) and the
/// database (metadata).
///
/// Every metadata row refers to an object that was successfully stored, and
/// an object whose row could not be written is deleted again.
pub struct DocumentService {
    patients: Arc<dyn PatientRepository>,
    documents: Arc<dyn DocumentRepository>,
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
}

impl DocumentService {
    pub fn new(
        patients: Arc<dyn PatientRepository>,
        documents: Arc<dyn DocumentRepository>,
        store: Arc<dyn ObjectStore>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            patients,
            documents,
            store,
            key_prefix: key_prefix.into(),
        }
    }

    /// Store a file for `patient_id` and record its metadata.
    ///
    /// Runs on its own task once validation passes, so an abandoned request
    /// cannot leave a stored object without either a row or a cleanup.
    pub async fn upload(self: &Arc<Self>, patient_id: i64, upload: DocumentUpload) -> Result<Document, ServiceError> {
        let file_name = storage::sanitize_file_name(&upload.file_name);
        let mut errors = FieldErrors::new();
        errors.check(
            "document",
            validate_required("File name", upload.file_name.trim(), MAX_NAME_LEN),
        );
        if upload.bytes.is_empty() {
            errors.check("document", Err("File is empty".to_string()));
        }
        errors.finish()?;

        self.ensure_patient(patient_id).await?;

        let service = Arc::clone(self);
        run_detached(async move { service.store_and_record(patient_id, file_name, upload).await }).await
    }

    async fn store_and_record(
        &self,
        patient_id: i64,
        file_name: String,
        upload: DocumentUpload,
    ) -> Result<Document, ServiceError> {
        let mime_type = storage::detect_content_type(&file_name, upload.content_type.as_deref());
        let key = storage::document_key(&self.key_prefix, patient_id, &file_name);

        let stored = self
            .store
            .store(&key, upload.bytes, Some(&mime_type))
            .await
            .map_err(|e| {
                error!(patient_id, key = %key, error = %e, "Failed to store document");
                ServiceError::UploadFailed(e.to_string())
            })?;

        let new_document = NewDocument {
            patient_id,
            file_name,
            external_url: stored.url,
            external_object_id: stored.id,
            mime_type,
        };

        match self.documents.create(&new_document).await {
            Ok(document) => {
                info!(
                    document_id = document.id,
                    patient_id,
                    mime_type = %document.mime_type,
                    "Uploaded document"
                );
                Ok(document)
            }
            Err(e) => {
                warn!(
                    patient_id,
                    object_id = %new_document.external_object_id,
                    "Recording document failed, removing stored object"
                );
                if let Err(delete_err) = self.store.delete(&new_document.external_object_id).await {
                    error!(
                        object_id = %new_document.external_object_id,
                        error = %delete_err,
                        "Failed to remove orphaned object"
                    );
                }
                Err(ServiceError::from_repo("document", e))
            }
        }
    }

    pub async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<Document>, ServiceError> {
        self.ensure_patient(patient_id).await?;
        self.documents
            .list_for_patient(patient_id)
            .await
            .map_err(|e| ServiceError::from_repo("document", e))
    }

    /// Delete a document's metadata and release its object.
    ///
    /// The object delete is best effort: a failure is logged and the row is
    /// still removed.
    pub async fn delete(self: &Arc<Self>, document_id: i64) -> Result<(), ServiceError> {
        let document = self
            .documents
            .get(document_id)
            .await
            .map_err(|e| ServiceError::from_repo("document", e))?;

        let service = Arc::clone(self);
        run_detached(async move {
            service.release_object(&document.external_object_id).await;
            service
                .documents
                .delete(document.id)
                .await
                .map_err(|e| ServiceError::from_repo("document", e))?;
            info!(document_id = document.id, patient_id = document.patient_id, "Deleted document");
            Ok(())
        })
        .await
    }

    /// Delete a patient together with their documents and release the
    /// stored objects.
    ///
    /// The rows go in one transaction, then the objects are released best
    /// effort. Runs on its own task so a dropped request cannot strand the
    /// objects between the two steps.
    pub async fn delete_patient(self: &Arc<Self>, patient_id: i64) -> Result<(), ServiceError> {
        let service = Arc::clone(self);
        run_detached(async move {
            let object_ids = service
                .patients
                .delete(patient_id)
                .await
                .map_err(|e| ServiceError::from_repo("patient", e))?;
            let released = object_ids.len();
            for object_id in &object_ids {
                service.release_object(object_id).await;
            }
            info!(patient_id, documents = released, "Deleted patient");
            Ok(())
        })
        .await
    }

    async fn release_object(&self, object_id: &str) {
        if let Err(e) = self.store.delete(object_id).await {
            warn!(object_id = %object_id, error = %e, "Failed to delete stored object");
        }
    }

    async fn ensure_patient(&self, patient_id: i64) -> Result<(), ServiceError> {
        self.patients
            .get(patient_id)
            .await
            .map(|_| ())
            .map_err(|e| ServiceError::from_repo("patient", e))
    }
}
