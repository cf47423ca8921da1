use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use super::extract::ApiPath;
use crate::db::Document;
use crate::services::DocumentUpload;
use crate::AppState;

/// Multipart field carrying the file
const DOCUMENT_FIELD: &str = "document";

/// POST /patients/:id/documents
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    ApiPath(patient_id): ApiPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some(DocumentUpload {
            file_name,
            content_type,
            bytes,
        });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::validation_field(DOCUMENT_FIELD, "Document file is required"))?;
    let document = state.documents.upload(patient_id, upload).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /patients/:id/documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    ApiPath(patient_id): ApiPath<i64>,
) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.documents.list_for_patient(patient_id).await?))
}

/// DELETE /documents/:id
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    ApiPath(document_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.documents.delete(document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
