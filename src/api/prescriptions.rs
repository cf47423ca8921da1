use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath};
use crate::auth::Identity;
use crate::db::{CreatePrescriptionRequest, Prescription};
use crate::AppState;

/// POST /patients/:id/prescriptions
///
/// Any `doctor_id` in the body is ignored; the prescriber is the caller.
pub async fn create_prescription(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    ApiPath(patient_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let prescription = state.prescriptions.create(patient_id, &identity, req).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

/// GET /patients/:id/prescriptions
pub async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    ApiPath(patient_id): ApiPath<i64>,
) -> Result<Json<Vec<Prescription>>, ApiError> {
    Ok(Json(state.prescriptions.list_for_patient(patient_id).await?))
}
