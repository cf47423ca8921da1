use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::{Patient, PatientDemographics, PatientMedicalUpdate, PatientSearchQuery};
use crate::AppState;

/// POST /patients
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<PatientDemographics>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = state.patients.create(req).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /patients
pub async fn list_patients(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(state.patients.list().await?))
}

/// GET /patients/:id
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Patient>, ApiError> {
    Ok(Json(state.patients.get(id).await?))
}

/// PUT /patients/:id
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PatientDemographics>,
) -> Result<Json<Patient>, ApiError> {
    Ok(Json(state.patients.update_demographics(id, req).await?))
}

/// PATCH /patients/:id/medical
pub async fn update_medical(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PatientMedicalUpdate>,
) -> Result<Json<Patient>, ApiError> {
    Ok(Json(state.patients.update_medical(id, req).await?))
}

/// DELETE /patients/:id
///
/// Document rows go with the patient row; their stored objects are
/// released afterwards.
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.documents.delete_patient(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /patients/search?q=
pub async fn search_patients(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PatientSearchQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(state.patients.search(&query.q).await?))
}
