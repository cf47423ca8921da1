//! Prescriptions. Append-only: there is no update or delete path.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Prescription {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

/// Client payload. Deliberately has no `doctor_id`: any such field in the
/// body is ignored and the prescriber comes from the bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A prescription ready to be persisted
#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub notes: Option<String>,
}
