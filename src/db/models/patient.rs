//! Patient records and the two disjoint update payloads.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub address: String,
    pub phone_number: Option<String>,
    /// Absent until the first medical update by a doctor
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Demographic fields. Used for both creation and the receptionist's PUT.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientDemographics {
    pub name: String,
    pub age: i64,
    pub address: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Medical fields, written only through the doctor's PATCH.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientMedicalUpdate {
    pub diagnosis: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientSearchQuery {
    #[serde(default)]
    pub q: String,
}
