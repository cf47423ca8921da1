use std::sync::Arc;
use tracing::info;

use super::validation::{validate_optional, validate_required, FieldErrors, MAX_NAME_LEN, MAX_TEXT_LEN};
use super::ServiceError;
use crate::auth::Identity;
use crate::db::{CreatePrescriptionRequest, NewPrescription, Prescription};
use crate::repository::{PatientRepository, PrescriptionRepository};

/// Append-only prescriptions
pub struct PrescriptionService {
    patients: Arc<dyn PatientRepository>,
    prescriptions: Arc<dyn PrescriptionRepository>,
}

impl PrescriptionService {
    pub fn new(patients: Arc<dyn PatientRepository>, prescriptions: Arc<dyn PrescriptionRepository>) -> Self {
        Self {
            patients,
            prescriptions,
        }
    }

    /// Record a prescription written by `prescriber`.
    ///
    /// The doctor id always comes from the authenticated identity.
    pub async fn create(
        &self,
        patient_id: i64,
        prescriber: &Identity,
        request: CreatePrescriptionRequest,
    ) -> Result<Prescription, ServiceError> {
        let mut errors = FieldErrors::new();
        errors
            .check("medication", validate_required("Medication", &request.medication, MAX_NAME_LEN))
            .check("dosage", validate_required("Dosage", &request.dosage, MAX_NAME_LEN))
            .check("frequency", validate_required("Frequency", &request.frequency, MAX_NAME_LEN))
            .check("notes", validate_optional("Notes", request.notes.as_deref(), MAX_TEXT_LEN));
        errors.finish()?;

        self.ensure_patient(patient_id).await?;

        let prescription = NewPrescription {
            patient_id,
            doctor_id: prescriber.user_id,
            medication: request.medication.trim().to_string(),
            dosage: request.dosage.trim().to_string(),
            frequency: request.frequency.trim().to_string(),
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        };

        let created = self
            .prescriptions
            .create(&prescription)
            .await
            .map_err(|e| ServiceError::from_repo("prescription", e))?;
        info!(
            prescription_id = created.id,
            patient_id,
            doctor_id = created.doctor_id,
            "Created prescription"
        );
        Ok(created)
    }

    pub async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<Prescription>, ServiceError> {
        self.ensure_patient(patient_id).await?;
        self.prescriptions
            .list_for_patient(patient_id)
            .await
            .map_err(|e| ServiceError::from_repo("prescription", e))
    }

    async fn ensure_patient(&self, patient_id: i64) -> Result<(), ServiceError> {
        self.patients
            .get(patient_id)
            .await
            .map(|_| ())
            .map_err(|e| ServiceError::from_repo("patient", e))
    }
}
