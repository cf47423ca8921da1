use std::sync::Arc;
use tracing::info;

use super::validation::{
    validate_age, validate_optional, validate_phone_number, validate_required, FieldErrors,
    MAX_NAME_LEN, MAX_TEXT_LEN,
};
use super::ServiceError;
use crate::db::{Patient, PatientDemographics, PatientMedicalUpdate};
use crate::repository::PatientRepository;

/// Patient records.
///
/// Demographic and medical updates are separate operations over disjoint
/// field sets; nothing here writes both at once.
pub struct PatientService {
    patients: Arc<dyn PatientRepository>,
}

fn normalize_demographics(mut demographics: PatientDemographics) -> PatientDemographics {
    demographics.name = demographics.name.trim().to_string();
    demographics.address = demographics.address.trim().to_string();
    demographics.phone_number = demographics
        .phone_number
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    demographics
}

fn validate_demographics(demographics: &PatientDemographics) -> Result<(), ServiceError> {
    let mut errors = FieldErrors::new();
    errors
        .check("name", validate_required("Name", &demographics.name, MAX_NAME_LEN))
        .check("age", validate_age(demographics.age))
        .check("address", validate_required("Address", &demographics.address, MAX_TEXT_LEN))
        .check("phone_number", validate_phone_number(demographics.phone_number.as_deref()));
    errors.finish()
}

impl PatientService {
    pub fn new(patients: Arc<dyn PatientRepository>) -> Self {
        Self { patients }
    }

    pub async fn create(&self, demographics: PatientDemographics) -> Result<Patient, ServiceError> {
        let demographics = normalize_demographics(demographics);
        validate_demographics(&demographics)?;

        let patient = self
            .patients
            .create(&demographics)
            .await
            .map_err(|e| ServiceError::from_repo("patient", e))?;
        info!(patient_id = patient.id, "Created patient");
        Ok(patient)
    }

    pub async fn get(&self, id: i64) -> Result<Patient, ServiceError> {
        self.patients
            .get(id)
            .await
            .map_err(|e| ServiceError::from_repo("patient", e))
    }

    pub async fn list(&self) -> Result<Vec<Patient>, ServiceError> {
        self.patients
            .list()
            .await
            .map_err(|e| ServiceError::from_repo("patient", e))
    }

    /// Receptionist update: name, age, address and phone number only
    pub async fn update_demographics(&self, id: i64, demographics: PatientDemographics) -> Result<Patient, ServiceError> {
        let demographics = normalize_demographics(demographics);
        validate_demographics(&demographics)?;

        let patient = self
            .patients
            .update_demographics(id, &demographics)
            .await
            .map_err(|e| ServiceError::from_repo("patient", e))?;
        info!(patient_id = id, "Updated patient demographics");
        Ok(patient)
    }

    /// Doctor update: diagnosis and notes only
    pub async fn update_medical(&self, id: i64, mut medical: PatientMedicalUpdate) -> Result<Patient, ServiceError> {
        medical.diagnosis = medical.diagnosis.trim().to_string();
        medical.notes = medical.notes.filter(|n| !n.trim().is_empty());

        let mut errors = FieldErrors::new();
        errors
            .check("diagnosis", validate_required("Diagnosis", &medical.diagnosis, MAX_TEXT_LEN))
            .check("notes", validate_optional("Notes", medical.notes.as_deref(), MAX_TEXT_LEN));
        errors.finish()?;

        let patient = self
            .patients
            .update_medical(id, &medical)
            .await
            .map_err(|e| ServiceError::from_repo("patient", e))?;
        info!(patient_id = id, "Updated patient medical record");
        Ok(patient)
    }

    /// Case-insensitive substring search on name, alphabetical
    pub async fn search(&self, query: &str) -> Result<Vec<Patient>, ServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::validation("q", "Search query is required"));
        }
        self.patients
            .search_by_name(query)
            .await
            .map_err(|e| ServiceError::from_repo("patient", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqlitePatientRepository;

    async fn service() -> PatientService {
        let db = crate::db::init_in_memory().await.unwrap();
        PatientService::new(Arc::new(SqlitePatientRepository::new(db)))
    }

    fn demographics(name: &str, age: i64) -> PatientDemographics {
        PatientDemographics {
            name: name.to_string(),
            age,
            address: "X".to_string(),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates_all_fields() {
        let service = service().await;
        let result = service
            .create(PatientDemographics {
                name: " ".to_string(),
                age: 0,
                address: String::new(),
                phone_number: Some("abc".to_string()),
            })
            .await;

        match result {
            Err(ServiceError::Validation(errors)) => {
                for field in ["name", "age", "address", "phone_number"] {
                    assert!(errors.contains_key(field), "missing error for {}", field);
                }
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_trims_and_drops_blank_phone() {
        let service = service().await;
        let mut input = demographics("  A  ", 30);
        input.phone_number = Some("  ".to_string());
        let patient = service.create(input).await.unwrap();
        assert_eq!(patient.name, "A");
        assert!(patient.phone_number.is_none());
    }

    #[tokio::test]
    async fn test_medical_then_demographic_updates_are_disjoint() {
        let service = service().await;
        let patient = service.create(demographics("A", 30)).await.unwrap();

        let after_medical = service
            .update_medical(
                patient.id,
                PatientMedicalUpdate {
                    diagnosis: "Flu".to_string(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(after_medical.diagnosis.as_deref(), Some("Flu"));
        assert_eq!(after_medical.name, "A");

        let after_demographics = service
            .update_demographics(patient.id, demographics("B", 31))
            .await
            .unwrap();
        assert_eq!(after_demographics.name, "B");
        assert_eq!(after_demographics.diagnosis.as_deref(), Some("Flu"));
    }

    #[tokio::test]
    async fn test_medical_update_requires_diagnosis() {
        let service = service().await;
        let patient = service.create(demographics("A", 30)).await.unwrap();
        let result = service
            .update_medical(
                patient.id,
                PatientMedicalUpdate {
                    diagnosis: "  ".to_string(),
                    notes: Some("n".to_string()),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_not_found_is_distinguished() {
        let service = service().await;
        assert!(matches!(service.get(99).await, Err(ServiceError::NotFound("patient"))));
        assert!(matches!(
            service.update_demographics(99, demographics("A", 30)).await,
            Err(ServiceError::NotFound("patient"))
        ));
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let service = service().await;
        assert!(matches!(service.search("   ").await, Err(ServiceError::Validation(_))));

        service.create(demographics("Zoe", 30)).await.unwrap();
        service.create(demographics("zack", 30)).await.unwrap();
        let found = service.search(" Z ").await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zack", "Zoe"]);
    }
}
