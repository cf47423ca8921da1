use async_trait::async_trait;

use super::{PatientRepository, RepoError, RepoResult};
use crate::db::{now_timestamp, DbPool, Patient, PatientDemographics, PatientMedicalUpdate};

const PATIENT_COLUMNS: &str =
    "id, name, age, address, phone_number, diagnosis, notes, created_at, updated_at";

pub struct SqlitePatientRepository {
    db: DbPool,
}

impl SqlitePatientRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

/// Escape LIKE wildcards so user input only ever matches literally
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl PatientRepository for SqlitePatientRepository {
    async fn create(&self, demographics: &PatientDemographics) -> RepoResult<Patient> {
        let now = now_timestamp();
        let query = format!(
            "INSERT INTO patients (name, age, address, phone_number, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            PATIENT_COLUMNS
        );
        let patient = sqlx::query_as::<_, Patient>(&query)
            .bind(&demographics.name)
            .bind(demographics.age)
            .bind(&demographics.address)
            .bind(&demographics.phone_number)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.db)
            .await?;
        Ok(patient)
    }

    async fn get(&self, id: i64) -> RepoResult<Patient> {
        let query = format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS);
        let patient = sqlx::query_as::<_, Patient>(&query)
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(patient)
    }

    async fn list(&self) -> RepoResult<Vec<Patient>> {
        let query = format!(
            "SELECT {} FROM patients ORDER BY created_at DESC, id DESC",
            PATIENT_COLUMNS
        );
        let patients = sqlx::query_as::<_, Patient>(&query)
            .fetch_all(&self.db)
            .await?;
        Ok(patients)
    }

    async fn update_demographics(&self, id: i64, demographics: &PatientDemographics) -> RepoResult<Patient> {
        let query = format!(
            "UPDATE patients SET name = ?, age = ?, address = ?, phone_number = ?, updated_at = ? \
             WHERE id = ? RETURNING {}",
            PATIENT_COLUMNS
        );
        sqlx::query_as::<_, Patient>(&query)
            .bind(&demographics.name)
            .bind(demographics.age)
            .bind(&demographics.address)
            .bind(&demographics.phone_number)
            .bind(now_timestamp())
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn update_medical(&self, id: i64, medical: &PatientMedicalUpdate) -> RepoResult<Patient> {
        let query = format!(
            "UPDATE patients SET diagnosis = ?, notes = ?, updated_at = ? WHERE id = ? RETURNING {}",
            PATIENT_COLUMNS
        );
        sqlx::query_as::<_, Patient>(&query)
            .bind(&medical.diagnosis)
            .bind(&medical.notes)
            .bind(now_timestamp())
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i64) -> RepoResult<Vec<String>> {
        let mut tx = self.db.begin().await?;

        // Writing first takes the write lock, so no upload can add a row
        // between collecting the object ids and removing the patient.
        let object_ids: Vec<String> = sqlx::query_scalar(
            "DELETE FROM patient_documents WHERE patient_id = ? RETURNING external_object_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(RepoError::NotFound);
        }

        tx.commit().await?;
        Ok(object_ids)
    }

    async fn search_by_name(&self, fragment: &str) -> RepoResult<Vec<Patient>> {
        let query = format!(
            "SELECT {} FROM patients WHERE name LIKE ? ESCAPE '\\' \
             ORDER BY name COLLATE NOCASE ASC, id ASC",
            PATIENT_COLUMNS
        );
        let pattern = format!("%{}%", escape_like(fragment));
        let patients = sqlx::query_as::<_, Patient>(&query)
            .bind(pattern)
            .fetch_all(&self.db)
            .await?;
        Ok(patients)
    }
}
