use async_trait::async_trait;

use super::{PrescriptionRepository, RepoResult};
use crate::db::{now_timestamp, DbPool, NewPrescription, Prescription};

pub struct SqlitePrescriptionRepository {
    db: DbPool,
}

impl SqlitePrescriptionRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PrescriptionRepository for SqlitePrescriptionRepository {
    async fn create(&self, prescription: &NewPrescription) -> RepoResult<Prescription> {
        let created = sqlx::query_as::<_, Prescription>(
            r#"
            INSERT INTO prescriptions (patient_id, doctor_id, medication, dosage, frequency, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, patient_id, doctor_id, medication, dosage, frequency, notes, created_at
            "#,
        )
        .bind(prescription.patient_id)
        .bind(prescription.doctor_id)
        .bind(&prescription.medication)
        .bind(&prescription.dosage)
        .bind(&prescription.frequency)
        .bind(&prescription.notes)
        .bind(now_timestamp())
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn list_for_patient(&self, patient_id: i64) -> RepoResult<Vec<Prescription>> {
        let prescriptions = sqlx::query_as::<_, Prescription>(
            r#"
            SELECT id, patient_id, doctor_id, medication, dosage, frequency, notes, created_at
            FROM prescriptions
            WHERE patient_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.db)
        .await?;
        Ok(prescriptions)
    }
}
