//! Persistence capabilities for each resource.
//!
//! Every repository is an async trait with one SQLite implementation. Services
//! only ever hold `Arc<dyn ...Repository>`, so tests can substitute fakes.

mod documents;
mod patients;
mod prescriptions;
mod users;

pub use documents::SqliteDocumentRepository;
pub use patients::SqlitePatientRepository;
pub use prescriptions::SqlitePrescriptionRepository;
pub use users::SqliteUserRepository;

use async_trait::async_trait;

use crate::db::{
    Document, NewDocument, NewPrescription, Patient, PatientDemographics, PatientMedicalUpdate,
    Prescription, Role, User,
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// No row matched the lookup, or an update/delete touched zero rows
    #[error("record not found")]
    NotFound,
    /// A unique constraint rejected the write
    #[error("record already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed") => {
                RepoError::Conflict
            }
            _ => RepoError::Database(err),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> RepoResult<User>;
    async fn create(&self, username: &str, password_hash: &str, role: Role) -> RepoResult<User>;
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn create(&self, demographics: &PatientDemographics) -> RepoResult<Patient>;
    async fn get(&self, id: i64) -> RepoResult<Patient>;
    /// All patients, newest first
    async fn list(&self) -> RepoResult<Vec<Patient>>;
    /// Overwrite name, age, address and phone number. Never touches medical fields.
    async fn update_demographics(&self, id: i64, demographics: &PatientDemographics) -> RepoResult<Patient>;
    /// Overwrite diagnosis and notes. Never touches demographic fields.
    async fn update_medical(&self, id: i64, medical: &PatientMedicalUpdate) -> RepoResult<Patient>;
    /// Delete the patient and their document rows in one transaction,
    /// returning the external object ids the removed documents pointed at.
    /// Prescriptions go with the patient through the cascade.
    async fn delete(&self, id: i64) -> RepoResult<Vec<String>>;
    /// Case-insensitive substring match on name, ordered by name
    async fn search_by_name(&self, fragment: &str) -> RepoResult<Vec<Patient>>;
}

#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    async fn create(&self, prescription: &NewPrescription) -> RepoResult<Prescription>;
    /// Prescriptions for a patient, newest first
    async fn list_for_patient(&self, patient_id: i64) -> RepoResult<Vec<Prescription>>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, document: &NewDocument) -> RepoResult<Document>;
    async fn get(&self, id: i64) -> RepoResult<Document>;
    /// Documents for a patient, most recently uploaded first
    async fn list_for_patient(&self, patient_id: i64) -> RepoResult<Vec<Document>>;
    /// Hard delete by id
    async fn delete(&self, id: i64) -> RepoResult<()>;
}
