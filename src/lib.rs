pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod repository;
pub mod services;
pub mod storage;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::repository::{
    SqliteDocumentRepository, SqlitePatientRepository, SqlitePrescriptionRepository,
};
use crate::services::{AuthService, DocumentService, PatientService, PrescriptionService};
use crate::storage::ObjectStore;

/// Everything a request handler can reach.
///
/// Built once at startup; none of it is mutated afterwards apart from the
/// rate limiter's counters.
pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub patients: PatientService,
    pub prescriptions: PrescriptionService,
    pub documents: Arc<DocumentService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, store: Arc<dyn ObjectStore>) -> Self {
        let patients = Arc::new(SqlitePatientRepository::new(db.clone()));
        let prescriptions = Arc::new(SqlitePrescriptionRepository::new(db.clone()));
        let documents = Arc::new(SqliteDocumentRepository::new(db.clone()));

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            auth: AuthService::from_config(db, &config.auth),
            patients: PatientService::new(patients.clone()),
            prescriptions: PrescriptionService::new(patients.clone(), prescriptions),
            documents: Arc::new(DocumentService::new(
                patients,
                documents,
                store,
                config.storage.key_prefix.clone(),
            )),
            rate_limiter,
            config,
        }
    }
}
