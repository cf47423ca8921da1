//! Business rules for each resource.
//!
//! Services sit between the HTTP handlers and the repositories. They validate
//! input, translate repository outcomes into [`ServiceError`] and, for
//! documents, coordinate the object store with the database.

mod auth;
mod documents;
mod patients;
mod prescriptions;
pub mod validation;

pub use auth::AuthService;
pub use documents::{DocumentService, DocumentUpload};
pub use patients::PatientService;
pub use prescriptions::PrescriptionService;

use std::collections::HashMap;
use std::future::Future;

use crate::repository::RepoError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Field name to the problems found with it
    #[error("validation failed")]
    Validation(HashMap<String, Vec<String>>),
    /// Unknown username and wrong password are deliberately the same error
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Translate a repository error for `resource`, keeping not-found distinct
    /// from storage failures.
    pub fn from_repo(resource: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ServiceError::NotFound(resource),
            RepoError::Conflict => ServiceError::Conflict(resource),
            RepoError::Database(e) => {
                tracing::error!(resource, error = %e, "Database error");
                ServiceError::Internal(e.to_string())
            }
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ServiceError::Validation(errors)
    }
}

/// Run a multi-step operation on its own task.
///
/// The caller awaits the result, but dropping the caller (client disconnect)
/// no longer cancels the work halfway through.
pub(crate) async fn run_detached<F, T>(operation: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| ServiceError::Internal(format!("background task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_errors_map_to_service_errors() {
        assert!(matches!(
            ServiceError::from_repo("patient", RepoError::NotFound),
            ServiceError::NotFound("patient")
        ));
        assert!(matches!(
            ServiceError::from_repo("user", RepoError::Conflict),
            ServiceError::Conflict("user")
        ));
        assert!(matches!(
            ServiceError::from_repo("patient", RepoError::Database(sqlx::Error::PoolClosed)),
            ServiceError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_run_detached_returns_result() {
        let value = run_detached(async { Ok::<_, ServiceError>(5) }).await.unwrap();
        assert_eq!(value, 5);

        let err = run_detached(async { Err::<(), _>(ServiceError::NotFound("document")) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("document")));
    }
}
