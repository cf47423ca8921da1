use std::sync::Arc;
use tracing::{info, warn};

use super::validation::{validate_new_password, validate_username, FieldErrors};
use super::ServiceError;
use crate::auth::{password, Identity, TokenError, TokenIssuer};
use crate::config::AuthConfig;
use crate::db::{Role, User};
use crate::repository::{RepoError, SqliteUserRepository, UserRepository};
use crate::DbPool;

/// Login and token verification
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    /// SQLite-backed service. Needs nothing but the pool, so account
    /// provisioning works without the object store being reachable.
    pub fn from_config(db: DbPool, auth: &AuthConfig) -> Self {
        Self::new(
            Arc::new(SqliteUserRepository::new(db)),
            TokenIssuer::new(&auth.jwt_secret, auth.token_ttl_hours),
        )
    }

    /// Check credentials and mint a bearer token.
    ///
    /// An unknown username still pays for one password verification and
    /// yields the same error as a wrong password.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ServiceError> {
        let user = match self.users.find_by_username(username).await {
            Ok(user) => Some(user),
            Err(RepoError::NotFound) => None,
            Err(e) => return Err(ServiceError::from_repo("user", e)),
        };

        let candidate = password.to_string();
        let hash = user.as_ref().map(|u| u.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => password::verify_password(&candidate, &hash),
            None => {
                password::verify_dummy(&candidate);
                false
            }
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("password verification failed: {}", e)))?;

        let user = match (user, verified) {
            (Some(user), true) => user,
            _ => {
                warn!(username = %username, "Failed login attempt");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let token = self
            .tokens
            .issue(&user)
            .map_err(|e| ServiceError::Internal(format!("failed to sign token: {}", e)))?;

        info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(token)
    }

    /// Verify a bearer token and resolve the caller's identity
    pub fn authenticate(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.tokens.verify(token)?;
        Identity::try_from(claims)
    }

    /// Provision a staff account
    pub async fn create_user(&self, username: &str, password: &str, role: Role) -> Result<User, ServiceError> {
        let mut errors = FieldErrors::new();
        errors
            .check("username", validate_username(username))
            .check("password", validate_new_password(password));
        errors.finish()?;

        let candidate = password.to_string();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&candidate))
            .await
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))?
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))?;

        let user = self
            .users
            .create(username, &hash, role)
            .await
            .map_err(|e| ServiceError::from_repo("user", e))?;

        info!(user_id = user.id, username = %user.username, role = %user.role, "Created user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageBackend};

    async fn service() -> AuthService {
        let db = crate::db::init_in_memory().await.unwrap();
        AuthService::new(
            Arc::new(SqliteUserRepository::new(db)),
            TokenIssuer::new("test-secret", 72),
        )
    }

    #[tokio::test]
    async fn test_login_token_carries_stored_identity() {
        let service = service().await;
        let user = service
            .create_user("reception1", "front-desk-pass", Role::Receptionist)
            .await
            .unwrap();

        let token = service.login("reception1", "front-desk-pass").await.unwrap();
        let identity = service.authenticate(&token).unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.username, "reception1");
        assert_eq!(identity.role, Role::Receptionist);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_identical() {
        let service = service().await;
        service
            .create_user("drwho", "tardis-blue-box", Role::Doctor)
            .await
            .unwrap();

        let wrong = service.login("drwho", "not-it").await.unwrap_err();
        let unknown = service.login("nobody", "not-it").await.unwrap_err();
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_create_user_validates_and_rejects_duplicates() {
        let service = service().await;
        assert!(matches!(
            service.create_user("x", "short", Role::Doctor).await,
            Err(ServiceError::Validation(errors)) if errors.len() == 2
        ));

        service
            .create_user("drgrey", "long-enough", Role::Doctor)
            .await
            .unwrap();
        assert!(matches!(
            service.create_user("drgrey", "long-enough", Role::Doctor).await,
            Err(ServiceError::Conflict("user"))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_foreign_tokens() {
        let service = service().await;
        let other = TokenIssuer::new("other-secret", 72);
        let user = User {
            id: 1,
            username: "x".to_string(),
            password_hash: String::new(),
            role: Role::Doctor,
            created_at: String::new(),
        };
        let token = other.issue(&user).unwrap();
        assert_eq!(service.authenticate(&token), Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn test_provisioning_needs_only_the_database() {
        let db = crate::db::init_in_memory().await.unwrap();
        // An S3 backend with no bucket would fail to build an object store
        let mut config = Config::default();
        config.storage.backend = StorageBackend::S3;
        config.auth.jwt_secret = "provision-secret".to_string();

        let service = AuthService::from_config(db, &config.auth);
        let user = service
            .create_user("dr_house", "diagnostic-pass", Role::Doctor)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Doctor);

        let token = service.login("dr_house", "diagnostic-pass").await.unwrap();
        assert_eq!(service.authenticate(&token).unwrap().user_id, user.id);
    }
}
