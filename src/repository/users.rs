use async_trait::async_trait;

use super::{RepoResult, UserRepository};
use crate::db::{now_timestamp, DbPool, Role, User};

pub struct SqliteUserRepository {
    db: DbPool,
}

impl SqliteUserRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_username(&self, username: &str) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, role, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, username: &str, password_hash: &str, role: Role) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, role, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, username, password_hash, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now_timestamp())
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepoError;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = SqliteUserRepository::new(crate::db::init_in_memory().await.unwrap());
        let created = repo.create("alice", "hash", Role::Doctor).await.unwrap();

        let found = repo.find_by_username("alice").await.unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, Role::Doctor);
        assert_eq!(found.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_unknown_username_is_not_found() {
        let repo = SqliteUserRepository::new(crate::db::init_in_memory().await.unwrap());
        assert!(matches!(repo.find_by_username("ghost").await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let repo = SqliteUserRepository::new(crate::db::init_in_memory().await.unwrap());
        repo.create("bob", "hash", Role::Receptionist).await.unwrap();
        assert!(matches!(
            repo.create("bob", "other", Role::Doctor).await,
            Err(RepoError::Conflict)
        ));
    }
}
