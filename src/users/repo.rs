use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, Error)]
pub enum RepoError {
    /// A write hit a unique constraint; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage access for `User` rows. No business rules live here.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> RepoResult<Vec<User>>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    async fn create(&self, user: NewUser) -> RepoResult<User>;

    /// Returns `None` when no row matched `id`.
    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>>;

    /// Returns whether a row existed and was removed.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

const USER_COLUMNS: &str = "id, email, name, password_hash, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const UNIQUE_VIOLATION: &str = "23505";

/// Constraint name when the SQLSTATE is a unique violation.
fn unique_violation(code: Option<&str>, constraint: Option<&str>) -> Option<String> {
    (code == Some(UNIQUE_VIOLATION)).then(|| constraint.unwrap_or("unique").to_string())
}

fn map_write_err(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db_err) = &e {
        if let Some(constraint) = unique_violation(db_err.code().as_deref(), db_err.constraint()) {
            return RepoError::UniqueViolation(constraint);
        }
    }
    RepoError::Database(e)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_all(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)?;
        info!(user_id = %created.id, email = %created.email, "user created");
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   name = COALESCE($3, name),
                   password_hash = COALESCE($4, password_hash),
                   is_active = COALESCE($5, is_active),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.name)
        .bind(changes.password_hash)
        .bind(changes.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_err)?;
        if updated.is_some() {
            info!(user_id = %id, "user updated");
        }
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        let removed = result.rows_affected() > 0;
        debug!(user_id = %id, removed, "user delete");
        Ok(removed)
    }
}

/// In-memory repository used as a storage double. Enforces the same
/// case-insensitive unique email index as the `users` table.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: std::sync::Arc<tokio::sync::RwLock<Vec<User>>>,
}

#[cfg(test)]
impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_all(&self) -> RepoResult<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepoError::UniqueViolation("users_email_key".into()));
        }
        let now = time::OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && u.email.eq_ignore_ascii_case(email)) {
                return Err(RepoError::UniqueViolation("users_email_key".into()));
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(active) = changes.is_active {
            user.is_active = active;
        }
        user.updated_at = time::OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Test".into(),
            password_hash: "$argon2id$fake".into(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("a@x.com")).await.unwrap();
        assert!(user.is_active);
        assert_eq!(user.created_at, user.updated_at);
        let found = repo.find_by_id(user.id).await.unwrap().expect("stored");
        assert_eq!(found.email, "a@x.com");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("a@x.com")).await.unwrap();
        let err = repo.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(_)));
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[test]
    fn only_sqlstate_23505_is_a_unique_violation() {
        assert_eq!(
            unique_violation(Some("23505"), Some("users_email_key")).as_deref(),
            Some("users_email_key")
        );
        assert_eq!(unique_violation(Some("23505"), None).as_deref(), Some("unique"));
        assert!(unique_violation(Some("23503"), Some("users_fk")).is_none());
        assert!(unique_violation(None, None).is_none());
    }

    #[test]
    fn non_database_errors_stay_database_errors() {
        assert!(matches!(
            map_write_err(sqlx::Error::RowNotFound),
            RepoError::Database(sqlx::Error::RowNotFound)
        ));
    }

    /// Runs against a live Postgres: `DATABASE_URL=... cargo test -- --ignored`.
    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn postgres_unique_index_is_case_insensitive() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let db = PgPool::connect(&url).await.expect("connect");
        crate::db::run_migrations(&db).await.expect("migrate");
        let repo = PgUserRepository::new(db);

        let email = format!("{}@x.com", Uuid::new_v4());
        let created = repo.create(new_user(&email)).await.expect("first insert");
        let err = repo
            .create(new_user(&email.to_uppercase()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(ref c) if c == "users_email_key"));
        let found = repo.find_by_email(&email.to_uppercase()).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));

        assert!(repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("a@x.com")).await.unwrap();
        let found = repo.find_by_email("A@X.COM").await.unwrap().expect("found");
        assert_eq!(found.id, user.id);
        let err = repo.create(new_user("A@x.com")).await.unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn find_all_keeps_insertion_order() {
        let repo = InMemoryUserRepository::new();
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            repo.create(new_user(email)).await.unwrap();
        }
        let emails: Vec<_> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, ["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("a@x.com")).await.unwrap();
        let changes = UserChanges {
            is_active: Some(false),
            ..Default::default()
        };
        let updated = repo.update(user.id, changes).await.unwrap().unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.name, "Test");
        assert_eq!(updated.id, user.id);
    }

    #[tokio::test]
    async fn update_missing_row_returns_none() {
        let repo = InMemoryUserRepository::new();
        let res = repo
            .update(Uuid::new_v4(), UserChanges::default())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn update_to_taken_email_violates_constraint() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("a@x.com")).await.unwrap();
        let b = repo.create(new_user("b@x.com")).await.unwrap();
        let changes = UserChanges {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        let err = repo.update(b.id, changes).await.unwrap_err();
        assert!(matches!(err, RepoError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(new_user("a@x.com")).await.unwrap();
        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
    }
}
