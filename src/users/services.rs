use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{instrument, Span};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    users::{
        dto::{CreateUser, UpdateUser, UserResponse},
        password::hash_password_blocking,
        repo::UserRepository,
        repo_types::{NewUser, UserChanges},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails compare case-insensitively; they are stored trimmed and lowercased.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Collects per-field messages; empty means valid.
#[derive(Default)]
struct FieldErrors(Map<String, Value>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: &str) {
        self.0.insert(field.to_string(), Value::String(message.to_string()));
    }

    fn check_email(&mut self, email: &str) {
        if !is_valid_email(email) {
            self.add("email", "must be a valid email address");
        }
    }

    fn check_name(&mut self, name: &str) {
        if name.trim().is_empty() {
            self.add("name", "must not be empty");
        }
    }

    fn check_password(&mut self, password: &str) {
        if password.is_empty() {
            self.add("password", "must not be empty");
        }
    }

    fn into_result(self) -> ApiResult<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(ApiError::Validation {
            message: "Validation failed".into(),
            errors: Some(Value::Object(self.0)),
        })
    }
}

/// Business rules on top of a [`UserRepository`].
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_all_users(&self) -> ApiResult<Vec<UserResponse>> {
        let users = self.repo.find_all().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> ApiResult<UserResponse> {
        let user = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(ApiError::not_found)?;
        Ok(user.into())
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUser) -> ApiResult<UserResponse> {
        let email = normalize_email(&input.email);
        let mut errors = FieldErrors::default();
        errors.check_email(&email);
        errors.check_name(&input.name);
        errors.check_password(&input.password);
        errors.into_result()?;

        // Friendly pre-check; the unique constraint still decides races.
        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(ApiError::email_exists());
        }

        let password_hash = hash_password_blocking(input.password).await?;
        let user = self
            .repo
            .create(NewUser {
                email,
                name: input.name,
                password_hash,
            })
            .await?;
        Ok(user.into())
    }

    #[instrument(skip(self, input), fields(owner_id = tracing::field::Empty))]
    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> ApiResult<UserResponse> {
        let existing = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(ApiError::not_found)?;

        let email = input.email.as_deref().map(normalize_email);
        let mut errors = FieldErrors::default();
        if let Some(email) = &email {
            errors.check_email(email);
        }
        if let Some(name) = &input.name {
            errors.check_name(name);
        }
        if let Some(password) = &input.password {
            errors.check_password(password);
        }
        errors.into_result()?;

        if let Some(email) = &email {
            if let Some(owner) = self.repo.find_by_email(email).await? {
                if owner.id != existing.id {
                    Span::current().record("owner_id", tracing::field::display(owner.id));
                    return Err(ApiError::email_exists());
                }
            }
        }

        let password_hash = match input.password {
            Some(plain) => Some(hash_password_blocking(plain).await?),
            None => None,
        };

        let changes = UserChanges {
            email,
            name: input.name,
            password_hash,
            is_active: input.is_active,
        };
        let updated = self
            .repo
            .update(id, changes)
            .await?
            .ok_or_else(|| ApiError::Internal("Failed to update user".into()))?;
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> ApiResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ApiError::not_found());
        }
        Ok(())
    }
}
