use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::User;

/// Request body for `POST /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Request body for `PUT|PATCH /users/:id`. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Public view of a user. Has no password field at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_body_uses_camel_case() {
        let body: UpdateUser =
            serde_json::from_str(r#"{"isActive": false, "name": "B"}"#).unwrap();
        assert_eq!(body.is_active, Some(false));
        assert_eq!(body.name.as_deref(), Some("B"));
        assert!(body.email.is_none());
        assert!(body.password.is_none());
    }

    #[test]
    fn response_never_serializes_password() {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            name: "A".into(),
            password_hash: "$argon2id$secret".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["isActive"], true);
        assert!(json["createdAt"].is_string());
    }
}
